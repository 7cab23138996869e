// Layer 1: Standard library
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

// Layer 3: Internal
use crate::actor::{ActorView, Behavior, HandlerError};
use crate::ask::TimeoutHandler;
use crate::message::Message;
use crate::plan::{HandlerResult, MessagePlan, SendInstruction};
use crate::util::ActorAddress;

/// Timer actor address kind.
pub const TIMER_ACTOR_KIND: &str = "timer";

/// Timer actor address id.
pub const TIMER_ACTOR_ID: &str = "system_timer";

/// Schedule a delivery: `{target, message, delay, id?}`.
pub const SCHEDULE: &str = "SCHEDULE";

/// Cancel a scheduled delivery: `{id}`.
pub const CANCEL_SCHEDULED: &str = "CANCEL_SCHEDULED";

/// Advance the virtual clock (test mode): `{by}`.
pub const ADVANCE_TIME: &str = "ADVANCE_TIME";

/// Ask for the pending schedule.
pub const GET_SCHEDULED: &str = "GET_SCHEDULED";

/// Internal wake-up in real-time mode.
pub const TIMER_TICK: &str = "TIMER_TICK";

/// Switch between host clock and virtual clock: `{enabled}`.
pub const SET_TEST_MODE: &str = "SET_TEST_MODE";

/// One pending delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    /// Schedule id, for cancellation
    pub id: u64,

    /// Target actor path
    pub target: String,

    /// Message delivered when due
    pub message: Message,

    /// Due instant on the timer's clock
    pub scheduled_time_ms: i64,

    /// Insertion order, breaking due-time ties
    pub seq: u64,
}

/// The timer actor's context value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Current clock reading in ms (host-synced or virtual)
    pub current_time_ms: i64,

    /// Pending deliveries
    pub scheduled: Vec<ScheduledItem>,

    /// Next auto-assigned schedule id
    pub next_id: u64,

    /// Next insertion sequence number
    pub next_seq: u64,

    /// Whether the clock is virtual
    pub test_mode: bool,
}

impl TimerState {
    fn decode(context: &Value) -> Self {
        serde_json::from_value(context.clone()).unwrap_or_default()
    }

    fn encode(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Sync from the host clock; never rewinds on backwards clock jumps.
    fn sync_host_clock(&mut self) {
        self.current_time_ms = self.current_time_ms.max(Utc::now().timestamp_millis());
    }

    /// Remove and return everything due, in non-decreasing due time,
    /// ties broken by insertion order.
    fn take_due(&mut self) -> Vec<ScheduledItem> {
        let current = self.current_time_ms;
        let mut due: Vec<ScheduledItem> = self
            .scheduled
            .iter()
            .filter(|item| item.scheduled_time_ms <= current)
            .cloned()
            .collect();
        self.scheduled.retain(|item| item.scheduled_time_ms > current);
        due.sort_by_key(|item| (item.scheduled_time_ms, item.seq));
        due
    }
}

fn deliveries(due: Vec<ScheduledItem>) -> Vec<MessagePlan> {
    due.into_iter()
        .filter_map(|item| match ActorAddress::parse(&item.target) {
            Ok(target) => Some(MessagePlan::Send(SendInstruction::new(target, item.message))),
            Err(error) => {
                warn!(item_target = %item.target, %error, "dropping scheduled item with bad target");
                None
            }
        })
        .collect()
}

/// Behavior of the timer actor.
///
/// Constructed by the actor system at startup; applications talk to it
/// through its address (`timer://local/system_timer`) or
/// `ActorSystem::timer()`.
pub struct TimerBehavior {
    timeouts: TimeoutHandler,
    test_mode_at_start: bool,
    tick: Arc<dyn Fn() + Send + Sync>,
}

impl TimerBehavior {
    pub(crate) fn new(
        timeouts: TimeoutHandler,
        test_mode_at_start: bool,
        tick: Arc<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            timeouts,
            test_mode_at_start,
            tick,
        }
    }

    fn reply_if_asked(view: &ActorView, result: HandlerResult, reply: Message) -> HandlerResult {
        if view.is_ask() {
            result.reply(reply)
        } else {
            result
        }
    }

    fn schedule(&self, message: &Message, view: &ActorView) -> MessagePlan {
        let mut state = TimerState::decode(view.context());
        if !state.test_mode {
            state.sync_host_clock();
        }

        let Some(target) = message.str_field("target") else {
            return Self::reply_if_asked(
                view,
                HandlerResult::new(),
                Message::with_payload("SCHEDULE_ERROR", json!({"reason": "missing target"})),
            )
            .into();
        };
        if ActorAddress::parse(target).is_err() {
            return Self::reply_if_asked(
                view,
                HandlerResult::new(),
                Message::with_payload(
                    "SCHEDULE_ERROR",
                    json!({"reason": format!("invalid target: {target}")}),
                ),
            )
            .into();
        }
        let Ok(payload) =
            serde_json::from_value::<Message>(message.field("message").cloned().unwrap_or(Value::Null))
        else {
            return Self::reply_if_asked(
                view,
                HandlerResult::new(),
                Message::with_payload("SCHEDULE_ERROR", json!({"reason": "invalid message"})),
            )
            .into();
        };
        let delay = message.i64_field("delay").unwrap_or(0).max(0);

        let id = match message.i64_field("id") {
            Some(given) => given as u64,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                id
            }
        };
        let seq = state.next_seq;
        state.next_seq += 1;

        state.scheduled.push(ScheduledItem {
            id,
            target: target.to_string(),
            message: payload,
            scheduled_time_ms: state.current_time_ms + delay,
            seq,
        });

        // Due items (zero or past delay) flush in the same tick.
        let mut plan = deliveries(state.take_due());

        if !state.test_mode && delay > 0 {
            let tick = Arc::clone(&self.tick);
            self.timeouts.set_timeout_owned(
                TIMER_ACTOR_ID,
                Duration::from_millis(delay as u64),
                move || tick(),
            );
        }

        let result = Self::reply_if_asked(
            view,
            HandlerResult::new().context(state.encode()),
            Message::with_payload("SCHEDULED", json!({"id": id})),
        );
        plan.push(result.into());
        MessagePlan::Sequence(plan)
    }

    fn cancel(message: &Message, view: &ActorView) -> MessagePlan {
        let mut state = TimerState::decode(view.context());
        let id = message.i64_field("id").map(|id| id as u64);
        let before = state.scheduled.len();
        if let Some(id) = id {
            state.scheduled.retain(|item| item.id != id);
        }
        let removed = before - state.scheduled.len();
        Self::reply_if_asked(
            view,
            HandlerResult::new().context(state.encode()),
            Message::with_payload("CANCELLED", json!({"removed": removed})),
        )
        .into()
    }

    fn advance(message: &Message, view: &ActorView) -> MessagePlan {
        let mut state = TimerState::decode(view.context());
        if !state.test_mode {
            warn!("ADVANCE_TIME ignored outside test mode");
            return MessagePlan::Noop;
        }
        let by = message.i64_field("by").unwrap_or(0).max(0);
        state.current_time_ms += by;

        let mut plan = deliveries(state.take_due());
        let result = Self::reply_if_asked(
            view,
            HandlerResult::new().context(state.encode()),
            Message::with_payload(
                "TIME_ADVANCED",
                json!({"currentTime": state.current_time_ms}),
            ),
        );
        plan.push(result.into());
        MessagePlan::Sequence(plan)
    }

    fn tick_now(view: &ActorView) -> MessagePlan {
        let mut state = TimerState::decode(view.context());
        if state.test_mode {
            return MessagePlan::Noop;
        }
        state.sync_host_clock();
        let mut plan = deliveries(state.take_due());
        plan.push(HandlerResult::new().context(state.encode()).into());
        MessagePlan::Sequence(plan)
    }
}

#[async_trait]
impl Behavior for TimerBehavior {
    fn initial_context(&self) -> Value {
        TimerState {
            test_mode: self.test_mode_at_start,
            ..Default::default()
        }
        .encode()
    }

    async fn on_message(
        &self,
        message: &Message,
        view: &ActorView,
    ) -> Result<MessagePlan, HandlerError> {
        match message.kind() {
            SCHEDULE => Ok(self.schedule(message, view)),

            CANCEL_SCHEDULED => Ok(Self::cancel(message, view)),

            ADVANCE_TIME => Ok(Self::advance(message, view)),

            TIMER_TICK => Ok(Self::tick_now(view)),

            SET_TEST_MODE => {
                let mut state = TimerState::decode(view.context());
                state.test_mode = message.bool_field("enabled").unwrap_or(true);
                Ok(MessagePlan::Result(
                    HandlerResult::new().context(state.encode()),
                ))
            }

            GET_SCHEDULED => {
                let state = TimerState::decode(view.context());
                let items = serde_json::to_value(&state.scheduled).unwrap_or(Value::Null);
                Ok(Self::reply_if_asked(
                    view,
                    HandlerResult::new(),
                    Message::with_payload(
                        "SCHEDULED_ITEMS",
                        json!({"currentTime": state.current_time_ms, "items": items}),
                    ),
                )
                .into())
            }

            other => {
                warn!(kind = other, "timer actor received unknown message");
                Ok(MessagePlan::Noop)
            }
        }
    }
}
