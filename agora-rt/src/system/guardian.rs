//! The guardian: root system actor.
//!
//! The guardian sits at the root of the tree. Top-level actors spawn as its
//! children and inherit its supervision default; escalated failures that
//! climb past every user actor land in its mailbox; and it answers the
//! system-level commands (spawn, stop, info, health, shutdown).

// Layer 1: Standard library
use std::sync::Weak;

// Layer 2: Third-party
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, warn};

// Layer 3: Internal
use super::actor_system::{ActorSystem, ParentSpec, SpawnOptions, SystemShared};
use crate::actor::{ActorView, Behavior, HandlerError};
use crate::deadletter::DeadLetterReason;
use crate::message::{Message, MessageEnvelope};
use crate::plan::{HandlerResult, MessagePlan};
use crate::supervisor::SupervisionPolicy;
use crate::util::ActorAddress;

/// Guardian address kind.
pub const GUARDIAN_KIND: &str = "system";

/// Guardian address id.
pub const GUARDIAN_ID: &str = "guardian";

/// Spawn a registered behavior: `{behavior, id?, kind?}`.
pub const SPAWN_ACTOR: &str = "SPAWN_ACTOR";

/// Stop the actor at `{path}`.
pub const STOP_ACTOR: &str = "STOP_ACTOR";

/// Failure notification: `{path, reason, fatal}`.
pub const ACTOR_FAILED: &str = "ACTOR_FAILED";

/// Initiate graceful system shutdown.
pub const SHUTDOWN: &str = "SHUTDOWN";

/// Ask for runtime statistics.
pub const GET_SYSTEM_INFO: &str = "GET_SYSTEM_INFO";

/// Ask for a liveness summary.
pub const SYSTEM_HEALTH_CHECK: &str = "SYSTEM_HEALTH_CHECK";

/// Behavior of the root system actor.
pub struct GuardianBehavior {
    shared: Weak<SystemShared>,
}

impl GuardianBehavior {
    pub(crate) fn new(shared: Weak<SystemShared>) -> Self {
        Self { shared }
    }

    fn reply_or_noop(view: &ActorView, reply: Message) -> MessagePlan {
        if view.is_ask() {
            HandlerResult::new().reply(reply).into()
        } else {
            MessagePlan::Noop
        }
    }

    async fn spawn_requested(
        &self,
        message: &Message,
        view: &ActorView,
    ) -> Result<MessagePlan, HandlerError> {
        let Some(shared) = self.shared.upgrade() else {
            return Ok(MessagePlan::Noop);
        };
        let Some(factory_name) = message.str_field("behavior") else {
            return Ok(Self::reply_or_noop(
                view,
                Message::with_payload(
                    "SPAWN_FAILED",
                    json!({"reason": "missing behavior name"}),
                ),
            ));
        };
        let Some(factory) = shared
            .factories
            .get(factory_name)
            .map(|entry| std::sync::Arc::clone(entry.value()))
        else {
            return Ok(Self::reply_or_noop(
                view,
                Message::with_payload(
                    "SPAWN_FAILED",
                    json!({"reason": format!("unknown behavior: {factory_name}")}),
                ),
            ));
        };

        let system = ActorSystem::from_shared(shared);
        let options = SpawnOptions {
            id: message.str_field("id").map(str::to_string),
            kind: message.str_field("kind").map(str::to_string),
            parent: ParentSpec::Guardian,
            ..Default::default()
        };
        match system.spawn_internal(factory(), options).await {
            Ok(actor) => Ok(Self::reply_or_noop(
                view,
                Message::with_payload("ACTOR_SPAWNED", json!({"path": actor.path()})),
            )),
            Err(spawn_error) => Ok(Self::reply_or_noop(
                view,
                Message::with_payload(
                    "SPAWN_FAILED",
                    json!({"reason": spawn_error.to_string()}),
                ),
            )),
        }
    }
}

#[async_trait]
impl Behavior for GuardianBehavior {
    fn supervision_strategy(&self) -> Option<SupervisionPolicy> {
        Some(SupervisionPolicy::StopOnFailure)
    }

    async fn on_message(
        &self,
        message: &Message,
        view: &ActorView,
    ) -> Result<MessagePlan, HandlerError> {
        match message.kind() {
            GET_SYSTEM_INFO => {
                let Some(shared) = self.shared.upgrade() else {
                    return Ok(MessagePlan::Noop);
                };
                let cache = shared.directory.cache_stats();
                Ok(Self::reply_or_noop(
                    view,
                    Message::with_payload(
                        "SYSTEM_INFO",
                        json!({
                            "actorCount": shared.cells.len(),
                            "askPending": shared.correlations.pending_count(),
                            "askTimeoutRate": shared.correlations.timeout_rate(),
                            "cacheHitRate": cache.hit_rate,
                            "deadLetterCount": shared.dead_letters.len(),
                        }),
                    ),
                ))
            }

            SYSTEM_HEALTH_CHECK => {
                let Some(shared) = self.shared.upgrade() else {
                    return Ok(MessagePlan::Noop);
                };
                Ok(Self::reply_or_noop(
                    view,
                    Message::with_payload(
                        "HEALTH_OK",
                        json!({"healthy": true, "actors": shared.cells.len()}),
                    ),
                ))
            }

            SPAWN_ACTOR => self.spawn_requested(message, view).await,

            STOP_ACTOR => {
                let Some(shared) = self.shared.upgrade() else {
                    return Ok(MessagePlan::Noop);
                };
                let Some(path) = message.str_field("path") else {
                    return Ok(Self::reply_or_noop(
                        view,
                        Message::with_payload("STOP_FAILED", json!({"reason": "missing path"})),
                    ));
                };
                match ActorAddress::parse(path) {
                    Ok(address) => {
                        SystemShared::stop_and_join(&shared, &address).await;
                        Ok(Self::reply_or_noop(
                            view,
                            Message::with_payload("ACTOR_STOPPED", json!({"path": path})),
                        ))
                    }
                    Err(parse_error) => Ok(Self::reply_or_noop(
                        view,
                        Message::with_payload(
                            "STOP_FAILED",
                            json!({"reason": parse_error.to_string()}),
                        ),
                    )),
                }
            }

            ACTOR_FAILED => {
                let path = message.str_field("path").unwrap_or("<unknown>");
                let reason = message.str_field("reason").unwrap_or("<unspecified>");
                let fatal = message.bool_field("fatal") == Some(true);
                if fatal {
                    error!(actor = path, reason, "fatal failure escalated to guardian; shutting down");
                    if let Some(shared) = self.shared.upgrade() {
                        let system = ActorSystem::from_shared(shared);
                        tokio::spawn(async move {
                            let _ = system.stop().await;
                        });
                    }
                } else {
                    warn!(actor = path, reason, "failure escalated to guardian");
                }
                Ok(MessagePlan::Noop)
            }

            SHUTDOWN => {
                if let Some(shared) = self.shared.upgrade() {
                    let system = ActorSystem::from_shared(shared);
                    tokio::spawn(async move {
                        let _ = system.stop().await;
                    });
                }
                Ok(Self::reply_or_noop(
                    view,
                    Message::new("SHUTDOWN_INITIATED"),
                ))
            }

            _ => {
                // Unknown system commands are dead-lettered, not dropped.
                if let Some(shared) = self.shared.upgrade() {
                    shared.dead_letters.publish(
                        MessageEnvelope::new(message.clone()),
                        DeadLetterReason::NoSuchActor,
                    );
                }
                Ok(MessagePlan::Noop)
            }
        }
    }
}
