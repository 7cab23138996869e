//! Scheduled message delivery through a pure-message timer actor.
//!
//! The timer is itself an actor: its context value holds the clock and the
//! scheduled items, and every operation (scheduling, cancelling, advancing
//! virtual time, listing) is a message. In real-time mode the clock syncs
//! from the host on each scheduling event and due items flush in the same
//! tick; in test mode time advances only via `ADVANCE_TIME`, which makes
//! delivery deterministic.
//!
//! # Module Organization
//!
//! This mod.rs file contains ONLY module declarations and re-exports.

pub mod timer_actor;

pub use timer_actor::{
    ScheduledItem, TimerBehavior, TimerState, ADVANCE_TIME, CANCEL_SCHEDULED, GET_SCHEDULED,
    SCHEDULE, SET_TEST_MODE, TIMER_ACTOR_ID, TIMER_ACTOR_KIND, TIMER_TICK,
};
