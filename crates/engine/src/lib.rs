//! Meal notification engine.
//!
//! The scheduled run ([`orchestrator::NotifySchedule`]) fans out from the
//! offers of a day to the devices of interested profiles:
//! catalog query → subscriptions → profiles → endpoint dedup → composer →
//! dispatcher → run log.

pub mod composer;
pub mod dedup;
pub mod dispatcher;
pub mod orchestrator;
pub mod pg_store;
pub mod run_lock;
pub mod run_log;
pub mod runs;
pub mod service;
pub mod store;

pub use composer::{Message, MessageComposer};
pub use orchestrator::{NotifySchedule, SCHEDULE_NAME};
pub use run_lock::{RedisRunGuard, RunGuard, RunLock};
pub use run_log::{RunLogSink, RunLogger};
pub use service::{LockPolicy, NotifyService, TriggerOutcome};
