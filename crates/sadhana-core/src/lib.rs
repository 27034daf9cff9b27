//! # Sadhana Core Library
//!
//! Core business logic for a daily contemplative-practice companion:
//! six scheduled sessions per day, each advancing through a time-driven
//! status lifecycle, with reminder notifications that avoid duplicate or
//! stale submissions. Everything presentational (rendering, audio,
//! onboarding) lives in host layers that consume this crate read-only
//! and feed user intents back in.
//!
//! ## Architecture
//!
//! - **Status Engine**: a pure, clock-driven state machine
//!   (`Upcoming -> Due -> Missed`, with `Completed`/`Skipped` terminal);
//!   the caller invokes it via [`SessionOrchestrator::refresh_today`] on
//!   a periodic tick and on foreground/day-change triggers
//! - **Instance Store**: all day-collection reads and writes serialized
//!   behind one mutex, so a read-modify-write can never drop a
//!   concurrent status transition
//! - **Notification Planner**: quiet-hours filtering, content-hash
//!   deduplication, and debounced re-planning with a staleness check
//! - **Storage**: a string-keyed async [`KeyValueStore`] seam with
//!   in-memory and atomic-file backends
//!
//! ## Key Components
//!
//! - [`SessionOrchestrator`]: the public start/complete/skip/snooze
//!   surface consumed by UI layers
//! - [`NotificationPlanner`]: reminder planning against a host
//!   [`NotificationDispatcher`]
//! - [`InstanceStore`]: the serialized persistence path for daily
//!   instances

pub mod clock;
pub mod error;
pub mod events;
pub mod generator;
pub mod instance;
pub mod notify;
pub mod orchestrator;
pub mod schedule;
pub mod status;
pub mod storage;
pub mod template;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use events::{EventLog, EventLogEntry, EventType, MAX_EVENT_LOG_ENTRIES};
pub use generator::{generate_day, InstanceGenerator};
pub use instance::{instance_id, DailySessionInstance, SessionStatus};
pub use notify::{
    NotificationDispatcher, NotificationPlanner, RecordedReminder, RecordingDispatcher, Reminder,
};
pub use orchestrator::SessionOrchestrator;
pub use schedule::{AppSettings, QuietHours, ScheduleRepository, UserSchedule};
pub use status::{compute_status, next_due, DEFAULT_GRACE_WINDOW_MIN, MISSED_NEXT_DUE_GRACE_MIN};
pub use storage::{FileStore, InstanceStore, KeyValueStore, MemoryStore, RETENTION_DAYS};
pub use template::{template_by_id, PracticeType, SessionTemplate, TEMPLATES};
