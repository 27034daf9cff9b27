//! Notification planner.
//!
//! Turns today's instances plus the user's schedule into a minimal set
//! of future reminders, submits them to the dispatcher, and cancels
//! whatever it submitted before. Three guards keep the dispatcher quiet:
//!
//! - a content hash of the surviving reminder set, so re-plans whose
//!   inputs are unchanged (e.g. an already-fired session flipped to
//!   completed) skip the cancel/reschedule churn entirely;
//! - a debounce window, so the burst of triggers at app startup
//!   coalesces into one pass;
//! - a monotonically increasing plan version, so a superseded in-flight
//!   pass notices it is stale and aborts without applying its hash.
//!
//! The hash only advances after the dispatcher confirms the whole plan,
//! so a failed pass is retried verbatim on the next trigger. Planner
//! state lives on the instance (reset on process restart), never in
//! globals. The planner only ever schedules for "today": cross-day work
//! is the generator's, re-triggered on day change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::NotificationDispatcher;
use crate::error::Result;
use crate::instance::DailySessionInstance;
use crate::schedule::{QuietHours, UserSchedule};
use crate::template::template_by_id;

/// Quiet period that coalesces rapid successive triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// One planned reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub instance_id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct PlannerState {
    last_applied_hash: Option<String>,
}

/// Debounced, deduplicated reminder planning against a dispatcher.
pub struct NotificationPlanner {
    dispatcher: Arc<dyn NotificationDispatcher>,
    debounce: Duration,
    version: AtomicU64,
    state: Mutex<PlannerState>,
}

impl NotificationPlanner {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_debounce(dispatcher, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(dispatcher: Arc<dyn NotificationDispatcher>, debounce: Duration) -> Self {
        Self {
            dispatcher,
            debounce,
            version: AtomicU64::new(0),
            state: Mutex::new(PlannerState::default()),
        }
    }

    /// Re-plan reminders for today's instances.
    ///
    /// Returns `true` if a plan was applied, `false` if this pass was
    /// debounced away, superseded, or deduplicated by the content hash.
    ///
    /// # Errors
    /// [`crate::error::CoreError::Dispatcher`] when cancellation or
    /// submission fails; the last applied hash is left untouched so the
    /// next trigger retries the same plan.
    pub async fn replan(
        &self,
        instances: &[DailySessionInstance],
        schedule: &UserSchedule,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let my_version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if self.version.load(Ordering::SeqCst) != my_version {
            debug!(version = my_version, "planning pass superseded during debounce");
            return Ok(false);
        }

        let reminders = build_reminders(instances, schedule, now);
        let hash = plan_hash(&reminders, &schedule.quiet_hours);

        let mut state = self.state.lock().await;
        // Re-check under the lock: a newer pass may have won the race
        // while this one waited.
        if self.version.load(Ordering::SeqCst) != my_version {
            debug!(version = my_version, "planning pass superseded before apply");
            return Ok(false);
        }
        if state.last_applied_hash.as_deref() == Some(hash.as_str()) {
            debug!("plan unchanged, skipping dispatcher churn");
            return Ok(false);
        }

        self.dispatcher.cancel_all().await.map_err(|e| {
            warn!(error = %e, "reminder cancellation failed, plan will be retried");
            e
        })?;
        for r in &reminders {
            self.dispatcher
                .schedule(&r.instance_id, r.fire_at, &r.title, &r.body)
                .await
                .map_err(|e| {
                    warn!(id = %r.instance_id, error = %e, "reminder submission failed");
                    e
                })?;
        }

        debug!(reminders = reminders.len(), "applied reminder plan");
        state.last_applied_hash = Some(hash);
        Ok(true)
    }

    /// The hash of the last successfully applied plan, if any.
    pub async fn last_applied_hash(&self) -> Option<String> {
        self.state.lock().await.last_applied_hash.clone()
    }
}

/// Pure planning step: drop past instances, terminal ones (a completed
/// or skipped session must not fire its pending reminder), and those
/// inside an enabled quiet window; keep the rest in canonical order.
pub fn build_reminders(
    instances: &[DailySessionInstance],
    schedule: &UserSchedule,
    now: DateTime<Utc>,
) -> Vec<Reminder> {
    instances
        .iter()
        .filter(|i| i.scheduled_at > now)
        .filter(|i| !i.status.is_terminal())
        .filter(|i| {
            let minute = i.scheduled_at.hour() * 60 + i.scheduled_at.minute();
            !schedule.quiet_hours.suppresses(minute)
        })
        .map(|i| {
            let (title, body) = match template_by_id(&i.template_id) {
                Some(t) => (t.title.to_string(), t.short_prompt.to_string()),
                None => ("Practice session".to_string(), String::new()),
            };
            Reminder {
                instance_id: i.id.clone(),
                fire_at: i.scheduled_at,
                title,
                body,
            }
        })
        .collect()
}

/// Content fingerprint of a plan: the sorted (id, fire-time) pairs plus
/// the quiet-hours configuration that shaped them.
pub fn plan_hash(reminders: &[Reminder], quiet: &QuietHours) -> String {
    let mut pairs: Vec<String> = reminders
        .iter()
        .map(|r| format!("{}|{}", r.instance_id, r.fire_at.to_rfc3339()))
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    for p in &pairs {
        hasher.update(p.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(quiet.start.as_bytes());
    hasher.update(b"|");
    hasher.update(quiet.end.as_bytes());
    hasher.update(if quiet.enabled { b"|1" } else { b"|0" });
    hex::encode(hasher.finalize())
}
