//! A day's concrete, stateful occurrence of a session template.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`DailySessionInstance`].
///
/// The clock drives `Upcoming -> Due -> Missed`; `Completed` and
/// `Skipped` are terminal and only ever set by explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Upcoming,
    Due,
    Missed,
    Completed,
    Skipped,
}

impl SessionStatus {
    /// Whether no further automatic transition may apply.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Skipped)
    }
}

/// One day's occurrence of a template.
///
/// `date` is the authoritative calendar day. It is set once at
/// generation and never re-derived from `scheduled_at`, so snoozing past
/// midnight cannot migrate an instance to another day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySessionInstance {
    /// `{date}_{template_id}`, unique per day and template.
    pub id: String,
    /// Calendar day, "YYYY-MM-DD".
    pub date: String,
    pub template_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub snooze_count: u32,
}

impl DailySessionInstance {
    pub fn new(date: NaiveDate, template_id: &str, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: instance_id(date, template_id),
            date: date.format("%Y-%m-%d").to_string(),
            template_id: template_id.to_string(),
            scheduled_at,
            status: SessionStatus::Upcoming,
            started_at: None,
            ended_at: None,
            snooze_count: 0,
        }
    }
}

/// Canonical instance id for a date and template.
pub fn instance_id(date: NaiveDate, template_id: &str) -> String {
    format!("{}_{}", date.format("%Y-%m-%d"), template_id)
}

/// Canonical ordering: scheduled time ascending, id as tiebreaker so the
/// order is total and stable across serialization.
pub fn sort_day(instances: &mut [DailySessionInstance]) {
    instances.sort_by(|a, b| {
        a.scheduled_at
            .cmp(&b.scheduled_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
