//! Per-user scheduling preferences and app settings.
//!
//! One [`UserSchedule`] per installation. Persisted as JSON under the
//! `user_schedule` key on every change.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::storage::{keys, KeyValueStore};
use crate::template::TEMPLATES;

/// A user-configured time-of-day window during which reminders are
/// suppressed. Times are "HH:mm"; the window may wrap midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(default = "default_quiet_start")]
    pub start: String,
    #[serde(default = "default_quiet_end")]
    pub end: String,
    #[serde(default)]
    pub enabled: bool,
}

impl QuietHours {
    /// Whether the given minute-of-day falls inside the window.
    ///
    /// A wrapping window (`start > end`, e.g. 22:00-07:00) contains `t`
    /// when `t >= start || t <= end`; a non-wrapping window uses plain
    /// interval containment.
    pub fn contains_minute(&self, minute_of_day: u32) -> bool {
        let (Some(start), Some(end)) = (parse_minute(&self.start), parse_minute(&self.end))
        else {
            warn!(start = %self.start, end = %self.end, "unparseable quiet hours ignored");
            return false;
        };
        if start > end {
            minute_of_day >= start || minute_of_day <= end
        } else {
            start <= minute_of_day && minute_of_day <= end
        }
    }

    /// Containment including the enabled flag.
    pub fn suppresses(&self, minute_of_day: u32) -> bool {
        self.enabled && self.contains_minute(minute_of_day)
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start: default_quiet_start(),
            end: default_quiet_end(),
            enabled: false,
        }
    }
}

/// "HH:mm" to minutes since midnight.
pub fn parse_minute(hhmm: &str) -> Option<u32> {
    let t = NaiveTime::parse_from_str(hhmm, "%H:%M").ok()?;
    use chrono::Timelike;
    Some(t.hour() * 60 + t.minute())
}

/// The user's per-session times and reminder preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSchedule {
    /// template id -> "HH:mm".
    #[serde(default = "default_session_times")]
    pub session_times: HashMap<String, String>,
    /// template id -> enabled at generation time.
    #[serde(default = "default_enabled_sessions")]
    pub enabled_sessions: HashMap<String, bool>,
    #[serde(default)]
    pub quiet_hours: QuietHours,
    #[serde(default = "default_snooze_options")]
    pub snooze_options_min: Vec<u32>,
    #[serde(default = "default_grace_window")]
    pub grace_window_min: i64,
    #[serde(default = "default_max_snooze")]
    pub max_snooze_count: u32,
}

impl UserSchedule {
    /// Scheduled "HH:mm" for a template, falling back to its default.
    pub fn time_for(&self, template_id: &str) -> Option<String> {
        if let Some(t) = self.session_times.get(template_id) {
            return Some(t.clone());
        }
        TEMPLATES
            .iter()
            .find(|t| t.id == template_id)
            .map(|t| t.default_time.to_string())
    }

    pub fn is_enabled(&self, template_id: &str) -> bool {
        self.enabled_sessions.get(template_id).copied().unwrap_or(true)
    }
}

impl Default for UserSchedule {
    fn default() -> Self {
        Self {
            session_times: default_session_times(),
            enabled_sessions: default_enabled_sessions(),
            quiet_hours: QuietHours::default(),
            snooze_options_min: default_snooze_options(),
            grace_window_min: default_grace_window(),
            max_snooze_count: default_max_snooze(),
        }
    }
}

/// Host-level toggles persisted under `app_settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub has_completed_onboarding: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub weekend_schedule_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            has_completed_onboarding: false,
            notifications_enabled: true,
            weekend_schedule_enabled: false,
        }
    }
}

// Default functions
fn default_quiet_start() -> String {
    "22:00".into()
}
fn default_quiet_end() -> String {
    "07:00".into()
}
fn default_session_times() -> HashMap<String, String> {
    TEMPLATES
        .iter()
        .map(|t| (t.id.to_string(), t.default_time.to_string()))
        .collect()
}
fn default_enabled_sessions() -> HashMap<String, bool> {
    TEMPLATES.iter().map(|t| (t.id.to_string(), true)).collect()
}
fn default_snooze_options() -> Vec<u32> {
    vec![5, 10, 30]
}
fn default_grace_window() -> i64 {
    crate::status::DEFAULT_GRACE_WINDOW_MIN
}
fn default_max_snooze() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

/// Loads and saves [`UserSchedule`] and [`AppSettings`].
pub struct ScheduleRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ScheduleRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the schedule, or the defaults if none has been saved.
    pub async fn load(&self) -> Result<UserSchedule> {
        match self.store.get(keys::USER_SCHEDULE).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(UserSchedule::default()),
        }
    }

    pub async fn save(&self, schedule: &UserSchedule) -> Result<()> {
        let json = serde_json::to_string(schedule)?;
        self.store.set(keys::USER_SCHEDULE, &json).await
    }

    pub async fn load_settings(&self) -> Result<AppSettings> {
        match self.store.get(keys::APP_SETTINGS).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(AppSettings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.store.set(keys::APP_SETTINGS, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn default_schedule_covers_all_templates() {
        let s = UserSchedule::default();
        assert_eq!(s.session_times.len(), 6);
        for t in &TEMPLATES {
            assert!(s.is_enabled(t.id));
            assert_eq!(s.time_for(t.id).as_deref(), Some(t.default_time));
        }
    }

    #[test]
    fn quiet_hours_wrapping_window() {
        let q = QuietHours {
            start: "22:00".into(),
            end: "07:00".into(),
            enabled: true,
        };
        assert!(q.suppresses(parse_minute("23:30").unwrap()));
        assert!(q.suppresses(parse_minute("06:00").unwrap()));
        assert!(!q.suppresses(parse_minute("12:00").unwrap()));
    }

    #[test]
    fn quiet_hours_non_wrapping_window_is_interval_containment() {
        let q = QuietHours {
            start: "12:00".into(),
            end: "14:00".into(),
            enabled: true,
        };
        assert!(q.suppresses(parse_minute("12:00").unwrap()));
        assert!(q.suppresses(parse_minute("13:00").unwrap()));
        assert!(q.suppresses(parse_minute("14:00").unwrap()));
        assert!(!q.suppresses(parse_minute("11:59").unwrap()));
        assert!(!q.suppresses(parse_minute("14:01").unwrap()));
    }

    #[test]
    fn disabled_quiet_hours_suppress_nothing() {
        let q = QuietHours {
            start: "00:00".into(),
            end: "23:59".into(),
            enabled: false,
        };
        assert!(!q.suppresses(parse_minute("12:00").unwrap()));
    }

    #[tokio::test]
    async fn repository_roundtrip() {
        let repo = ScheduleRepository::new(Arc::new(MemoryStore::new()));
        let mut s = repo.load().await.unwrap();
        s.grace_window_min = 45;
        s.quiet_hours.enabled = true;
        repo.save(&s).await.unwrap();
        let loaded = repo.load().await.unwrap();
        assert_eq!(loaded, s);
    }

    #[tokio::test]
    async fn settings_default_then_roundtrip() {
        let repo = ScheduleRepository::new(Arc::new(MemoryStore::new()));
        let settings = repo.load_settings().await.unwrap();
        assert!(settings.notifications_enabled);
        assert!(!settings.has_completed_onboarding);

        let mut updated = settings.clone();
        updated.has_completed_onboarding = true;
        repo.save_settings(&updated).await.unwrap();
        assert_eq!(repo.load_settings().await.unwrap(), updated);
    }
}
