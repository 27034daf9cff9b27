//! Append-only event log.
//!
//! Every user action and MISS transition produces an entry. The log is
//! capped; the oldest entries are trimmed, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The log never grows past this many entries.
pub const MAX_EVENT_LOG_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Start,
    Complete,
    Skip,
    Snooze,
    Miss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl EventLogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        event_type: EventType,
        instance_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            event_type,
            instance_id: instance_id.to_string(),
            metadata,
        }
    }
}

/// In-memory shape of the persisted `event_log` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    pub entries: Vec<EventLogEntry>,
}

impl EventLog {
    /// Append an entry, trimming the oldest past the cap.
    pub fn append(&mut self, entry: EventLogEntry) {
        self.entries.push(entry);
        if self.entries.len() > MAX_EVENT_LOG_ENTRIES {
            let excess = self.entries.len() - MAX_EVENT_LOG_ENTRIES;
            self.entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(n: usize) -> EventLogEntry {
        EventLogEntry::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            EventType::Start,
            &format!("2026-03-01_t{n}"),
            None,
        )
    }

    #[test]
    fn append_caps_at_max_dropping_oldest() {
        let mut log = EventLog::default();
        for n in 0..MAX_EVENT_LOG_ENTRIES + 5 {
            log.append(entry(n));
        }
        assert_eq!(log.entries.len(), MAX_EVENT_LOG_ENTRIES);
        assert_eq!(log.entries[0].instance_id, "2026-03-01_t5");
    }

    #[test]
    fn event_type_serializes_uppercase() {
        let json = serde_json::to_string(&EventType::Miss).unwrap();
        assert_eq!(json, "\"MISS\"");
    }

    #[test]
    fn log_serializes_as_plain_array() {
        let mut log = EventLog::default();
        log.append(entry(0));
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.starts_with('['));
        let back: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries.len(), 1);
    }
}
