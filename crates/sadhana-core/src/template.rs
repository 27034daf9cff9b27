//! The six compiled-in session templates.
//!
//! Templates are static: never created or destroyed at runtime. Per-user
//! variation (times, enablement) lives in [`crate::schedule::UserSchedule`].

use serde::{Deserialize, Serialize};

/// The six contemplative categories, one per daily session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeType {
    Intention,
    Breath,
    LovingKindness,
    Gratitude,
    Reflection,
    Dedication,
}

/// Immutable definition of one of the six daily practices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionTemplate {
    pub id: &'static str,
    /// Position in the daily cycle, 1 through 6.
    pub order: u8,
    pub title: &'static str,
    pub practice_type: PracticeType,
    /// Default scheduled time of day, "HH:mm".
    pub default_time: &'static str,
    pub duration_sec: u32,
    pub short_prompt: &'static str,
    pub dedication: &'static str,
}

/// The full daily cycle, ordered by `order`.
pub const TEMPLATES: [SessionTemplate; 6] = [
    SessionTemplate {
        id: "dawn_intention",
        order: 1,
        title: "Dawn Intention",
        practice_type: PracticeType::Intention,
        default_time: "06:30",
        duration_sec: 300,
        short_prompt: "Set the motivation that will carry the day.",
        dedication: "May this day be of benefit.",
    },
    SessionTemplate {
        id: "morning_breath",
        order: 2,
        title: "Morning Breath",
        practice_type: PracticeType::Breath,
        default_time: "09:00",
        duration_sec: 600,
        short_prompt: "Ten minutes of settling on the breath.",
        dedication: "May calm abide.",
    },
    SessionTemplate {
        id: "midday_kindness",
        order: 3,
        title: "Midday Kindness",
        practice_type: PracticeType::LovingKindness,
        default_time: "12:30",
        duration_sec: 420,
        short_prompt: "Extend warmth to someone difficult.",
        dedication: "May all beings be at ease.",
    },
    SessionTemplate {
        id: "afternoon_gratitude",
        order: 4,
        title: "Afternoon Gratitude",
        practice_type: PracticeType::Gratitude,
        default_time: "15:30",
        duration_sec: 300,
        short_prompt: "Name three things received today.",
        dedication: "May appreciation deepen.",
    },
    SessionTemplate {
        id: "evening_reflection",
        order: 5,
        title: "Evening Reflection",
        practice_type: PracticeType::Reflection,
        default_time: "18:30",
        duration_sec: 600,
        short_prompt: "Review the day without judgment.",
        dedication: "May clarity grow.",
    },
    SessionTemplate {
        id: "night_dedication",
        order: 6,
        title: "Night Dedication",
        practice_type: PracticeType::Dedication,
        default_time: "21:30",
        duration_sec: 300,
        short_prompt: "Dedicate the day's effort before rest.",
        dedication: "May the merit ripen for all.",
    },
];

/// Look up a template by id.
pub fn template_by_id(id: &str) -> Option<&'static SessionTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_templates_ordered_one_through_six() {
        assert_eq!(TEMPLATES.len(), 6);
        for (i, t) in TEMPLATES.iter().enumerate() {
            assert_eq!(t.order as usize, i + 1);
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<_> = TEMPLATES.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn default_times_parse_as_hh_mm() {
        for t in &TEMPLATES {
            assert!(
                chrono::NaiveTime::parse_from_str(t.default_time, "%H:%M").is_ok(),
                "bad default_time on {}",
                t.id
            );
        }
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(template_by_id("morning_breath").unwrap().order, 2);
        assert!(template_by_id("nope").is_none());
    }
}
