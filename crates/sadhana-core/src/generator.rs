//! Derives a day's instances from the template table and the user's
//! schedule.
//!
//! Generation happens once per calendar day per enabled template; the
//! generated day is written through the [`InstanceStore`] lock so it can
//! never race an upsert.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::info;

use crate::error::Result;
use crate::instance::{sort_day, DailySessionInstance};
use crate::schedule::UserSchedule;
use crate::storage::InstanceStore;
use crate::template::TEMPLATES;

/// Build the day's instances for `date` from the enabled templates.
///
/// Pure: the same date and schedule always produce the same day. A
/// template whose configured time fails to parse falls back to its
/// compiled-in default time.
pub fn generate_day(date: NaiveDate, schedule: &UserSchedule) -> Vec<DailySessionInstance> {
    let mut day: Vec<DailySessionInstance> = TEMPLATES
        .iter()
        .filter(|t| schedule.is_enabled(t.id))
        .map(|t| {
            let hhmm = schedule
                .time_for(t.id)
                .unwrap_or_else(|| t.default_time.to_string());
            let time = NaiveTime::parse_from_str(&hhmm, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(t.default_time, "%H:%M"))
                .unwrap_or_default();
            DailySessionInstance::new(date, t.id, date.and_time(time).and_utc())
        })
        .collect();
    sort_day(&mut day);
    day
}

/// Copy progress fields (status, timestamps, snooze count) from
/// `previous` onto matching ids in `day`.
pub fn merge_progress(day: &mut [DailySessionInstance], previous: &[DailySessionInstance]) {
    for inst in day {
        if let Some(prev) = previous.iter().find(|p| p.id == inst.id) {
            inst.status = prev.status;
            inst.started_at = prev.started_at;
            inst.ended_at = prev.ended_at;
            inst.snooze_count = prev.snooze_count;
        }
    }
}

/// Generates days into the instance store.
pub struct InstanceGenerator {
    store: Arc<InstanceStore>,
}

impl InstanceGenerator {
    pub fn new(store: Arc<InstanceStore>) -> Self {
        Self { store }
    }

    /// Generate and persist `date` if it does not exist yet. Returns the
    /// day's instances either way.
    pub async fn ensure_day(
        &self,
        date: NaiveDate,
        schedule: &UserSchedule,
    ) -> Result<Vec<DailySessionInstance>> {
        if self.store.day_exists(date).await? {
            return self.store.load_day(date).await;
        }
        let day = generate_day(date, schedule);
        info!(date = %date, sessions = day.len(), "generated daily sessions");
        self.store.write_day(date, day.clone()).await?;
        Ok(day)
    }

    /// Regenerate `date` unconditionally (bulk write), e.g. after the
    /// user changed session times for today. Progress already made on
    /// `previous` instances (status, timestamps, snooze count) carries
    /// over by id; scheduled times come from the new schedule.
    pub async fn regenerate_day(
        &self,
        date: NaiveDate,
        schedule: &UserSchedule,
        previous: &[DailySessionInstance],
    ) -> Result<Vec<DailySessionInstance>> {
        let mut day = generate_day(date, schedule);
        merge_progress(&mut day, previous);
        sort_day(&mut day);
        self.store.write_day(date, day.clone()).await?;
        Ok(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::instance_id;
    use crate::storage::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn generates_exactly_the_enabled_templates() {
        let mut schedule = UserSchedule::default();
        schedule
            .enabled_sessions
            .insert("midday_kindness".to_string(), false);

        let day = generate_day(date(), &schedule);
        assert_eq!(day.len(), 5);
        assert!(day.iter().all(|i| i.template_id != "midday_kindness"));
        for i in &day {
            assert_eq!(i.id, instance_id(date(), &i.template_id));
        }
    }

    #[test]
    fn day_is_sorted_by_scheduled_time() {
        let day = generate_day(date(), &UserSchedule::default());
        for pair in day.windows(2) {
            assert!(pair[0].scheduled_at <= pair[1].scheduled_at);
        }
    }

    #[test]
    fn custom_time_overrides_default() {
        let mut schedule = UserSchedule::default();
        schedule
            .session_times
            .insert("dawn_intention".to_string(), "05:15".to_string());
        let day = generate_day(date(), &schedule);
        let dawn = day.iter().find(|i| i.template_id == "dawn_intention").unwrap();
        assert_eq!(dawn.scheduled_at.format("%H:%M").to_string(), "05:15");
    }

    #[test]
    fn unparseable_time_falls_back_to_template_default() {
        let mut schedule = UserSchedule::default();
        schedule
            .session_times
            .insert("dawn_intention".to_string(), "nonsense".to_string());
        let day = generate_day(date(), &schedule);
        let dawn = day.iter().find(|i| i.template_id == "dawn_intention").unwrap();
        assert_eq!(dawn.scheduled_at.format("%H:%M").to_string(), "06:30");
    }

    #[tokio::test]
    async fn ensure_day_keeps_a_legitimately_empty_day() {
        let store = Arc::new(InstanceStore::new(Arc::new(MemoryStore::new())));
        let generator = InstanceGenerator::new(store.clone());
        let mut schedule = UserSchedule::default();
        for t in crate::template::TEMPLATES {
            schedule.enabled_sessions.insert(t.id.to_string(), false);
        }

        assert!(generator.ensure_day(date(), &schedule).await.unwrap().is_empty());
        assert!(store.day_exists(date()).await.unwrap());
        // A second pass sees the generated (empty) day and leaves it be.
        assert!(generator.ensure_day(date(), &schedule).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn regenerate_day_carries_progress_over() {
        let store = Arc::new(InstanceStore::new(Arc::new(MemoryStore::new())));
        let generator = InstanceGenerator::new(store.clone());
        let schedule = UserSchedule::default();

        let mut previous = generator.ensure_day(date(), &schedule).await.unwrap();
        previous[0].status = crate::instance::SessionStatus::Completed;
        previous[1].snooze_count = 2;

        let mut retimed = schedule.clone();
        retimed
            .session_times
            .insert("morning_breath".to_string(), "10:30".to_string());
        let day = generator
            .regenerate_day(date(), &retimed, &previous)
            .await
            .unwrap();

        let dawn = day.iter().find(|i| i.template_id == "dawn_intention").unwrap();
        assert_eq!(dawn.status, crate::instance::SessionStatus::Completed);
        let breath = day.iter().find(|i| i.template_id == "morning_breath").unwrap();
        assert_eq!(breath.snooze_count, 2);
        assert_eq!(breath.scheduled_at.format("%H:%M").to_string(), "10:30");
        // The bulk write is persisted, not just returned.
        assert_eq!(store.load_day(date()).await.unwrap(), day);
    }

    #[tokio::test]
    async fn ensure_day_is_idempotent() {
        let store = Arc::new(InstanceStore::new(Arc::new(MemoryStore::new())));
        let generator = InstanceGenerator::new(store.clone());
        let schedule = UserSchedule::default();

        let first = generator.ensure_day(date(), &schedule).await.unwrap();
        assert_eq!(first.len(), 6);

        // A second call must not clobber mutations made in between.
        let mut started = first[0].clone();
        started.status = crate::instance::SessionStatus::Completed;
        store.upsert(started.clone()).await.unwrap();

        let second = generator.ensure_day(date(), &schedule).await.unwrap();
        assert_eq!(second[0].status, crate::instance::SessionStatus::Completed);
    }
}
