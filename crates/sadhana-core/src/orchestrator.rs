//! Session orchestrator: the public-facing API.
//!
//! All user intents (start/complete/skip/snooze) and the periodic
//! refresh flow through here. The orchestrator keeps today's instances
//! in memory so a caller reading state right after an awaited mutation
//! sees the updated status, while persistence runs through the
//! serialized [`InstanceStore`].
//!
//! Error policy: persistence and dispatcher failures are logged and
//! absorbed -- the in-memory view stays consistent with the last
//! successful write and the next mutation implicitly retries. A stale
//! instance id is a silent no-op (the UI's view usually lags a day
//! rollover). Nothing on this surface panics or propagates those
//! failures to callers.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::events::{EventLog, EventLogEntry, EventType};
use crate::generator::InstanceGenerator;
use crate::instance::{DailySessionInstance, SessionStatus};
use crate::notify::NotificationPlanner;
use crate::schedule::{ScheduleRepository, UserSchedule};
use crate::status;
use crate::storage::{keys, InstanceStore, KeyValueStore};

struct TodayCache {
    date: NaiveDate,
    instances: Vec<DailySessionInstance>,
}

/// Public operations over the daily session cycle.
pub struct SessionOrchestrator {
    clock: Arc<dyn Clock>,
    kv: Arc<dyn KeyValueStore>,
    instances: Arc<InstanceStore>,
    generator: InstanceGenerator,
    schedule_repo: ScheduleRepository,
    planner: Arc<NotificationPlanner>,
    cache: RwLock<Option<TodayCache>>,
    schedule: RwLock<Option<UserSchedule>>,
}

impl SessionOrchestrator {
    pub fn new(
        clock: Arc<dyn Clock>,
        kv: Arc<dyn KeyValueStore>,
        planner: Arc<NotificationPlanner>,
    ) -> Self {
        let instances = Arc::new(InstanceStore::new(kv.clone()));
        Self {
            clock,
            kv: kv.clone(),
            instances: instances.clone(),
            generator: InstanceGenerator::new(instances),
            schedule_repo: ScheduleRepository::new(kv),
            planner,
            cache: RwLock::new(None),
            schedule: RwLock::new(None),
        }
    }

    // ── Public surface ───────────────────────────────────────────────

    /// Re-derive today's set: generate the day if needed, run the status
    /// engine over every instance, and kick a notification re-plan.
    ///
    /// Hosts call this on a periodic tick (about once a minute), on
    /// foreground resume, and on day change; every path recomputes from
    /// the clock, so calling it more often than needed is harmless.
    pub async fn refresh_today(&self) -> Vec<DailySessionInstance> {
        let now = self.clock.now();
        let today = self.clock.today();
        let schedule = self.load_schedule().await;

        let mut day = match self.generator.ensure_day(today, &schedule).await {
            Ok(day) => day,
            Err(e) => {
                warn!(error = %e, "day generation did not persist, continuing in memory");
                let cache = self.cache.read().await;
                match cache.as_ref() {
                    Some(c) if c.date == today => c.instances.clone(),
                    _ => crate::generator::generate_day(today, &schedule),
                }
            }
        };

        for idx in 0..day.len() {
            let Some(change) = status::evaluate(&day[idx], now, schedule.grace_window_min) else {
                continue;
            };
            let updated = change.updated.clone();
            match self.instances.upsert(updated.clone()).await {
                Ok(persisted) => {
                    day = persisted;
                    // Logged only once the transition persisted: a failed
                    // write is re-evaluated on the next refresh, and
                    // logging here too would duplicate the MISS.
                    if change.newly_missed {
                        self.log_event(EventType::Miss, &updated.id, None).await;
                    }
                }
                Err(e) => {
                    warn!(id = %updated.id, error = %e, "status transition not persisted");
                    day[idx] = updated.clone();
                }
            }
        }

        *self.cache.write().await = Some(TodayCache {
            date: today,
            instances: day.clone(),
        });
        self.spawn_replan(day.clone(), schedule).await;
        day
    }

    /// Today's instances in canonical order. Refreshes first when the
    /// cached day is stale (day rollover) or nothing is cached yet.
    pub async fn get_today_instances(&self) -> Vec<DailySessionInstance> {
        let today = self.clock.today();
        {
            let cache = self.cache.read().await;
            if let Some(c) = cache.as_ref() {
                if c.date == today {
                    return c.instances.clone();
                }
            }
        }
        self.refresh_today().await
    }

    /// Begin a session. Starting a completed session is a no-op so the
    /// user can replay it without mutating state.
    pub async fn start(&self, id: &str) {
        let now = self.clock.now();
        let Some(existing) = self.find(id).await else {
            return;
        };
        if existing.status == SessionStatus::Completed {
            debug!(id, "start on completed session ignored (replay)");
            return;
        }
        if self
            .mutate(id, |i| {
                i.status = SessionStatus::Due;
                i.started_at = Some(now);
            })
            .await
            .is_some()
        {
            self.log_event(EventType::Start, id, None).await;
        }
    }

    /// Finish a session. Calling it twice just re-stamps `ended_at`.
    pub async fn complete(&self, id: &str) {
        let now = self.clock.now();
        if self
            .mutate(id, |i| {
                i.status = SessionStatus::Completed;
                i.ended_at = Some(now);
            })
            .await
            .is_some()
        {
            self.log_event(EventType::Complete, id, None).await;
            // A pending reminder for this session is now stale; the next
            // planning pass drops it.
            self.replan_from_cache().await;
        }
    }

    /// Skip a session. Terminal: the clock never moves it again.
    pub async fn skip(&self, id: &str) {
        if self
            .mutate(id, |i| i.status = SessionStatus::Skipped)
            .await
            .is_some()
        {
            self.log_event(EventType::Skip, id, None).await;
            self.replan_from_cache().await;
        }
    }

    /// Push a session `minutes` into the future and re-enter the normal
    /// clock-driven lifecycle from `Upcoming`.
    ///
    /// Returns `false` when the id is unknown or the snooze cap is
    /// already reached (the count stays at the cap).
    pub async fn snooze(&self, id: &str, minutes: u32) -> bool {
        let now = self.clock.now();
        let schedule = self.load_schedule().await;
        let Some(existing) = self.find(id).await else {
            return false;
        };
        if existing.snooze_count >= schedule.max_snooze_count {
            debug!(id, count = existing.snooze_count, "snooze cap reached");
            return false;
        }
        let mutated = self
            .mutate(id, |i| {
                i.scheduled_at = now + chrono::Duration::minutes(i64::from(minutes));
                i.status = SessionStatus::Upcoming;
                i.snooze_count += 1;
            })
            .await;
        if mutated.is_some() {
            self.log_event(
                EventType::Snooze,
                id,
                Some(serde_json::json!({ "minutes": minutes })),
            )
            .await;
            // The moved fire-time makes the pending reminder stale; the
            // next planning pass cancels and resubmits.
            self.replan_from_cache().await;
        }
        mutated.is_some()
    }

    /// The instance the primary call-to-action should point at, if any.
    /// Pure over the current in-memory set.
    pub async fn next_due(&self) -> Option<DailySessionInstance> {
        let now = self.clock.now();
        let day = self.get_today_instances().await;
        status::next_due(&day, now).cloned()
    }

    /// Record ad-hoc practice minutes for today. Returns today's total,
    /// or `None` when persistence failed.
    pub async fn add_extra_practice_minutes(&self, minutes: u32) -> Option<u32> {
        match self
            .instances
            .add_extra_minutes(self.clock.today(), minutes)
            .await
        {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(error = %e, "extra practice minutes not persisted");
                None
            }
        }
    }

    /// Replace the user's schedule: persist it, regenerate today with
    /// existing progress carried over, and re-plan reminders.
    pub async fn set_schedule(&self, schedule: UserSchedule) {
        if let Err(e) = self.schedule_repo.save(&schedule).await {
            warn!(error = %e, "schedule not persisted, continuing in memory");
        }
        *self.schedule.write().await = Some(schedule.clone());

        let today = self.clock.today();
        let old = self.get_today_instances().await;
        let day = match self.generator.regenerate_day(today, &schedule, &old).await {
            Ok(day) => day,
            Err(e) => {
                warn!(error = %e, "regenerated day not persisted, continuing in memory");
                let mut day = crate::generator::generate_day(today, &schedule);
                crate::generator::merge_progress(&mut day, &old);
                day
            }
        };
        *self.cache.write().await = Some(TodayCache {
            date: today,
            instances: day.clone(),
        });
        self.spawn_replan(day, schedule).await;
    }

    /// Read-only view of the persisted event log.
    pub async fn event_log(&self) -> Vec<EventLogEntry> {
        self.load_log().await.entries
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn find(&self, id: &str) -> Option<DailySessionInstance> {
        self.get_today_instances()
            .await
            .into_iter()
            .find(|i| i.id == id)
    }

    /// Apply `f` to the instance with `id`, persist through the
    /// serialized store, and refresh the in-memory view. `None` when the
    /// id is not in today's set.
    async fn mutate<F>(&self, id: &str, f: F) -> Option<DailySessionInstance>
    where
        F: FnOnce(&mut DailySessionInstance),
    {
        let mut instance = match self.find(id).await {
            Some(i) => i,
            None => {
                debug!(id, "operation on unknown instance ignored");
                return None;
            }
        };
        f(&mut instance);

        let day = match self.instances.upsert(instance.clone()).await {
            Ok(day) => day,
            Err(e) => {
                // Covers both a failed write and the invariant case where
                // the day itself never persisted; the in-memory view stays
                // consistent with the last successful write.
                warn!(id, error = %e, "mutation not persisted, continuing in memory");
                let mut day = self.get_today_instances().await;
                if let Some(slot) = day.iter_mut().find(|i| i.id == id) {
                    *slot = instance.clone();
                }
                day
            }
        };

        *self.cache.write().await = Some(TodayCache {
            date: self.clock.today(),
            instances: day,
        });
        Some(instance)
    }

    async fn load_schedule(&self) -> UserSchedule {
        if let Some(s) = self.schedule.read().await.as_ref() {
            return s.clone();
        }
        let schedule = match self.schedule_repo.load().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "schedule load failed, using defaults");
                UserSchedule::default()
            }
        };
        *self.schedule.write().await = Some(schedule.clone());
        schedule
    }

    /// Trigger a planning pass over the current in-memory day.
    async fn replan_from_cache(&self) {
        let day = self.get_today_instances().await;
        let schedule = self.load_schedule().await;
        self.spawn_replan(day, schedule).await;
    }

    async fn spawn_replan(&self, day: Vec<DailySessionInstance>, schedule: UserSchedule) {
        let notifications_enabled = match self.schedule_repo.load_settings().await {
            Ok(s) => s.notifications_enabled,
            Err(e) => {
                warn!(error = %e, "settings load failed, assuming notifications on");
                true
            }
        };
        let day = if notifications_enabled { day } else { Vec::new() };
        let planner = self.planner.clone();
        let now = self.clock.now();
        tokio::spawn(async move {
            if let Err(e) = planner.replan(&day, &schedule, now).await {
                // Hash was not advanced; the next trigger retries.
                warn!(error = %e, "reminder planning failed");
            }
        });
    }

    async fn load_log(&self) -> EventLog {
        match self.kv.get(keys::EVENT_LOG).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(error = %e, "event log unreadable, starting fresh");
                EventLog::default()
            }),
            Ok(None) => EventLog::default(),
            Err(e) => {
                warn!(error = %e, "event log read failed, starting fresh");
                EventLog::default()
            }
        }
    }

    async fn log_event(
        &self,
        event_type: EventType,
        instance_id: &str,
        metadata: Option<serde_json::Value>,
    ) {
        let mut log = self.load_log().await;
        log.append(EventLogEntry::new(
            self.clock.now(),
            event_type,
            instance_id,
            metadata,
        ));
        let json = match serde_json::to_string(&log) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "event log serialization failed");
                return;
            }
        };
        if let Err(e) = self.kv.set(keys::EVENT_LOG, &json).await {
            warn!(error = %e, "event log append not persisted");
        }
    }
}
