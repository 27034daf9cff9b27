//! Serialized access to the per-day instance collections.
//!
//! Every read and write of the `daily_instances` record goes through one
//! `tokio::sync::Mutex`, so a read-modify-write (the upsert path) can
//! never interleave with another writer and drop its update. The
//! historical failure mode this guards against: read a stale day, write
//! it back, and discard a status transition that landed in between.
//!
//! Only the generator may create a day (via [`InstanceStore::write_day`]);
//! an upsert against an ungenerated date is a loud invariant violation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{keys, KeyValueStore};
use crate::error::{CoreError, Result};
use crate::instance::{sort_day, DailySessionInstance};

/// Whole days older than this are pruned on every bulk write.
pub const RETENTION_DAYS: i64 = 30;

/// Persisted shape of the `daily_instances` record: date -> day.
pub type DayMap = BTreeMap<String, Vec<DailySessionInstance>>;

/// Persisted shape of the `extra_practice_minutes` record: date -> minutes.
pub type ExtraPracticeMinutes = BTreeMap<String, u32>;

/// Mutex-serialized store for daily instance collections and the
/// extra-practice-minutes ledger.
pub struct InstanceStore {
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl InstanceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// The day's instances, sorted by scheduled time. Empty if the day
    /// was never generated.
    pub async fn load_day(&self, date: NaiveDate) -> Result<Vec<DailySessionInstance>> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        let mut day = map
            .get(&date.format("%Y-%m-%d").to_string())
            .cloned()
            .unwrap_or_default();
        sort_day(&mut day);
        Ok(day)
    }

    /// Whether a day has been generated for `date`.
    pub async fn day_exists(&self, date: NaiveDate) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.contains_key(&date.format("%Y-%m-%d").to_string()))
    }

    /// Bulk day write (regeneration). Replaces the whole day and prunes
    /// days older than [`RETENTION_DAYS`] relative to `date`.
    pub async fn write_day(
        &self,
        date: NaiveDate,
        mut instances: Vec<DailySessionInstance>,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        sort_day(&mut instances);
        map.insert(date.format("%Y-%m-%d").to_string(), instances);
        prune_dates(&mut map, date);
        self.write_map(&map).await
    }

    /// Single-instance upsert. Re-reads the persisted day inside the
    /// critical section, replaces the matching id (or inserts it into an
    /// existing day), and writes the whole day back. Returns the updated
    /// day.
    ///
    /// # Errors
    /// [`CoreError::InvariantViolation`] if no day exists for the
    /// instance's date: only the generator may create days.
    pub async fn upsert(
        &self,
        instance: DailySessionInstance,
    ) -> Result<Vec<DailySessionInstance>> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        let day = map.get_mut(&instance.date).ok_or_else(|| {
            CoreError::InvariantViolation(format!(
                "upsert for date {} with no generated day (instance {})",
                instance.date, instance.id
            ))
        })?;

        if let Some(slot) = day.iter_mut().find(|i| i.id == instance.id) {
            *slot = instance;
        } else {
            debug!(id = %instance.id, "upsert inserted id missing from its day");
            day.push(instance);
        }
        sort_day(day);
        let updated = day.clone();
        self.write_map(&map).await?;
        Ok(updated)
    }

    /// Accumulate ad-hoc practice minutes for `date`. Returns the day's
    /// new total. Prunes the ledger with the same retention window.
    pub async fn add_extra_minutes(&self, date: NaiveDate, minutes: u32) -> Result<u32> {
        let _guard = self.lock.lock().await;
        let raw = self.store.get(keys::EXTRA_PRACTICE_MINUTES).await?;
        let mut ledger: ExtraPracticeMinutes = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => BTreeMap::new(),
        };
        let key = date.format("%Y-%m-%d").to_string();
        let total = ledger.get(&key).copied().unwrap_or(0).saturating_add(minutes);
        ledger.insert(key, total);

        let cutoff = date - Duration::days(RETENTION_DAYS);
        ledger.retain(|d, _| within_retention(d, cutoff));

        let json = serde_json::to_string(&ledger)?;
        self.store.set(keys::EXTRA_PRACTICE_MINUTES, &json).await?;
        Ok(total)
    }

    /// Extra practice minutes recorded for `date`.
    pub async fn extra_minutes(&self, date: NaiveDate) -> Result<u32> {
        let _guard = self.lock.lock().await;
        let raw = self.store.get(keys::EXTRA_PRACTICE_MINUTES).await?;
        let ledger: ExtraPracticeMinutes = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => BTreeMap::new(),
        };
        Ok(ledger
            .get(&date.format("%Y-%m-%d").to_string())
            .copied()
            .unwrap_or(0))
    }

    async fn read_map(&self) -> Result<DayMap> {
        match self.store.get(keys::DAILY_INSTANCES).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn write_map(&self, map: &DayMap) -> Result<()> {
        let json = serde_json::to_string(map)?;
        self.store.set(keys::DAILY_INSTANCES, &json).await
    }
}

fn prune_dates(map: &mut DayMap, today: NaiveDate) {
    let cutoff = today - Duration::days(RETENTION_DAYS);
    let before = map.len();
    map.retain(|d, _| within_retention(d, cutoff));
    if map.len() < before {
        debug!(pruned = before - map.len(), "dropped days past retention");
    }
}

fn within_retention(date_key: &str, cutoff: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(date_key, "%Y-%m-%d") {
        Ok(d) => d >= cutoff,
        Err(_) => {
            warn!(key = date_key, "unparseable date key dropped from store");
            false
        }
    }
}
