//! Platform notification seam.
//!
//! The dispatcher is consumed, not implemented here: the host platform
//! owns actual delivery. Delivery is best-effort -- a reminder fires
//! at-or-after its instant while the host process is resident, with no
//! guarantee after termination.

mod planner;

pub use planner::{NotificationPlanner, Reminder, DEFAULT_DEBOUNCE};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};

/// Schedules and cancels platform reminders.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Schedule a reminder; returns an opaque cancellation token.
    async fn schedule(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String>;

    /// Cancel one previously scheduled reminder.
    async fn cancel(&self, token: &str) -> Result<()>;

    /// Cancel everything previously scheduled by this process.
    async fn cancel_all(&self) -> Result<()>;
}

/// A reminder as recorded by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReminder {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// In-memory dispatcher for tests: records submissions, counts calls,
/// and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    inner: Mutex<RecordingState>,
}

#[derive(Debug, Default)]
struct RecordingState {
    pending: Vec<(String, RecordedReminder)>,
    schedule_calls: usize,
    cancel_all_calls: usize,
    fail: bool,
    next_token: u64,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent call fail until cleared.
    pub async fn set_failing(&self, fail: bool) {
        self.inner.lock().await.fail = fail;
    }

    /// Currently pending reminders, in submission order.
    pub async fn pending(&self) -> Vec<RecordedReminder> {
        self.inner
            .lock()
            .await
            .pending
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub async fn schedule_calls(&self) -> usize {
        self.inner.lock().await.schedule_calls
    }

    pub async fn cancel_all_calls(&self) -> usize {
        self.inner.lock().await.cancel_all_calls
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn schedule(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let mut state = self.inner.lock().await;
        if state.fail {
            return Err(CoreError::Dispatcher("injected schedule failure".into()));
        }
        state.schedule_calls += 1;
        state.next_token += 1;
        let token = state.next_token.to_string();
        state.pending.push((
            token.clone(),
            RecordedReminder {
                id: id.to_string(),
                fire_at,
                title: title.to_string(),
                body: body.to_string(),
            },
        ));
        Ok(token)
    }

    async fn cancel(&self, token: &str) -> Result<()> {
        let mut state = self.inner.lock().await;
        if state.fail {
            return Err(CoreError::Dispatcher("injected cancel failure".into()));
        }
        state.pending.retain(|(t, _)| t != token);
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        let mut state = self.inner.lock().await;
        if state.fail {
            return Err(CoreError::Dispatcher("injected cancel_all failure".into()));
        }
        state.cancel_all_calls += 1;
        state.pending.clear();
        Ok(())
    }
}
