//! Status engine: the time-driven state machine.
//!
//! The engine is the single source of truth for clock-driven
//! transitions. It is a pure function of an instance and `now` -- the
//! caller (the orchestrator's refresh path) is responsible for invoking
//! it periodically and on foreground/day-change triggers, and for
//! persisting the results.
//!
//! ```text
//! Upcoming -> Due -> Missed        (clock-driven)
//! Completed, Skipped               (terminal, user-driven only)
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::instance::{DailySessionInstance, SessionStatus};

/// Minutes after `scheduled_at` during which an instance is still `Due`.
pub const DEFAULT_GRACE_WINDOW_MIN: i64 = 30;

/// A just-missed instance stays eligible for `next_due` this long.
pub const MISSED_NEXT_DUE_GRACE_MIN: i64 = 60;

/// Clock-driven status for an instance at `now`. Terminal statuses are
/// absorbing and returned unchanged.
pub fn compute_status(
    instance: &DailySessionInstance,
    now: DateTime<Utc>,
    grace_window_min: i64,
) -> SessionStatus {
    if instance.status.is_terminal() {
        return instance.status;
    }
    let grace_end = instance.scheduled_at + Duration::minutes(grace_window_min);
    if now < instance.scheduled_at {
        SessionStatus::Upcoming
    } else if now < grace_end {
        SessionStatus::Due
    } else {
        SessionStatus::Missed
    }
}

/// Result of evaluating one instance: the updated record plus whether
/// this evaluation crossed into `Missed` (exactly-once MISS emission).
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub updated: DailySessionInstance,
    pub newly_missed: bool,
}

/// Evaluate one instance. `None` means the stored status already matches
/// the computed one: no write, no event. Re-evaluating an instance that
/// is already `Missed` therefore never re-emits a MISS.
pub fn evaluate(
    instance: &DailySessionInstance,
    now: DateTime<Utc>,
    grace_window_min: i64,
) -> Option<StatusChange> {
    let computed = compute_status(instance, now, grace_window_min);
    if computed == instance.status {
        return None;
    }
    let mut updated = instance.clone();
    updated.status = computed;
    Some(StatusChange {
        updated,
        newly_missed: computed == SessionStatus::Missed,
    })
}

/// The currently actionable instance, if any.
///
/// Selection order over the canonically sorted day:
/// 1. the earliest instance that is `Due` or `Upcoming`;
/// 2. failing that, the earliest `Missed` instance scheduled within the
///    last [`MISSED_NEXT_DUE_GRACE_MIN`] minutes;
/// 3. otherwise none.
///
/// Pure: derives entirely from the instance slice and `now`.
pub fn next_due(
    instances: &[DailySessionInstance],
    now: DateTime<Utc>,
) -> Option<&DailySessionInstance> {
    if let Some(actionable) = instances
        .iter()
        .find(|i| matches!(i.status, SessionStatus::Due | SessionStatus::Upcoming))
    {
        return Some(actionable);
    }
    let recent_cutoff = now - Duration::minutes(MISSED_NEXT_DUE_GRACE_MIN);
    instances
        .iter()
        .find(|i| i.status == SessionStatus::Missed && i.scheduled_at >= recent_cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    fn inst(template_id: &str, scheduled: DateTime<Utc>) -> DailySessionInstance {
        DailySessionInstance::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            template_id,
            scheduled,
        )
    }

    #[test]
    fn grace_boundary() {
        let i = inst("x", at(9, 0, 0));
        assert_eq!(compute_status(&i, at(8, 59, 59), 30), SessionStatus::Upcoming);
        assert_eq!(compute_status(&i, at(9, 0, 0), 30), SessionStatus::Due);
        assert_eq!(compute_status(&i, at(9, 29, 59), 30), SessionStatus::Due);
        assert_eq!(compute_status(&i, at(9, 30, 0), 30), SessionStatus::Missed);
    }

    #[test]
    fn terminal_absorption() {
        let mut i = inst("x", at(9, 0, 0));
        i.status = SessionStatus::Completed;
        assert_eq!(compute_status(&i, at(23, 0, 0), 30), SessionStatus::Completed);
        i.status = SessionStatus::Skipped;
        assert_eq!(compute_status(&i, at(23, 0, 0), 30), SessionStatus::Skipped);
    }

    #[test]
    fn evaluate_emits_miss_exactly_once() {
        let i = inst("x", at(9, 0, 0));
        let change = evaluate(&i, at(9, 31, 0), 30).expect("transition expected");
        assert!(change.newly_missed);
        assert_eq!(change.updated.status, SessionStatus::Missed);

        // Second evaluation of the updated record: no write, no event.
        assert!(evaluate(&change.updated, at(9, 32, 0), 30).is_none());
    }

    #[test]
    fn evaluate_is_noop_when_status_matches() {
        let i = inst("x", at(9, 0, 0));
        assert!(evaluate(&i, at(8, 0, 0), 30).is_none());
    }

    #[test]
    fn next_due_prefers_due_over_recent_missed() {
        let now = at(12, 0, 0);
        let mut completed = inst("a", at(6, 0, 0));
        completed.status = SessionStatus::Completed;
        let mut missed = inst("b", at(9, 0, 0)); // 3h ago, outside the window
        missed.status = SessionStatus::Missed;
        let mut due = inst("c", at(11, 50, 0));
        due.status = SessionStatus::Due;

        let day = vec![completed, missed, due];
        assert_eq!(next_due(&day, now).unwrap().template_id, "c");
    }

    #[test]
    fn next_due_falls_back_to_recently_missed() {
        let now = at(12, 0, 0);
        let mut a = inst("a", at(6, 0, 0));
        a.status = SessionStatus::Completed;
        let mut b = inst("b", at(11, 50, 0)); // missed 10 min ago
        b.status = SessionStatus::Missed;
        let mut c = inst("c", at(7, 0, 0));
        c.status = SessionStatus::Completed;

        let mut day = vec![a, b, c];
        crate::instance::sort_day(&mut day);
        assert_eq!(next_due(&day, now).unwrap().template_id, "b");
    }

    #[test]
    fn next_due_none_when_all_terminal() {
        let now = at(12, 0, 0);
        let day: Vec<_> = ["a", "b"]
            .iter()
            .map(|id| {
                let mut i = inst(id, at(6, 0, 0));
                i.status = SessionStatus::Completed;
                i
            })
            .collect();
        assert!(next_due(&day, now).is_none());
    }

    #[test]
    fn next_due_ignores_stale_missed() {
        let now = at(12, 0, 0);
        let mut i = inst("a", at(10, 55, 0)); // 65 minutes ago
        i.status = SessionStatus::Missed;
        assert!(next_due(&[i], now).is_none());
    }

    proptest! {
        /// Recomputing at a fixed `now` is idempotent: the second pass
        /// never produces a write or a duplicate MISS.
        #[test]
        fn status_computation_idempotent(
            offset_min in -720i64..720,
            grace in 1i64..120,
        ) {
            let scheduled = at(12, 0, 0);
            let now = scheduled + Duration::minutes(offset_min);
            let i = inst("x", scheduled);

            let first = compute_status(&i, now, grace);
            prop_assert_eq!(compute_status(&i, now, grace), first);

            if let Some(change) = evaluate(&i, now, grace) {
                prop_assert!(evaluate(&change.updated, now, grace).is_none());
            }
        }
    }
}
