//! Twice-daily refresh scheduling
//!
//! Slots are local wall-clock times. After the last slot of a day the next
//! instant rolls to the first slot of the following day.

use crate::sync::TaskSync;
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::sync::Arc;
use tokio::sync::watch;

/// Next slot strictly after `now`
///
/// `slots` need not be sorted. Returns `None` only for an empty slot list.
#[must_use]
pub fn next_slot<Tz: TimeZone>(now: &DateTime<Tz>, slots: &[NaiveTime]) -> Option<DateTime<Tz>> {
    let mut sorted = slots.to_vec();
    sorted.sort();

    let tz = now.timezone();
    let today = now.date_naive();
    // a DST gap can swallow a slot; look one extra day ahead
    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .flat_map(|day| sorted.iter().map(move |slot| day.and_time(*slot)))
        .filter_map(|naive| tz.from_local_datetime(&naive).earliest())
        .find(|candidate| candidate > now)
}

/// Drives scheduled refreshes until shut down
#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    sync: Arc<TaskSync>,
    slots: Vec<NaiveTime>,
}

impl RefreshScheduler {
    /// Create scheduler
    #[must_use]
    pub fn new(sync: Arc<TaskSync>, slots: Vec<NaiveTime>) -> Self {
        Self { sync, slots }
    }

    /// Next scheduled instant from the local clock
    #[must_use]
    pub fn next_run(&self) -> Option<DateTime<Local>> {
        next_slot(&Local::now(), &self.slots)
    }

    /// Sleep until each slot and refresh, until `shutdown` flips to true
    /// or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let Some(next) = self.next_run() else {
                tracing::warn!("no schedule slots configured, scheduler idle");
                let _ = shutdown.changed().await;
                break;
            };
            let wait = (next.clone() - Local::now()).to_std().unwrap_or_default();
            tracing::info!(next = %next, "next scheduled refresh");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    match self.sync.refresh_scheduled().await {
                        Some(Ok(list)) => tracing::info!(tasks = list.tasks.len(), "scheduled refresh done"),
                        Some(Err(err)) => tracing::warn!(error = %err, "scheduled refresh failed"),
                        None => tracing::warn!("refresh already running, scheduled tick skipped"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn slots() -> Vec<NaiveTime> {
        vec![
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        ]
    }

    fn kst(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn before_first_slot_picks_morning() {
        assert_eq!(next_slot(&kst(2026, 3, 1, 8, 30), &slots()), Some(kst(2026, 3, 1, 10, 0)));
    }

    #[test]
    fn between_slots_picks_evening() {
        assert_eq!(next_slot(&kst(2026, 3, 1, 10, 0), &slots()), Some(kst(2026, 3, 1, 19, 0)));
    }

    #[test]
    fn after_last_slot_rolls_to_next_day() {
        assert_eq!(next_slot(&kst(2026, 3, 31, 19, 5), &slots()), Some(kst(2026, 4, 1, 10, 0)));
    }

    #[test]
    fn empty_slots_yield_none() {
        assert_eq!(next_slot(&Utc::now(), &[]), None);
    }
}
