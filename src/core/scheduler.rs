use super::accrual::AccrualJob;
use super::clock::LedgerCalendar;
use super::traits::{Clock, LedgerStore};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The first local `run_at` strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let calendar = LedgerCalendar::new(offset);
    let today = calendar.today(now);
    let candidate = calendar.to_utc(today.and_time(run_at));
    if candidate > now {
        return candidate;
    }
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    calendar.to_utc(tomorrow.and_time(run_at))
}

/// Runs the accrual job once per local day, off the request path
///
/// On start it first catches up on today's date, which is a no-op if that
/// date is already closed. A failed run is logged and retried at the next
/// tick.
pub struct AccrualScheduler<S> {
    job: Arc<AccrualJob<S>>,
    calendar: LedgerCalendar,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore + 'static> AccrualScheduler<S> {
    pub fn new(job: Arc<AccrualJob<S>>, calendar: LedgerCalendar, clock: Arc<dyn Clock>) -> Self {
        Self {
            job,
            calendar,
            clock,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let run_at = self.job.config().run_at;
        info!(%run_at, offset = %self.calendar.offset(), "accrual scheduler started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let today = self.calendar.today(self.clock.now());
            self.run_for(today).await;

            let now = self.clock.now();
            let next = next_run_after(now, run_at, self.calendar.offset());
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "accrual scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("accrual scheduler stopped");
    }

    async fn run_for(&self, date: NaiveDate) {
        let job = Arc::clone(&self.job);
        match tokio::task::spawn_blocking(move || job.run_daily_accrual(date)).await {
            Ok(Ok(summary)) => info!(
                %date,
                credited = summary.credited_this_run,
                revenue = %summary.revenue.amount,
                "scheduled accrual finished"
            ),
            Ok(Err(e)) if e.is_retryable() => {
                warn!(%date, error = %e, "scheduled accrual skipped, will retry")
            }
            Ok(Err(e)) => error!(%date, error = %e, "scheduled accrual failed"),
            Err(e) => error!(%date, error = %e, "accrual task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccrualConfig;
    use crate::core::clock::ManualClock;
    use crate::core::memory_store::MemoryStore;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, d, h, m, 0).unwrap()
    }

    fn five_past_midnight() -> NaiveTime {
        NaiveTime::from_hms_opt(0, 5, 0).unwrap()
    }

    #[rstest]
    #[case::later_today(0, utc(1, 0, 1), utc(1, 0, 5))]
    #[case::exactly_now_moves_to_tomorrow(0, utc(1, 0, 5), utc(2, 0, 5))]
    #[case::after_run_time(0, utc(1, 12, 0), utc(2, 0, 5))]
    #[case::east_offset(120, utc(1, 12, 0), utc(1, 22, 5))]
    #[case::west_offset(-300, utc(1, 3, 0), utc(1, 5, 5))]
    fn test_next_run_after(
        #[case] offset_minutes: i32,
        #[case] now: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
        assert_eq!(next_run_after(now, five_past_midnight(), offset), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_catches_up_then_stops() {
        let store = Arc::new(MemoryStore::new());
        let job = Arc::new(AccrualJob::new(Arc::clone(&store), AccrualConfig::default()).unwrap());
        let clock = Arc::new(ManualClock::new(utc(4, 9, 0)));
        let calendar = LedgerCalendar::new(FixedOffset::east_opt(0).unwrap());
        let shutdown = CancellationToken::new();

        let handle = AccrualScheduler::new(job, calendar, clock).spawn(shutdown.clone());
        // The catch-up run writes today's revenue record before the first sleep
        for _ in 0..200 {
            if store.revenue_record(utc(4, 0, 0).date_naive()).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        shutdown.cancel();
        handle.await.unwrap();

        assert!(store.revenue_record(utc(4, 0, 0).date_naive()).is_some());
    }
}
