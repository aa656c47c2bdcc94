//! Wall-clock scheduling for digest and warning jobs.
//!
//! Occurrence math is pure and separate from the loops: `next_*` functions
//! compute the next firing instant in the configured time zone, job loops
//! sleep until it and fire. Firings are fire-and-forget: no dedup across
//! restarts and no backfill of missed firings. A failing cycle is logged and
//! skipped; the loop keeps going.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::format;
use crate::notifier::NotifierHandle;
use crate::store::accessor::{StoreAccessor, group_by_assignee};
use crate::store::{StoreError, TaskStore};

/// Whether `date` is a workday (Monday through Friday).
#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Local instant at `hour:minute` on `date`, if that wall-clock time exists.
///
/// DST gaps make a local time nonexistent; ambiguous times resolve to the
/// earlier offset.
fn occurrence_on(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

/// First instant strictly after `after` at `hour:minute` on a date accepted
/// by `accept`. `None` only for out-of-range times (hour > 23).
fn next_matching(
    after: DateTime<Tz>,
    hour: u32,
    minute: u32,
    accept: impl Fn(NaiveDate) -> bool,
) -> Option<DateTime<Tz>> {
    NaiveTime::from_hms_opt(hour, minute, 0)?;
    let tz = after.timezone();
    let mut date = after.date_naive();
    // Bounded scan: a matching date always exists within a few weeks.
    for _ in 0..366 {
        if accept(date)
            && let Some(at) = occurrence_on(tz, date, hour, minute)
            && at > after
        {
            return Some(at);
        }
        date = date.checked_add_days(Days::new(1))?;
    }
    None
}

/// Next workday firing at `hour:minute` strictly after `after`.
#[must_use]
pub fn next_workday_at(after: DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    next_matching(after, hour, minute, is_workday)
}

/// Next Monday firing at `hour:minute` strictly after `after`.
#[must_use]
pub fn next_monday_at(after: DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    next_matching(after, hour, minute, |d| d.weekday() == Weekday::Mon)
}

/// Next first-of-month firing at `hour:minute` strictly after `after`.
#[must_use]
pub fn next_first_of_month_at(after: DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    next_matching(after, hour, minute, |d| d.day() == 1)
}

/// Last day of the month `first` belongs to.
fn month_end(first: NaiveDate) -> NaiveDate {
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next_first.and_then(|d| d.pred_opt()).unwrap_or(first)
}

/// Builds the morning digest text for `today`.
///
/// # Errors
///
/// Propagates store fetch failures; the caller skips the cycle.
pub async fn build_daily_digest<S: TaskStore>(
    accessor: &StoreAccessor<S>,
    today: NaiveDate,
) -> Result<String, StoreError> {
    let due = accessor.tasks_due_on(today).await?;
    let overdue = accessor.overdue_tasks(today).await?;
    Ok(format::daily_digest(today, &group_by_assignee(&due), &overdue))
}

/// Builds the evening warning text for the day after `today`.
///
/// # Errors
///
/// Propagates store fetch failures; the caller skips the cycle.
pub async fn build_deadline_warning<S: TaskStore>(
    accessor: &StoreAccessor<S>,
    today: NaiveDate,
) -> Result<String, StoreError> {
    let Some(tomorrow) = today.succ_opt() else {
        return Ok(format::deadline_warning(today, &[]));
    };
    let due = accessor.tasks_due_on(tomorrow).await?;
    Ok(format::deadline_warning(tomorrow, &due))
}

/// Builds the weekly digest for the week starting at `monday`.
///
/// # Errors
///
/// Propagates store fetch failures; the caller skips the cycle.
pub async fn build_weekly_digest<S: TaskStore>(
    accessor: &StoreAccessor<S>,
    monday: NaiveDate,
) -> Result<String, StoreError> {
    let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
    let due = accessor.tasks_in_range(monday, sunday).await?;
    Ok(format::weekly_digest(monday, sunday, &group_by_assignee(&due)))
}

/// Builds the monthly digest for the month starting at `first`.
///
/// # Errors
///
/// Propagates store fetch failures; the caller skips the cycle.
pub async fn build_monthly_digest<S: TaskStore>(
    accessor: &StoreAccessor<S>,
    first: NaiveDate,
) -> Result<String, StoreError> {
    let due = accessor.tasks_in_range(first, month_end(first)).await?;
    Ok(format::monthly_digest(first, &group_by_assignee(&due)))
}

/// Which digest a job loop fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Workday mornings: tasks due today plus the overdue tail.
    DailyDigest,
    /// Workday evenings: tasks due tomorrow.
    DeadlineWarning,
    /// Monday mornings: the week ahead.
    WeeklyDigest,
    /// First of the month: the month ahead.
    MonthlyDigest,
}

impl Job {
    fn next_firing(self, after: DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
        match self {
            Self::DailyDigest | Self::DeadlineWarning => next_workday_at(after, hour, minute),
            Self::WeeklyDigest => next_monday_at(after, hour, minute),
            Self::MonthlyDigest => next_first_of_month_at(after, hour, minute),
        }
    }

    async fn build<S: TaskStore>(
        self,
        accessor: &StoreAccessor<S>,
        date: NaiveDate,
    ) -> Result<String, StoreError> {
        match self {
            Self::DailyDigest => build_daily_digest(accessor, date).await,
            Self::DeadlineWarning => build_deadline_warning(accessor, date).await,
            Self::WeeklyDigest => build_weekly_digest(accessor, date).await,
            Self::MonthlyDigest => build_monthly_digest(accessor, date).await,
        }
    }
}

/// Runs one job forever: sleep until the next firing, build, send.
pub async fn run_job<S: TaskStore>(
    job: Job,
    accessor: Arc<StoreAccessor<S>>,
    notifier: NotifierHandle,
    tz: Tz,
    hour: u32,
    minute: u32,
) {
    loop {
        let now = Utc::now().with_timezone(&tz);
        let Some(at) = job.next_firing(now, hour, minute) else {
            tracing::error!(?job, hour, minute, "no valid firing time, job stopped");
            return;
        };
        let wait = (at - now).to_std().unwrap_or_default();
        tracing::debug!(?job, firing = %at, "scheduled");
        tokio::time::sleep(wait).await;

        match job.build(&accessor, at.date_naive()).await {
            Ok(text) => notifier.send(&text),
            Err(e) => {
                tracing::warn!(?job, error = %e, "cycle failed, skipping until next firing");
            }
        }
    }
}
