//! Day-bucketed read models over the movement log.
//!
//! All functions take "now" as a `DateTime<FixedOffset>` so callers decide
//! which calendar the buckets follow (the API passes the server's local time).

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::movement::{Movement, MovementType};

/// Days covered by the per-product trend summary, today included.
pub const SUMMARY_DAYS: u32 = 7;

/// Half-open `[start, end)` UTC window covering one local calendar day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate, offset: FixedOffset) -> Self {
        let start = local_midnight_utc(date, offset);
        Self {
            date,
            start,
            end: start + Duration::days(1),
        }
    }

    /// The window of the calendar day `now` falls in.
    pub fn today(now: DateTime<FixedOffset>) -> Self {
        Self::for_date(now.date_naive(), *now.offset())
    }

    /// `days` consecutive windows ending with today, oldest first.
    pub fn trailing(now: DateTime<FixedOffset>, days: u32) -> Vec<Self> {
        let today = now.date_naive();
        (0..days)
            .rev()
            .map(|back| Self::for_date(today - Duration::days(i64::from(back)), *now.offset()))
            .collect()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    (local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Movement counts per type plus their total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTypeCounts {
    pub entry: u64,
    pub exit: u64,
    pub transfer: u64,
    pub adjustment: u64,
    pub total: u64,
}

impl MovementTypeCounts {
    pub fn tally<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> Self {
        let mut counts = Self::default();
        for m in movements {
            counts.add(m.movement_type, 1);
        }
        counts
    }

    /// Add `n` movements of `movement_type` (used by grouped SQL counts too).
    pub fn add(&mut self, movement_type: MovementType, n: u64) {
        match movement_type {
            MovementType::Entry => self.entry += n,
            MovementType::Exit => self.exit += n,
            MovementType::Transfer => self.transfer += n,
            MovementType::Adjustment => self.adjustment += n,
        }
        self.total += n;
    }
}

/// Quantities moved for one product on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMovementSummary {
    pub date: NaiveDate,
    pub entries: i64,
    pub exits: i64,
    pub transfers: i64,
    pub adjustments: i64,
}

impl DailyMovementSummary {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: 0,
            exits: 0,
            transfers: 0,
            adjustments: 0,
        }
    }
}

/// Sum movement quantities into `days` daily buckets ending today.
///
/// Every day gets a bucket, even without movements. Movements outside the
/// window are ignored. Totals saturate at `i64::MAX`.
pub fn summarize_days(
    movements: &[Movement],
    now: DateTime<FixedOffset>,
    days: u32,
) -> Vec<DailyMovementSummary> {
    let windows = DayWindow::trailing(now, days);
    let mut buckets: Vec<DailyMovementSummary> =
        windows.iter().map(|w| DailyMovementSummary::empty(w.date)).collect();

    for m in movements {
        let Some(idx) = windows.iter().position(|w| w.contains(m.created_at)) else {
            continue;
        };
        let bucket = &mut buckets[idx];
        let slot = match m.movement_type {
            MovementType::Entry => &mut bucket.entries,
            MovementType::Exit => &mut bucket.exits,
            MovementType::Transfer => &mut bucket.transfers,
            MovementType::Adjustment => &mut bucket.adjustments,
        };
        *slot = slot.saturating_add(m.quantity);
    }

    buckets
}
