//! The stats aggregator: period counts, streaks, and fitness, computed
//! purely from a user's focus-session timestamps.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::fitness::{fitness_curve, FitnessPoint};
use super::streaks::{best_daily_streak, current_daily_streak, week_start, weekly_streak};
use crate::storage::FitnessConfig;

/// Derived statistics for one user, as of a given instant.
///
/// `best_streak` folds in the persisted high-water mark and therefore
/// never regresses; everything else is recomputed from the ledger alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusStats {
    /// Lifetime focus-session count
    pub total: u64,
    /// Focus sessions today
    pub today: u64,
    /// Focus sessions since Monday 00:00 (ISO week)
    pub week: u64,
    /// Focus sessions since the 1st of the month
    pub month: u64,
    /// Live daily streak (today- or yesterday-anchored)
    pub current_streak: u32,
    /// max(historical best run, stored high-water mark, current streak)
    pub best_streak: u32,
    /// Consecutive ISO weeks with at least 5 focus sessions
    pub weekly_streak: u32,
    /// Trailing EWMA curve, oldest day first
    pub fitness: Vec<FitnessPoint>,
}

/// Computes [`FocusStats`] from focus-session completion times.
///
/// All calendar bucketing (days, ISO weeks, months) is done in UTC so the
/// result is independent of where it is evaluated.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    fitness: FitnessConfig,
}

impl StatsAggregator {
    pub fn new(fitness: FitnessConfig) -> Self {
        Self { fitness }
    }

    /// Compute stats over `times` (focus sessions only) as of `as_of`.
    ///
    /// `stored_best` is the persisted `best_daily_streak` high-water mark;
    /// the reported best streak never drops below it.
    pub fn compute(
        &self,
        times: &[DateTime<Utc>],
        as_of: DateTime<Utc>,
        stored_best: u32,
    ) -> FocusStats {
        let today = as_of.date_naive();
        let week = week_start(today);
        let month = today.with_day(1).unwrap_or(today);

        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut daily_counts: HashMap<NaiveDate, u32> = HashMap::new();
        let mut week_counts: HashMap<NaiveDate, u32> = HashMap::new();
        let (mut today_n, mut week_n, mut month_n) = (0u64, 0u64, 0u64);

        for t in times {
            let d = t.date_naive();
            dates.insert(d);
            *daily_counts.entry(d).or_insert(0) += 1;
            *week_counts.entry(week_start(d)).or_insert(0) += 1;
            if d == today {
                today_n += 1;
            }
            if d >= week {
                week_n += 1;
            }
            if d >= month {
                month_n += 1;
            }
        }

        let current = current_daily_streak(&dates, today);
        let best = best_daily_streak(&dates).max(stored_best).max(current);

        FocusStats {
            total: times.len() as u64,
            today: today_n,
            week: week_n,
            month: month_n,
            current_streak: current,
            best_streak: best,
            weekly_streak: weekly_streak(&week_counts, today),
            fitness: fitness_curve(
                &daily_counts,
                today,
                self.fitness.window_days,
                self.fitness.decay,
                self.fitness.weight,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn aggregator() -> StatsAggregator {
        StatsAggregator::new(FitnessConfig::default())
    }

    #[test]
    fn empty_ledger_yields_zeroes() {
        let stats = aggregator().compute(&[], at(2026, 6, 3, 12), 0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.today, 0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.weekly_streak, 0);
        // The fitness window is still emitted, flat at zero
        assert_eq!(stats.fitness.len(), 90);
    }

    #[test]
    fn period_boundaries() {
        // as_of Wednesday 2026-06-03; week starts Mon 06-01, month 06-01
        let times = vec![
            at(2026, 6, 3, 9),  // today
            at(2026, 6, 3, 15), // today
            at(2026, 6, 1, 9),  // this week + month
            at(2026, 5, 31, 9), // prior week, prior month
            at(2026, 5, 4, 9),  // prior month
        ];
        let stats = aggregator().compute(&times, at(2026, 6, 3, 23), 0);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.today, 2);
        assert_eq!(stats.week, 3);
        assert_eq!(stats.month, 3);
    }

    #[test]
    fn best_streak_never_regresses_below_stored_mark() {
        let times = vec![at(2026, 6, 3, 9)];
        let stats = aggregator().compute(&times, at(2026, 6, 3, 12), 7);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.best_streak, 7);
    }

    #[test]
    fn best_streak_covers_current_run() {
        // Three straight days ending today, no stored mark yet
        let times = vec![at(2026, 6, 1, 9), at(2026, 6, 2, 9), at(2026, 6, 3, 9)];
        let stats = aggregator().compute(&times, at(2026, 6, 3, 12), 0);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.best_streak, 3);
    }

    #[test]
    fn weekly_streak_from_raw_times() {
        // 5 sessions in the week of Mon 06-01, 5 in the week of Mon 05-25
        let mut times = Vec::new();
        for d in 1..=5 {
            times.push(at(2026, 6, d, 9));
        }
        for d in 25..=29 {
            times.push(at(2026, 5, d, 9));
        }
        let stats = aggregator().compute(&times, at(2026, 6, 6, 12), 0);
        assert_eq!(stats.weekly_streak, 2);
    }
}
