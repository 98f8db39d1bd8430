//! Daily and weekly streak computation.
//!
//! Streaks are computed over distinct calendar dates (UTC) with at least
//! one focus session. The current daily streak anchors at today, or at
//! yesterday when today is still empty, so an unbroken streak is not
//! reported as broken before the user has actually missed a full day.

use chrono::{Datelike, Days, NaiveDate};
use std::collections::{BTreeSet, HashMap};

/// Focus sessions a week needs to count toward the weekly streak.
pub const WEEKLY_STREAK_QUOTA: u32 = 5;

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_monday() as u64)
}

/// Consecutive days with at least one session, walking backward from
/// today (or yesterday, if today has none yet).
pub fn current_daily_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let anchor = if dates.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(y) => y,
            None => return 0,
        }
    };

    let mut streak = 0;
    let mut day = anchor;
    while dates.contains(&day) {
        streak += 1;
        day = match day.pred_opt() {
            Some(d) => d,
            None => break,
        };
    }
    streak
}

/// Longest run of consecutive session dates anywhere in history.
pub fn best_daily_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;

    for &date in dates {
        run = match prev {
            Some(p) if p.succ_opt() == Some(date) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(date);
    }
    best
}

/// Consecutive ISO weeks, walking backward from the current week, each
/// with at least [`WEEKLY_STREAK_QUOTA`] focus sessions.
///
/// `week_counts` is keyed by the Monday of each week.
pub fn weekly_streak(week_counts: &HashMap<NaiveDate, u32>, today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut week = week_start(today);
    while week_counts.get(&week).copied().unwrap_or(0) >= WEEKLY_STREAK_QUOTA {
        streak += 1;
        week = match week.checked_sub_days(Days::new(7)) {
            Some(w) => w,
            None => break,
        };
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dates(items: &[(i32, u32, u32)]) -> BTreeSet<NaiveDate> {
        items.iter().map(|&(y, m, d)| date(y, m, d)).collect()
    }

    #[test]
    fn week_start_is_monday() {
        // 2026-06-03 is a Wednesday
        assert_eq!(week_start(date(2026, 6, 3)), date(2026, 6, 1));
        // Monday maps to itself
        assert_eq!(week_start(date(2026, 6, 1)), date(2026, 6, 1));
        // Sunday belongs to the week that started six days earlier
        assert_eq!(week_start(date(2026, 6, 7)), date(2026, 6, 1));
    }

    #[test]
    fn current_streak_counts_back_from_today() {
        let ds = dates(&[(2026, 6, 1), (2026, 6, 2), (2026, 6, 3)]);
        assert_eq!(current_daily_streak(&ds, date(2026, 6, 3)), 3);
    }

    #[test]
    fn current_streak_anchors_at_yesterday_when_today_empty() {
        let ds = dates(&[(2026, 6, 1), (2026, 6, 2)]);
        // No session yet today: the streak is not reported broken
        assert_eq!(current_daily_streak(&ds, date(2026, 6, 3)), 2);
        // But a full missed day does break it
        assert_eq!(current_daily_streak(&ds, date(2026, 6, 4)), 0);
    }

    #[test]
    fn current_streak_zero_with_no_recent_days() {
        let ds = dates(&[(2026, 5, 1)]);
        assert_eq!(current_daily_streak(&ds, date(2026, 6, 3)), 0);
        assert_eq!(current_daily_streak(&BTreeSet::new(), date(2026, 6, 3)), 0);
    }

    #[test]
    fn best_streak_finds_longest_run() {
        let ds = dates(&[
            (2026, 5, 1),
            (2026, 5, 2),
            // gap
            (2026, 5, 10),
            (2026, 5, 11),
            (2026, 5, 12),
            (2026, 5, 13),
            // gap
            (2026, 5, 20),
        ]);
        assert_eq!(best_daily_streak(&ds), 4);
        assert_eq!(best_daily_streak(&BTreeSet::new()), 0);
    }

    #[test]
    fn weekly_streak_boundary() {
        // 5 sessions this week (starting Mon 2026-06-01) and 5 prior week
        let mut counts = HashMap::new();
        counts.insert(date(2026, 6, 1), 5);
        counts.insert(date(2026, 5, 25), 5);
        assert_eq!(weekly_streak(&counts, date(2026, 6, 3)), 2);

        // 4 sessions in the prior week breaks the streak there
        counts.insert(date(2026, 5, 25), 4);
        assert_eq!(weekly_streak(&counts, date(2026, 6, 3)), 1);

        // 4 in the current week: no streak at all
        counts.insert(date(2026, 6, 1), 4);
        assert_eq!(weekly_streak(&counts, date(2026, 6, 3)), 0);
    }
}
