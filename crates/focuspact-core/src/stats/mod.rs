//! Statistics derived from the session ledger.
//!
//! Everything here is a pure function of the user's focus-session
//! timestamps and an `as_of` instant: period counts, daily and weekly
//! streaks, and the exponentially-decayed focus-fitness curve. Nothing is
//! read back from a persisted cache.

mod aggregate;
mod fitness;
mod streaks;

pub use aggregate::{FocusStats, StatsAggregator};
pub use fitness::{fitness_curve, FitnessPoint};
pub use streaks::{
    best_daily_streak, current_daily_streak, week_start, weekly_streak, WEEKLY_STREAK_QUOTA,
};
