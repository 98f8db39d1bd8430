//! Focus fitness: an exponentially weighted moving average of daily
//! session counts, modeling a decaying "training load".
//!
//! Each completed focus session adds `weight` points on its day; each day
//! of inactivity decays the running score by `1 - decay` (about 2.4% at
//! the default 0.976). The curve is seeded at zero at the start of the
//! trailing window.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One day of the fitness curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessPoint {
    pub date: NaiveDate,
    pub score: f64,
}

/// Compute the fitness curve over the trailing window ending at `as_of`.
///
/// `daily_counts` maps dates to focus-session counts; missing dates count
/// as zero. Returns one point per day, oldest first.
pub fn fitness_curve(
    daily_counts: &HashMap<NaiveDate, u32>,
    as_of: NaiveDate,
    window_days: u32,
    decay: f64,
    weight: f64,
) -> Vec<FitnessPoint> {
    if window_days == 0 {
        return Vec::new();
    }

    let start = as_of
        .checked_sub_days(Days::new(window_days as u64 - 1))
        .unwrap_or(as_of);

    let mut curve = Vec::with_capacity(window_days as usize);
    let mut score = 0.0_f64;

    for date in start.iter_days().take_while(|d| *d <= as_of) {
        let pomos = daily_counts.get(&date).copied().unwrap_or(0);
        score = score * decay + pomos as f64 * weight;
        curve.push(FitnessPoint { date, score });
    }
    curve
}
