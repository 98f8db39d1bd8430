//! Accountability pacts with an all-or-nothing daily quota.
//!
//! A pact commits every participant to a fixed number of focus sessions
//! per day over a fixed date range. The lifecycle is a one-way state
//! machine: `pending -> active -> {completed, failed}`, with the terminal
//! states immutable. One participant missing the quota on any past date
//! fails the pact for everyone, permanently.
//!
//! Everything in this module is pure: transition evaluation is a function
//! of the pact, its participants, the recomputed daily-progress grid and
//! the calendar date. Persistence and task scheduling live in the engine.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::identity::UserId;

/// Join-code length in characters.
pub const JOIN_CODE_LEN: usize = 6;

/// Join-code alphabet. Excludes visually confusable characters
/// (0/O, 1/I/L) so codes survive being read aloud or handwritten.
pub const JOIN_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Lifecycle state of a pact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PactStatus {
    /// Created, waiting for the start date; membership is open.
    Pending,
    /// Start date reached; the daily quota is being enforced.
    Active,
    /// End date passed with every participant meeting quota every day.
    Completed,
    /// A participant missed the quota on a past date. Terminal.
    Failed,
}

impl PactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PactStatus::Pending => "pending",
            PactStatus::Active => "active",
            PactStatus::Completed => "completed",
            PactStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PactStatus::Pending),
            "active" => Some(PactStatus::Active),
            "completed" => Some(PactStatus::Completed),
            "failed" => Some(PactStatus::Failed),
            _ => None,
        }
    }

    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PactStatus::Completed | PactStatus::Failed)
    }
}

impl std::fmt::Display for PactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a pact member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PactRole {
    Creator,
    Participant,
}

impl PactRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PactRole::Creator => "creator",
            PactRole::Participant => "participant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "creator" => Some(PactRole::Creator),
            "participant" => Some(PactRole::Participant),
            _ => None,
        }
    }
}

/// A multi-participant accountability commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pact {
    /// Unique pact identifier
    pub id: Uuid,

    /// User who created the pact
    pub creator_id: UserId,

    /// Six-character invite code, unique across pacts
    pub join_code: String,

    /// First day the quota applies (inclusive)
    pub start_date: NaiveDate,

    /// Last day the quota applies (inclusive)
    pub end_date: NaiveDate,

    /// Focus sessions each participant must complete per day
    pub required_pomos_per_day: u32,

    /// Lifecycle state
    pub status: PactStatus,

    /// First date on which the quota was missed, if failed
    pub failed_on_date: Option<NaiveDate>,

    /// Participant who missed the quota first, if failed
    pub failed_by_user_id: Option<UserId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Pact {
    /// Every date in the pact's range, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |d| *d <= self.end_date)
    }

    /// Number of days in the range.
    pub fn days(&self) -> u32 {
        (self.end_date - self.start_date).num_days() as u32 + 1
    }

    /// Whether the given date falls inside the quota range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Membership record linking a user to a pact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PactParticipant {
    pub pact_id: Uuid,
    pub user_id: UserId,
    pub role: PactRole,
    pub joined_at: DateTime<Utc>,
}

/// One participant's recomputed progress for one day of a pact.
///
/// Always re-derived from the session ledger, never incremented, so
/// out-of-order or retried session writes cannot skew it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PactDailyProgress {
    pub pact_id: Uuid,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub pomos_completed: u32,
    pub completed: bool,
}

/// A state-machine transition due to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PactTransition {
    /// pending -> active: the start date has been reached.
    Activate,
    /// active -> failed: a participant missed the quota on a past date.
    Fail {
        date: NaiveDate,
        user_id: UserId,
    },
    /// active -> completed: the range has passed with every cell complete.
    Complete,
}

/// Evaluate the next transition for a pact, if any.
///
/// `participants` must be in join order and `progress` maps
/// `(user_id, date)` to the recomputed completion flag; a missing entry
/// counts as a miss. The scan is deterministic: dates ascending, then
/// participants in join order, so concurrent evaluations converge on the
/// same terminal state.
pub fn evaluate_transition(
    pact: &Pact,
    participants: &[PactParticipant],
    progress: &HashMap<(UserId, NaiveDate), bool>,
    today: NaiveDate,
) -> Option<PactTransition> {
    match pact.status {
        PactStatus::Pending => {
            if today >= pact.start_date {
                Some(PactTransition::Activate)
            } else {
                None
            }
        }
        PactStatus::Active => {
            // Fail-fast: the first (date, participant) cell short of quota
            // fails the pact for everyone.
            for date in pact.dates() {
                if date >= today {
                    break;
                }
                for p in participants {
                    let met = progress
                        .get(&(p.user_id.clone(), date))
                        .copied()
                        .unwrap_or(false);
                    if !met {
                        return Some(PactTransition::Fail {
                            date,
                            user_id: p.user_id.clone(),
                        });
                    }
                }
            }

            // Completion is only evaluable once the whole range is in the
            // past; the scan above already verified every cell.
            if today > pact.end_date {
                Some(PactTransition::Complete)
            } else {
                None
            }
        }
        PactStatus::Completed | PactStatus::Failed => None,
    }
}

/// Generate a join code from the unambiguous alphabet.
///
/// Collision checking against existing pacts is the caller's job; on a
/// collision, call again.
pub fn generate_join_code<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pact(start: NaiveDate, end: NaiveDate, status: PactStatus) -> Pact {
        Pact {
            id: Uuid::new_v4(),
            creator_id: "p1".to_string(),
            join_code: "ABCDEF".to_string(),
            start_date: start,
            end_date: end,
            required_pomos_per_day: 1,
            status,
            failed_on_date: None,
            failed_by_user_id: None,
            created_at: Utc::now(),
        }
    }

    fn member(pact_id: Uuid, user: &str, role: PactRole, order: i64) -> PactParticipant {
        PactParticipant {
            pact_id,
            user_id: user.to_string(),
            role,
            joined_at: Utc::now() + chrono::Duration::seconds(order),
        }
    }

    fn three_day() -> (Pact, Vec<PactParticipant>) {
        let p = pact(date(2026, 6, 1), date(2026, 6, 3), PactStatus::Active);
        let members = vec![
            member(p.id, "p1", PactRole::Creator, 0),
            member(p.id, "p2", PactRole::Participant, 1),
        ];
        (p, members)
    }

    fn grid(entries: &[(&str, NaiveDate, bool)]) -> HashMap<(UserId, NaiveDate), bool> {
        entries
            .iter()
            .map(|(u, d, c)| ((u.to_string(), *d), *c))
            .collect()
    }

    #[test]
    fn pending_activates_on_start_date() {
        let p = pact(date(2026, 6, 1), date(2026, 6, 3), PactStatus::Pending);
        let none = evaluate_transition(&p, &[], &HashMap::new(), date(2026, 5, 31));
        assert_eq!(none, None);
        let some = evaluate_transition(&p, &[], &HashMap::new(), date(2026, 6, 1));
        assert_eq!(some, Some(PactTransition::Activate));
    }

    #[test]
    fn fail_fast_records_first_offender() {
        let (p, members) = three_day();
        // P1 perfect, P2 missed day 2
        let progress = grid(&[
            ("p1", date(2026, 6, 1), true),
            ("p2", date(2026, 6, 1), true),
            ("p1", date(2026, 6, 2), true),
            ("p1", date(2026, 6, 3), true),
        ]);
        let t = evaluate_transition(&p, &members, &progress, date(2026, 6, 3));
        assert_eq!(
            t,
            Some(PactTransition::Fail {
                date: date(2026, 6, 2),
                user_id: "p2".to_string(),
            })
        );
    }

    #[test]
    fn missing_row_counts_as_miss() {
        let (p, members) = three_day();
        // No progress rows at all: day 1 already passed
        let t = evaluate_transition(&p, &members, &HashMap::new(), date(2026, 6, 2));
        assert_eq!(
            t,
            Some(PactTransition::Fail {
                date: date(2026, 6, 1),
                user_id: "p1".to_string(),
            })
        );
    }

    #[test]
    fn today_is_not_scanned() {
        let (p, members) = three_day();
        // Nothing recorded yet for day 1, but day 1 is still today
        let t = evaluate_transition(&p, &members, &HashMap::new(), date(2026, 6, 1));
        assert_eq!(t, None);
    }

    #[test]
    fn scan_order_is_dates_then_join_order() {
        let (p, members) = three_day();
        // Both missed day 1: the first participant in join order is blamed
        let progress = grid(&[("p2", date(2026, 6, 2), true)]);
        let t = evaluate_transition(&p, &members, &progress, date(2026, 6, 4));
        assert_eq!(
            t,
            Some(PactTransition::Fail {
                date: date(2026, 6, 1),
                user_id: "p1".to_string(),
            })
        );
    }

    #[test]
    fn completes_only_after_end_date() {
        let (p, members) = three_day();
        let progress = grid(&[
            ("p1", date(2026, 6, 1), true),
            ("p2", date(2026, 6, 1), true),
            ("p1", date(2026, 6, 2), true),
            ("p2", date(2026, 6, 2), true),
            ("p1", date(2026, 6, 3), true),
            ("p2", date(2026, 6, 3), true),
        ]);
        // Last day still running: no transition
        let t = evaluate_transition(&p, &members, &progress, date(2026, 6, 3));
        assert_eq!(t, None);
        // Range over: complete
        let t = evaluate_transition(&p, &members, &progress, date(2026, 6, 4));
        assert_eq!(t, Some(PactTransition::Complete));
    }

    #[test]
    fn terminal_states_never_transition() {
        let (mut p, members) = three_day();
        p.status = PactStatus::Failed;
        let t = evaluate_transition(&p, &members, &HashMap::new(), date(2026, 7, 1));
        assert_eq!(t, None);
        p.status = PactStatus::Completed;
        let t = evaluate_transition(&p, &members, &HashMap::new(), date(2026, 7, 1));
        assert_eq!(t, None);
    }

    #[test]
    fn join_codes_use_unambiguous_alphabet() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_join_code(&mut rng);
            assert_eq!(code.len(), JOIN_CODE_LEN);
            for c in code.bytes() {
                assert!(JOIN_CODE_ALPHABET.contains(&c));
                assert!(!b"0O1IL".contains(&c));
            }
        }
    }

    #[test]
    fn date_helpers() {
        let p = pact(date(2026, 6, 1), date(2026, 6, 3), PactStatus::Pending);
        assert_eq!(p.days(), 3);
        let dates: Vec<_> = p.dates().collect();
        assert_eq!(
            dates,
            vec![date(2026, 6, 1), date(2026, 6, 2), date(2026, 6, 3)]
        );
        assert!(p.contains(date(2026, 6, 2)));
        assert!(!p.contains(date(2026, 6, 4)));
    }
}
