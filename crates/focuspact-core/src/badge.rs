//! The team badge granted when a pact completes.
//!
//! The badge is modeled as a singleton challenge definition plus one
//! completion row per participant, so it rides on the same monotonic
//! completion machinery as regular challenges.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::challenge::{ChallengeDefinition, ChallengeKind};
use crate::error::Result;
use crate::storage::Database;

/// Catalog id of the singleton team badge.
pub const TEAM_BADGE_ID: &str = "pact-team";

/// The badge's definition. Inactive so the regular challenge evaluator
/// never processes it; it is only ever granted here.
fn team_badge_definition() -> ChallengeDefinition {
    ChallengeDefinition {
        id: TEAM_BADGE_ID.to_string(),
        kind: ChallengeKind::Total,
        target: 0,
        active: false,
    }
}

/// Grant the team badge to every participant of a completed pact.
///
/// Creates the badge definition if absent, then a completion per
/// participant only where none exists. Safe to call any number of times
/// for the same pact; participants who already hold the badge from an
/// earlier pact keep their original `completed_at`.
pub fn award_on_pact_completion(
    db: &Database,
    pact_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    db.insert_definition_if_absent(&team_badge_definition())?;

    for participant in db.participants(pact_id)? {
        db.complete_challenge(&participant.user_id, TEAM_BADGE_ID, now)?;
        log::info!(
            "team badge granted: user={} pact={}",
            participant.user_id,
            pact_id
        );
    }
    Ok(())
}
