use clap::Subcommand;
use focuspact_core::{ChallengeDefinition, ChallengeKind, Engine};

use super::{caller, parse_at};

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Add or replace a catalog entry (admin only)
    Define {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Catalog slug
        id: String,
        /// Kind: total, daily, weekly, monthly, recurring-monthly, streak
        #[arg(long)]
        kind: String,
        /// Target value
        #[arg(long)]
        target: u64,
        /// Month (1-12), required for recurring-monthly
        #[arg(long)]
        month: Option<u32>,
    },
    /// Toggle a catalog entry (admin only)
    SetActive {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Catalog slug
        id: String,
        /// New active state
        #[arg(long)]
        active: bool,
    },
    /// Progress against every active challenge
    Progress {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Evaluation instant (RFC3339), defaults to now
        #[arg(long)]
        at: Option<String>,
    },
}

fn parse_kind(kind: &str, month: Option<u32>) -> Result<ChallengeKind, Box<dyn std::error::Error>> {
    match kind {
        "total" => Ok(ChallengeKind::Total),
        "daily" => Ok(ChallengeKind::Daily),
        "weekly" => Ok(ChallengeKind::Weekly),
        "monthly" => Ok(ChallengeKind::Monthly),
        "streak" => Ok(ChallengeKind::Streak),
        "recurring-monthly" => {
            let month = month.ok_or("--month is required for recurring-monthly")?;
            if !(1..=12).contains(&month) {
                return Err("--month must be 1-12".into());
            }
            Ok(ChallengeKind::RecurringMonthly { month })
        }
        other => Err(format!("unknown kind: {other}").into()),
    }
}

pub fn run(action: ChallengeAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::open()?;

    match action {
        ChallengeAction::Define {
            user,
            id,
            kind,
            target,
            month,
        } => {
            let def = ChallengeDefinition {
                id,
                kind: parse_kind(&kind, month)?,
                target,
                active: true,
            };
            engine.define_challenge(&caller(&user), def.clone())?;
            println!("{}", serde_json::to_string_pretty(&def)?);
        }
        ChallengeAction::SetActive { user, id, active } => {
            engine.set_challenge_active(&caller(&user), &id, active)?;
            println!("ok");
        }
        ChallengeAction::Progress { user, at } => {
            let progress = engine.challenge_progress(&caller(&user), parse_at(&at)?)?;
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
    }
    Ok(())
}
