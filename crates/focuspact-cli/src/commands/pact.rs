use clap::Subcommand;
use focuspact_core::Engine;
use uuid::Uuid;

use super::{caller, parse_at, parse_date};

#[derive(Subcommand)]
pub enum PactAction {
    /// Create a pact; prints the join code
    Create {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// First quota day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last quota day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Focus sessions each participant must complete per day
        #[arg(long)]
        quota: u32,
    },
    /// Join a pact by invite code
    Join {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Six-character invite code
        code: String,
    },
    /// Leave a pending pact (the creator leaving dissolves it)
    Leave {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Pact id
        id: Uuid,
    },
    /// Rewrite a pending pact's terms (creator only, pre-start)
    Update {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Pact id
        id: Uuid,
        /// First quota day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last quota day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Focus sessions each participant must complete per day
        #[arg(long)]
        quota: u32,
    },
    /// Participant view of one pact
    Show {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Pact id
        id: Uuid,
    },
    /// All pacts the acting user belongs to
    List {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
    },
    /// Reconciliation sweep over every non-terminal pact
    Sweep {
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,
    },
}

pub fn run(action: PactAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::open()?;

    match action {
        PactAction::Create {
            user,
            start,
            end,
            quota,
        } => {
            let pact = engine.create_pact(
                &caller(&user),
                parse_date(&Some(start))?,
                parse_date(&Some(end))?,
                quota,
                parse_at(&None)?,
            )?;
            println!("{}", serde_json::to_string_pretty(&pact)?);
        }
        PactAction::Join { user, code } => {
            let pact = engine.join_pact(&caller(&user), &code, parse_at(&None)?)?;
            println!("{}", serde_json::to_string_pretty(&pact)?);
        }
        PactAction::Leave { user, id } => {
            engine.leave_pact(&caller(&user), id)?;
            println!("ok");
        }
        PactAction::Update {
            user,
            id,
            start,
            end,
            quota,
        } => {
            let pact = engine.update_pact(
                &caller(&user),
                id,
                parse_date(&Some(start))?,
                parse_date(&Some(end))?,
                quota,
                parse_at(&None)?,
            )?;
            println!("{}", serde_json::to_string_pretty(&pact)?);
        }
        PactAction::Show { user, id } => match engine.pact_overview(&caller(&user), id)? {
            Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
            None => {
                eprintln!("no such pact (or not a participant): {id}");
                std::process::exit(1);
            }
        },
        PactAction::List { user } => {
            let pacts = engine.my_pacts(&caller(&user))?;
            println!("{}", serde_json::to_string_pretty(&pacts)?);
        }
        PactAction::Sweep { today } => {
            let summary = engine.sweep(parse_date(&today)?)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
