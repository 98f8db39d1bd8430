use clap::Subcommand;
use focuspact_core::Engine;

use super::{caller, parse_at};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Full derived stats: counts, streaks, fitness curve
    Show {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Evaluation instant (RFC3339), defaults to now
        #[arg(long)]
        at: Option<String>,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::open()?;

    match action {
        StatsAction::Show { user, at } => {
            let stats = engine.stats(&caller(&user), parse_at(&at)?)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
