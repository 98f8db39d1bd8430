use clap::Subcommand;
use focuspact_core::{Engine, SessionMode};
use uuid::Uuid;

use super::{caller, parse_at};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Record a completed session
    Record {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Session mode: focus or break
        #[arg(long, default_value = "focus")]
        mode: String,
        /// Duration in seconds
        #[arg(long)]
        duration: u32,
        /// Completion time (RFC3339), defaults to now
        #[arg(long)]
        at: Option<String>,
        /// Optional label
        #[arg(long)]
        tag: Option<String>,
    },
    /// Change the tag of an owned session
    Tag {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
        /// Session id
        id: Uuid,
        /// New label; omit to clear
        #[arg(long)]
        tag: Option<String>,
        /// Hide the tag from other users
        #[arg(long)]
        private: bool,
    },
    /// List the acting user's sessions
    List {
        /// Acting user id (or FOCUSPACT_USER)
        #[arg(long)]
        user: Option<String>,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = Engine::open()?;

    match action {
        SessionAction::Record {
            user,
            mode,
            duration,
            at,
            tag,
        } => {
            let mode = SessionMode::parse(&mode)
                .ok_or_else(|| format!("unknown mode: {mode} (expected focus or break)"))?;
            let completed_at = parse_at(&at)?;
            let id = engine.record_session(&caller(&user), mode, duration, completed_at, tag)?;
            // The CLI is the runtime: run the scheduled follow-up work
            // before exiting.
            engine.drain_tasks(completed_at);
            println!("{id}");
        }
        SessionAction::Tag {
            user,
            id,
            tag,
            private,
        } => {
            engine.update_session_tag(&caller(&user), id, tag, private)?;
            println!("ok");
        }
        SessionAction::List { user } => {
            let sessions = engine.sessions(&caller(&user))?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
