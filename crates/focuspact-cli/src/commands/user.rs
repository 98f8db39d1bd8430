use clap::Subcommand;
use focuspact_core::{Engine, User};

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user (or refresh an existing record)
    Register {
        /// User id
        id: String,
        /// Identity reference (e.g. an email)
        #[arg(long)]
        identity: String,
        /// Display name
        #[arg(long)]
        name: String,
    },
    /// Show a user record
    Show {
        /// User id
        id: String,
    },
}

pub fn run(action: UserAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::open()?;

    match action {
        UserAction::Register { id, identity, name } => {
            let user = User::new(id, identity, name);
            engine.register_user(&user)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserAction::Show { id } => match engine.db().get_user(&id)? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => {
                eprintln!("unknown user: {id}");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
