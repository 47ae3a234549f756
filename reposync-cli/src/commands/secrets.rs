//! Secrets file management

use clap::{Args, Subcommand};
use reposync_core::{redact_token, Secrets};

/// Manage the provider token file
#[derive(Args, Debug)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Create a template secrets file with 0600 permissions
    Init,

    /// Show whether a token is available for a user
    Check {
        /// User id to check
        #[arg(short, long, env = "REPOSYNC_USER")]
        user: String,
    },
}

impl SecretsArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            SecretsCommand::Init => {
                let path = Secrets::create_template()?;
                println!("Created {}", path.display());
                println!("Add a token under [users.<id>] before pushing.");
            }
            SecretsCommand::Check { user } => {
                let secrets = Secrets::load()?;
                match secrets.token_for(user) {
                    Some(token) => println!("{}: token {}", user, redact_token(&token)),
                    None => println!("{}: no token", user),
                }
            }
        }
        Ok(())
    }
}
