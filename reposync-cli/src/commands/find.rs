//! Look up an existing repository

use clap::Args;
use reposync_core::{Config, CredentialStore, FileCredentialStore, RepositoryHost};
use reposync_gitlab::GitLabClient;

/// Find one of the user's repositories by exact name
#[derive(Args, Debug)]
pub struct FindArgs {
    /// User whose provider token is used
    #[arg(short, long, env = "REPOSYNC_USER")]
    pub user: String,

    /// Repository name to look up
    #[arg(short, long)]
    pub name: String,

    /// Print the repository as JSON
    #[arg(long)]
    pub json: bool,
}

impl FindArgs {
    /// Returns whether the repository exists
    pub async fn execute(&self, config: &Config) -> anyhow::Result<bool> {
        let store = FileCredentialStore::load()?;
        let credential = store
            .get_credential(&self.user)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No token stored for user '{}'", self.user))?;

        let client = GitLabClient::new(&config.provider)?;
        let found = client.find_repository(&credential, &self.name).await?;

        match (&found, self.json) {
            (_, true) => println!("{}", serde_json::to_string_pretty(&found)?),
            (Some(repo), false) => {
                println!("{}", self.name);
                println!("  id:       {}", repo.id);
                println!("  clone:    {}", repo.http_url);
                println!("  web:      {}", repo.web_url);
            }
            (None, false) => println!("No repository named '{}' found", self.name),
        }

        Ok(found.is_some())
    }
}
