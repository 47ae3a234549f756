//! Publish a workspace as a new repository

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use reposync_core::{
    CancellationToken, Config, FileCredentialStore, PushRequest, RemoteRepository, SyncOutcome,
    Synchronizer,
};
use reposync_gitlab::GitLabClient;

/// Push a generated workspace to a newly created repository
#[derive(Args, Debug)]
pub struct PushArgs {
    /// User whose provider token is used
    #[arg(short, long, env = "REPOSYNC_USER")]
    pub user: String,

    /// Workspace directory to publish
    #[arg(short, long)]
    pub workspace: PathBuf,

    /// Name of the repository to create
    #[arg(short, long)]
    pub name: String,

    /// Repository description
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Clone URL of an already provisioned repository to push to instead of creating one
    #[arg(long, requires_all = ["existing_web_url", "existing_id"])]
    pub existing_url: Option<String>,

    /// Web URL of the already provisioned repository
    #[arg(long, requires = "existing_url")]
    pub existing_web_url: Option<String>,

    /// Provider id of the already provisioned repository
    #[arg(long, requires = "existing_url")]
    pub existing_id: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    fn existing(&self) -> Option<RemoteRepository> {
        match (&self.existing_url, &self.existing_web_url, &self.existing_id) {
            (Some(http_url), Some(web_url), Some(id)) => Some(RemoteRepository {
                id: id.clone(),
                http_url: http_url.clone(),
                web_url: web_url.clone(),
            }),
            _ => None,
        }
    }

    /// Run the sync; returns whether it succeeded
    pub async fn execute(&self, config: &Config, cancel: &CancellationToken) -> anyhow::Result<bool> {
        let host = Arc::new(GitLabClient::new(&config.provider)?);
        let store = Arc::new(FileCredentialStore::load()?);
        let synchronizer = Synchronizer::new(config, host, store);

        let request = PushRequest::new(
            self.user.as_str(),
            self.workspace.as_path(),
            self.name.as_str(),
            self.description.as_str(),
        );

        let outcome = synchronizer
            .synchronize_with(&request, self.existing(), cancel)
            .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            print_outcome(&outcome);
        }

        Ok(outcome.success)
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    if outcome.success {
        println!("✓ {}", outcome.message);
        println!("  Repository: {}", outcome.repository_url);
        if let Some(warning) = &outcome.warning {
            println!("  Warning: {}", warning);
        }
        return;
    }

    eprintln!("✗ Sync failed: {}", outcome.message);
    if let Some(kind) = outcome.error_kind {
        eprintln!("  Kind: {:?}", kind);
        if kind.is_retriable() {
            eprintln!("  The provider may be temporarily unavailable; retrying later can succeed.");
        }
    }
    if let Some(repo) = &outcome.repository {
        eprintln!("  Repository already provisioned: {}", repo.web_url);
        eprintln!(
            "  Retry with: --existing-url {} --existing-web-url {} --existing-id {}",
            repo.http_url, repo.web_url, repo.id
        );
    }
}
