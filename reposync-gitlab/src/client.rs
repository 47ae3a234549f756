//! GitLab REST client for project provisioning

use async_trait::async_trait;
use reposync_core::{ProviderConfig, RemoteRepository, RepositoryHost, UserCredential};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

const USER_AGENT: &str = concat!("reposync/", env!("CARGO_PKG_VERSION"));

/// A project as returned by the GitLab API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path: String,
    pub http_url_to_repo: String,
    pub web_url: String,
}

impl From<Project> for RemoteRepository {
    fn from(project: Project) -> Self {
        RemoteRepository {
            id: project.id.to_string(),
            http_url: project.http_url_to_repo,
            web_url: project.web_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateProject<'a> {
    name: &'a str,
    description: &'a str,
    visibility: &'a str,
    initialize_with_readme: bool,
}

/// GitLab API client; tokens are supplied per call
#[derive(Clone)]
pub struct GitLabClient {
    http: Client,
    api_url: String,
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl GitLabClient {
    /// Create a client for the API at `config.api_url`, e.g. `https://gitlab.com/api/v4`
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Url::parse(&config.api_url).map_err(|_| Error::InvalidApiUrl(config.api_url.clone()))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    /// Create a private project initialized with a README
    pub async fn create_project(
        &self,
        token: &str,
        name: &str,
        description: &str,
    ) -> Result<Project> {
        let body = CreateProject {
            name,
            description,
            visibility: "private",
            initialize_with_readme: true,
        };

        debug!(name = %name, "POST /projects");
        let response = self
            .http
            .post(self.endpoint("projects"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let response = check_status(response, Some(name)).await?;
        let project: Project = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("project: {}", e)))?;

        info!(id = project.id, url = %project.web_url, "Created GitLab project");
        Ok(project)
    }

    /// Projects the token's user is a member of whose name matches `search`
    pub async fn search_projects(&self, token: &str, search: &str) -> Result<Vec<Project>> {
        debug!(search = %search, "GET /projects");
        let response = self
            .http
            .get(self.endpoint("projects"))
            .bearer_auth(token)
            .query(&[
                ("search", search),
                ("membership", "true"),
                ("simple", "true"),
            ])
            .send()
            .await?;

        let response = check_status(response, None).await?;
        response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("project list: {}", e)))
    }

    /// The user's project named exactly `name`, if any
    pub async fn find_project(&self, token: &str, name: &str) -> Result<Option<Project>> {
        let projects = self.search_projects(token, name).await?;
        Ok(projects
            .into_iter()
            .find(|p| p.name == name || p.path == name))
    }
}

/// Turn a non-success response into the matching error
async fn check_status(response: Response, creating: Option<&str>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Auth {
            status: status.as_u16(),
            message,
        }),
        StatusCode::CONFLICT | StatusCode::BAD_REQUEST
            if creating.is_some() && message.contains("has already been taken") =>
        {
            Err(Error::NameTaken(creating.unwrap_or_default().to_string()))
        }
        _ => Err(Error::Status {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Flatten GitLab's `message`/`error` body into one line
///
/// `message` may be a string, a list, or a map of field to messages such as
/// `{"name": ["has already been taken"]}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    let field = value
        .get("message")
        .or_else(|| value.get("error"))
        .unwrap_or(&value);

    flatten(field)
}

fn flatten(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{} {}", k, flatten(v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[async_trait]
impl RepositoryHost for GitLabClient {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn create_repository(
        &self,
        credential: &UserCredential,
        name: &str,
        description: &str,
    ) -> reposync_core::Result<RemoteRepository> {
        Ok(self
            .create_project(&credential.bearer_token, name, description)
            .await?
            .into())
    }

    async fn find_repository(
        &self,
        credential: &UserCredential,
        name: &str,
    ) -> reposync_core::Result<Option<RemoteRepository>> {
        Ok(self
            .find_project(&credential.bearer_token, name)
            .await?
            .map(Into::into))
    }
}
