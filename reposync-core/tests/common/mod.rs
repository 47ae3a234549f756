//! Fixtures shared by the integration tests
//!
//! Remotes are local bare repositories. The authenticated https URL a sync
//! would push to is rewritten to the bare path with `url.<base>.insteadOf`,
//! so the full credential path runs without any network.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reposync_core::{
    CancellationToken, Config, CredentialStore, RemoteRepository, RepositoryHost, Result,
    UserCredential,
};

pub const TOKEN: &str = "glpat-test-token";
pub const HTTP_URL: &str = "https://host/user/demo-1.git";
pub const WEB_URL: &str = "https://host/user/demo-1";

/// The push URL a sync builds from [`HTTP_URL`] and [`TOKEN`]
pub fn authenticated_url() -> String {
    authenticated_url_for("demo-1")
}

/// The push URL a sync builds for the project `name`
pub fn authenticated_url_for(name: &str) -> String {
    format!("https://oauth2:{}@host/user/{}.git", TOKEN, name)
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=fixture",
            "-c",
            "user.email=fixture@localhost",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("LC_ALL", "C")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Lines of `git log --format=%s <branch>` in a bare repository
pub fn remote_log(bare: &Path, branch: &str) -> Vec<String> {
    git(bare, &["log", "--format=%s", branch])
        .lines()
        .map(str::to_string)
        .collect()
}

/// Files tracked on `branch` of a bare repository
pub fn remote_files(bare: &Path, branch: &str) -> Vec<String> {
    git(bare, &["ls-tree", "-r", "--name-only", branch])
        .lines()
        .map(str::to_string)
        .collect()
}

/// A bare repository whose `main` holds one "Initial commit" with a README,
/// the way a provider initializes a new project
pub fn seeded_remote(root: &Path, readme: &str) -> PathBuf {
    seeded_remote_named(root, "remote", readme)
}

/// Like [`seeded_remote`], at `root/<name>.git`
pub fn seeded_remote_named(root: &Path, name: &str, readme: &str) -> PathBuf {
    let bare = root.join(format!("{}.git", name));
    std::fs::create_dir_all(&bare).unwrap();
    git(&bare, &["init", "--bare", "--quiet"]);

    let seed = root.join(format!("{}-seed", name));
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init", "--quiet"]);
    std::fs::write(seed.join("README.md"), readme).unwrap();
    git(&seed, &["add", "README.md"]);
    git(&seed, &["commit", "--quiet", "-m", "Initial commit"]);
    git(
        &seed,
        &["push", "--quiet", bare.to_str().unwrap(), "HEAD:refs/heads/main"],
    );

    bare
}

/// A bare repository with no branches at all
pub fn empty_remote(root: &Path) -> PathBuf {
    let bare = root.join("empty.git");
    std::fs::create_dir_all(&bare).unwrap();
    git(&bare, &["init", "--bare", "--quiet"]);
    bare
}

/// Config whose git rewrites the authenticated URL to `remote`
pub fn config_for(remote: &Path) -> Config {
    let mut config = Config::default();
    route(&mut config, "demo-1", remote);
    config.git.timeout = Duration::from_secs(60);
    config.provider.retry_backoff = Duration::from_millis(1);
    config
}

/// Also send pushes for project `name` to `remote`
pub fn route(config: &mut Config, name: &str, remote: &Path) {
    config.git.extra_config.push(format!(
        "url.file://{}.insteadOf={}",
        remote.display(),
        authenticated_url_for(name)
    ));
}

/// Write an executable shell script to use as `git.program`
#[cfg(unix)]
pub fn git_wrapper(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("git-wrapper.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A workspace with a couple of generated files
pub fn generated_workspace(root: &Path) -> PathBuf {
    let ws = root.join("ws");
    std::fs::create_dir_all(ws.join("src")).unwrap();
    std::fs::write(ws.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    std::fs::write(ws.join("src/main.rs"), "fn main() {}\n").unwrap();
    ws
}

/// Sorted names of the entries directly under `dir`
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

pub fn git_config_text(ws: &Path) -> String {
    std::fs::read_to_string(ws.join(".git/config")).unwrap()
}

pub fn demo_repository() -> RemoteRepository {
    repository_named("demo-1")
}

/// What [`FakeHost`] returns for a project called `name`
pub fn repository_named(name: &str) -> RemoteRepository {
    RemoteRepository {
        id: name.to_string(),
        http_url: format!("https://host/user/{}.git", name),
        web_url: format!("https://host/user/{}", name),
    }
}

/// Provider that hands out [`repository_named`] and counts creates
#[derive(Debug, Default)]
pub struct FakeHost {
    creates: AtomicUsize,
    cancel_on_create: Option<CancellationToken>,
}

impl FakeHost {
    /// A host that cancels `token` while creating, like a client disconnecting
    /// during the provider call
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            creates: AtomicUsize::new(0),
            cancel_on_create: Some(token),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_repository(
        &self,
        _credential: &UserCredential,
        name: &str,
        _description: &str,
    ) -> Result<RemoteRepository> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_create {
            token.cancel();
        }
        Ok(repository_named(name))
    }

    async fn find_repository(
        &self,
        _credential: &UserCredential,
        _name: &str,
    ) -> Result<Option<RemoteRepository>> {
        Ok(None)
    }
}

/// Store holding a single user's token
#[derive(Debug)]
pub struct OneUser(pub &'static str);

#[async_trait]
impl CredentialStore for OneUser {
    async fn get_credential(&self, user_id: &str) -> Result<Option<UserCredential>> {
        Ok((user_id == self.0).then(|| UserCredential::new(user_id, TOKEN)))
    }
}
