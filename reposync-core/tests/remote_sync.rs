//! Remote configuration, rebase and push against local bare remotes

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::*;
use reposync_core::{CancellationToken, Config, Error, GitRepo, RemoteSyncExecutor, WorkspaceReconciler};
use tempfile::TempDir;

async fn commit_workspace(ws: &Path, config: &Config) {
    WorkspaceReconciler::new(&config.git)
        .prepare(ws, &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_divergent_history_is_rebased_linearly() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;

    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        remote_log(&bare, "main"),
        vec!["Initial commit: generated project", "Initial commit"]
    );
    let files = remote_files(&bare, "main");
    assert!(files.contains(&"README.md".to_string()));
    assert!(files.contains(&"src/main.rs".to_string()));
    // Every commit has at most one parent
    assert!(git(&bare, &["rev-list", "--merges", "main"]).is_empty());
}

#[tokio::test]
async fn test_conflict_aborts_without_pushing() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# provider readme\n");
    let ws = generated_workspace(dir.path());
    std::fs::write(ws.join("README.md"), "# generated readme\n").unwrap();
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;
    let head = git(&ws, &["rev-parse", "HEAD"]);

    let err = RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::IntegrationConflict(_)), "got {:?}", err);
    assert_eq!(remote_log(&bare, "main"), vec!["Initial commit"]);
    assert_eq!(
        std::fs::read_to_string(ws.join("README.md")).unwrap(),
        "# generated readme\n"
    );
    assert_eq!(git(&ws, &["rev-parse", "HEAD"]), head);
    assert!(!GitRepo::open(&ws).unwrap().rebase_in_progress());
}

#[tokio::test]
async fn test_empty_remote_is_pushed_without_integration() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = empty_remote(dir.path());
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;

    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(remote_log(&bare, "main"), vec!["Initial commit: generated project"]);
}

#[tokio::test]
async fn test_existing_remote_is_repointed() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;
    git(&ws, &["remote", "add", "origin", "https://elsewhere.example/old.git"]);

    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(remote_log(&bare, "main").len(), 2);
    let url = GitRepo::open(&ws).unwrap().remote_url("origin").unwrap();
    assert_eq!(url.as_deref(), Some(HTTP_URL));
}

#[tokio::test]
async fn test_branch_is_renamed_to_main() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;
    git(&ws, &["branch", "-M", "trunk"]);

    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();

    let branch = GitRepo::open(&ws).unwrap().current_branch().unwrap();
    assert_eq!(branch.as_deref(), Some("main"));
    assert_eq!(remote_log(&bare, "main").len(), 2);
}

#[tokio::test]
async fn test_credential_is_scrubbed_on_success_and_failure() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();

    // Success
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;
    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!git_config_text(&ws).contains(TOKEN));

    // Failure: the rewritten remote does not exist
    let other = TempDir::new().unwrap();
    let ws = generated_workspace(other.path());
    let config = config_for(&other.path().join("missing.git"));
    commit_workspace(&ws, &config).await;
    let err = RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProviderUnavailable(_)), "got {:?}", err);
    assert!(!git_config_text(&ws).contains(TOKEN));
    let url = GitRepo::open(&ws).unwrap().remote_url("origin").unwrap();
    assert_eq!(url.as_deref(), Some(HTTP_URL));
}

#[tokio::test]
async fn test_cancelled_sync_still_scrubs() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let config = config_for(&bare);
    commit_workspace(&ws, &config).await;

    let executor = RemoteSyncExecutor::new(&config.git);
    let cancel = CancellationToken::new();
    executor
        .configure_remote(&ws, &authenticated_url(), &cancel)
        .await
        .unwrap();
    assert!(git_config_text(&ws).contains(TOKEN));

    cancel.cancel();
    let result = executor
        .integrate_upstream(&ws, &cancel)
        .await
        .map(|_| ());
    let err = executor.finish(&ws, result).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(!git_config_text(&ws).contains(TOKEN));
    assert_eq!(remote_log(&bare, "main"), vec!["Initial commit"]);
}

/// Wrap git so that each of the first `limit` pushes is preceded by another
/// client pushing an empty "concurrent" commit to `bare`; returns the wrapper
/// and the file counting push attempts
#[cfg(unix)]
fn racing_remote(root: &Path, bare: &Path, limit: usize) -> (PathBuf, PathBuf) {
    let other = root.join("other-client");
    git(
        root,
        &["clone", "--quiet", "-b", "main", bare.to_str().unwrap(), other.to_str().unwrap()],
    );
    let attempts = root.join("push-attempts");
    let body = format!(
        r#"for arg in "$@"; do
  if [ "$arg" = push ]; then
    echo push >> '{attempts}'
    if [ "$(wc -l < '{attempts}')" -le {limit} ]; then
      git -C '{other}' -c user.name=other -c user.email=other@localhost -c commit.gpgsign=false commit --quiet --allow-empty -m concurrent || exit 1
      git -C '{other}' push --quiet origin HEAD:main || exit 1
    fi
  fi
done
exec git "$@""#,
        attempts = attempts.display(),
        other = other.display(),
        limit = limit,
    );
    (git_wrapper(root, &body), attempts)
}

#[cfg(unix)]
fn push_attempts(file: &Path) -> usize {
    std::fs::read_to_string(file).unwrap().lines().count()
}

#[cfg(unix)]
#[tokio::test]
async fn test_rejected_push_is_integrated_and_retried_once() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let mut config = config_for(&bare);
    commit_workspace(&ws, &config).await;

    let (wrapper, attempts) = racing_remote(dir.path(), &bare, 1);
    config.git.program = wrapper.to_string_lossy().to_string();

    RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(push_attempts(&attempts), 2);
    assert_eq!(
        remote_log(&bare, "main"),
        vec!["Initial commit: generated project", "concurrent", "Initial commit"]
    );
    assert!(git(&bare, &["rev-list", "--merges", "main"]).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_second_rejection_fails_without_third_push() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# demo\n");
    let ws = generated_workspace(dir.path());
    let mut config = config_for(&bare);
    commit_workspace(&ws, &config).await;

    let (wrapper, attempts) = racing_remote(dir.path(), &bare, 1000);
    config.git.program = wrapper.to_string_lossy().to_string();

    let err = RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::PushRejected(_)), "got {:?}", err);
    assert_eq!(push_attempts(&attempts), 2);
    assert_eq!(
        remote_log(&bare, "main"),
        vec!["concurrent", "concurrent", "Initial commit"]
    );
    assert!(!git_config_text(&ws).contains(TOKEN));
    assert!(ws.join("src/main.rs").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_rebase_killed_by_timeout_is_aborted() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let bare = seeded_remote(dir.path(), "# provider readme\n");
    let ws = generated_workspace(dir.path());
    std::fs::write(ws.join("README.md"), "# generated readme\n").unwrap();
    let mut config = config_for(&bare);
    commit_workspace(&ws, &config).await;
    let head = git(&ws, &["rev-parse", "HEAD"]);

    // The rebase stops on its conflict, then the process hangs until killed
    let wrapper = git_wrapper(
        dir.path(),
        r#"git "$@"
status=$?
case " $* " in
  *" --abort "*) ;;
  *" rebase "*) exec sleep 30 ;;
esac
exit $status"#,
    );
    config.git.program = wrapper.to_string_lossy().to_string();
    config.git.timeout = Duration::from_secs(3);

    let err = RemoteSyncExecutor::new(&config.git)
        .sync(&ws, &authenticated_url(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::SyncTool(ref m) if m.contains("timed out")), "got {:?}", err);
    assert!(!GitRepo::open(&ws).unwrap().rebase_in_progress());
    assert_eq!(git(&ws, &["rev-parse", "HEAD"]), head);
    assert_eq!(git(&ws, &["symbolic-ref", "--short", "HEAD"]), "main");
    assert_eq!(
        std::fs::read_to_string(ws.join("README.md")).unwrap(),
        "# generated readme\n"
    );
    assert_eq!(remote_log(&bare, "main"), vec!["Initial commit"]);
    assert!(!git_config_text(&ws).contains(TOKEN));
}
