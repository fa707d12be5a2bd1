//! Workspace orchestrator: sequences the git operations that turn a bare
//! directory into a ready-to-build clone with both remotes registered, the
//! requested source branch checked out, and a fresh fork branch created.
//!
//! Clone directories are reused across jobs on purpose: every acquisition
//! force-resets to a detached HEAD, so a reused clone is equivalent to a
//! fresh one, and the serialized dispatcher guarantees exclusive access.

use std::path::{Path, PathBuf};

use benchbot_core::mint_fork_branch_name;
use benchbot_github::RepoCapability;
use benchbot_runner::{run_task, RunTaskError};
use thiserror::Error;
use tracing::debug;

pub const ORIGINAL_REMOTE_NAME: &str = "original";
pub const FORK_REMOTE_NAME: &str = "fork";

#[derive(Debug, Error)]
/// Enumerates supported `WorkspaceError` values.
pub enum WorkspaceError {
    #[error("failed to prepare workspace directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Git(#[from] RunTaskError),
    #[error("failed to obtain authorized clone url: {0}")]
    Capability(anyhow::Error),
}

/// On-disk clone plus the branch names one job operates on.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub directory: PathBuf,
    pub source_branch: String,
    pub fork_branch: String,
}

/// Clones `{authorized_url}/{owner}/{repo}` under `parent_dir`, or reuses an
/// existing clone at that destination, and leaves it reset on a detached HEAD
/// so any named branch can later be deleted safely.
pub async fn acquire_repository(
    authorized_url: &str,
    owner: &str,
    repo: &str,
    parent_dir: &Path,
) -> Result<PathBuf, WorkspaceError> {
    tokio::fs::create_dir_all(parent_dir)
        .await
        .map_err(|source| WorkspaceError::Io {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    let repo_directory = parent_dir.join(repo);
    debug!("acquiring {owner}/{repo} at {}", repo_directory.display());

    let clone = run_task(
        &format!(
            "git clone {authorized_url}/{owner}/{repo} {}",
            repo_directory.display()
        ),
        parent_dir,
        None,
    )
    .await;
    if let Err(error) = clone {
        // A failed clone over an existing clone is reuse, not an error; the
        // reset below brings the directory back to a known state. Anything
        // else is fatal.
        if !is_git_repository(&repo_directory).await {
            return Err(error.into());
        }
        debug!("reusing existing clone at {}", repo_directory.display());
    }

    run_task("git submodule update --init", &repo_directory, None).await?;
    run_task("git add .", &repo_directory, None).await?;
    run_task("git reset --hard HEAD", &repo_directory, None).await?;
    let head = run_task("git rev-parse HEAD", &repo_directory, None)
        .await?
        .trim()
        .to_string();
    run_task(&format!("git checkout {head}"), &repo_directory, None).await?;
    Ok(repo_directory)
}

/// Points remote `name` at `{authorized_url}/{owner}/{repo}.git`, replacing
/// any remote previously registered under that name.
pub async fn add_remote(
    repo_directory: &Path,
    name: &str,
    authorized_url: &str,
    owner: &str,
    repo: &str,
) -> Result<(), WorkspaceError> {
    debug!("add remote {name} -> {owner}/{repo}");
    if let Err(error) = run_task(&format!("git remote remove {name}"), repo_directory, None).await {
        debug!("remote {name} not previously registered: {error}");
    }
    run_task(
        &format!("git remote add {name} {authorized_url}/{owner}/{repo}.git"),
        repo_directory,
        None,
    )
    .await?;
    Ok(())
}

/// Fetches `branch` from `remote` and checks it out with tracking, recreating
/// the local branch from scratch when possible.
pub async fn setup_tracking_branch(
    repo_directory: &Path,
    remote: &str,
    branch: &str,
) -> Result<(), WorkspaceError> {
    if let Err(error) = run_task(&format!("git branch -D {branch}"), repo_directory, None).await {
        debug!("no local branch {branch} to delete: {error}");
    }
    run_task(
        &format!("git fetch {remote} {branch}"),
        repo_directory,
        Some(&format!("Fetching {branch} from {remote}")),
    )
    .await?;
    match run_task(
        &format!("git checkout --track {remote}/{branch}"),
        repo_directory,
        None,
    )
    .await
    {
        Ok(_) => Ok(()),
        Err(track_error) => {
            // The branch can survive the delete above (e.g. it was checked
            // out); switching to it is an acceptable fallback.
            match run_task(&format!("git checkout {branch}"), repo_directory, None).await {
                Ok(_) => Ok(()),
                Err(_) => Err(track_error.into()),
            }
        }
    }
}

/// Creates and checks out a new local branch. Fails if the name exists; the
/// minted fork branch names make that unreachable in practice.
pub async fn create_branch(repo_directory: &Path, branch: &str) -> Result<(), WorkspaceError> {
    run_task(
        &format!("git checkout -b {branch}"),
        repo_directory,
        Some(&format!("Creating branch {branch}")),
    )
    .await?;
    Ok(())
}

/// Composite preparation for one benchmark job: clone-or-reuse the source
/// repository, register both remotes, check out the requested source branch,
/// and create the freshly named fork branch to receive results.
pub async fn prepare_fork_workspace(
    source_repo: &dyn RepoCapability,
    fork_repo: &dyn RepoCapability,
    branch: &str,
    git_root: &Path,
) -> Result<Workspace, WorkspaceError> {
    let source_url = source_repo
        .authorized_clone_url()
        .await
        .map_err(WorkspaceError::Capability)?;
    let fork_url = fork_repo
        .authorized_clone_url()
        .await
        .map_err(WorkspaceError::Capability)?;
    let source = source_repo.repo_ref();
    let fork = fork_repo.repo_ref();
    let fork_branch = mint_fork_branch_name(branch);

    let directory = acquire_repository(&source_url, &source.owner, &source.name, git_root).await?;
    add_remote(
        &directory,
        ORIGINAL_REMOTE_NAME,
        &source_url,
        &source.owner,
        &source.name,
    )
    .await?;
    add_remote(
        &directory,
        FORK_REMOTE_NAME,
        &fork_url,
        &fork.owner,
        &fork.name,
    )
    .await?;
    setup_tracking_branch(&directory, ORIGINAL_REMOTE_NAME, branch).await?;
    create_branch(&directory, &fork_branch).await?;

    Ok(Workspace {
        directory,
        source_branch: branch.to_string(),
        fork_branch,
    })
}

async fn is_git_repository(directory: &Path) -> bool {
    match tokio::fs::metadata(directory.join(".git")).await {
        Ok(metadata) => metadata.is_dir(),
        Err(_) => false,
    }
}
