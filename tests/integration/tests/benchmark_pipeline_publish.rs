//! Execute/publish stage coverage for the benchmark pipeline, driven against
//! local git repositories and a buildable stand-in for the target project.
//!
//! Each test seeds an origin holding a minimal `moonbeam` bin crate whose
//! rendered benchmark command actually runs, so the pipeline's execute,
//! artifact, and publish stages are exercised end to end without network.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use benchbot_github::{RepoCapability, RepoRef};
use benchbot_pipeline::{run_benchmark, BenchError, BenchRunRequest};
use benchbot_runner::run_task;
use tempfile::tempdir;

const WEIGHTS_CONTENT: &str = "pub mod weights {}\n";

const SEED_MANIFEST: &str = r#"[package]
name = "moonbeam"
version = "0.1.0"
edition = "2021"

[features]
runtime-benchmarks = []

[workspace]
"#;

// Writes the file named by --output=<path>, as the real benchmark would.
const WRITING_MAIN: &str = r#"use std::fs;
use std::path::Path;

fn main() {
    for arg in std::env::args() {
        if let Some(path) = arg.strip_prefix("--output=") {
            if let Some(parent) = Path::new(path).parent() {
                fs::create_dir_all(parent).expect("create output directory");
            }
            fs::write(path, "pub mod weights {}\n").expect("write output");
        }
    }
    println!("benchmark finished");
}
"#;

// Runs successfully but never produces the output artifact.
const SILENT_MAIN: &str = r#"fn main() {
    println!("benchmark finished");
}
"#;

async fn seed_benchmark_origin(
    root: &Path,
    owner: &str,
    repo: &str,
    main_source: &str,
) -> PathBuf {
    let origin = root.join(owner).join(repo);
    tokio::fs::create_dir_all(origin.join("src"))
        .await
        .expect("mkdir");
    tokio::fs::write(origin.join("Cargo.toml"), SEED_MANIFEST)
        .await
        .expect("manifest");
    tokio::fs::write(origin.join("src").join("main.rs"), main_source)
        .await
        .expect("main");
    run_task("git init -b master", &origin, None)
        .await
        .expect("git init");
    run_task("git add .", &origin, None).await.expect("git add");
    run_task(
        "git -c user.name=benchbot -c user.email=benchbot@example.com commit -m seed",
        &origin,
        None,
    )
    .await
    .expect("git commit");
    origin
}

async fn seed_bare_fork(root: &Path, owner: &str, repo: &str) -> PathBuf {
    let fork = root.join(owner).join(format!("{repo}.git"));
    tokio::fs::create_dir_all(&fork).await.expect("mkdir");
    run_task("git init --bare", &fork, None)
        .await
        .expect("git init --bare");
    fork
}

// The pipeline commits with the clone's default identity; tests cannot rely
// on one being configured on the host.
fn set_git_identity() {
    for (key, value) in [
        ("GIT_AUTHOR_NAME", "benchbot"),
        ("GIT_AUTHOR_EMAIL", "benchbot@example.com"),
        ("GIT_COMMITTER_NAME", "benchbot"),
        ("GIT_COMMITTER_EMAIL", "benchbot@example.com"),
    ] {
        std::env::set_var(key, value);
    }
}

/// Serves filesystem clone URLs and records pull-request creations.
struct PublishRecordingRepo {
    repo: RepoRef,
    clone_root: String,
    pulls: Mutex<Vec<(String, String)>>,
}

impl PublishRecordingRepo {
    fn new(owner: &str, name: &str, clone_root: &Path) -> Self {
        Self {
            repo: RepoRef::new(owner, name),
            clone_root: clone_root.display().to_string(),
            pulls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RepoCapability for PublishRecordingRepo {
    fn repo_ref(&self) -> &RepoRef {
        &self.repo
    }

    async fn authorized_clone_url(&self) -> Result<String> {
        Ok(self.clone_root.clone())
    }

    async fn pull_request_head_ref(&self, _pull_number: u64) -> Result<String> {
        bail!("not used")
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        _title: &str,
        _body: &str,
    ) -> Result<u64> {
        self.pulls
            .lock()
            .expect("pulls")
            .push((head.to_string(), base.to_string()));
        Ok(7)
    }

    async fn create_issue_comment(&self, _issue_number: u64, _body: &str) -> Result<u64> {
        bail!("not used")
    }

    async fn update_issue_comment(&self, _comment_id: u64, _body: &str) -> Result<()> {
        bail!("not used")
    }
}

#[tokio::test]
async fn functional_dry_run_streams_artifact_contents_without_publishing() {
    let tempdir = tempdir().expect("tempdir");
    seed_benchmark_origin(tempdir.path(), "owner", "repo", WRITING_MAIN).await;
    seed_bare_fork(tempdir.path(), "fork-owner", "repo").await;
    let source = PublishRecordingRepo::new("owner", "repo", tempdir.path());
    let fork = PublishRecordingRepo::new("fork-owner", "repo", tempdir.path());
    let git_root = tempdir.path().join("work");

    let outcome = run_benchmark(BenchRunRequest {
        branch: "master",
        command_params: "pallet author-mapping",
        source_repo: &source,
        fork_repo: &fork,
        git_root: &git_root,
        dry_run: true,
    })
    .await
    .expect("dry run");

    assert_eq!(outcome.logs, WEIGHTS_CONTENT);
    assert_eq!(outcome.pull_number, None);
    assert!(source.pulls.lock().expect("pulls").is_empty());

    // Nothing was committed: the fork branch still points at the seed.
    let subject = run_task("git log -1 --format=%s", &outcome.repo_directory, None)
        .await
        .expect("git log");
    assert_eq!(subject.trim(), "seed");
}

#[tokio::test]
async fn integration_publish_commits_pushes_fork_branch_and_opens_pull_request() {
    set_git_identity();
    let tempdir = tempdir().expect("tempdir");
    seed_benchmark_origin(tempdir.path(), "owner", "repo", WRITING_MAIN).await;
    let bare_fork = seed_bare_fork(tempdir.path(), "fork-owner", "repo").await;
    let source = PublishRecordingRepo::new("owner", "repo", tempdir.path());
    let fork = PublishRecordingRepo::new("fork-owner", "repo", tempdir.path());
    let git_root = tempdir.path().join("work");

    let outcome = run_benchmark(BenchRunRequest {
        branch: "master",
        command_params: "pallet author-mapping",
        source_repo: &source,
        fork_repo: &fork,
        git_root: &git_root,
        dry_run: false,
    })
    .await
    .expect("publish run");

    assert_eq!(outcome.pull_number, Some(7));
    assert!(outcome.logs.contains("benchmark finished"));
    assert!(outcome.output_file.is_file());

    let pulls = source.pulls.lock().expect("pulls").clone();
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].0, format!("fork-owner:{}", outcome.fork_branch));
    assert_eq!(pulls[0].1, "master");

    // The fork received the branch; its tip commit message is the rendered
    // benchmark command.
    let subject = run_task(
        &format!("git log -1 --format=%s {}", outcome.fork_branch),
        &bare_fork,
        None,
    )
    .await
    .expect("fork log");
    assert_eq!(subject.trim(), outcome.bench_command);
}

#[tokio::test]
async fn functional_missing_artifact_is_reported_as_artifact_error() {
    let tempdir = tempdir().expect("tempdir");
    seed_benchmark_origin(tempdir.path(), "owner", "repo", SILENT_MAIN).await;
    let source = PublishRecordingRepo::new("owner", "repo", tempdir.path());
    let fork = PublishRecordingRepo::new("fork-owner", "repo", tempdir.path());
    let git_root = tempdir.path().join("work");

    let error = run_benchmark(BenchRunRequest {
        branch: "master",
        command_params: "pallet author-mapping",
        source_repo: &source,
        fork_repo: &fork,
        git_root: &git_root,
        dry_run: true,
    })
    .await
    .expect_err("artifact missing");
    assert!(matches!(error, BenchError::Artifact { .. }));
}
