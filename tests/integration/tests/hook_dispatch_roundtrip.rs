//! End-to-end coverage of the hook → dispatcher → benchmark command path,
//! with the GitHub capability replaced by an in-memory recorder.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use benchbot_commander::Commander;
use benchbot_github::{RepoCapability, RepoRef};
use benchbot_http::HookServer;
use benchbot_pipeline::{BenchmarkCommand, BenchmarkCommandConfig};

struct RecordingRepo {
    repo: RepoRef,
    comments: Mutex<Vec<(u64, String)>>,
}

impl RecordingRepo {
    fn new() -> Self {
        Self {
            repo: RepoRef::new("owner", "repo"),
            comments: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RepoCapability for RecordingRepo {
    fn repo_ref(&self) -> &RepoRef {
        &self.repo
    }

    async fn authorized_clone_url(&self) -> Result<String> {
        bail!("integration tests never clone")
    }

    async fn pull_request_head_ref(&self, _pull_number: u64) -> Result<String> {
        Ok("pr-head-branch".to_string())
    }

    async fn create_pull_request(
        &self,
        _head: &str,
        _base: &str,
        _title: &str,
        _body: &str,
    ) -> Result<u64> {
        bail!("integration tests never publish")
    }

    async fn create_issue_comment(&self, issue_number: u64, body: &str) -> Result<u64> {
        let mut comments = self.comments.lock().expect("comments");
        comments.push((issue_number, body.to_string()));
        Ok(comments.len() as u64)
    }

    async fn update_issue_comment(&self, _comment_id: u64, _body: &str) -> Result<()> {
        Ok(())
    }
}

async fn start_stack(repo: Arc<RecordingRepo>) -> (Arc<Commander>, std::net::SocketAddr, tokio::sync::oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
    let benchmark = Arc::new(BenchmarkCommand::new(
        "bench",
        BenchmarkCommandConfig {
            source_repo: Arc::clone(&repo) as Arc<dyn RepoCapability>,
            fork_repo: repo,
            base_branch: "master".to_string(),
            git_root: PathBuf::from("/nonexistent-benchbot-test-root"),
            dry_run: false,
        },
    ));
    let commander = Commander::start(vec![benchmark]).await.expect("start");
    let server = HookServer::bind("127.0.0.1:0", Arc::clone(&commander))
        .await
        .expect("bind");
    let addr = server.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let serve = tokio::spawn(server.serve(async {
        let _ = shutdown_rx.await;
    }));
    (commander, addr, shutdown_tx, serve)
}

#[tokio::test]
async fn integration_unknown_pallet_surfaces_error_in_the_streamed_body() {
    let repo = Arc::new(RecordingRepo::new());
    let (commander, addr, shutdown_tx, serve) = start_stack(Arc::clone(&repo)).await;

    let body = reqwest::get(format!("http://{addr}/bench/pallet/balances?issue_number=12"))
        .await
        .expect("request")
        .text()
        .await
        .expect("body");

    assert!(body.contains("Service bench queued"));
    assert!(body.contains("Running benchmark from master"));
    assert!(body.contains("ERROR: Failed to execute benchmark"));
    assert!(body.contains("pallet argument not recognized: balances"));
    assert!(body.ends_with("Done benchmarking\n"));

    // Progress comment first, then the failure report against the issue.
    let comments = repo.comments.lock().expect("comments").clone();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].0, 12);
    assert!(comments[1].1.contains("pallet argument not recognized"));

    let _ = shutdown_tx.send(());
    serve.await.expect("join").expect("serve");
    commander.shutdown().await;
}

#[tokio::test]
async fn integration_unknown_keyword_gets_a_terminal_notice() {
    let repo = Arc::new(RecordingRepo::new());
    let (commander, addr, shutdown_tx, serve) = start_stack(repo).await;

    let body = reqwest::get(format!("http://{addr}/deploy/pallet/author-mapping"))
        .await
        .expect("request")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "Error: Command not found\n");

    let _ = shutdown_tx.send(());
    serve.await.expect("join").expect("serve");
    commander.shutdown().await;
}

#[tokio::test]
async fn integration_triggers_are_processed_in_submission_order() {
    let repo = Arc::new(RecordingRepo::new());
    let (commander, addr, shutdown_tx, serve) = start_stack(Arc::clone(&repo)).await;

    // Each trigger carries an issue number; comment arrival order mirrors
    // job execution order.
    for issue in [1_u64, 2, 3] {
        let body = reqwest::get(format!(
            "http://{addr}/bench/pallet/balances?issue_number={issue}"
        ))
        .await
        .expect("request")
        .text()
        .await
        .expect("body");
        assert!(body.contains("Done benchmarking"));
    }

    let issues: Vec<u64> = repo
        .comments
        .lock()
        .expect("comments")
        .iter()
        .map(|(issue, _)| *issue)
        .collect();
    assert_eq!(issues, vec![1, 1, 2, 2, 3, 3]);

    let _ = shutdown_tx.send(());
    serve.await.expect("join").expect("serve");
    commander.shutdown().await;
}
