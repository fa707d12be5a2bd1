//! The `bench` command handler: binds the pipeline to the dispatcher and to
//! the GitHub comment surface.
//!
//! This layer is the only place pipeline failures are caught; they are
//! converted into a user-visible comment and a closed log stream. The logger
//! is closed on every path.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use benchbot_commander::{Command, CommandLogger};
use benchbot_github::{render_benchmark_comment, RepoCapability};
use benchbot_runner::run_task;
use tracing::{debug, error};

use crate::pipeline::{run_benchmark, BenchRunRequest};

/// Everything the handler needs beyond the invocation itself.
pub struct BenchmarkCommandConfig {
    pub source_repo: Arc<dyn RepoCapability>,
    pub fork_repo: Arc<dyn RepoCapability>,
    /// Branch benchmarked when the trigger carries no pull number.
    pub base_branch: String,
    /// Parent directory for (reused) clones.
    pub git_root: PathBuf,
    /// Dry-run: skip publication, stream raw artifact output instead.
    pub dry_run: bool,
}

pub struct BenchmarkCommand {
    keyword: String,
    config: BenchmarkCommandConfig,
}

impl BenchmarkCommand {
    pub fn new(keyword: impl Into<String>, config: BenchmarkCommandConfig) -> Self {
        Self {
            keyword: keyword.into(),
            config,
        }
    }

    async fn run(
        &self,
        command_params: &str,
        pull_number: Option<u64>,
        issue_number: Option<u64>,
        logger: &Arc<dyn CommandLogger>,
    ) -> Result<()> {
        let branch = match pull_number {
            Some(pull_number) => self
                .config
                .source_repo
                .pull_request_head_ref(pull_number)
                .await
                .context("failed to resolve pull request head branch")?,
            None => self.config.base_branch.clone(),
        };
        debug!("running benchmark from {branch}");
        logger.write(&format!("Running benchmark from {branch}\n"));

        let comment_id = match issue_number {
            Some(issue_number) => {
                let initial = format!(
                    "Starting benchmark for branch: {branch}\nComment will be updated.\n"
                );
                logger.write(&initial);
                Some(
                    self.config
                        .source_repo
                        .create_issue_comment(issue_number, &initial)
                        .await
                        .context("failed to create progress comment")?,
                )
            }
            None => None,
        };

        let outcome = run_benchmark(BenchRunRequest {
            branch: &branch,
            command_params,
            source_repo: self.config.source_repo.as_ref(),
            fork_repo: self.config.fork_repo.as_ref(),
            git_root: &self.config.git_root,
            dry_run: self.config.dry_run,
        })
        .await?;

        if self.config.dry_run {
            logger.write(&outcome.logs);
            return Ok(());
        }

        let toolchain = run_task(
            "rustup show active-toolchain --verbose",
            &outcome.repo_directory,
            None,
        )
        .await
        .context("failed to read active toolchain")?;

        let body = render_benchmark_comment(
            &branch,
            &outcome.bench_command,
            toolchain.trim(),
            &outcome.logs,
        );
        if let Some(comment_id) = comment_id {
            self.config
                .source_repo
                .update_issue_comment(comment_id, &body)
                .await
                .context("failed to publish result comment")?;
        }
        if let Some(pull_number) = outcome.pull_number {
            logger.write(&format!("Created pull request #{pull_number}\n"));
        }
        logger.write("Success !!\n");
        Ok(())
    }
}

#[async_trait]
impl Command for BenchmarkCommand {
    fn keyword(&self) -> &str {
        &self.keyword
    }

    async fn execute(&self, parameters: &BTreeMap<String, String>, logger: Arc<dyn CommandLogger>) {
        let Some(cmd_line) = parameters.get("cmd_line") else {
            logger.write("Error: Missing parameter cmd_line\n");
            logger.close();
            return;
        };
        debug!("executing: {cmd_line}");
        let pull_number = parameters
            .get("pull_number")
            .and_then(|value| value.parse::<u64>().ok());
        let issue_number = parameters
            .get("issue_number")
            .and_then(|value| value.parse::<u64>().ok());

        // Tokens after the trigger keyword are the pipeline's parameters.
        let command_params = cmd_line
            .split(' ')
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ");

        if let Err(run_error) = self
            .run(&command_params, pull_number, issue_number, &logger)
            .await
        {
            let message = format!("ERROR: Failed to execute benchmark: {run_error}\n");
            error!("benchmark run failed: {run_error:#}");
            logger.write(&message);
            if let Some(issue_number) = issue_number {
                if let Err(comment_error) = self
                    .config
                    .source_repo
                    .create_issue_comment(issue_number, &message)
                    .await
                {
                    error!("failed to post error comment: {comment_error:#}");
                }
            }
        }
        logger.write("Done benchmarking\n");
        logger.close();
    }
}
