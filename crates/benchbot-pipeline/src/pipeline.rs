//! The sequential benchmark pipeline: parse, resolve, verify, prepare,
//! execute, publish. Failure at any stage is terminal for the job; no stage
//! retries and no git state is rolled back.

use std::path::{Path, PathBuf};

use benchbot_github::RepoCapability;
use benchbot_runner::run_task;
use benchbot_workspace::{prepare_fork_workspace, FORK_REMOTE_NAME};
use tracing::debug;

use crate::error::BenchError;
use crate::registry::{
    command_syntax_is_safe, missing_required_flags, render_bench_command, BenchSubcommand, Pallet,
};

/// One requested benchmark run.
pub struct BenchRunRequest<'a> {
    /// Source branch the benchmark runs against.
    pub branch: &'a str,
    /// Command parameters after the trigger keyword, e.g. "pallet author-mapping".
    pub command_params: &'a str,
    pub source_repo: &'a dyn RepoCapability,
    pub fork_repo: &'a dyn RepoCapability,
    /// Parent directory holding (reused) clones.
    pub git_root: &'a Path,
    /// When set, all mutating git/publish operations are skipped and the raw
    /// artifact contents are returned as the logs.
    pub dry_run: bool,
}

/// Terminal result of a successful pipeline run; never retried.
#[derive(Debug)]
pub struct BenchRunOutcome {
    pub logs: String,
    pub repo_directory: PathBuf,
    /// None in dry-run mode.
    pub pull_number: Option<u64>,
    pub output_file: PathBuf,
    pub fork_branch: String,
    pub bench_command: String,
}

/// Drives one benchmark job through every stage.
///
/// All validation happens before any filesystem or network effect: a request
/// that fails to parse never touches the workspace.
pub async fn run_benchmark(request: BenchRunRequest<'_>) -> Result<BenchRunOutcome, BenchError> {
    // Parse.
    let words: Vec<&str> = request.command_params.split(' ').collect();
    if words.len() < 2 {
        return Err(BenchError::IncompleteCommand);
    }
    let subcommand_word = words[0];
    let remainder = words[1..].join(" ").trim().to_string();

    // Resolve.
    let subcommand = BenchSubcommand::from_keyword(subcommand_word)
        .ok_or_else(|| BenchError::UnknownSubcommand(subcommand_word.to_string()))?;
    if !command_syntax_is_safe(&remainder) {
        return Err(BenchError::DisallowedCharacters);
    }
    let pallet_name = remainder.split(' ').next().unwrap_or_default();
    let pallet =
        Pallet::from_name(pallet_name).ok_or_else(|| BenchError::UnknownPallet(pallet_name.to_string()))?;
    let spec = subcommand.spec();
    let bench_command = render_bench_command(spec, pallet);

    // Verify flags.
    let missing = missing_required_flags(&bench_command, spec.required_flags);
    if !missing.is_empty() {
        return Err(BenchError::MissingFlags(missing));
    }

    // Extract the artifact path; pure string work, kept ahead of any
    // workspace mutation.
    let output_token =
        extract_output_path(&bench_command).ok_or(BenchError::MissingOutputParameter)?;

    debug!(
        "starting {} benchmark \"{}\" (command: {bench_command})",
        subcommand.as_str(),
        spec.title
    );

    // Prepare workspace; this also mints the unique fork branch.
    let workspace = prepare_fork_workspace(
        request.source_repo,
        request.fork_repo,
        request.branch,
        request.git_root,
    )
    .await?;
    let output_file = workspace.directory.join(&output_token);
    debug!("output file: {}", output_file.display());

    // Execute.
    let logs = run_task(
        &bench_command,
        &workspace.directory,
        Some(&format!(
            "Running for branch {}, output: {}",
            request.branch,
            output_file.display()
        )),
    )
    .await?;

    // Verify: diagnostic only, never acted upon.
    let git_status = run_task("git status --short", &workspace.directory, None).await?;
    debug!("git status after execution: {git_status}");

    if request.dry_run {
        let artifact =
            tokio::fs::read_to_string(&output_file)
                .await
                .map_err(|source| BenchError::Artifact {
                    path: output_file.clone(),
                    source,
                })?;
        return Ok(BenchRunOutcome {
            logs: artifact,
            repo_directory: workspace.directory,
            pull_number: None,
            output_file,
            fork_branch: workspace.fork_branch,
            bench_command,
        });
    }

    // Publish: commit the artifact, push the fork branch, open the PR.
    run_task(
        &format!("git add {output_token}"),
        &workspace.directory,
        None,
    )
    .await?;
    run_task(
        &format!("git commit -m {}", shell_words::quote(&bench_command)),
        &workspace.directory,
        None,
    )
    .await?;
    run_task(
        &format!("git push {FORK_REMOTE_NAME} {}", workspace.fork_branch),
        &workspace.directory,
        Some(&format!("Pushing {} to fork", workspace.fork_branch)),
    )
    .await?;

    let head = format!(
        "{}:{}",
        request.fork_repo.repo_ref().owner,
        workspace.fork_branch
    );
    let pull_number = request
        .source_repo
        .create_pull_request(
            &head,
            request.branch,
            "Updated Weights",
            "Weights have been updated",
        )
        .await
        .map_err(BenchError::Integration)?;

    Ok(BenchRunOutcome {
        logs,
        repo_directory: workspace.directory,
        pull_number: Some(pull_number),
        output_file,
        fork_branch: workspace.fork_branch,
        bench_command,
    })
}

/// Pulls the `--output=<path>` (or `--output <path>`) value out of the
/// rendered command. Tokenization goes through shell-words so a quoted path
/// comes back unquoted and whole.
fn extract_output_path(command: &str) -> Option<String> {
    let tokens = shell_words::split(command).ok()?;
    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        if let Some(value) = token.strip_prefix("--output=") {
            return non_empty(value.to_string());
        }
        if token == "--output" {
            return tokens.next().and_then(non_empty);
        }
    }
    None
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
