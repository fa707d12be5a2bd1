//! benchbot binary: configuration, wiring, and signal-driven shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use benchbot_commander::Commander;
use benchbot_github::{GithubRepoClient, RepoCapability, RepoRef};
use benchbot_http::HookServer;
use benchbot_pipeline::{BenchmarkCommand, BenchmarkCommandConfig};
use clap::Parser;

mod bootstrap_helpers;

#[derive(Debug, Parser)]
#[command(
    name = "benchbot",
    about = "Benchmark automation bot triggered by pull-request commands",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "BENCHBOT_BIND",
        default_value = "0.0.0.0:8080",
        help = "Socket address the HTTP hook listens on."
    )]
    bind: String,

    #[arg(
        long,
        env = "BENCHBOT_BASE_BRANCH",
        default_value = "master",
        help = "Branch benchmarked when a trigger carries no pull number."
    )]
    base_branch: String,

    #[arg(long, env = "BENCHBOT_REPO_OWNER", help = "Source repository owner.")]
    repo_owner: String,

    #[arg(long, env = "BENCHBOT_REPO_NAME", help = "Source repository name.")]
    repo_name: String,

    #[arg(
        long,
        env = "BENCHBOT_REPO_TOKEN",
        hide_env_values = true,
        help = "Token authorized for the source repository (clone, PRs, comments)."
    )]
    repo_token: String,

    #[arg(long, env = "BENCHBOT_FORK_OWNER", help = "Results fork owner.")]
    fork_owner: String,

    #[arg(long, env = "BENCHBOT_FORK_NAME", help = "Results fork name.")]
    fork_name: String,

    #[arg(
        long,
        env = "BENCHBOT_FORK_TOKEN",
        hide_env_values = true,
        help = "Token authorized for the results fork (push)."
    )]
    fork_token: String,

    #[arg(
        long,
        env = "BENCHBOT_GIT_ROOT",
        default_value = "git",
        help = "Parent directory holding (reused) repository clones."
    )]
    git_root: PathBuf,

    #[arg(
        long,
        env = "BENCHBOT_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub API base URL."
    )]
    api_base: String,

    #[arg(
        long,
        env = "BENCHBOT_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        help = "Per-request timeout for GitHub API calls."
    )]
    request_timeout_ms: u64,

    #[arg(
        long,
        env = "BENCHBOT_DRY_RUN",
        help = "Disable all mutating git/publish operations and surface raw artifact output."
    )]
    dry_run: bool,
}

/// Everything the shutdown path needs, constructed once at startup and
/// threaded through explicitly instead of living in process globals.
struct AppContext {
    commander: Arc<Commander>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    bootstrap_helpers::init_tracing();

    let source_repo: Arc<dyn RepoCapability> = Arc::new(GithubRepoClient::new(
        cli.api_base.clone(),
        cli.repo_token.clone(),
        RepoRef::new(cli.repo_owner.clone(), cli.repo_name.clone()),
        cli.request_timeout_ms,
    )?);
    let fork_repo: Arc<dyn RepoCapability> = Arc::new(GithubRepoClient::new(
        cli.api_base.clone(),
        cli.fork_token.clone(),
        RepoRef::new(cli.fork_owner.clone(), cli.fork_name.clone()),
        cli.request_timeout_ms,
    )?);

    let benchmark = Arc::new(BenchmarkCommand::new(
        "bench",
        BenchmarkCommandConfig {
            source_repo,
            fork_repo,
            base_branch: cli.base_branch.clone(),
            git_root: cli.git_root.clone(),
            dry_run: cli.dry_run,
        },
    ));

    let commander = Commander::start(vec![benchmark]).await?;
    let context = AppContext {
        commander: Arc::clone(&commander),
    };

    let server = HookServer::bind(&cli.bind, commander).await?;
    println!(
        "benchbot hook listening: addr={} repo={}/{} base_branch={} dry_run={}",
        server.local_addr()?,
        cli.repo_owner,
        cli.repo_name,
        cli.base_branch,
        cli.dry_run
    );

    server.serve(bootstrap_helpers::shutdown_signal()).await?;

    context.commander.shutdown().await;
    Ok(())
}
