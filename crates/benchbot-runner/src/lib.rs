//! Shell executor: runs one external command to completion and captures its
//! standard output.
//!
//! Every failure propagates to the caller unchanged; there is no retry at
//! this layer. Callers serialize their own invocations, so no two tasks from
//! the same pipeline run concurrently.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
/// Enumerates supported `RunTaskError` values.
pub enum RunTaskError {
    #[error("command line is empty")]
    EmptyCommand,
    #[error("failed to tokenize command line: {0}")]
    InvalidCommand(#[from] shell_words::ParseError),
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command exited with status {}: {stderr}", .exit_code.map(|code| code.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit {
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Runs `command` in `cwd` and returns its captured stdout.
///
/// The command line is tokenized with shell-words semantics, so quoted
/// arguments survive intact but no shell interpolation ever happens.
pub async fn run_task(
    command: &str,
    cwd: &Path,
    label: Option<&str>,
) -> Result<String, RunTaskError> {
    if let Some(label) = label {
        debug!("{label}");
    }
    debug!("running task in {}: {command}", cwd.display());

    let tokens = shell_words::split(command)?;
    let (program, args) = tokens.split_first().ok_or(RunTaskError::EmptyCommand)?;

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| RunTaskError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(RunTaskError::NonZeroExit {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
