use std::path::PathBuf;

use benchbot_runner::RunTaskError;
use benchbot_workspace::WorkspaceError;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates supported `BenchError` values.
///
/// Validation variants are detected before any workspace mutation and are
/// always fatal to the job; nothing at this layer retries.
pub enum BenchError {
    #[error("incomplete command")]
    IncompleteCommand,
    #[error("special characters not allowed")]
    DisallowedCharacters,
    #[error("unknown benchmark subcommand: {0}")]
    UnknownSubcommand(String),
    #[error("pallet argument not recognized: {0}")]
    UnknownPallet(String),
    #[error("missing required flags: {}", .0.join(", "))]
    MissingFlags(Vec<&'static str>),
    #[error("missing output file parameter")]
    MissingOutputParameter,
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Execution(#[from] RunTaskError),
    #[error("failed to read benchmark artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("github integration failed: {0}")]
    Integration(anyhow::Error),
}
