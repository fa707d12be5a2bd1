//! GitHub capability object used by the benchmark pipeline.
//!
//! The rest of the system depends only on the [`RepoCapability`] trait:
//! authorized clone URLs, pull-request creation, and issue comments. The
//! concrete [`GithubRepoClient`] speaks the GitHub REST API.

pub mod comment;
pub mod repo_client;

pub use comment::{render_benchmark_comment, COMMENT_MAX_LENGTH, COMMENT_TRUNCATED_POSTFIX};
pub use repo_client::{GithubRepoClient, RepoCapability, RepoRef};
