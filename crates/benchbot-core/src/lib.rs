//! Foundational helpers shared across benchbot crates.
//!
//! Provides time utilities and the fork-branch-name minting used by the
//! workspace layer to keep every benchmark job on its own branch.

pub mod branch_name;
pub mod time_utils;

pub use branch_name::mint_fork_branch_name;
pub use time_utils::current_unix_timestamp_ms;
