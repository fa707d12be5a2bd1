use std::sync::atomic::{AtomicU64, Ordering};

use crate::time_utils::current_unix_timestamp_ms;

const FORK_BRANCH_MARKER: &str = "benchbot-job";

static FORK_BRANCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Mints a fork branch name that is unique within this process.
///
/// The millisecond timestamp keeps names readable and roughly sortable; the
/// monotonic sequence makes two mints within the same millisecond distinct.
pub fn mint_fork_branch_name(source_branch: &str) -> String {
    let sequence = FORK_BRANCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{source_branch}-{FORK_BRANCH_MARKER}-{}-{sequence}",
        current_unix_timestamp_ms()
    )
}
