//! Benchmark result comment rendering and the published-size contract.

/// Hard cap GitHub enforces on comment bodies.
pub const COMMENT_MAX_LENGTH: usize = 65_536;

/// Literal marker appended where the captured log was cut.
pub const COMMENT_TRUNCATED_POSTFIX: &str = "<truncated>...";

// Slack for the two newlines joining the segments plus formatting drift.
const COMMENT_FORMATTING_PADDING: usize = 16;

const BODY_SUFFIX: &str = "```\n\n</details>";

fn body_prefix(branch: &str, bench_command: &str, toolchain: &str) -> String {
    format!(
        "Benchmark for branch \"{branch}\" with command {bench_command}\n\n\
         Toolchain: {toolchain}\n\n\
         <details>\n<summary>Results</summary>\n\n```"
    )
}

/// Renders the published result comment, truncating the log segment so the
/// whole body fits within [`COMMENT_MAX_LENGTH`].
pub fn render_benchmark_comment(
    branch: &str,
    bench_command: &str,
    toolchain: &str,
    logs: &str,
) -> String {
    render_with_limit(branch, bench_command, toolchain, logs, COMMENT_MAX_LENGTH)
}

fn render_with_limit(
    branch: &str,
    bench_command: &str,
    toolchain: &str,
    logs: &str,
    limit: usize,
) -> String {
    let prefix = body_prefix(branch, bench_command, toolchain);
    let formatting_length = prefix.len() + BODY_SUFFIX.len() + COMMENT_FORMATTING_PADDING;
    let total = formatting_length + logs.len();
    let cleaned_logs = if total < limit {
        logs.to_string()
    } else {
        let budget = limit.saturating_sub(COMMENT_TRUNCATED_POSTFIX.len() + formatting_length);
        format!(
            "{}{COMMENT_TRUNCATED_POSTFIX}",
            truncate_to_char_boundary(logs, budget)
        )
    };
    format!("{prefix}\n{cleaned_logs}\n{BODY_SUFFIX}")
}

fn truncate_to_char_boundary(text: &str, max_bytes: usize) -> &str {
    let mut end = text.len().min(max_bytes);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
