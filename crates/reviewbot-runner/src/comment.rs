use std::fmt::Display;

use reviewbot_core::GeneratedText;

pub const PROGRESS_NOTICE: &str = "AI is reviewing the code. Please wait a moment.\n\n\
This comment was generated automatically.";

pub const REVIEW_FAILED: &str =
    "AI code review could not be generated. A human review is required.";

const REFACTOR_TITLE: &str = "### Refactoring Suggestions (once per merge request)";

/// Usage line appended below every generated comment.
pub fn result_footer(result: &GeneratedText) -> String {
    let mut line = format!(
        "\n\n---\n_Generated by {} / {} in {:.1}s",
        result.provider, result.model, result.elapsed_seconds
    );
    let has_usage = result.input_tokens.is_some()
        || result.output_tokens.is_some()
        || result.total_tokens.is_some();
    if has_usage {
        let show = |n: Option<u64>| n.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        line.push_str(&format!(
            ", tokens in {} / out {} / total {}",
            show(result.input_tokens),
            show(result.output_tokens),
            show(result.total_tokens)
        ));
    }
    line.push('_');
    line
}

pub fn failure_notice(message: &str, error: &dyn Display) -> String {
    format!("{}\n\n```\n{}\n```", message, error)
}

pub fn refactor_comment(result: &GeneratedText) -> String {
    format!(
        "{}\nThese suggestions are separate from the diff review and are based on the full \
         contents of the changed code files.\n\n{}{}",
        REFACTOR_TITLE,
        result.content,
        result_footer(result)
    )
}

pub fn no_target_files_notice() -> String {
    format!(
        "{}\nNo code files in this merge request qualified for refactoring suggestions, \
         so the analysis was skipped.",
        REFACTOR_TITLE
    )
}
