use std::fmt;

use anyhow::Result;
use reviewbot_core::{ChatMessage, DiffChange, GeneratedText};
use tracing::{info, warn};

/// Repository host (merge requests, commits, files, comments).
pub trait RepositoryApi: Send + Sync {
    fn merge_request_changes(
        &self,
        project_id: i64,
        merge_request_iid: i64,
    ) -> Result<Vec<DiffChange>>;

    fn commit_diff(&self, project_id: i64, commit_id: &str) -> Result<Vec<DiffChange>>;

    /// Raw file body at `git_ref` (commit sha or branch name).
    fn raw_file(&self, project_id: i64, path: &str, git_ref: &str) -> Result<String>;

    fn post_merge_request_comment(
        &self,
        project_id: i64,
        merge_request_iid: i64,
        body: &str,
    ) -> Result<()>;

    fn post_commit_comment(&self, project_id: i64, commit_id: &str, body: &str) -> Result<()>;
}

/// Text generation backend. One call per job; the queue already paces calls.
pub trait TextGenerator: Send + Sync {
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    fn generate(&self, messages: &[ChatMessage]) -> Result<GeneratedText>;
}

/// Job kind attached to usage reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewType {
    MergeRequestReview,
    PushReview,
    RefactorSuggestion,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewType::MergeRequestReview => "merge_request_review",
            ReviewType::PushReview => "push_review",
            ReviewType::RefactorSuggestion => "refactor_suggestion",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository object a job worked on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewTarget {
    MergeRequest { project_id: i64, merge_request_iid: i64 },
    Commit { project_id: i64, commit_id: String },
}

impl fmt::Display for ReviewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewTarget::MergeRequest { project_id, merge_request_iid } => {
                write!(f, "project {} merge request !{}", project_id, merge_request_iid)
            }
            ReviewTarget::Commit { project_id, commit_id } => {
                write!(f, "project {} commit {}", project_id, commit_id)
            }
        }
    }
}

/// Per-job usage monitoring. Called once per finished job; must not fail the job.
pub trait UsageReporter: Send + Sync {
    fn success(&self, review_type: ReviewType, target: &ReviewTarget, result: &GeneratedText);

    fn failure(
        &self,
        review_type: ReviewType,
        target: &ReviewTarget,
        provider: &str,
        model: &str,
        error: &anyhow::Error,
    );
}

/// Writes usage reports to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingUsageReporter;

impl UsageReporter for TracingUsageReporter {
    fn success(&self, review_type: ReviewType, target: &ReviewTarget, result: &GeneratedText) {
        info!(
            review_type = %review_type,
            target = %target,
            provider = %result.provider,
            model = %result.model,
            elapsed_seconds = result.elapsed_seconds,
            input_tokens = ?result.input_tokens,
            output_tokens = ?result.output_tokens,
            total_tokens = ?result.total_tokens,
            content_chars = result.content.trim().chars().count(),
            "llm usage"
        );
    }

    fn failure(
        &self,
        review_type: ReviewType,
        target: &ReviewTarget,
        provider: &str,
        model: &str,
        error: &anyhow::Error,
    ) {
        warn!(
            review_type = %review_type,
            target = %target,
            provider,
            model,
            error = %format!("{:#}", error),
            "llm job failed"
        );
    }
}
