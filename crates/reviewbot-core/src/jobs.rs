use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ClaimKey;

/// Work for the review queue. Repeatable: every trigger produces a fresh job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewJob {
    MergeRequest { project_id: i64, merge_request_iid: i64 },
    Push { project_id: i64, commit_id: String },
}

impl ReviewJob {
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewJob::MergeRequest { .. } => "merge_request_review",
            ReviewJob::Push { .. } => "push_review",
        }
    }
}

impl fmt::Display for ReviewJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewJob::MergeRequest { project_id, merge_request_iid } => {
                write!(f, "merge request review {}!{}", project_id, merge_request_iid)
            }
            ReviewJob::Push { project_id, commit_id } => {
                write!(f, "push review {}@{}", project_id, commit_id)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionLimits {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_total_chars: usize,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            max_files: 20,
            max_file_chars: 12_000,
            max_total_chars: 60_000,
        }
    }
}

/// One-shot job: at most one per merge request, guarded by a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorSuggestionJob {
    pub project_id: i64,
    pub merge_request_iid: i64,
    pub source_ref: String,
    pub limits: SuggestionLimits,
}

impl RefactorSuggestionJob {
    pub fn claim_key(&self) -> ClaimKey {
        ClaimKey::new(self.project_id, self.merge_request_iid)
    }
}

impl fmt::Display for RefactorSuggestionJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "refactor suggestion {}!{} at {}",
            self.project_id, self.merge_request_iid, self.source_ref
        )
    }
}
