use std::sync::Arc;

use anyhow::{Context, Result};
use reviewbot_core::{RefactorSuggestionJob, SuggestionLimits};
use reviewbot_queue::catch_panic;
use reviewbot_storage::ClaimStore;
use tracing::{info, warn};

use crate::collaborators::{
    RepositoryApi, ReviewTarget, ReviewType, TextGenerator, TracingUsageReporter, UsageReporter,
};
use crate::comment::{no_target_files_notice, refactor_comment};
use crate::prompt::{refactor_messages, FileExcerpt};
use crate::selector::{collect_candidate_paths, truncate_text};

/// One-shot whole-file refactoring suggestions. Completes or releases the claim it was queued
/// under.
pub struct RefactorSuggestionService {
    repo: Arc<dyn RepositoryApi>,
    generator: Arc<dyn TextGenerator>,
    claims: Arc<dyn ClaimStore>,
    reporter: Arc<dyn UsageReporter>,
}

impl RefactorSuggestionService {
    pub fn new(
        repo: Arc<dyn RepositoryApi>,
        generator: Arc<dyn TextGenerator>,
        claims: Arc<dyn ClaimStore>,
    ) -> Self {
        Self { repo, generator, claims, reporter: Arc::new(TracingUsageReporter) }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Queue handler. Success marks the claim completed; a failure or panic releases it so a
    /// later event can retry.
    pub fn run(&self, job: &RefactorSuggestionJob) -> Result<()> {
        info!(job = %job, "running refactor suggestion");
        let key = job.claim_key();
        let target = ReviewTarget::MergeRequest {
            project_id: job.project_id,
            merge_request_iid: job.merge_request_iid,
        };
        match catch_panic(|| self.suggest(job, &target)) {
            Ok(()) => {
                self.claims.mark_completed(key);
                Ok(())
            }
            Err(err) => {
                self.reporter.failure(
                    ReviewType::RefactorSuggestion,
                    &target,
                    self.generator.provider_name(),
                    self.generator.model_name(),
                    &err,
                );
                self.claims.release_claim(key);
                Err(err)
            }
        }
    }

    fn suggest(&self, job: &RefactorSuggestionJob, target: &ReviewTarget) -> Result<()> {
        let changes = self
            .repo
            .merge_request_changes(job.project_id, job.merge_request_iid)
            .context("fetch merge request changes")?;
        let candidates = collect_candidate_paths(&changes, job.limits.max_files);
        let files = collect_excerpts(
            self.repo.as_ref(),
            job.project_id,
            &job.source_ref,
            &candidates,
            job.limits,
        );

        if files.is_empty() {
            info!(
                job = %job,
                candidates = candidates.len(),
                "no target files for refactor suggestion"
            );
            return self
                .repo
                .post_merge_request_comment(
                    job.project_id,
                    job.merge_request_iid,
                    &no_target_files_notice(),
                )
                .context("post no-target notice");
        }

        let result = self
            .generator
            .generate(&refactor_messages(&files))
            .context("generate refactor suggestion")?;
        self.repo
            .post_merge_request_comment(
                job.project_id,
                job.merge_request_iid,
                &refactor_comment(&result),
            )
            .context("post refactor suggestion")?;
        self.reporter.success(ReviewType::RefactorSuggestion, target, &result);
        Ok(())
    }
}

/// Fetch candidate files at `git_ref`, clipping each to the per-file budget and stopping at the
/// total budget. Files that fail to load or are blank are skipped.
pub fn collect_excerpts(
    repo: &dyn RepositoryApi,
    project_id: i64,
    git_ref: &str,
    paths: &[String],
    limits: SuggestionLimits,
) -> Vec<FileExcerpt> {
    let mut files = Vec::new();
    let mut consumed = 0usize;

    for path in paths {
        if consumed >= limits.max_total_chars {
            break;
        }
        let raw = match repo.raw_file(project_id, path, git_ref) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    project_id,
                    path = %path,
                    git_ref,
                    error = ?err,
                    "failed to fetch file, skipping"
                );
                continue;
            }
        };
        if raw.trim().is_empty() {
            continue;
        }

        let allowed = limits.max_file_chars.min(limits.max_total_chars - consumed);
        let (content, truncated) = truncate_text(&raw, allowed);
        if content.trim().is_empty() {
            continue;
        }
        consumed += content.chars().count();
        files.push(FileExcerpt { path: path.clone(), content, truncated });
    }
    files
}
