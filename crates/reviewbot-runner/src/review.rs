use std::sync::Arc;

use anyhow::{Context, Result};
use reviewbot_core::{DiffChange, GeneratedText, ReviewJob};
use reviewbot_queue::catch_panic;
use reviewbot_storage::ResultCache;
use tracing::{info, warn};

use crate::collaborators::{
    RepositoryApi, ReviewTarget, ReviewType, TextGenerator, TracingUsageReporter, UsageReporter,
};
use crate::comment::{failure_notice, result_footer, REVIEW_FAILED};
use crate::prompt::review_messages;

/// Diff review for merge requests and pushed commits, backed by the result cache.
pub struct ReviewService {
    repo: Arc<dyn RepositoryApi>,
    generator: Arc<dyn TextGenerator>,
    cache: Arc<dyn ResultCache>,
    reporter: Arc<dyn UsageReporter>,
    system_prompt: Option<String>,
}

impl ReviewService {
    pub fn new(
        repo: Arc<dyn RepositoryApi>,
        generator: Arc<dyn TextGenerator>,
        cache: Arc<dyn ResultCache>,
    ) -> Self {
        Self {
            repo,
            generator,
            cache,
            reporter: Arc::new(TracingUsageReporter),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn UsageReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Queue handler. A failure or panic is reported, a notice is posted (best effort) and the
    /// error is returned.
    pub fn run(&self, job: &ReviewJob) -> Result<()> {
        info!(job = %job, "running review");
        let (review_type, target) = describe(job);
        match catch_panic(|| self.review(job, review_type, &target)) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reporter.failure(
                    review_type,
                    &target,
                    self.generator.provider_name(),
                    self.generator.model_name(),
                    &err,
                );
                let notice = failure_notice(REVIEW_FAILED, &format!("{:#}", err));
                if let Err(post_err) = self.post(&target, &notice) {
                    warn!(job = %job, error = ?post_err, "failed to post review failure notice");
                }
                Err(err)
            }
        }
    }

    fn review(
        &self,
        job: &ReviewJob,
        review_type: ReviewType,
        target: &ReviewTarget,
    ) -> Result<()> {
        let changes = match job {
            ReviewJob::MergeRequest { project_id, merge_request_iid } => self
                .repo
                .merge_request_changes(*project_id, *merge_request_iid)
                .context("fetch merge request changes")?,
            ReviewJob::Push { project_id, commit_id } => self
                .repo
                .commit_diff(*project_id, commit_id)
                .context("fetch commit diff")?,
        };

        let result = self.cached_or_generate(&changes)?;
        self.reporter.success(review_type, target, &result);
        let body = format!("{}{}", result.content, result_footer(&result));
        self.post(target, &body).context("post review comment")
    }

    fn post(&self, target: &ReviewTarget, body: &str) -> Result<()> {
        match target {
            ReviewTarget::MergeRequest { project_id, merge_request_iid } => {
                self.repo.post_merge_request_comment(*project_id, *merge_request_iid, body)
            }
            ReviewTarget::Commit { project_id, commit_id } => {
                self.repo.post_commit_comment(*project_id, commit_id, body)
            }
        }
    }

    /// Cached result for identical changes under the same provider and model, else a fresh one.
    pub fn cached_or_generate(&self, changes: &[DiffChange]) -> Result<GeneratedText> {
        let provider = self.generator.provider_name();
        let model = self.generator.model_name();

        if let Some(hit) = self.cache.get(provider, model, changes) {
            info!(provider, model, "using cached review result");
            return Ok(hit);
        }

        let messages = review_messages(changes, self.system_prompt.as_deref());
        let result = self.generator.generate(&messages).context("generate review")?;
        self.cache.put(provider, model, changes, &result);
        Ok(result)
    }
}

fn describe(job: &ReviewJob) -> (ReviewType, ReviewTarget) {
    match job {
        ReviewJob::MergeRequest { project_id, merge_request_iid } => (
            ReviewType::MergeRequestReview,
            ReviewTarget::MergeRequest {
                project_id: *project_id,
                merge_request_iid: *merge_request_iid,
            },
        ),
        ReviewJob::Push { project_id, commit_id } => (
            ReviewType::PushReview,
            ReviewTarget::Commit { project_id: *project_id, commit_id: commit_id.clone() },
        ),
    }
}
