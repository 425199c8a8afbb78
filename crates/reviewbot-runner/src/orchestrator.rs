use std::sync::Arc;

use anyhow::Result;
use reviewbot_core::{ClaimKey, JobId, RefactorSuggestionJob, ReviewJob, SuggestionLimits};
use reviewbot_queue::WorkerQueue;
use reviewbot_storage::ClaimStore;
use tracing::{error, info, warn};

use crate::collaborators::RepositoryApi;
use crate::comment::PROGRESS_NOTICE;
use crate::config::FeatureFlags;
use crate::events::{MergeRequestAction, MergeRequestEvent, PushEvent, WebhookEvent};

/// What happened to the refactor-suggestion branch of a merge request event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SuggestionOutcome {
    #[default]
    NotApplicable,
    Enqueued(JobId),
    AlreadyClaimed,
    MissingSourceRef,
    EnqueueFailed,
}

/// Summary of one routed event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub handled: bool,
    pub review: Option<JobId>,
    pub suggestion: SuggestionOutcome,
}

impl Dispatch {
    fn ignored() -> Self {
        Self::default()
    }
}

/// Routes events to the queues. Never blocks on generation work.
pub struct Orchestrator {
    repo: Arc<dyn RepositoryApi>,
    claims: Arc<dyn ClaimStore>,
    features: FeatureFlags,
    limits: SuggestionLimits,
    review_queue: Option<Arc<WorkerQueue<ReviewJob>>>,
    suggestion_queue: Option<Arc<WorkerQueue<RefactorSuggestionJob>>>,
}

impl Orchestrator {
    pub fn new(
        repo: Arc<dyn RepositoryApi>,
        claims: Arc<dyn ClaimStore>,
        features: FeatureFlags,
        limits: SuggestionLimits,
    ) -> Self {
        Self { repo, claims, features, limits, review_queue: None, suggestion_queue: None }
    }

    pub fn with_review_queue(mut self, queue: Arc<WorkerQueue<ReviewJob>>) -> Self {
        self.review_queue = Some(queue);
        self
    }

    pub fn with_suggestion_queue(mut self, queue: Arc<WorkerQueue<RefactorSuggestionJob>>) -> Self {
        self.suggestion_queue = Some(queue);
        self
    }

    /// Decode a webhook body and route it.
    pub fn handle_json(&self, body: &str) -> Result<Dispatch> {
        Ok(match WebhookEvent::from_json(body)? {
            WebhookEvent::MergeRequest(ev) => self.handle_merge_request(&ev),
            WebhookEvent::Push(ev) => self.handle_push(&ev),
        })
    }

    pub fn handle_merge_request(&self, ev: &MergeRequestEvent) -> Dispatch {
        let (project_id, merge_request_iid) = (ev.project_id, ev.merge_request_iid);
        if !ev.action.is_handled() {
            info!(
                project_id,
                merge_request_iid,
                action = ev.action.as_str(),
                "ignoring merge request action"
            );
            return Dispatch::ignored();
        }
        info!(project_id, merge_request_iid, action = ev.action.as_str(), "handling merge request");

        let mut dispatch = Dispatch { handled: true, ..Dispatch::default() };

        if self.features.merge_request_review {
            if let Some(queue) = &self.review_queue {
                let posted = self.repo.post_merge_request_comment(
                    project_id,
                    merge_request_iid,
                    PROGRESS_NOTICE,
                );
                if let Err(err) = posted {
                    warn!(
                        project_id,
                        merge_request_iid,
                        error = ?err,
                        "failed to post progress notice"
                    );
                }
                match queue.enqueue(ReviewJob::MergeRequest { project_id, merge_request_iid }) {
                    Ok(id) => dispatch.review = Some(id),
                    Err(err) => error!(
                        project_id,
                        merge_request_iid,
                        error = %err,
                        "failed to enqueue merge request review"
                    ),
                }
            }
        }

        if ev.action == MergeRequestAction::Open && self.features.refactor_suggestion {
            if let Some(queue) = &self.suggestion_queue {
                dispatch.suggestion = self.claim_and_enqueue(queue, ev);
            }
        }
        dispatch
    }

    fn claim_and_enqueue(
        &self,
        queue: &WorkerQueue<RefactorSuggestionJob>,
        ev: &MergeRequestEvent,
    ) -> SuggestionOutcome {
        let key = ClaimKey::new(ev.project_id, ev.merge_request_iid);
        if !self.claims.try_claim(key) {
            info!(claim = %key, "skipping refactor suggestion, claim not obtained");
            return SuggestionOutcome::AlreadyClaimed;
        }

        let Some(source_ref) = ev.source_ref() else {
            warn!(claim = %key, "skipping refactor suggestion, merge request has no source ref");
            self.claims.release_claim(key);
            return SuggestionOutcome::MissingSourceRef;
        };

        let job = RefactorSuggestionJob {
            project_id: ev.project_id,
            merge_request_iid: ev.merge_request_iid,
            source_ref: source_ref.to_string(),
            limits: self.limits,
        };
        match queue.enqueue(job) {
            Ok(id) => SuggestionOutcome::Enqueued(id),
            Err(err) => {
                error!(claim = %key, error = %err, "failed to enqueue refactor suggestion");
                self.claims.release_claim(key);
                SuggestionOutcome::EnqueueFailed
            }
        }
    }

    pub fn handle_push(&self, ev: &PushEvent) -> Dispatch {
        let project_id = ev.project_id;
        info!(project_id, commit_id = %ev.commit_id, "handling push");
        let mut dispatch = Dispatch { handled: true, ..Dispatch::default() };

        if !self.features.push_review {
            return dispatch;
        }
        let Some(queue) = &self.review_queue else {
            return dispatch;
        };

        let posted = self.repo.post_commit_comment(project_id, &ev.commit_id, PROGRESS_NOTICE);
        if let Err(err) = posted {
            warn!(
                project_id,
                commit_id = %ev.commit_id,
                error = ?err,
                "failed to post progress notice"
            );
        }
        match queue.enqueue(ReviewJob::Push { project_id, commit_id: ev.commit_id.clone() }) {
            Ok(id) => dispatch.review = Some(id),
            Err(err) => error!(
                project_id,
                commit_id = %ev.commit_id,
                error = %err,
                "failed to enqueue push review"
            ),
        }
        dispatch
    }
}
