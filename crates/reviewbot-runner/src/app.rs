use std::sync::Arc;

use anyhow::{Context, Result};
use reviewbot_core::{RefactorSuggestionJob, ReviewJob};
use reviewbot_queue::WorkerQueue;
use reviewbot_storage::{ClaimStore, ResultCache};
use reviewbot_storage_sqlite::{SqliteClaimStore, SqliteResultCache};
use tracing::info;

use crate::collaborators::{RepositoryApi, TextGenerator, UsageReporter};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::review::ReviewService;
use crate::suggestion::RefactorSuggestionService;

pub const REVIEW_QUEUE: &str = "review";
pub const SUGGESTION_QUEUE: &str = "refactor-suggestion";

/// Everything a webhook receiver needs, wired from settings.
pub struct App {
    pub settings: Settings,
    pub orchestrator: Orchestrator,
    pub claims: Arc<dyn ClaimStore>,
    pub cache: Arc<dyn ResultCache>,
    review_queue: Option<Arc<WorkerQueue<ReviewJob>>>,
    suggestion_queue: Option<Arc<WorkerQueue<RefactorSuggestionJob>>>,
}

impl App {
    /// Open the SQLite stores named in `settings` and wire the rest.
    pub fn build(
        settings: Settings,
        repo: Arc<dyn RepositoryApi>,
        generator: Arc<dyn TextGenerator>,
        reporter: Arc<dyn UsageReporter>,
    ) -> Result<Self> {
        let cache_path = settings.storage.review_cache_path();
        let claims_path = settings.storage.claim_state_path();
        let cache: Arc<dyn ResultCache> = Arc::new(
            SqliteResultCache::open(&cache_path)
                .with_context(|| format!("open result cache {}", cache_path.display()))?,
        );
        let claims: Arc<dyn ClaimStore> = Arc::new(
            SqliteClaimStore::open(&claims_path)
                .with_context(|| format!("open claim store {}", claims_path.display()))?,
        );
        Self::with_stores(settings, repo, generator, reporter, claims, cache)
    }

    /// Wire with caller-provided stores. Starts one queue per enabled feature.
    pub fn with_stores(
        settings: Settings,
        repo: Arc<dyn RepositoryApi>,
        generator: Arc<dyn TextGenerator>,
        reporter: Arc<dyn UsageReporter>,
        claims: Arc<dyn ClaimStore>,
        cache: Arc<dyn ResultCache>,
    ) -> Result<Self> {
        settings.validate()?;
        let features = settings.features.clone();

        let review_queue = if features.merge_request_review || features.push_review {
            let service = ReviewService::new(repo.clone(), generator.clone(), cache.clone())
                .with_system_prompt(settings.llm.review_system_prompt.clone())
                .with_reporter(reporter.clone());
            let queue = WorkerQueue::new(
                REVIEW_QUEUE,
                settings.review_queue.queue_config(),
                move |job: ReviewJob| service.run(&job),
            )?;
            Some(Arc::new(queue))
        } else {
            None
        };

        let suggestion_queue = if features.refactor_suggestion {
            let service =
                RefactorSuggestionService::new(repo.clone(), generator.clone(), claims.clone())
                    .with_reporter(reporter.clone());
            let queue = WorkerQueue::new(
                SUGGESTION_QUEUE,
                settings.suggestion_queue.queue_config(),
                move |job: RefactorSuggestionJob| service.run(&job),
            )?;
            Some(Arc::new(queue))
        } else {
            None
        };

        let mut orchestrator =
            Orchestrator::new(repo, claims.clone(), features, settings.suggestion_limits.limits());
        if let Some(q) = &review_queue {
            orchestrator = orchestrator.with_review_queue(q.clone());
        }
        if let Some(q) = &suggestion_queue {
            orchestrator = orchestrator.with_suggestion_queue(q.clone());
        }

        info!(
            provider = %settings.llm.provider,
            model = %settings.llm.model,
            review_queue = review_queue.is_some(),
            suggestion_queue = suggestion_queue.is_some(),
            "app ready"
        );

        Ok(Self { settings, orchestrator, claims, cache, review_queue, suggestion_queue })
    }

    pub fn review_queue(&self) -> Option<&WorkerQueue<ReviewJob>> {
        self.review_queue.as_deref()
    }

    pub fn suggestion_queue(&self) -> Option<&WorkerQueue<RefactorSuggestionJob>> {
        self.suggestion_queue.as_deref()
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub fn shutdown(&self) {
        if let Some(q) = &self.review_queue {
            q.shutdown();
        }
        if let Some(q) = &self.suggestion_queue {
            q.shutdown();
        }
    }
}
