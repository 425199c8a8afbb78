use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use reviewbot_core::{ConfigError, JobId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::limiter::RateLimiter;

/// Job handler. Errors and panics are logged by the worker and never stop it.
pub type JobHandler<T> = dyn Fn(T) -> anyhow::Result<()> + Send + Sync;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("queue '{0}' is shut down")]
    Closed(String),
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub max_per_minute: u32,
    pub workers: usize,
    /// Depth above which `enqueue` logs a warning. `None` or 0 disables the check.
    pub soft_pending_limit: Option<usize>,
}

impl QueueConfig {
    pub fn new(max_per_minute: u32, workers: usize) -> Self {
        Self {
            max_per_minute,
            workers,
            soft_pending_limit: None,
        }
    }

    pub fn with_soft_pending_limit(mut self, limit: usize) -> Self {
        self.soft_pending_limit = Some(limit);
        self
    }
}

/// Runtime counters, mostly for tests and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl QueueStats {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed + self.panicked
    }
}

struct Envelope<T> {
    id: JobId,
    job: T,
    enqueued_at: Instant,
}

struct WorkerContext<T> {
    queue: String,
    receiver: Arc<Mutex<mpsc::Receiver<Envelope<T>>>>,
    limiter: Arc<RateLimiter>,
    handler: Arc<JobHandler<T>>,
    pending: Arc<AtomicUsize>,
    stats: Arc<Mutex<QueueStats>>,
}

/// Unbounded in-process queue drained by a fixed pool of rate-limited workers.
///
/// `enqueue` never blocks and never rejects because of load; the soft limit
/// only produces a warning. Each job reaches exactly one worker.
pub struct WorkerQueue<T> {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Envelope<T>>>>,
    pending: Arc<AtomicUsize>,
    soft_pending_limit: Option<usize>,
    stats: Arc<Mutex<QueueStats>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl<T> WorkerQueue<T>
where
    T: fmt::Debug + Send + 'static,
{
    /// Validate the config and start the worker threads.
    pub fn new<F>(
        name: impl Into<String>,
        config: QueueConfig,
        handler: F,
    ) -> Result<Self, QueueError>
    where
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if config.workers == 0 {
            return Err(ConfigError::NonPositiveWorkers(0).into());
        }
        let limiter = Arc::new(RateLimiter::new(config.max_per_minute)?);
        let handler: Arc<JobHandler<T>> = Arc::new(handler);

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(Mutex::new(QueueStats::default()));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let ctx = WorkerContext {
                queue: name.clone(),
                receiver: receiver.clone(),
                limiter: limiter.clone(),
                handler: handler.clone(),
                pending: pending.clone(),
                stats: stats.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", name, index + 1))
                .spawn(move || worker_loop(ctx))?;
            workers.push(handle);
        }

        info!(
            queue = %name,
            workers = config.workers,
            max_per_minute = config.max_per_minute,
            soft_pending_limit = ?config.soft_pending_limit,
            "queue started"
        );

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            pending,
            soft_pending_limit: config.soft_pending_limit,
            stats,
            workers: Mutex::new(workers),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand a job to the pool. Fails only once the queue has been shut down.
    pub fn enqueue(&self, job: T) -> Result<JobId, QueueError> {
        let id = JobId::new();
        let depth = {
            let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = guard.as_ref() else {
                return Err(QueueError::Closed(self.name.clone()));
            };
            // Count before sending so a fast worker never decrements below zero.
            let depth = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
            let envelope = Envelope {
                id: id.clone(),
                job,
                enqueued_at: Instant::now(),
            };
            if sender.send(envelope).is_err() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                return Err(QueueError::Closed(self.name.clone()));
            }
            depth
        };

        self.stats.lock().unwrap_or_else(PoisonError::into_inner).enqueued += 1;
        debug!(queue = %self.name, job_id = %id, depth, "job enqueued");
        self.warn_if_over_soft_limit(depth);
        Ok(id)
    }

    fn warn_if_over_soft_limit(&self, depth: usize) {
        match self.soft_pending_limit {
            Some(limit) if limit > 0 && depth > limit => {
                warn!(
                    queue = %self.name,
                    depth,
                    soft_limit = limit,
                    "queue length exceeded soft limit"
                );
            }
            _ => {}
        }
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop accepting jobs, let the workers drain what is queued, and join them.
    ///
    /// Must not be called from inside a handler of the same queue.
    pub fn shutdown(&self) {
        drop(self.sender.lock().unwrap_or_else(PoisonError::into_inner).take());
        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if handle.join().is_err() {
                warn!(queue = %self.name, "worker thread terminated abnormally");
            }
        }
        info!(queue = %self.name, "queue stopped");
    }
}

fn worker_loop<T: fmt::Debug + Send + 'static>(ctx: WorkerContext<T>) {
    loop {
        let next = {
            let receiver = ctx.receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        let Ok(Envelope { id, job, enqueued_at }) = next else {
            debug!(queue = %ctx.queue, "sender dropped, worker exiting");
            return;
        };
        ctx.pending.fetch_sub(1, Ordering::SeqCst);

        ctx.limiter.acquire();

        let description = format!("{:?}", job);
        debug!(
            queue = %ctx.queue,
            job_id = %id,
            waited_ms = enqueued_at.elapsed().as_millis() as u64,
            "job started"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (ctx.handler)(job)));
        let mut stats = ctx.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Ok(Ok(())) => stats.succeeded += 1,
            Ok(Err(err)) => {
                stats.failed += 1;
                error!(
                    queue = %ctx.queue,
                    job_id = %id,
                    job = %description,
                    error = ?err,
                    "job handler failed"
                );
            }
            Err(payload) => {
                stats.panicked += 1;
                error!(
                    queue = %ctx.queue,
                    job_id = %id,
                    job = %description,
                    panic = %panic_message(payload.as_ref()),
                    "job handler panicked"
                );
            }
        }
    }
}

/// Run a handler body, turning a panic into an error so the caller's failure path still runs.
pub fn catch_panic<R>(f: impl FnOnce() -> anyhow::Result<R>) -> anyhow::Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
