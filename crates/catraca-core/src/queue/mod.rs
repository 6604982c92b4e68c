//! Polling dequeue engine over a store-side sorted set.
//!
//! A queue is a named sorted set ordered by score ascending. What a score
//! means is a property of the queue, not the entry: a future execution
//! timestamp in delay mode, a caller-chosen rank in priority mode, or
//! nothing at all in immediate mode.
//!
//! Delivery is at-least-once. Entries are removed only after the handler
//! succeeds; failures requeue the entry with its original score, and there
//! is no attempt limit, backoff, or dead-letter sink: a permanently
//! failing payload occupies its slot until a human notices the logs.
//! Consumers must be idempotent. Identical raw payloads collapse to one
//! sorted-set member, so callers embed their own unique id in the payload.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{EnqueueError, HandlerError, StoreResult};
use crate::store::Store;
use crate::time::unix_ms;

#[cfg(test)]
mod tests;

/// When an enqueued entry becomes eligible, expressed as a tagged mode
/// rather than a bare score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Eligible right away (score 0).
    Immediate,
    /// Eligible at a unix-epoch timestamp in milliseconds. Only meaningful
    /// on a queue consumed in [`QueueMode::Delay`].
    DelayedUntil(u64),
    /// Eligible after a duration from now. Convenience over `DelayedUntil`.
    DelayedBy(Duration),
    /// Rank among siblings; lower ranks are delivered first. Only
    /// meaningful on a queue consumed in [`QueueMode::Priority`].
    PriorityRank(i64),
}

impl Schedule {
    fn score(self, now_ms: u64) -> f64 {
        match self {
            Schedule::Immediate => 0.0,
            Schedule::DelayedUntil(at_ms) => at_ms as f64,
            Schedule::DelayedBy(delay) => (now_ms + delay.as_millis() as u64) as f64,
            Schedule::PriorityRank(rank) => rank as f64,
        }
    }
}

/// How a `run` loop interprets scores when popping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Scores carry no meaning; everything is eligible.
    Immediate,
    /// Scores are unix-epoch milliseconds; entries in the future are put
    /// back untouched and skipped this tick.
    Delay,
    /// Scores are ranks; everything is eligible, lowest rank first.
    Priority,
}

/// Tuning for one `run` invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: QueueMode,
    /// Max entries popped per tick; also the fan-out bound for concurrent
    /// handler dispatch within the tick.
    pub batch_size: usize,
    /// Poll interval of the dequeue loop.
    pub tick: Duration,
}

impl RunOptions {
    pub fn new(mode: QueueMode) -> Self {
        Self {
            mode,
            batch_size: 10,
            tick: Duration::from_secs(1),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(QueueMode::Immediate)
    }
}

/// Consumer seam for the dequeue loop.
///
/// `process` receives the payload byte-identical to what was enqueued.
/// Returning `Err` requeues the entry with its original score; the error
/// itself is only logged.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn process(&self, payload: Vec<u8>) -> Result<Self::Output, HandlerError>;

    /// Called once per tick with the outputs of that tick's successful
    /// entries, when there were any. Errors are logged, never retried.
    async fn on_batch(&self, outputs: Vec<Self::Output>) -> Result<(), HandlerError> {
        let _ = outputs;
        Ok(())
    }
}

/// Queue operations over an injected store client. Cheap to clone; all
/// clones share the same store.
#[derive(Clone)]
pub struct QueueEngine {
    store: Arc<dyn Store>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// JSON-encode a payload and insert it. Encode errors surface
    /// immediately; the entry never enters the queue.
    pub async fn enqueue<T>(
        &self,
        queue: &str,
        payload: &T,
        schedule: Schedule,
    ) -> Result<(), EnqueueError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(payload)?;
        self.enqueue_raw(queue, bytes, schedule).await
    }

    /// Insert raw payload bytes. The bytes arrive at the handler exactly
    /// as given here.
    pub async fn enqueue_raw(
        &self,
        queue: &str,
        payload: Vec<u8>,
        schedule: Schedule,
    ) -> Result<(), EnqueueError> {
        let score = schedule.score(unix_ms());
        self.store.zadd(queue, &payload, score).await?;
        debug!(%queue, score, bytes = payload.len(), "entry enqueued");
        Ok(())
    }

    /// Number of entries currently in the queue.
    pub async fn len(&self, queue: &str) -> StoreResult<u64> {
        self.store.zcard(queue).await
    }

    /// Run the dequeue loop until `shutdown` flips to true.
    ///
    /// One long-lived task per queue: each tick pops up to `batch_size`
    /// eligible entries, dispatches them concurrently, and joins the whole
    /// batch before the next tick, so throughput per tick is capped by the
    /// slowest handler in the batch. Every internal error (store, handler,
    /// batch callback) is logged and absorbed; only the shutdown signal
    /// ends the loop.
    #[tracing::instrument(skip_all, fields(queue = %queue))]
    pub async fn run<H: Handler>(
        &self,
        queue: &str,
        handler: Arc<H>,
        opts: RunOptions,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(%queue, mode = ?opts.mode, batch_size = opts.batch_size, "queue worker started");

        let mut tick = tokio::time::interval(opts.tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }
            self.run_tick(queue, &handler, &opts).await;
        }

        info!(%queue, "queue worker stopped");
    }

    /// One tick: pop, filter by eligibility, fan out, join, batch-callback.
    async fn run_tick<H: Handler>(&self, queue: &str, handler: &Arc<H>, opts: &RunOptions) {
        let score_max = match opts.mode {
            QueueMode::Delay => unix_ms() as f64,
            QueueMode::Immediate | QueueMode::Priority => f64::INFINITY,
        };

        let mut batch: JoinSet<Option<H::Output>> = JoinSet::new();

        for _ in 0..opts.batch_size {
            let entry = match self.store.zpop_min(queue, 1).await {
                Ok(mut entries) => match entries.pop() {
                    Some(entry) => entry,
                    None => break, // queue drained
                },
                Err(err) => {
                    error!(%queue, error = %err, "failed to pop entry, ending tick");
                    break;
                }
            };

            if entry.score > score_max {
                // Not yet due. Put it back unchanged; since pop-min returned
                // it, everything still queued is at least as far out.
                if let Err(err) = self.store.zadd(queue, &entry.member, entry.score).await {
                    error!(%queue, error = %err, "failed to restore undue entry");
                }
                break;
            }

            let store = Arc::clone(&self.store);
            let handler = Arc::clone(handler);
            let queue = queue.to_string();
            batch.spawn(async move {
                match handler.process(entry.member.clone()).await {
                    Ok(output) => Some(output),
                    Err(err) => {
                        warn!(queue = %queue, error = %err, "handler failed, requeueing entry");
                        // Original score, so delay/priority position is kept.
                        if let Err(store_err) =
                            store.zadd(&queue, &entry.member, entry.score).await
                        {
                            error!(queue = %queue, error = %store_err, "failed to requeue entry");
                        }
                        None
                    }
                }
            });
        }

        let mut outputs = Vec::new();
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Some(output)) => outputs.push(output),
                Ok(None) => {}
                Err(err) => error!(%queue, error = %err, "handler task panicked"),
            }
        }

        if !outputs.is_empty() {
            if let Err(err) = handler.on_batch(outputs).await {
                warn!(%queue, error = %err, "batch callback failed");
            }
        }
    }
}

/// Owns a spawned `run` loop and its shutdown signal, so callers get a
/// handle instead of a future that never resolves.
pub struct QueueWorker {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl QueueWorker {
    /// Spawn the dequeue loop for `queue` on the current runtime.
    pub fn spawn<H: Handler>(
        engine: QueueEngine,
        queue: impl Into<String>,
        handler: Arc<H>,
        opts: RunOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue = queue.into();
        let handle =
            tokio::spawn(async move { engine.run(&queue, handler, opts, shutdown_rx).await });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to stop after its current tick and wait for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}
