#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use catraca_core::{Handler, HandlerError, MemoryStore, QueueEngine};

/// A shared store and an engine over it, the way one process would wire them.
pub fn store_and_engine() -> (Arc<MemoryStore>, QueueEngine) {
    let store = Arc::new(MemoryStore::new());
    let engine = QueueEngine::new(store.clone());
    (store, engine)
}

/// Poll `check` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Handler that decodes `{"id": n}` payloads and records the ids in
/// delivery order.
pub struct SeenHandler {
    seen: Mutex<Vec<i64>>,
}

impl SeenHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn ids(&self) -> Vec<i64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for SeenHandler {
    type Output = ();

    async fn process(&self, payload: Vec<u8>) -> Result<(), HandlerError> {
        let value: serde_json::Value = serde_json::from_slice(&payload)?;
        let id = value["id"].as_i64().ok_or("payload without an id")?;
        self.seen.lock().unwrap().push(id);
        Ok(())
    }
}

/// Handler that fails its first `failures` calls, then succeeds, recording
/// every attempt.
pub struct FlakyHandler {
    failures: usize,
    attempts: AtomicUsize,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl FlakyHandler {
    pub fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            attempts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn successes(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Handler for FlakyHandler {
    type Output = ();

    async fn process(&self, payload: Vec<u8>) -> Result<(), HandlerError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err("transient failure".into());
        }
        self.seen.lock().unwrap().push(payload);
        Ok(())
    }
}
