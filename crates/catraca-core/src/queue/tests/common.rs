use super::*;

pub(super) fn test_engine() -> (Arc<MemoryStore>, QueueEngine) {
    let store = Arc::new(MemoryStore::new());
    let engine = QueueEngine::new(store.clone());
    (store, engine)
}

/// Handler that records every payload it sees and every batch-callback
/// size. `fail_when` decides per payload whether to return an error.
pub(super) struct RecordingHandler {
    pub(super) calls: Mutex<Vec<Vec<u8>>>,
    pub(super) batch_sizes: Mutex<Vec<usize>>,
    fail_when: fn(&[u8]) -> bool,
}

impl RecordingHandler {
    pub(super) fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            fail_when: |_| false,
        })
    }

    pub(super) fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            fail_when: |_| true,
        })
    }

    pub(super) fn failing_when(fail_when: fn(&[u8]) -> bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            fail_when,
        })
    }

    pub(super) fn payloads(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    type Output = Vec<u8>;

    async fn process(&self, payload: Vec<u8>) -> Result<Self::Output, HandlerError> {
        self.calls.lock().unwrap().push(payload.clone());
        if (self.fail_when)(&payload) {
            return Err("induced handler failure".into());
        }
        Ok(payload)
    }

    async fn on_batch(&self, outputs: Vec<Self::Output>) -> Result<(), HandlerError> {
        self.batch_sizes.lock().unwrap().push(outputs.len());
        Ok(())
    }
}

/// Store whose every operation fails, for dead-store behavior tests.
pub(super) struct BrokenStore;

fn down<T>() -> crate::error::StoreResult<T> {
    Err(crate::error::StoreError::Connection(
        "store unreachable".to_string(),
    ))
}

#[async_trait]
impl Store for BrokenStore {
    async fn get(&self, _: &str) -> crate::error::StoreResult<Option<Vec<u8>>> {
        down()
    }
    async fn set(
        &self,
        _: &str,
        _: &[u8],
        _: Option<Duration>,
    ) -> crate::error::StoreResult<()> {
        down()
    }
    async fn del(&self, _: &[&str]) -> crate::error::StoreResult<u64> {
        down()
    }
    async fn expire(&self, _: &str, _: Duration) -> crate::error::StoreResult<bool> {
        down()
    }
    async fn ttl(&self, _: &str) -> crate::error::StoreResult<Option<Duration>> {
        down()
    }
    async fn incr_by(&self, _: &str, _: i64) -> crate::error::StoreResult<i64> {
        down()
    }
    async fn zadd(&self, _: &str, _: &[u8], _: f64) -> crate::error::StoreResult<()> {
        down()
    }
    async fn zpop_min(&self, _: &str, _: usize) -> crate::error::StoreResult<Vec<ScoredMember>> {
        down()
    }
    async fn zrange_by_score(
        &self,
        _: &str,
        _: f64,
        _: f64,
        _: usize,
    ) -> crate::error::StoreResult<Vec<ScoredMember>> {
        down()
    }
    async fn zrem(&self, _: &str, _: &[u8]) -> crate::error::StoreResult<bool> {
        down()
    }
    async fn zcard(&self, _: &str) -> crate::error::StoreResult<u64> {
        down()
    }
    async fn set_if_absent(
        &self,
        _: &str,
        _: &[u8],
        _: Duration,
    ) -> crate::error::StoreResult<bool> {
        down()
    }
    async fn compare_and_delete(&self, _: &str, _: &[u8]) -> crate::error::StoreResult<bool> {
        down()
    }
    async fn sliding_window_add(
        &self,
        _: &str,
        _: u64,
        _: Duration,
        _: u64,
        _: &[u8],
    ) -> crate::error::StoreResult<bool> {
        down()
    }
}
