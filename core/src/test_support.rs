//! Mock collaborators shared by the worker and stressor tests

use crate::metrics::CacheStats;
use crate::request::{OpResult, OpType, PoolId, Request, RequestId};
use crate::traits::{CacheError, CacheHandle, WorkloadError, WorkloadSource};

use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock Cache
// ============================================================================

pub(crate) struct MockCache {
    items: Mutex<HashMap<String, Vec<u8>>>,
    delay: Option<Duration>,
    fail_every: Option<u64>,
    always_miss: bool,
    calls: AtomicU64,
}

impl MockCache {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            delay: None,
            fail_every: None,
            always_miss: false,
            calls: AtomicU64::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub(crate) fn with_always_miss(mut self) -> Self {
        self.always_miss = true;
        self
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    // Counts the call, sleeps if configured, and fails every Nth call.
    fn enter(&self) -> Result<(), CacheError> {
        let count = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match self.fail_every {
            Some(n) if count % n == 0 => Err(CacheError::Closed),
            _ => Ok(()),
        }
    }
}

impl CacheHandle for MockCache {
    fn name(&self) -> &str {
        "mock-cache"
    }

    fn set(&self, key: &str, value: &[u8], _ttl_secs: u32) -> Result<(), CacheError> {
        self.enter()?;
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.enter()?;
        if self.always_miss {
            return Ok(None);
        }
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.enter()?;
        Ok(self.items.lock().unwrap().remove(key).is_some())
    }

    fn size(&self) -> u64 {
        self.items
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    fn reset(&self) -> Result<(), CacheError> {
        self.items.lock().unwrap().clear();
        Ok(())
    }

    fn stats_snapshot(&self) -> CacheStats {
        let num_items = self.items.lock().unwrap().len() as u64;
        CacheStats {
            num_items,
            live_bytes: self.size(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Mock Workload
// ============================================================================

pub(crate) struct MockWorkload {
    pools: usize,
    ops: Vec<OpType>,
    size: usize,
    keys: u64,
    max_requests: Option<usize>,
    with_ids: bool,
    issued: AtomicUsize,
    finished: AtomicUsize,
    shutdowns: AtomicUsize,
    pools_seen: Mutex<Vec<PoolId>>,
    last_ids_seen: Mutex<Vec<Option<RequestId>>>,
    results: Mutex<Vec<(RequestId, OpResult)>>,
}

impl MockWorkload {
    /// Cycles through `ops` on a single pool with 16-byte payloads
    pub(crate) fn new(ops: Vec<OpType>) -> Self {
        Self {
            pools: 1,
            ops,
            size: 16,
            keys: 64,
            max_requests: None,
            with_ids: false,
            issued: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            pools_seen: Mutex::new(Vec::new()),
            last_ids_seen: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_pools(mut self, pools: usize) -> Self {
        self.pools = pools;
        self
    }

    pub(crate) fn with_keys(mut self, keys: u64) -> Self {
        self.keys = keys;
        self
    }

    pub(crate) fn with_max_requests(mut self, max: usize) -> Self {
        self.max_requests = Some(max);
        self
    }

    pub(crate) fn with_ids(mut self) -> Self {
        self.with_ids = true;
        self
    }

    pub(crate) fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub(crate) fn pools_seen(&self) -> Vec<PoolId> {
        self.pools_seen.lock().unwrap().clone()
    }

    pub(crate) fn last_ids_seen(&self) -> Vec<Option<RequestId>> {
        self.last_ids_seen.lock().unwrap().clone()
    }

    pub(crate) fn results(&self) -> Vec<(RequestId, OpResult)> {
        self.results.lock().unwrap().clone()
    }
}

impl WorkloadSource for MockWorkload {
    fn name(&self) -> &str {
        "mock-workload"
    }

    fn num_pools(&self) -> usize {
        self.pools
    }

    fn next_request(
        &self,
        pool: PoolId,
        _rng: &mut dyn RngCore,
        last_request_id: Option<RequestId>,
    ) -> Result<Request, WorkloadError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.max_requests {
            if n >= max {
                self.issued.fetch_sub(1, Ordering::SeqCst);
                return Err(WorkloadError::Exhausted);
            }
        }

        self.pools_seen.lock().unwrap().push(pool);
        self.last_ids_seen.lock().unwrap().push(last_request_id);

        // Consecutive pairs of requests share a key so a set is followed by a get of it.
        let key = format!("pool{pool}-key{}", (n as u64 / 2) % self.keys);
        let mut request = Request::new(key, self.ops[n % self.ops.len()]).with_size(self.size);
        if self.with_ids {
            request = request.with_id(n as u64);
        }
        Ok(request)
    }

    fn notify_result(&self, request_id: RequestId, result: OpResult) {
        self.results.lock().unwrap().push((request_id, result));
    }

    fn notify_thread_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
