//! Trace replay workload

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::RngCore;
use serde::Deserialize;

use cachebench_core::{OpResult, OpType, PoolId, Request, RequestId, WorkloadError, WorkloadSource};

/// One row of a trace file
///
/// ```text
/// key,op,size,ttl,pool
/// user:42,set,128,60,0
/// user:42,get,,,0
/// ```
///
/// `size`, `ttl` and `pool` may be left empty or omitted.
#[derive(Debug, Deserialize)]
struct TraceRecord {
    key: String,
    op: String,
    #[serde(default)]
    size: Option<usize>,
    #[serde(default)]
    ttl: Option<u32>,
    #[serde(default)]
    pool: Option<PoolId>,
}

/// Requests of one pool and the position of the next one to hand out
struct TracePool {
    requests: Vec<Request>,
    cursor: AtomicUsize,
}

/// Replays requests recorded in a CSV trace
///
/// Each pool's requests are handed out once, in file order, to whichever
/// worker asks next; the pool is exhausted after its last row. Every request
/// carries its row index as id, and results reported back are kept per id.
pub struct TraceReplay {
    name: String,
    pools: Vec<TracePool>,
    results: Mutex<Vec<Option<OpResult>>>,
    finished_threads: AtomicUsize,
    shut_down: AtomicBool,
}

fn trace_error(err: csv::Error) -> WorkloadError {
    let line = err.position().map_or(0, |p| p.line());
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => WorkloadError::Io(e),
        _ => WorkloadError::Trace { line, reason },
    }
}

impl TraceReplay {
    /// Load a trace file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(trace_error)?;
        let replay = Self::load(reader, path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            requests = replay.len(),
            pools = replay.pools.len(),
            "Loaded trace"
        );
        Ok(replay)
    }

    /// Load a trace from any reader
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, WorkloadError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        Self::load(reader, "trace".to_string())
    }

    fn load<R: io::Read>(mut reader: csv::Reader<R>, name: String) -> Result<Self, WorkloadError> {
        let mut by_pool: Vec<Vec<Request>> = Vec::new();
        let mut total = 0u64;

        for row in reader.deserialize::<TraceRecord>() {
            let record = row.map_err(trace_error)?;
            // Header is line 1, so row N sits on line N + 2.
            let line = total + 2;

            if record.key.is_empty() {
                return Err(WorkloadError::Trace {
                    line,
                    reason: "empty key".into(),
                });
            }
            let op: OpType = record
                .op
                .parse()
                .map_err(|reason| WorkloadError::Trace { line, reason })?;

            let mut request = Request::new(record.key, op).with_id(total);
            if let Some(size) = record.size {
                request = request.with_size(size);
            }
            if let Some(ttl) = record.ttl {
                request = request.with_ttl(ttl);
            }

            let pool = record.pool.unwrap_or(0);
            if by_pool.len() <= pool {
                by_pool.resize_with(pool + 1, Vec::new);
            }
            by_pool[pool].push(request);
            total += 1;
        }

        if total == 0 {
            return Err(WorkloadError::InvalidConfig("trace contains no requests".into()));
        }

        let pools = by_pool
            .into_iter()
            .map(|requests| TracePool {
                requests,
                cursor: AtomicUsize::new(0),
            })
            .collect();

        Ok(Self {
            name,
            pools,
            results: Mutex::new(vec![None; total as usize]),
            finished_threads: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Total number of requests in the trace
    pub fn len(&self) -> usize {
        self.pools.iter().map(|p| p.requests.len()).sum()
    }

    /// Whether the trace holds no requests
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests not yet handed out
    pub fn remaining(&self) -> usize {
        self.pools
            .iter()
            .map(|p| p.requests.len().saturating_sub(p.cursor.load(Ordering::Acquire)))
            .sum()
    }

    /// Reported result of each request, indexed by id
    pub fn results(&self) -> Vec<Option<OpResult>> {
        match self.results.lock() {
            Ok(results) => results.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of workers that have stopped asking for requests
    pub fn finished_threads(&self) -> usize {
        self.finished_threads.load(Ordering::Acquire)
    }

    /// Whether the run owning this trace has ended
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl WorkloadSource for TraceReplay {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_pools(&self) -> usize {
        self.pools.len()
    }

    fn next_request(
        &self,
        pool: PoolId,
        _rng: &mut dyn RngCore,
        _last_request_id: Option<RequestId>,
    ) -> Result<Request, WorkloadError> {
        let trace = self.pools.get(pool).ok_or(WorkloadError::UnknownPool {
            pool,
            pools: self.pools.len(),
        })?;

        let idx = trace.cursor.fetch_add(1, Ordering::AcqRel);
        trace
            .requests
            .get(idx)
            .cloned()
            .ok_or(WorkloadError::Exhausted)
    }

    fn notify_result(&self, request_id: RequestId, result: OpResult) {
        let Ok(idx) = usize::try_from(request_id.0) else {
            return;
        };
        let Ok(mut results) = self.results.lock() else {
            return;
        };
        if let Some(slot) = results.get_mut(idx) {
            *slot = Some(result);
        }
    }

    fn notify_thread_finished(&self) {
        self.finished_threads.fetch_add(1, Ordering::AcqRel);
    }

    fn notify_shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        tracing::debug!(
            trace = %self.name,
            remaining = self.remaining(),
            finished_threads = self.finished_threads(),
            "Trace replay shut down"
        );
    }
}

impl std::fmt::Debug for TraceReplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceReplay")
            .field("name", &self.name)
            .field("pools", &self.pools.len())
            .field("requests", &self.len())
            .field("remaining", &self.remaining())
            .finish()
    }
}
