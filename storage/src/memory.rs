//! Concurrent in-memory cache engine

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use cachebench_core::{CacheConfig, CacheError, CacheHandle, CacheStats};

use crate::log::{LogRecord, PersistenceLog};

/// A stored value and its expiry
struct Item {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Item {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Bytes an item occupies against the capacity
fn item_size(key: &str, value_len: usize) -> u64 {
    (key.len() + value_len) as u64
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Default)]
struct Counters {
    gets: AtomicU64,
    get_miss: AtomicU64,
    sets: AtomicU64,
    set_failures: AtomicU64,
    dels: AtomicU64,
    expired: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// In-memory key/value cache with a byte capacity, per-item TTL and an
/// optional append-only persistence log
///
/// Writes that would push live bytes past the capacity are rejected with
/// [`CacheError::CapacityExceeded`]; nothing is evicted.
pub struct MemoryCache {
    name: String,
    items: DashMap<String, Item>,
    capacity: u64,
    live_bytes: AtomicU64,
    counters: Counters,
    log: Option<PersistenceLog>,
}

impl MemoryCache {
    /// Open a cache as described by `config`
    ///
    /// With a persistence path the log in that directory is replayed
    /// before the cache is returned. Items whose TTL elapsed while the cache
    /// was closed are not restored.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut cache = Self::in_memory(config.capacity_bytes());

        if let Some(dir) = &config.persistence_path {
            let (log, records) = PersistenceLog::open(dir, config.sync_writes)?;
            let replayed = records.len();
            cache.replay(records);
            cache.name = "memory+log".to_string();

            tracing::info!(
                path = %log.path().display(),
                records = replayed,
                items = cache.items.len(),
                live_bytes = cache.size(),
                sync_writes = config.sync_writes,
                "Replayed persistence log"
            );
            cache.log = Some(log);
        }

        Ok(cache)
    }

    /// Volatile cache holding at most `capacity` bytes of keys and values
    pub fn in_memory(capacity: u64) -> Self {
        Self {
            name: "memory".to_string(),
            items: DashMap::new(),
            capacity,
            live_bytes: AtomicU64::new(0),
            counters: Counters::default(),
            log: None,
        }
    }

    /// Configured capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of stored items, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cache holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn replay(&mut self, records: Vec<LogRecord>) {
        let now_unix = unix_now();
        let now = Instant::now();

        for record in records {
            match record {
                LogRecord::Set {
                    key,
                    value,
                    expires_at,
                } => {
                    if expires_at != 0 && expires_at <= now_unix {
                        self.items.remove(&key);
                        continue;
                    }
                    let expires_at = (expires_at != 0)
                        .then(|| now + Duration::from_secs(expires_at - now_unix));
                    self.items.insert(key, Item { value, expires_at });
                }
                LogRecord::Del { key } => {
                    self.items.remove(&key);
                }
            }
        }

        let live: u64 = self
            .items
            .iter()
            .map(|entry| item_size(entry.key(), entry.value().value.len()))
            .sum();
        if live > self.capacity {
            tracing::warn!(
                live_bytes = live,
                capacity = self.capacity,
                "Replayed data exceeds configured capacity"
            );
        }
        self.live_bytes.store(live, Ordering::Relaxed);
    }

    /// Move live bytes from `old` to `new`, failing if the result exceeds capacity
    fn reserve(&self, old: u64, new: u64) -> Result<(), CacheError> {
        let capacity = self.capacity;
        self.live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                let next = live.saturating_sub(old) + new;
                (next <= capacity).then_some(next)
            })
            .map(|_| ())
            .map_err(|live| CacheError::CapacityExceeded {
                needed: new,
                available: capacity.saturating_sub(live.saturating_sub(old)),
            })
    }

    fn release(&self, bytes: u64) {
        // Never underflows: every released item was reserved first.
        self.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }

    fn append(&self, record: &LogRecord) -> Result<(), CacheError> {
        match &self.log {
            Some(log) => log.append(record),
            None => Ok(()),
        }
    }

    fn count_failure(&self, err: &CacheError) {
        match err {
            CacheError::CapacityExceeded { .. } => Counters::bump(&self.counters.set_failures),
            _ => Counters::bump(&self.counters.errors),
        }
    }
}

impl CacheHandle for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&self, key: &str, value: &[u8], ttl_secs: u32) -> Result<(), CacheError> {
        let needed = item_size(key, value.len());
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(u64::from(ttl_secs)));

        // The entry guard holds the shard lock, so the size swap and the log
        // append happen atomically with respect to other writers of this key.
        let entry = self.items.entry(key.to_string());
        let old = match &entry {
            Entry::Occupied(occupied) => item_size(key, occupied.get().value.len()),
            Entry::Vacant(_) => 0,
        };

        if let Err(e) = self.reserve(old, needed) {
            self.count_failure(&e);
            return Err(e);
        }

        if let Some(log) = &self.log {
            let record = LogRecord::Set {
                key: key.to_string(),
                value: value.to_vec(),
                expires_at: ttl.map_or(0, |ttl| unix_now() + ttl.as_secs()),
            };
            if let Err(e) = log.append(&record) {
                // The old item stays in place, so give back the difference.
                let _ = self
                    .live_bytes
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                        Some(live.saturating_sub(needed) + old)
                    });
                self.count_failure(&e);
                return Err(e);
            }
        }

        let item = Item {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(item);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(item);
            }
        }

        Counters::bump(&self.counters.sets);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();

        let expired = match self.items.get(key) {
            Some(item) if !item.is_expired(now) => {
                Counters::bump(&self.counters.gets);
                return Ok(Some(item.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            if let Some((k, item)) = self.items.remove_if(key, |_, item| item.is_expired(now)) {
                self.release(item_size(&k, item.value.len()));
                Counters::bump(&self.counters.expired);
            }
        }

        Counters::bump(&self.counters.get_miss);
        Ok(None)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        // Log while holding the entry guard so a concurrent set of this key
        // cannot land between the removal and its log record.
        let Entry::Occupied(occupied) = self.items.entry(key.to_string()) else {
            return Ok(false);
        };

        if let Err(e) = self.append(&LogRecord::Del {
            key: key.to_string(),
        }) {
            self.count_failure(&e);
            return Err(e);
        }

        let (k, item) = occupied.remove_entry();
        self.release(item_size(&k, item.value.len()));

        if item.is_expired(Instant::now()) {
            Counters::bump(&self.counters.expired);
            return Ok(false);
        }

        Counters::bump(&self.counters.dels);
        Ok(true)
    }

    fn size(&self) -> u64 {
        self.live_bytes.load(Ordering::Acquire)
    }

    fn reset(&self) -> Result<(), CacheError> {
        self.items.clear();
        self.live_bytes.store(0, Ordering::Release);
        if let Some(log) = &self.log {
            log.truncate()?;
        }
        tracing::debug!(engine = %self.name, "Cache reset");
        Ok(())
    }

    fn stats_snapshot(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            num_items: self.items.len() as u64,
            live_bytes: self.size(),
            num_cache_gets: c.gets.load(Ordering::Relaxed),
            num_cache_get_miss: c.get_miss.load(Ordering::Relaxed),
            num_cache_sets: c.sets.load(Ordering::Relaxed),
            num_cache_set_failures: c.set_failures.load(Ordering::Relaxed),
            num_cache_dels: c.dels.load(Ordering::Relaxed),
            num_cache_expired: c.expired.load(Ordering::Relaxed),
            num_cache_errors: c.errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("name", &self.name)
            .field("items", &self.items.len())
            .field("live_bytes", &self.size())
            .field("capacity", &self.capacity)
            .field("persistent", &self.log.is_some())
            .finish()
    }
}
