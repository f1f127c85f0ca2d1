//! Synthetic workload generator

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::Normal;

use cachebench_core::{
    KeyDistribution, OpType, PoolId, Request, RequestId, WorkloadConfig, WorkloadError,
    WorkloadSource,
};

/// Operation kinds in the order of [`WorkloadConfig::op_ratios`]
const OPS: [OpType; 6] = [
    OpType::Set,
    OpType::Get,
    OpType::Del,
    OpType::LoneGet,
    OpType::LoneSet,
    OpType::Update,
];

/// Sizes drawn from weighted buckets, uniform within each bucket
///
/// Bucket `i` covers `[bounds[i], bounds[i + 1])`.
#[derive(Debug, Clone)]
struct SizeDistribution {
    bounds: Vec<u32>,
    buckets: WeightedIndex<f64>,
}

impl SizeDistribution {
    fn new(field: &str, bounds: &[u32], probabilities: &[f64]) -> Result<Self, WorkloadError> {
        if bounds.len() != probabilities.len() + 1 {
            return Err(WorkloadError::InvalidConfig(format!(
                "{field}: {} boundaries need {} probabilities",
                bounds.len(),
                bounds.len().saturating_sub(1)
            )));
        }
        let buckets = WeightedIndex::new(probabilities)
            .map_err(|e| WorkloadError::InvalidConfig(format!("{field}: {e}")))?;
        Ok(Self {
            bounds: bounds.to_vec(),
            buckets,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let bucket = self.buckets.sample(rng);
        rng.gen_range(self.bounds[bucket]..self.bounds[bucket + 1]) as usize
    }
}

/// Keys of one pool and how they are picked
#[derive(Debug)]
struct KeyPool {
    keys: Vec<Arc<str>>,
    popularity: Option<Normal<f64>>,
}

impl KeyPool {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Arc<str> {
        let last = self.keys.len() - 1;
        let idx = match &self.popularity {
            Some(normal) => normal.sample(rng).round().clamp(0.0, last as f64) as usize,
            None => rng.gen_range(0..=last),
        };
        Arc::clone(&self.keys[idx])
    }
}

/// Generates requests from key/value size distributions and an operation mix
///
/// The key population is built once: `numKeys` keys split evenly across
/// pools, each key's length drawn from the key size buckets. Requests pick
/// an operation by weight and a key by the configured popularity. Lone
/// operations use fresh keys outside the population, so a lone get always
/// misses and a lone set is never read back.
///
/// Requests carry no ids and the generator never runs dry; runs end on the
/// per-thread quota.
pub struct SyntheticWorkload {
    pools: Vec<KeyPool>,
    ops: WeightedIndex<f64>,
    values: SizeDistribution,
    ttl_secs: u32,
    issued: AtomicU64,
    lone_keys: AtomicU64,
}

impl SyntheticWorkload {
    /// Build a generator with a random key population
    pub fn new(config: &WorkloadConfig, num_pools: usize) -> Result<Self, WorkloadError> {
        Self::with_seed(config, num_pools, rand::random())
    }

    /// Build a generator whose key population is derived from `seed`
    pub fn with_seed(
        config: &WorkloadConfig,
        num_pools: usize,
        seed: u64,
    ) -> Result<Self, WorkloadError> {
        if num_pools == 0 {
            return Err(WorkloadError::InvalidConfig("at least one pool is required".into()));
        }
        if config.num_keys < num_pools {
            return Err(WorkloadError::InvalidConfig(format!(
                "{} keys cannot be split across {num_pools} pools",
                config.num_keys
            )));
        }

        let key_sizes = SizeDistribution::new(
            "keySizeRange",
            &config.key_size_range,
            &config.key_size_range_probability,
        )?;
        let values = SizeDistribution::new(
            "valSizeRange",
            &config.val_size_range,
            &config.val_size_range_probability,
        )?;
        let ops = WeightedIndex::new(config.op_ratios())
            .map_err(|e| WorkloadError::InvalidConfig(format!("operation ratios: {e}")))?;

        let mut rng = StdRng::seed_from_u64(seed);
        let per_pool = config.num_keys / num_pools;
        let extra = config.num_keys % num_pools;
        let mut next_index = 0usize;

        let mut pools = Vec::with_capacity(num_pools);
        for pool in 0..num_pools {
            let count = per_pool + usize::from(pool < extra);
            let keys: Vec<Arc<str>> = (next_index..next_index + count)
                .map(|index| {
                    let len = key_sizes.sample(&mut rng);
                    Arc::from(format!("{index:0>len$}"))
                })
                .collect();
            next_index += count;

            let popularity = match config.distribution {
                KeyDistribution::Range => None,
                KeyDistribution::Normal => {
                    let mean = (count - 1) as f64 / 2.0;
                    let std_dev = (count as f64 / 6.0).max(1.0);
                    Some(Normal::new(mean, std_dev).map_err(|e| {
                        WorkloadError::InvalidConfig(format!("key popularity: {e}"))
                    })?)
                }
            };

            pools.push(KeyPool { keys, popularity });
        }

        tracing::info!(
            pools = num_pools,
            keys = config.num_keys,
            distribution = ?config.distribution,
            ttl_secs = config.ttl_secs,
            "Built synthetic key population"
        );

        Ok(Self {
            pools,
            ops,
            values,
            ttl_secs: config.ttl_secs,
            issued: AtomicU64::new(0),
            lone_keys: AtomicU64::new(0),
        })
    }

    /// Keys of `pool`, in population order
    pub fn keys(&self, pool: PoolId) -> Option<&[Arc<str>]> {
        self.pools.get(pool).map(|p| p.keys.as_slice())
    }

    /// Requests produced so far
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    fn lone_key(&self, pool: PoolId) -> String {
        let n = self.lone_keys.fetch_add(1, Ordering::Relaxed);
        format!("lone-{pool}-{n}")
    }
}

impl WorkloadSource for SyntheticWorkload {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn num_pools(&self) -> usize {
        self.pools.len()
    }

    fn next_request(
        &self,
        pool: PoolId,
        rng: &mut dyn RngCore,
        _last_request_id: Option<RequestId>,
    ) -> Result<Request, WorkloadError> {
        let keys = self.pools.get(pool).ok_or(WorkloadError::UnknownPool {
            pool,
            pools: self.pools.len(),
        })?;

        let op = OPS[self.ops.sample(rng)];
        let request = match op {
            OpType::LoneGet => Request::new(self.lone_key(pool), op),
            OpType::LoneSet => Request::new(self.lone_key(pool), op)
                .with_size(self.values.sample(rng))
                .with_ttl(self.ttl_secs),
            OpType::Set => Request::new(keys.pick(rng), op)
                .with_size(self.values.sample(rng))
                .with_ttl(self.ttl_secs),
            _ => Request::new(keys.pick(rng), op),
        };

        self.issued.fetch_add(1, Ordering::Relaxed);
        Ok(request)
    }

    fn notify_shutdown(&self) {
        tracing::debug!(issued = self.issued(), "Synthetic workload shut down");
    }
}

impl std::fmt::Debug for SyntheticWorkload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticWorkload")
            .field("pools", &self.pools.len())
            .field("ttl_secs", &self.ttl_secs)
            .field("issued", &self.issued())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn config() -> WorkloadConfig {
        WorkloadConfig {
            num_keys: 1000,
            key_size_range: vec![8, 16],
            key_size_range_probability: vec![1.0],
            val_size_range: vec![64, 128, 4096],
            val_size_range_probability: vec![0.9, 0.1],
            ..Default::default()
        }
    }

    fn draw(workload: &SyntheticWorkload, pool: PoolId, n: usize) -> Vec<Request> {
        let mut rng = StdRng::seed_from_u64(11);
        (0..n)
            .map(|_| workload.next_request(pool, &mut rng, None).unwrap())
            .collect()
    }

    #[test]
    fn test_keys_split_across_pools() {
        let workload = SyntheticWorkload::with_seed(&config(), 3, 1).unwrap();

        let sizes: Vec<usize> = (0..3).map(|p| workload.keys(p).unwrap().len()).collect();
        assert_eq!(sizes, vec![334, 333, 333]);

        let all: HashSet<&str> = (0..3)
            .flat_map(|p| workload.keys(p).unwrap().iter().map(|k| &**k))
            .collect();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_key_lengths_follow_buckets() {
        let workload = SyntheticWorkload::with_seed(&config(), 1, 2).unwrap();

        for key in workload.keys(0).unwrap() {
            assert!((8..16).contains(&key.len()), "key {key} has bad length");
        }
    }

    #[test]
    fn test_same_seed_same_population() {
        let a = SyntheticWorkload::with_seed(&config(), 2, 9).unwrap();
        let b = SyntheticWorkload::with_seed(&config(), 2, 9).unwrap();
        assert_eq!(a.keys(1), b.keys(1));
    }

    #[test]
    fn test_op_mix_follows_ratios() {
        let workload = SyntheticWorkload::with_seed(
            &WorkloadConfig {
                get_ratio: 0.8,
                set_ratio: 0.2,
                ..config()
            },
            1,
            3,
        )
        .unwrap();

        let mut counts: HashMap<OpType, usize> = HashMap::new();
        for request in draw(&workload, 0, 10_000) {
            *counts.entry(request.op).or_default() += 1;
        }

        let gets = counts[&OpType::Get] as f64 / 10_000.0;
        assert!((gets - 0.8).abs() < 0.03, "get share was {gets}");
        assert_eq!(counts.get(&OpType::Del), None);
        assert_eq!(workload.issued(), 10_000);
    }

    #[test]
    fn test_value_sizes_follow_buckets() {
        let workload = SyntheticWorkload::with_seed(
            &WorkloadConfig {
                get_ratio: 0.0,
                set_ratio: 1.0,
                ..config()
            },
            1,
            4,
        )
        .unwrap();

        let sizes: Vec<usize> = draw(&workload, 0, 5_000)
            .into_iter()
            .map(|r| r.size.unwrap())
            .collect();

        assert!(sizes.iter().all(|s| (64..4096).contains(s)));
        let small = sizes.iter().filter(|&&s| s < 128).count() as f64 / 5_000.0;
        assert!((small - 0.9).abs() < 0.03, "small share was {small}");
    }

    #[test]
    fn test_requests_stay_in_their_pool() {
        let workload = SyntheticWorkload::with_seed(&config(), 2, 5).unwrap();
        let pool1: HashSet<&str> = workload.keys(1).unwrap().iter().map(|k| &**k).collect();

        for request in draw(&workload, 1, 500) {
            assert!(pool1.contains(&*request.key));
        }
    }

    #[test]
    fn test_lone_ops_use_fresh_keys() {
        let workload = SyntheticWorkload::with_seed(
            &WorkloadConfig {
                get_ratio: 0.0,
                set_ratio: 0.0,
                lone_get_ratio: 1.0,
                lone_set_ratio: 1.0,
                ttl_secs: 30,
                ..config()
            },
            1,
            6,
        )
        .unwrap();

        let requests = draw(&workload, 0, 200);
        let keys: HashSet<&str> = requests.iter().map(|r| &*r.key).collect();
        assert_eq!(keys.len(), 200);
        for request in &requests {
            assert!(request.key.starts_with("lone-0-"));
            match request.op {
                OpType::LoneSet => {
                    assert!(request.size.is_some());
                    assert_eq!(request.ttl_secs, 30);
                }
                OpType::LoneGet => assert!(request.size.is_none()),
                other => panic!("unexpected op {other}"),
            }
        }
    }

    #[test]
    fn test_normal_popularity_favours_middle() {
        let workload = SyntheticWorkload::with_seed(
            &WorkloadConfig {
                distribution: KeyDistribution::Normal,
                ..config()
            },
            1,
            7,
        )
        .unwrap();
        let keys = workload.keys(0).unwrap();
        let middle: HashSet<&str> = keys[400..600].iter().map(|k| &**k).collect();

        let requests = draw(&workload, 0, 5_000);
        let hot = requests
            .iter()
            .filter(|r| middle.contains(&*r.key))
            .count() as f64
            / 5_000.0;

        // +-100 keys is +-0.6 sigma, about 45% of draws; uniform would give 20%
        assert!(hot > 0.35, "middle share was {hot}");
    }

    #[test]
    fn test_unknown_pool() {
        let workload = SyntheticWorkload::with_seed(&config(), 2, 8).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let err = workload.next_request(2, &mut rng, None).unwrap_err();
        assert!(matches!(err, WorkloadError::UnknownPool { pool: 2, pools: 2 }));
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert!(SyntheticWorkload::new(&config(), 0).is_err());
        assert!(SyntheticWorkload::new(
            &WorkloadConfig {
                num_keys: 2,
                ..config()
            },
            3
        )
        .is_err());
        assert!(SyntheticWorkload::new(
            &WorkloadConfig {
                val_size_range_probability: vec![1.0],
                ..config()
            },
            1
        )
        .is_err());
    }
}
