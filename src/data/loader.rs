//! Batching views over datasets.
//!
//! A [`Loader`] turns random access into a stream of batches. It
//! implements [`DataPipe`], so a loader drops into a pipeline wherever a
//! pipe is expected.
//!
//! # Contract
//!
//! * Every pass visits this loader's shard of the dataset exactly once.
//! * With a fixed seed, shuffled passes replay the same order; without
//!   one, each pass draws a fresh order.
//! * Batches are `Value::Array`; the final short batch is kept unless
//!   `drop_last` is set.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::Value;

use crate::errors::{PipewrightError, Result};
use crate::pipes::{DataPipe, Sample, SampleIter};

use super::dataset::SharedDataset;

/// A distributed partition: of the full index range, every
/// `world_size`-th index starting at `rank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    rank: usize,
    world_size: usize,
}

impl Shard {
    pub fn new(rank: usize, world_size: usize) -> Result<Self> {
        if world_size == 0 {
            return Err(PipewrightError::invalid_param(
                "Shard",
                "world_size",
                "must be at least 1",
            ));
        }
        if rank >= world_size {
            return Err(PipewrightError::invalid_param(
                "Shard",
                "rank",
                format!("must be below world_size ({world_size}), got {rank}"),
            ));
        }
        Ok(Self { rank, world_size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }
}

/// The process's position in a multi-process run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldInfo {
    pub rank: usize,
    pub world_size: usize,
}

impl WorldInfo {
    pub fn new(rank: usize, world_size: usize) -> Self {
        Self { rank, world_size }
    }

    /// A single-process world.
    pub fn solo() -> Self {
        Self::new(0, 1)
    }

    /// Read `RANK` and `WORLD_SIZE` from the environment, defaulting to
    /// a single-process world where unset.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rank: read_env_usize("RANK", 0)?,
            world_size: read_env_usize("WORLD_SIZE", 1)?,
        })
    }

    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    /// This process's shard. Fails when the pair is inconsistent.
    pub fn shard(&self) -> Result<Shard> {
        Shard::new(self.rank, self.world_size)
    }
}

/// Serializes tests that read or write `RANK` / `WORLD_SIZE`; the
/// process environment is shared across the whole test binary.
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    use once_cell::sync::Lazy;
    use std::sync::Mutex;
    static LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_env_usize(name: &'static str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| {
            PipewrightError::invalid_param(
                "environment",
                name,
                format!("expected an unsigned integer, got '{raw}'"),
            )
        }),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => Err(PipewrightError::invalid_param(
            "environment",
            name,
            "not valid unicode",
        )),
    }
}

/// A re-iterable batching view over a dataset.
#[derive(Debug, Clone)]
pub struct Loader {
    dataset: SharedDataset,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
    shard: Option<Shard>,
}

impl Loader {
    /// Batch size 1, sequential order, full dataset.
    pub fn new(dataset: SharedDataset) -> Self {
        Self {
            dataset,
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            seed: None,
            shard: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        debug_assert!(batch_size >= 1, "batch_size must be at least 1");
        self.batch_size = batch_size;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn shard(mut self, shard: Shard) -> Self {
        self.shard = Some(shard);
        self
    }

    /// Samples in this loader's shard.
    pub fn num_samples(&self) -> usize {
        match self.shard {
            Some(shard) => self
                .dataset
                .len()
                .saturating_sub(shard.rank)
                .div_ceil(shard.world_size),
            None => self.dataset.len(),
        }
    }

    /// Batches per pass.
    pub fn num_batches(&self) -> usize {
        let samples = self.num_samples();
        if self.drop_last {
            samples / self.batch_size
        } else {
            samples.div_ceil(self.batch_size)
        }
    }

    /// Index order for one pass: shard, then optional shuffle.
    fn pass_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = match self.shard {
            Some(shard) => (shard.rank..self.dataset.len())
                .step_by(shard.world_size)
                .collect(),
            None => (0..self.dataset.len()).collect(),
        };
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }
        indices
    }
}

impl DataPipe for Loader {
    fn iter(&self) -> SampleIter<'_> {
        let indices = self.pass_indices();
        let mut cursor = 0;
        Box::new(std::iter::from_fn(move || {
            if cursor >= indices.len() {
                return None;
            }
            let end = (cursor + self.batch_size).min(indices.len());
            if self.drop_last && end - cursor < self.batch_size {
                return None;
            }
            let batch: Vec<Sample> = indices[cursor..end]
                .iter()
                .filter_map(|&index| self.dataset.get(index))
                .collect();
            cursor = end;
            Some(Value::Array(batch))
        }))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.num_batches())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;
    use crate::pipes::collect_samples;
    use serde_json::json;
    use std::sync::Arc;

    fn dataset(n: usize) -> SharedDataset {
        Arc::new(InMemoryDataset::new((0..n).map(|i| json!(i)).collect()))
    }

    #[test]
    fn test_sequential_batches() {
        let loader = Loader::new(dataset(5)).batch_size(2);
        assert_eq!(loader.num_batches(), 3);
        assert_eq!(
            collect_samples(&loader),
            vec![json!([0, 1]), json!([2, 3]), json!([4])]
        );
    }

    #[test]
    fn test_drop_last() {
        let loader = Loader::new(dataset(5)).batch_size(2).drop_last(true);
        assert_eq!(loader.num_batches(), 2);
        assert_eq!(collect_samples(&loader), vec![json!([0, 1]), json!([2, 3])]);
    }

    #[test]
    fn test_reiteration_yields_same_batches() {
        let loader = Loader::new(dataset(4)).batch_size(2);
        assert_eq!(collect_samples(&loader), collect_samples(&loader));
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let loader = Loader::new(dataset(20)).batch_size(4).shuffle(true).seed(7);
        let first = collect_samples(&loader);
        let second = collect_samples(&loader);
        assert_eq!(first, second);

        let mut flat: Vec<i64> = first
            .iter()
            .flat_map(|batch| batch.as_array().unwrap().iter())
            .map(|v| v.as_i64().unwrap())
            .collect();
        flat.sort_unstable();
        assert_eq!(flat, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn test_different_seeds_differ() {
        let data = dataset(50);
        let a = collect_samples(&Loader::new(Arc::clone(&data)).shuffle(true).seed(1));
        let b = collect_samples(&Loader::new(data).shuffle(true).seed(2));
        assert_ne!(a, b);
    }

    #[test]
    fn test_shards_partition_dataset() {
        let data = dataset(5);
        let rank0 = Loader::new(Arc::clone(&data)).shard(Shard::new(0, 2).unwrap());
        let rank1 = Loader::new(data).shard(Shard::new(1, 2).unwrap());

        assert_eq!(rank0.num_samples(), 3);
        assert_eq!(rank1.num_samples(), 2);
        assert_eq!(
            collect_samples(&rank0),
            vec![json!([0]), json!([2]), json!([4])]
        );
        assert_eq!(collect_samples(&rank1), vec![json!([1]), json!([3])]);
    }

    #[test]
    fn test_shard_validation() {
        assert!(Shard::new(0, 0).is_err());
        assert!(Shard::new(2, 2).is_err());
        assert!(Shard::new(1, 2).is_ok());
    }

    #[test]
    fn test_world_info_solo_and_shard() {
        let world = WorldInfo::solo();
        assert!(!world.is_distributed());
        let shard = world.shard().unwrap();
        assert_eq!((shard.rank(), shard.world_size()), (0, 1));
    }

    #[test]
    fn test_world_info_from_env() {
        let _guard = env_guard();
        std::env::set_var("RANK", "1");
        std::env::set_var("WORLD_SIZE", "4");
        let world = WorldInfo::from_env().unwrap();
        assert_eq!((world.rank, world.world_size), (1, 4));
        assert!(world.is_distributed());

        std::env::set_var("RANK", "one");
        let err = WorldInfo::from_env().unwrap_err();
        assert!(err.to_string().contains("RANK"));

        std::env::remove_var("RANK");
        std::env::remove_var("WORLD_SIZE");
        let world = WorldInfo::from_env().unwrap();
        assert_eq!((world.rank, world.world_size), (0, 1));
    }

    #[test]
    fn test_loader_len_hint_matches_batches() {
        let loader = Loader::new(dataset(7)).batch_size(3);
        assert_eq!(loader.len_hint(), Some(3));
        assert_eq!(loader.iter().count(), 3);
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let loader = Loader::new(dataset(0)).batch_size(2);
        assert_eq!(loader.num_batches(), 0);
        assert!(collect_samples(&loader).is_empty());
    }
}
