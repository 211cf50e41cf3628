//! Loader creators: configuration plus dataset in, loader out.
//!
//! Three built-ins cover the single- and multi-process cases. The
//! vanilla creator ignores process topology; the distributed creator
//! shards by an explicit or environment-derived [`WorldInfo`]; the auto
//! creator picks between the two by world size, which is how callers
//! get sensible behavior without caring where they run.

use std::fmt;

use serde_json::Value;

use crate::config::StageDescriptor;
use crate::data::{Loader, SharedDataset, WorldInfo};
use crate::errors::Result;
use crate::registry::{Params, Registry};

pub trait LoaderCreator: fmt::Debug + Send + Sync {
    fn create(&self, registry: &Registry, dataset: SharedDataset) -> Result<Loader>;
}

pub type BoxedLoaderCreator = Box<dyn LoaderCreator>;

/// `true` when `value` is a descriptor for a registered loader creator.
pub fn is_loader_creator_config(registry: &Registry, value: &Value) -> bool {
    StageDescriptor::from_value(value)
        .map_or(false, |descriptor| registry.has_loader_creator(&descriptor.kind))
}

/// Resolve a loader-creator configuration through the registry.
pub fn setup_loader_creator(registry: &Registry, value: &Value) -> Result<BoxedLoaderCreator> {
    let descriptor = StageDescriptor::from_value(value)?;
    #[cfg(feature = "tracing")]
    tracing::info!(kind = %descriptor.kind, "setting up loader creator");
    registry.build_loader_creator(&descriptor)
}

/// The batching knobs shared by every loader creator.
fn loader_params(params: &mut Params<BoxedLoaderCreator>) -> Result<VanillaLoaderCreator> {
    let batch_size: usize = params.take("batch_size")?.unwrap_or(1);
    if batch_size == 0 {
        return Err(params.invalid("batch_size", "must be at least 1"));
    }
    Ok(VanillaLoaderCreator {
        batch_size,
        shuffle: params.take("shuffle")?.unwrap_or(false),
        drop_last: params.take("drop_last")?.unwrap_or(false),
        seed: params.take("seed")?,
    })
}

/// An explicit `rank` / `world_size` pair, when the configuration gives
/// one. Both or neither; one alone is a mistake.
fn world_params(params: &mut Params<BoxedLoaderCreator>) -> Result<Option<WorldInfo>> {
    let rank = params.take::<usize>("rank")?;
    let world_size = params.take::<usize>("world_size")?;
    match (rank, world_size) {
        (None, None) => Ok(None),
        (Some(rank), Some(world_size)) => Ok(Some(WorldInfo::new(rank, world_size))),
        (Some(_), None) => Err(params.invalid("world_size", "required when 'rank' is given")),
        (None, Some(_)) => Err(params.invalid("rank", "required when 'world_size' is given")),
    }
}

// ─── Vanilla ────────────────────────────────────────────────────────────────

/// Plain single-process loaders.
#[derive(Debug, Clone)]
pub struct VanillaLoaderCreator {
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: Option<u64>,
}

impl VanillaLoaderCreator {
    pub fn new() -> Self {
        Self {
            batch_size: 1,
            shuffle: false,
            drop_last: false,
            seed: None,
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

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedLoaderCreator>,
    ) -> Result<BoxedLoaderCreator> {
        let creator = loader_params(&mut params)?;
        params.finish()?;
        Ok(Box::new(creator))
    }

    fn apply(&self, dataset: SharedDataset) -> Loader {
        let mut loader = Loader::new(dataset)
            .batch_size(self.batch_size)
            .shuffle(self.shuffle)
            .drop_last(self.drop_last);
        if let Some(seed) = self.seed {
            loader = loader.seed(seed);
        }
        loader
    }
}

impl Default for VanillaLoaderCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderCreator for VanillaLoaderCreator {
    fn create(&self, _registry: &Registry, dataset: SharedDataset) -> Result<Loader> {
        Ok(self.apply(dataset))
    }
}

// ─── Distributed ────────────────────────────────────────────────────────────

/// Sharded loaders for multi-process runs.
///
/// Without an explicit world, `RANK` / `WORLD_SIZE` are read from the
/// environment at creation time.
#[derive(Debug, Clone)]
pub struct DistributedLoaderCreator {
    vanilla: VanillaLoaderCreator,
    world: Option<WorldInfo>,
}

impl DistributedLoaderCreator {
    pub fn new() -> Self {
        Self {
            vanilla: VanillaLoaderCreator::new(),
            world: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.vanilla = self.vanilla.batch_size(batch_size);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.vanilla = self.vanilla.shuffle(shuffle);
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.vanilla = self.vanilla.drop_last(drop_last);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.vanilla = self.vanilla.seed(seed);
        self
    }

    pub fn world(mut self, world: WorldInfo) -> Self {
        self.world = Some(world);
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedLoaderCreator>,
    ) -> Result<BoxedLoaderCreator> {
        let vanilla = loader_params(&mut params)?;
        let world = world_params(&mut params)?;
        params.finish()?;
        Ok(Box::new(Self { vanilla, world }))
    }
}

impl Default for DistributedLoaderCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderCreator for DistributedLoaderCreator {
    fn create(&self, _registry: &Registry, dataset: SharedDataset) -> Result<Loader> {
        let world = match self.world {
            Some(world) => world,
            None => WorldInfo::from_env()?,
        };
        Ok(self.vanilla.apply(dataset).shard(world.shard()?))
    }
}

// ─── Auto ───────────────────────────────────────────────────────────────────

/// Distributed when the world size exceeds one, vanilla otherwise.
#[derive(Debug, Clone)]
pub struct AutoLoaderCreator {
    vanilla: VanillaLoaderCreator,
    world: Option<WorldInfo>,
}

impl AutoLoaderCreator {
    pub fn new() -> Self {
        Self {
            vanilla: VanillaLoaderCreator::new(),
            world: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.vanilla = self.vanilla.batch_size(batch_size);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.vanilla = self.vanilla.shuffle(shuffle);
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.vanilla = self.vanilla.drop_last(drop_last);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.vanilla = self.vanilla.seed(seed);
        self
    }

    pub fn world(mut self, world: WorldInfo) -> Self {
        self.world = Some(world);
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedLoaderCreator>,
    ) -> Result<BoxedLoaderCreator> {
        let vanilla = loader_params(&mut params)?;
        let world = world_params(&mut params)?;
        params.finish()?;
        Ok(Box::new(Self { vanilla, world }))
    }
}

impl Default for AutoLoaderCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderCreator for AutoLoaderCreator {
    fn create(&self, _registry: &Registry, dataset: SharedDataset) -> Result<Loader> {
        let world = match self.world {
            Some(world) => world,
            None => WorldInfo::from_env()?,
        };
        if world.is_distributed() {
            Ok(self.vanilla.apply(dataset).shard(world.shard()?))
        } else {
            Ok(self.vanilla.apply(dataset))
        }
    }
}
