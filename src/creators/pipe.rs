//! Pipe creators: configuration plus upstream pipes in, pipe out.

use std::fmt;

use serde_json::Value;

use crate::builder::build_pipeline;
use crate::config::{json_type_name, PipelineConfig, StageDescriptor};
use crate::data::{setup_data_creator, BoxedDataCreator, StaticDataCreator};
use crate::errors::{PipewrightError, Result};
use crate::pipes::{BoxedPipe, DictBatcher};
use crate::registry::{Params, Registry};

pub trait PipeCreator: fmt::Debug + Send + Sync {
    /// Build the pipe, routing `source_inputs` as the configuration
    /// dictates.
    fn create(&self, registry: &Registry, source_inputs: Vec<BoxedPipe>) -> Result<BoxedPipe>;
}

pub type BoxedPipeCreator = Box<dyn PipeCreator>;

/// `true` when `value` is a descriptor for a registered pipe creator.
pub fn is_pipe_creator_config(registry: &Registry, value: &Value) -> bool {
    StageDescriptor::from_value(value)
        .map_or(false, |descriptor| registry.has_pipe_creator(&descriptor.kind))
}

/// Resolve a pipe-creator configuration through the registry.
pub fn setup_pipe_creator(registry: &Registry, value: &Value) -> Result<BoxedPipeCreator> {
    let descriptor = StageDescriptor::from_value(value)?;
    #[cfg(feature = "tracing")]
    tracing::info!(kind = %descriptor.kind, "setting up pipe creator");
    registry.build_pipe_creator(&descriptor)
}

// ─── Sequential ─────────────────────────────────────────────────────────────

/// Builds a sequential pipeline from a stored configuration.
///
/// The configuration is validated to be non-empty here; all stage
/// construction is deferred to [`create`](PipeCreator::create), where
/// the caller's source pipes feed the first stage.
#[derive(Debug, Clone)]
pub struct SequentialPipeCreator {
    config: PipelineConfig,
}

impl SequentialPipeCreator {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if config.is_empty() {
            return Err(PipewrightError::empty_config("pipeline has no stages"));
        }
        Ok(Self { config })
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipeCreator>,
    ) -> Result<BoxedPipeCreator> {
        let stages = match params.take_raw("stages")? {
            Some(stages) => stages,
            None => return Err(params.invalid("stages", "missing required parameter")),
        };
        params.finish()?;
        let config = PipelineConfig::from_value(&stages)?;
        Ok(Box::new(Self::new(config)?))
    }
}

impl PipeCreator for SequentialPipeCreator {
    fn create(&self, registry: &Registry, source_inputs: Vec<BoxedPipe>) -> Result<BoxedPipe> {
        build_pipeline(registry, &self.config, source_inputs)
    }
}

// ─── Dict batcher ───────────────────────────────────────────────────────────

/// Builds a [`DictBatcher`] over data produced by a data creator.
///
/// Configured with either `creator` (a data-creator descriptor) or
/// `data` (a literal mapping of columns), never both. Takes no upstream
/// pipes.
#[derive(Debug)]
pub struct DictBatcherPipeCreator {
    creator: BoxedDataCreator,
    batch_size: usize,
    shuffle: bool,
    seed: Option<u64>,
}

impl DictBatcherPipeCreator {
    pub fn new(creator: BoxedDataCreator, batch_size: usize) -> Self {
        Self {
            creator,
            batch_size,
            shuffle: false,
            seed: None,
        }
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn from_config(
        registry: &Registry,
        mut params: Params<BoxedPipeCreator>,
    ) -> Result<BoxedPipeCreator> {
        let creator_spec = params.take_raw("creator")?;
        let data_spec = params.take_raw("data")?;
        let batch_size: usize = params.require("batch_size")?;
        if batch_size == 0 {
            return Err(params.invalid("batch_size", "must be at least 1"));
        }
        let shuffle = params.take("shuffle")?.unwrap_or(false);
        let seed = params.take("seed")?;

        let creator: BoxedDataCreator = match (creator_spec, data_spec) {
            (Some(_), Some(_)) => {
                return Err(params.invalid("creator", "cannot be combined with 'data'"))
            }
            (Some(spec), None) => setup_data_creator(registry, &spec)?,
            (None, Some(data)) => Box::new(StaticDataCreator::new(data)),
            (None, None) => {
                return Err(params.invalid("creator", "either 'creator' or 'data' is required"))
            }
        };
        params.finish()?;

        let mut built = Self::new(creator, batch_size).shuffle(shuffle);
        if let Some(seed) = seed {
            built = built.seed(seed);
        }
        Ok(Box::new(built))
    }
}

impl PipeCreator for DictBatcherPipeCreator {
    fn create(&self, registry: &Registry, source_inputs: Vec<BoxedPipe>) -> Result<BoxedPipe> {
        if !source_inputs.is_empty() {
            return Err(PipewrightError::invalid_param(
                "DictBatcherPipeCreator",
                "inputs",
                format!("takes no upstream pipes, got {}", source_inputs.len()),
            ));
        }
        let data = self.creator.create(registry)?;
        let columns = match data {
            Value::Object(columns) => columns,
            other => {
                return Err(PipewrightError::invalid_param(
                    "DictBatcherPipeCreator",
                    "data",
                    format!("expected a mapping of columns, got {}", json_type_name(&other)),
                ))
            }
        };
        let mut pipe = DictBatcher::from_data(columns, self.batch_size).shuffle(self.shuffle);
        if let Some(seed) = self.seed {
            pipe = pipe.seed(seed);
        }
        Ok(Box::new(pipe))
    }
}
