//! Indexable sample collections.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{json_type_name, StageDescriptor};
use crate::errors::{PipewrightError, Result};
use crate::pipes::Sample;
use crate::registry::{Params, Registry};

/// Random access over a fixed collection of samples.
///
/// `get` returns an owned sample so implementations are free to
/// materialize lazily; indexes at or past [`len`](Dataset::len) return
/// `None`.
pub trait Dataset: std::fmt::Debug + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<Sample>;
}

/// Shared handle, cloned freely across loaders and splits.
pub type SharedDataset = Arc<dyn Dataset>;

/// A dataset over a sample vector.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    samples: Vec<Sample>,
}

impl InMemoryDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<SharedDataset>,
    ) -> Result<SharedDataset> {
        let samples: Vec<Sample> = params.require("data")?;
        params.finish()?;
        Ok(Arc::new(Self::new(samples)))
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }
}

/// Resolve a dataset configuration.
///
/// A mapping whose `kind` is a string is a descriptor and goes through
/// the registry's dataset table; a bare sequence becomes an
/// [`InMemoryDataset`] over its elements.
pub fn setup_dataset(registry: &Registry, value: &Value) -> Result<SharedDataset> {
    if StageDescriptor::is_descriptor_shaped(value) {
        let descriptor = StageDescriptor::from_value(value)?;
        #[cfg(feature = "tracing")]
        tracing::info!(kind = %descriptor.kind, "setting up dataset");
        return registry.build_dataset(&descriptor);
    }
    match value {
        Value::Array(samples) => Ok(Arc::new(InMemoryDataset::new(samples.clone()))),
        other => Err(PipewrightError::invalid_descriptor(format!(
            "dataset configuration must be a descriptor or a sequence of samples, got {}",
            json_type_name(other)
        ))),
    }
}
