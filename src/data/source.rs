//! Named dataset splits with per-split loader construction.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::creators::{AutoLoaderCreator, BoxedLoaderCreator};
use crate::errors::{PipewrightError, Result};
use crate::registry::Registry;

use super::dataset::SharedDataset;
use super::loader::Loader;

/// Conventional split names.
pub const TRAIN: &str = "train";
pub const EVAL: &str = "eval";

#[derive(Debug)]
struct Split {
    dataset: SharedDataset,
    creator: BoxedLoaderCreator,
}

/// Datasets grouped by split name, each paired with the loader creator
/// that turns it into batches.
///
/// Splits are arbitrary names; [`TRAIN`] and [`EVAL`] are the
/// conventional ones. A split registered without a creator gets the
/// default [`AutoLoaderCreator`].
#[derive(Debug, Default)]
pub struct DatasetSource {
    splits: FxHashMap<String, Split>,
}

impl DatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `split` with an explicit loader creator. Registering a
    /// name again replaces the earlier entry.
    pub fn with_split(
        mut self,
        split: impl Into<String>,
        dataset: SharedDataset,
        creator: BoxedLoaderCreator,
    ) -> Self {
        self.splits.insert(split.into(), Split { dataset, creator });
        self
    }

    /// Register `split` with the default auto loader creator.
    pub fn with_dataset(self, split: impl Into<String>, dataset: SharedDataset) -> Self {
        self.with_split(split, dataset, Box::new(AutoLoaderCreator::new()))
    }

    pub fn has_split(&self, split: &str) -> bool {
        self.splits.contains_key(split)
    }

    /// Registered split names, sorted.
    pub fn splits(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.splits.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The dataset behind `split`.
    pub fn dataset(&self, split: &str) -> Result<SharedDataset> {
        Ok(Arc::clone(&self.get(split)?.dataset))
    }

    /// Build `split`'s loader through its creator.
    pub fn loader(&self, registry: &Registry, split: &str) -> Result<Loader> {
        let entry = self.get(split)?;
        entry.creator.create(registry, Arc::clone(&entry.dataset))
    }

    fn get(&self, split: &str) -> Result<&Split> {
        self.splits.get(split).ok_or_else(|| {
            PipewrightError::unsupported(format!(
                "unknown split '{split}'; known splits: [{}]",
                self.splits().join(", ")
            ))
        })
    }
}
