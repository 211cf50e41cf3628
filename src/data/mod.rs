//! Datasets, loaders, and the data-creation seam.
//!
//! Pipes stream; datasets index. This module holds the indexed side of
//! the crate: the [`Dataset`] trait and its in-memory implementation,
//! the batching [`Loader`] view (which implements
//! [`DataPipe`](crate::pipes::DataPipe) so loaders splice straight into
//! pipelines), distributed partitioning via [`Shard`] / [`WorldInfo`],
//! data creators, and named split management in [`DatasetSource`].

pub mod creator;
pub mod dataset;
pub mod loader;
pub mod source;

pub use creator::{setup_data_creator, BoxedDataCreator, DataCreator, StaticDataCreator};
pub use dataset::{setup_dataset, Dataset, InMemoryDataset, SharedDataset};
pub use loader::{Loader, Shard, WorldInfo};
pub use source::{DatasetSource, EVAL, TRAIN};
