//! # pipewright
//!
//! Declarative construction of sequential data pipelines.
//!
//! This library turns JSON configurations into running pipelines: stage
//! descriptors name a registered kind, a registry of factory tables
//! resolves nested descriptors recursively, and a builder threads a
//! sequence of stages into a single re-iterable pipe.
//!
//! ## Features
//!
//! - **Declarative**: pipelines are plain JSON values; configurations
//!   are copied, never mutated, and can be built repeatedly
//! - **Extensible**: every constructible family (stages, transforms,
//!   datasets, creators) has its own registration table; custom kinds
//!   register as closures
//! - **Typed failures**: unknown kinds, empty configurations, and bad
//!   parameters each carry their own error variant
//! - **Loader integration**: batching dataset loaders implement the
//!   pipe contract and splice straight into pipelines

pub mod builder;
pub mod config;
pub mod creators;
pub mod data;
pub mod errors;
pub mod pipes;
pub mod registry;
pub mod transforms;

// Re-export commonly used types
pub use errors::{PipewrightError, Result};

// Configuration and construction
pub use builder::{build_pipeline, build_pipeline_from_value};
pub use config::{PipelineConfig, StageDescriptor, KIND_KEY};
pub use registry::{Arg, Factory, Params, Registry, StageFactory};

// Pipes and transforms
pub use pipes::{
    collect_samples, Batcher, BoxedPipe, Concater, DataPipe, DictBatcher, Mapper, Multiplexer,
    Sample, SampleIter, SharedPipe, Shuffler, SourceWrapper, Zipper,
};
pub use transforms::{BoxedTransform, Compose, Rename, Scale, Select, Transform};

// Datasets and loaders
pub use data::{
    setup_dataset, DataCreator, Dataset, DatasetSource, InMemoryDataset, Loader, Shard,
    SharedDataset, StaticDataCreator, WorldInfo, EVAL, TRAIN,
};

// Creator adapters
pub use creators::{
    setup_flow_creator, setup_loader_creator, setup_pipe_creator, AutoLoaderCreator,
    DictBatcherPipeCreator, DistributedLoaderCreator, FlowCreator, IterableFlowCreator,
    LoaderCreator, LoaderFlowCreator, PipeCreator, SequentialPipeCreator, VanillaLoaderCreator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
