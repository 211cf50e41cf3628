//! Creator adapters: stored configuration in, built object out.
//!
//! A creator is constructed once from a descriptor and can then build
//! its target any number of times. Each family follows the same
//! pattern: a trait, an `is_*_creator_config` shape check, and a
//! `setup_*_creator` function resolving a configuration through the
//! registry.

pub mod flow;
pub mod loader;
pub mod pipe;

pub use flow::{
    is_flow_creator_config, setup_flow_creator, BoxedFlowCreator, FlowCreator,
    IterableFlowCreator, LoaderFlowCreator,
};
pub use loader::{
    is_loader_creator_config, setup_loader_creator, AutoLoaderCreator, BoxedLoaderCreator,
    DistributedLoaderCreator, LoaderCreator, VanillaLoaderCreator,
};
pub use pipe::{
    is_pipe_creator_config, setup_pipe_creator, BoxedPipeCreator, DictBatcherPipeCreator,
    PipeCreator, SequentialPipeCreator,
};
