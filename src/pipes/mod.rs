//! The pipe substrate: re-iterable sample streams.
//!
//! A [`DataPipe`] is a constructed pipeline stage. Stages are wired
//! together at construction time (by the registry and the sequential
//! builder) and hold their upstream pipes by ownership, so a pipeline is
//! a tree of stages with the sink at the root.
//!
//! # Contract
//!
//! - **Re-iterable**: every call to [`DataPipe::iter`] starts a fresh pass
//!   over the same logical stream. Stages must not exhaust themselves.
//! - **Infallible iteration**: everything that can fail does so while the
//!   stage is being constructed. Yielded samples are plain values.
//! - **Deterministic given construction**: a seeded stage produces the
//!   same order on every pass; only explicitly unseeded shuffling draws
//!   fresh entropy per pass.

use std::fmt;
use std::sync::Arc;

mod batch;
mod combine;
mod map;
mod shuffle;
mod source;

pub use batch::{Batcher, DictBatcher};
pub use combine::{Concater, Multiplexer, Zipper};
pub use map::Mapper;
pub use shuffle::{Shuffler, DEFAULT_BUFFER_SIZE};
pub use source::SourceWrapper;

use crate::errors::Result;
use crate::registry::Params;

/// The unit of data flowing through pipes.
pub type Sample = serde_json::Value;

/// One pass over a pipe's samples.
pub type SampleIter<'a> = Box<dyn Iterator<Item = Sample> + 'a>;

/// A constructed pipeline stage.
pub trait DataPipe: fmt::Debug + Send + Sync {
    /// Start a fresh pass over the stream.
    fn iter(&self) -> SampleIter<'_>;

    /// Number of samples a pass will yield, when cheaply known.
    fn len_hint(&self) -> Option<usize> {
        None
    }
}

/// An owned stage, as produced by factories and the builder.
pub type BoxedPipe = Box<dyn DataPipe>;

impl<P: DataPipe + ?Sized> DataPipe for Box<P> {
    fn iter(&self) -> SampleIter<'_> {
        (**self).iter()
    }

    fn len_hint(&self) -> Option<usize> {
        (**self).len_hint()
    }
}

/// A cheaply clonable handle to a stage, for pipes handed out more than
/// once (cached flows, datasets spliced into several pipelines).
#[derive(Debug, Clone)]
pub struct SharedPipe(Arc<dyn DataPipe>);

impl SharedPipe {
    /// Wrap an owned stage in a shared handle.
    pub fn new(pipe: BoxedPipe) -> Self {
        Self(Arc::from(pipe))
    }
}

impl DataPipe for SharedPipe {
    fn iter(&self) -> SampleIter<'_> {
        self.0.iter()
    }

    fn len_hint(&self) -> Option<usize> {
        self.0.len_hint()
    }
}

/// Drain one full pass of a pipe into a vector.
pub fn collect_samples(pipe: &dyn DataPipe) -> Vec<Sample> {
    pipe.iter().collect()
}

// ─── Source resolution for stage factories ──────────────────────────────────

/// Resolve the single upstream pipe of a one-input stage.
///
/// The upstream arrives either positionally (chaining, source inputs) or
/// as a nested `source` descriptor parameter; exactly one of the two must
/// be present. Input counts are checked here, by the factory, not upfront
/// by the builder.
pub(crate) fn take_source(
    params: &mut Params<BoxedPipe>,
    inputs: Vec<BoxedPipe>,
) -> Result<BoxedPipe> {
    let mut inputs = inputs;
    match params.take_built("source")? {
        Some(_) if !inputs.is_empty() => Err(params.invalid(
            "source",
            "got both a positional input and a 'source' parameter",
        )),
        Some(pipe) => Ok(pipe),
        None if inputs.len() == 1 => Ok(inputs.remove(0)),
        None => Err(params.invalid(
            "inputs",
            format!("expected exactly one upstream pipe, got {}", inputs.len()),
        )),
    }
}

/// Resolve the upstream pipes of a multi-input stage.
///
/// Upstreams arrive either positionally or as a nested `sources` sequence
/// parameter; exactly one of the two must be present, and at least one
/// pipe is required.
pub(crate) fn take_sources(
    params: &mut Params<BoxedPipe>,
    inputs: Vec<BoxedPipe>,
) -> Result<Vec<BoxedPipe>> {
    match params.take_built_seq("sources")? {
        Some(_) if !inputs.is_empty() => Err(params.invalid(
            "sources",
            "got both positional inputs and a 'sources' parameter",
        )),
        Some(pipes) if pipes.is_empty() => {
            Err(params.invalid("sources", "expected at least one upstream pipe"))
        }
        Some(pipes) => Ok(pipes),
        None if !inputs.is_empty() => Ok(inputs),
        None => Err(params.invalid("inputs", "expected at least one upstream pipe")),
    }
}
