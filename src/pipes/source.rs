//! Source stage: the entry point of most pipelines.

use crate::errors::Result;
use crate::pipes::{BoxedPipe, DataPipe, Sample, SampleIter};
use crate::registry::{Params, Registry};

/// Wraps a literal sample vector, or passes an upstream pipe through.
///
/// As a descriptor, `SourceWrapper` takes either a `data` parameter (a
/// JSON array of samples) or exactly one positional upstream pipe;
/// supplying both is an error. Samples are copied at construction, so
/// later mutation of the originating configuration never shows up in the
/// stream.
#[derive(Debug)]
pub struct SourceWrapper {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    Samples(Vec<Sample>),
    Upstream(BoxedPipe),
}

impl SourceWrapper {
    /// Wrap a literal sample vector.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self {
            inner: Inner::Samples(samples),
        }
    }

    /// Pass an upstream pipe through unchanged.
    pub fn from_pipe(pipe: BoxedPipe) -> Self {
        Self {
            inner: Inner::Upstream(pipe),
        }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let mut inputs = inputs;
        let data: Option<Vec<Sample>> = params.take("data")?;
        let wrapper = match data {
            Some(_) if !inputs.is_empty() => {
                return Err(params.invalid(
                    "data",
                    "got both a 'data' parameter and a positional input",
                ))
            }
            Some(samples) => Self::from_samples(samples),
            None if inputs.len() == 1 => Self::from_pipe(inputs.remove(0)),
            None => {
                return Err(params.invalid(
                    "data",
                    format!(
                        "expected a 'data' parameter or exactly one upstream pipe, got {} pipes",
                        inputs.len()
                    ),
                ))
            }
        };
        params.finish()?;
        Ok(Box::new(wrapper))
    }
}

impl DataPipe for SourceWrapper {
    fn iter(&self) -> SampleIter<'_> {
        match &self.inner {
            Inner::Samples(samples) => Box::new(samples.iter().cloned()),
            Inner::Upstream(pipe) => pipe.iter(),
        }
    }

    fn len_hint(&self) -> Option<usize> {
        match &self.inner {
            Inner::Samples(samples) => Some(samples.len()),
            Inner::Upstream(pipe) => pipe.len_hint(),
        }
    }
}
