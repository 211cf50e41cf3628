//! Per-sample transformation.

use serde_json::Value;

use crate::config::StageDescriptor;
use crate::errors::Result;
use crate::pipes::{take_source, BoxedPipe, DataPipe, SampleIter};
use crate::registry::{Params, Registry};
use crate::transforms::{create_compose, BoxedTransform};

/// Applies a transform to every upstream sample.
///
/// The `transform` parameter is resolved against the transforms table: a
/// single transform descriptor, or a sequence of descriptors applied in
/// order (composed).
#[derive(Debug)]
pub struct Mapper {
    source: BoxedPipe,
    transform: BoxedTransform,
}

impl Mapper {
    pub fn new(source: BoxedPipe, transform: BoxedTransform) -> Self {
        Self { source, transform }
    }

    pub(crate) fn from_config(
        registry: &Registry,
        mut params: Params<BoxedPipe>,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        let source = take_source(&mut params, inputs)?;
        let transform = match params.take_raw("transform")? {
            Some(Value::Array(specs)) => {
                Box::new(create_compose(registry, &specs)?) as BoxedTransform
            }
            Some(value) => registry.build_transform(&StageDescriptor::from_value(&value)?)?,
            None => return Err(params.invalid("transform", "missing required parameter")),
        };
        params.finish()?;
        Ok(Box::new(Self::new(source, transform)))
    }
}

impl DataPipe for Mapper {
    fn iter(&self) -> SampleIter<'_> {
        let transform = &self.transform;
        Box::new(self.source.iter().map(move |sample| transform.apply(sample)))
    }

    fn len_hint(&self) -> Option<usize> {
        self.source.len_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{collect_samples, SourceWrapper};
    use crate::transforms::Scale;
    use serde_json::json;

    fn source(samples: Vec<Value>) -> BoxedPipe {
        Box::new(SourceWrapper::from_samples(samples))
    }

    #[test]
    fn test_mapper_applies_transform() {
        let pipe = Mapper::new(
            source(vec![json!(1), json!(2), json!(3)]),
            Box::new(Scale::new(2.0)),
        );
        assert_eq!(
            collect_samples(&pipe),
            vec![json!(2.0), json!(4.0), json!(6.0)]
        );
    }

    #[test]
    fn test_mapper_len_hint_passthrough() {
        let pipe = Mapper::new(source(vec![json!(1)]), Box::new(Scale::new(1.0)));
        assert_eq!(pipe.len_hint(), Some(1));
    }
}
