//! Sample transforms and the compose factory.
//!
//! Transforms are total functions over samples: all parameter validation
//! happens while the transform is being constructed, and `apply` leaves
//! any sample it does not understand unchanged. This keeps iteration
//! infallible (see the [`pipes`](crate::pipes) contract).
//!
//! # JSON shape
//!
//! ```json
//! {
//!   "kind": "Compose",
//!   "transforms": [
//!     { "kind": "Rename", "from": "raw", "to": "value" },
//!     { "kind": "Scale", "factor": 0.5 }
//!   ]
//! }
//! ```

use std::fmt;

use serde_json::Value;

use crate::config::StageDescriptor;
use crate::errors::Result;
use crate::pipes::Sample;
use crate::registry::{Params, Registry};

/// A per-sample transformation.
pub trait Transform: fmt::Debug + Send + Sync {
    /// Transform one sample.
    fn apply(&self, sample: Sample) -> Sample;
}

/// An owned transform, as produced by the transforms table.
pub type BoxedTransform = Box<dyn Transform>;

/// Applies a list of transforms in order.
#[derive(Debug)]
pub struct Compose {
    transforms: Vec<BoxedTransform>,
}

impl Compose {
    /// Compose transforms; an empty list is the identity.
    pub fn new(transforms: Vec<BoxedTransform>) -> Self {
        Self { transforms }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedTransform>,
    ) -> Result<BoxedTransform> {
        let transforms = match params.take_built_seq("transforms")? {
            Some(transforms) => transforms,
            None => return Err(params.invalid("transforms", "missing required parameter")),
        };
        params.finish()?;
        Ok(Box::new(Self::new(transforms)))
    }
}

impl Transform for Compose {
    fn apply(&self, sample: Sample) -> Sample {
        self.transforms
            .iter()
            .fold(sample, |sample, transform| transform.apply(sample))
    }
}

/// Build a [`Compose`] from a sequence of transform descriptors.
pub fn create_compose(registry: &Registry, specs: &[Value]) -> Result<Compose> {
    let transforms = specs
        .iter()
        .map(|spec| registry.build_transform(&StageDescriptor::from_value(spec)?))
        .collect::<Result<Vec<_>>>()?;
    Ok(Compose::new(transforms))
}

/// Multiplies numeric samples by a factor, recursing into sequences.
/// Non-numeric samples pass through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    factor: f64,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedTransform>,
    ) -> Result<BoxedTransform> {
        let factor: f64 = params.require("factor")?;
        params.finish()?;
        Ok(Box::new(Self::new(factor)))
    }

    fn scale(&self, value: Value) -> Value {
        match value {
            Value::Number(number) => number
                .as_f64()
                .and_then(|n| serde_json::Number::from_f64(n * self.factor))
                .map_or(Value::Null, Value::Number),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.scale(item)).collect())
            }
            other => other,
        }
    }
}

impl Transform for Scale {
    fn apply(&self, sample: Sample) -> Sample {
        self.scale(sample)
    }
}

/// Projects a mapping sample down to the value under one key (missing
/// key → null). Non-mapping samples pass through unchanged.
#[derive(Debug, Clone)]
pub struct Select {
    key: String,
}

impl Select {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedTransform>,
    ) -> Result<BoxedTransform> {
        let key: String = params.require("key")?;
        params.finish()?;
        Ok(Box::new(Self::new(key)))
    }
}

impl Transform for Select {
    fn apply(&self, sample: Sample) -> Sample {
        match sample {
            Value::Object(mut object) => object.remove(&self.key).unwrap_or(Value::Null),
            other => other,
        }
    }
}

/// Renames one key of a mapping sample. Samples without the key (and
/// non-mapping samples) pass through unchanged.
#[derive(Debug, Clone)]
pub struct Rename {
    from: String,
    to: String,
}

impl Rename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedTransform>,
    ) -> Result<BoxedTransform> {
        let from: String = params.require("from")?;
        let to: String = params.require("to")?;
        params.finish()?;
        Ok(Box::new(Self::new(from, to)))
    }
}

impl Transform for Rename {
    fn apply(&self, sample: Sample) -> Sample {
        match sample {
            Value::Object(mut object) => {
                if let Some(value) = object.remove(&self.from) {
                    object.insert(self.to.clone(), value);
                }
                Value::Object(object)
            }
            other => other,
        }
    }
}
