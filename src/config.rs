//! Stage descriptors and pipeline configurations.
//!
//! A [`StageDescriptor`] is a JSON mapping with one reserved key,
//! [`KIND_KEY`], naming the registered kind to construct; every other key
//! is passed to the factory as a named parameter. A [`PipelineConfig`] is
//! either a single descriptor or an ordered sequence of descriptors that
//! the builder chains head to tail.
//!
//! Parsing never mutates the caller's value: descriptors copy the keys
//! they consume, so the same configuration can be built any number of
//! times.
//!
//! # JSON shape
//!
//! ```json
//! [
//!   { "kind": "SourceWrapper", "data": [1, 2, 3, 4] },
//!   { "kind": "Batcher", "batch_size": 2 }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PipewrightError, Result};

/// Reserved descriptor key naming the kind of object to construct.
pub const KIND_KEY: &str = "kind";

/// A single stage descriptor.
///
/// The `kind` field holds the registered identifier; `params` holds every
/// remaining key of the source mapping, in order, to be interpreted by
/// the kind's factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Registered identifier of the object to construct.
    pub kind: String,

    /// All non-reserved keys of the mapping, passed to the factory by name.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl StageDescriptor {
    /// Create a descriptor with no parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    /// Add a named parameter (builder style).
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Parse a descriptor out of a JSON mapping.
    ///
    /// The mapping is copied before the reserved key is split off, so the
    /// caller's map is left untouched. Fails with
    /// [`PipewrightError::InvalidDescriptor`] when the reserved key is
    /// missing or not a string.
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let mut params = object.clone();
        match params.remove(KIND_KEY) {
            Some(Value::String(kind)) => Ok(Self { kind, params }),
            Some(other) => Err(PipewrightError::invalid_descriptor(format!(
                "reserved key '{KIND_KEY}' must be a string, got {}",
                json_type_name(&other)
            ))),
            None => Err(PipewrightError::invalid_descriptor(format!(
                "missing reserved key '{KIND_KEY}'"
            ))),
        }
    }

    /// Parse a descriptor out of any JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) => Self::from_object(object),
            other => Err(PipewrightError::invalid_descriptor(format!(
                "expected a mapping with a '{KIND_KEY}' key, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// Returns `true` if `value` has the shape of a descriptor: a mapping
    /// whose reserved key is a string.
    ///
    /// Shape only; whether the kind is actually registered is decided by
    /// the table the descriptor is resolved against.
    pub fn is_descriptor_shaped(value: &Value) -> bool {
        matches!(value, Value::Object(object) if matches!(object.get(KIND_KEY), Some(Value::String(_))))
    }

    /// Render the descriptor back to its JSON mapping form.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.params.len() + 1);
        object.insert(KIND_KEY.to_string(), Value::String(self.kind.clone()));
        for (name, value) in &self.params {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// An ordered pipeline configuration.
///
/// Deserializes untagged: a JSON mapping becomes [`Stage`], a JSON
/// sequence becomes [`Chain`]. Use [`PipelineConfig::from_value`] when
/// typed errors for empty or malformed input are needed.
///
/// [`Stage`]: PipelineConfig::Stage
/// [`Chain`]: PipelineConfig::Chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineConfig {
    /// One stage, constructed directly from the caller's source inputs.
    Stage(StageDescriptor),

    /// A chain of stages. The first receives the caller's source inputs;
    /// each subsequent stage receives exactly the previous stage as its
    /// sole input; the last stage is the one returned.
    Chain(Vec<StageDescriptor>),
}

impl PipelineConfig {
    /// Parse a configuration out of any JSON value.
    ///
    /// Empty input (`{}` or `[]`) fails with
    /// [`PipewrightError::EmptyConfig`] so that callers learn about a
    /// vacuous configuration before any factory runs.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) if object.is_empty() => Err(PipewrightError::empty_config(
                "stage configuration is empty",
            )),
            Value::Object(object) => Ok(Self::Stage(StageDescriptor::from_object(object)?)),
            Value::Array(items) if items.is_empty() => {
                Err(PipewrightError::empty_config("stage sequence is empty"))
            }
            Value::Array(items) => {
                let stages = items
                    .iter()
                    .map(StageDescriptor::from_value)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Chain(stages))
            }
            other => Err(PipewrightError::invalid_descriptor(format!(
                "expected a mapping or a sequence of mappings, got {}",
                json_type_name(other)
            ))),
        }
    }

    /// The descriptors in build order.
    pub fn stages(&self) -> &[StageDescriptor] {
        match self {
            Self::Stage(descriptor) => std::slice::from_ref(descriptor),
            Self::Chain(descriptors) => descriptors,
        }
    }

    /// Number of stages described.
    pub fn len(&self) -> usize {
        self.stages().len()
    }

    /// `true` when no stages are described (only possible for a
    /// hand-built empty [`Chain`](Self::Chain)).
    pub fn is_empty(&self) -> bool {
        self.stages().is_empty()
    }
}

/// Human-readable name of a JSON value's type, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
