//! Data creators produce raw sample values on demand.
//!
//! This is the seam between configuration and data: anything that can
//! hand back a JSON value when asked (a literal, a generator, something
//! backed by a file) sits behind [`DataCreator`]. The dict-batcher pipe
//! creator consumes this seam for its column data.

use serde_json::Value;

use crate::config::StageDescriptor;
use crate::errors::Result;
use crate::pipes::Sample;
use crate::registry::{Params, Registry};

pub trait DataCreator: std::fmt::Debug + Send + Sync {
    /// Produce the value. Called per use; implementations decide whether
    /// that means recomputing or cloning.
    fn create(&self, registry: &Registry) -> Result<Sample>;
}

pub type BoxedDataCreator = Box<dyn DataCreator>;

/// Serves back a fixed value.
#[derive(Debug, Clone)]
pub struct StaticDataCreator {
    value: Sample,
}

impl StaticDataCreator {
    pub fn new(value: Sample) -> Self {
        Self { value }
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedDataCreator>,
    ) -> Result<BoxedDataCreator> {
        let value: Sample = params.require("value")?;
        params.finish()?;
        Ok(Box::new(Self::new(value)))
    }
}

impl DataCreator for StaticDataCreator {
    fn create(&self, _registry: &Registry) -> Result<Sample> {
        Ok(self.value.clone())
    }
}

/// Resolve a data-creator configuration.
///
/// A mapping whose `kind` is a string is always treated as a descriptor
/// and routed through the registry; every other value is served back
/// verbatim by a [`StaticDataCreator`]. Literal data that happens to
/// have descriptor shape must be wrapped in an explicit
/// `StaticDataCreator` descriptor.
pub fn setup_data_creator(registry: &Registry, value: &Value) -> Result<BoxedDataCreator> {
    if StageDescriptor::is_descriptor_shaped(value) {
        let descriptor = StageDescriptor::from_value(value)?;
        #[cfg(feature = "tracing")]
        tracing::info!(kind = %descriptor.kind, "setting up data creator");
        return registry.build_data_creator(&descriptor);
    }
    Ok(Box::new(StaticDataCreator::new(value.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipewrightError;
    use serde_json::json;

    #[test]
    fn test_static_creator_clones_value() {
        let registry = Registry::with_builtins();
        let creator = StaticDataCreator::new(json!({ "x": [1, 2] }));
        assert_eq!(creator.create(&registry).unwrap(), json!({ "x": [1, 2] }));
        assert_eq!(creator.create(&registry).unwrap(), json!({ "x": [1, 2] }));
    }

    #[test]
    fn test_setup_wraps_raw_value() {
        let registry = Registry::with_builtins();
        let creator = setup_data_creator(&registry, &json!([1, 2, 3])).unwrap();
        assert_eq!(creator.create(&registry).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_setup_routes_descriptor() {
        let registry = Registry::with_builtins();
        let creator = setup_data_creator(
            &registry,
            &json!({ "kind": "StaticDataCreator", "value": { "a": [1] } }),
        )
        .unwrap();
        assert_eq!(creator.create(&registry).unwrap(), json!({ "a": [1] }));
    }

    #[test]
    fn test_setup_unknown_kind() {
        let registry = Registry::with_builtins();
        let err = setup_data_creator(&registry, &json!({ "kind": "NoSuchCreator" })).unwrap_err();
        assert!(matches!(
            err,
            PipewrightError::UnknownKind { ref namespace, .. } if namespace == "data creator"
        ));
    }

    #[test]
    fn test_custom_creator_registration() {
        let mut registry = Registry::with_builtins();
        registry.register_data_creator("Range", |_reg, mut params| {
            let n: usize = params.require("n")?;
            params.finish()?;
            let values: Vec<Value> = (0..n).map(|i| json!(i)).collect();
            Ok(Box::new(StaticDataCreator::new(Value::Array(values))) as BoxedDataCreator)
        });
        let creator =
            setup_data_creator(&registry, &json!({ "kind": "Range", "n": 3 })).unwrap();
        assert_eq!(creator.create(&registry).unwrap(), json!([0, 1, 2]));
    }
}
