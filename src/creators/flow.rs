//! Flow creators: stored configuration in, ready-to-iterate pipe out.
//!
//! A flow is the top of the food chain: something that needs no inputs
//! and can be handed straight to a consumer. The iterable creator wraps
//! a pipeline configuration or literal samples; the loader creator
//! wires a dataset to a loader creator.

use std::fmt;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::builder::build_pipeline_from_value;
use crate::config::{json_type_name, StageDescriptor};
use crate::data::setup_dataset;
use crate::errors::{PipewrightError, Result};
use crate::pipes::{BoxedPipe, SharedPipe, SourceWrapper};
use crate::registry::{Params, Registry};

use super::loader::{setup_loader_creator, AutoLoaderCreator, BoxedLoaderCreator};

pub trait FlowCreator: fmt::Debug + Send + Sync {
    fn create(&self, registry: &Registry) -> Result<BoxedPipe>;
}

pub type BoxedFlowCreator = Box<dyn FlowCreator>;

/// `true` when `value` is a descriptor for a registered flow creator.
pub fn is_flow_creator_config(registry: &Registry, value: &Value) -> bool {
    StageDescriptor::from_value(value)
        .map_or(false, |descriptor| registry.has_flow_creator(&descriptor.kind))
}

/// Resolve a flow-creator configuration through the registry.
pub fn setup_flow_creator(registry: &Registry, value: &Value) -> Result<BoxedFlowCreator> {
    let descriptor = StageDescriptor::from_value(value)?;
    #[cfg(feature = "tracing")]
    tracing::info!(kind = %descriptor.kind, "setting up flow creator");
    registry.build_flow_creator(&descriptor)
}

// ─── Iterable ───────────────────────────────────────────────────────────────

/// Wraps an iterable specification as a flow.
///
/// The specification is a pipeline configuration (a stage descriptor or
/// a sequence of them) or a literal sequence of samples. With `cache`
/// set, the pipe is built on first use and shared by every later
/// `create`; the shared pipe stays re-iterable.
#[derive(Debug)]
pub struct IterableFlowCreator {
    spec: Value,
    cache: bool,
    cached: OnceCell<SharedPipe>,
}

impl IterableFlowCreator {
    pub fn new(spec: Value) -> Self {
        Self {
            spec,
            cache: false,
            cached: OnceCell::new(),
        }
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedFlowCreator>,
    ) -> Result<BoxedFlowCreator> {
        let spec = match params.take_raw("iterable")? {
            Some(spec) => spec,
            None => return Err(params.invalid("iterable", "missing required parameter")),
        };
        let cache = params.take("cache")?.unwrap_or(false);
        params.finish()?;
        Ok(Box::new(Self::new(spec).cache(cache)))
    }

    fn build(&self, registry: &Registry) -> Result<BoxedPipe> {
        if StageDescriptor::is_descriptor_shaped(&self.spec) {
            return build_pipeline_from_value(registry, &self.spec, Vec::new());
        }
        match &self.spec {
            Value::Array(items)
                if !items.is_empty()
                    && items.iter().all(StageDescriptor::is_descriptor_shaped) =>
            {
                build_pipeline_from_value(registry, &self.spec, Vec::new())
            }
            // An empty or non-descriptor sequence is literal data.
            Value::Array(items) => Ok(Box::new(SourceWrapper::from_samples(items.clone()))),
            other => Err(PipewrightError::invalid_descriptor(format!(
                "iterable must be a pipeline configuration or a sequence of samples, got {}",
                json_type_name(other)
            ))),
        }
    }
}

impl FlowCreator for IterableFlowCreator {
    fn create(&self, registry: &Registry) -> Result<BoxedPipe> {
        if !self.cache {
            return self.build(registry);
        }
        let shared = self
            .cached
            .get_or_try_init(|| self.build(registry).map(SharedPipe::new))?;
        Ok(Box::new(shared.clone()))
    }
}

// ─── Loader ─────────────────────────────────────────────────────────────────

/// A dataset specification wired to a loader creator.
///
/// `dataset` is anything [`setup_dataset`] accepts; `creator` is a
/// loader-creator descriptor, defaulting to the auto creator when
/// absent.
#[derive(Debug)]
pub struct LoaderFlowCreator {
    dataset_spec: Value,
    creator_spec: Option<Value>,
}

impl LoaderFlowCreator {
    pub fn new(dataset_spec: Value) -> Self {
        Self {
            dataset_spec,
            creator_spec: None,
        }
    }

    pub fn creator_spec(mut self, creator_spec: Value) -> Self {
        self.creator_spec = Some(creator_spec);
        self
    }

    pub(crate) fn from_config(
        _registry: &Registry,
        mut params: Params<BoxedFlowCreator>,
    ) -> Result<BoxedFlowCreator> {
        let dataset_spec = match params.take_raw("dataset")? {
            Some(spec) => spec,
            None => return Err(params.invalid("dataset", "missing required parameter")),
        };
        let creator_spec = params.take_raw("creator")?;
        params.finish()?;
        let mut creator = Self::new(dataset_spec);
        if let Some(spec) = creator_spec {
            creator = creator.creator_spec(spec);
        }
        Ok(Box::new(creator))
    }
}

impl FlowCreator for LoaderFlowCreator {
    fn create(&self, registry: &Registry) -> Result<BoxedPipe> {
        let dataset = setup_dataset(registry, &self.dataset_spec)?;
        let creator: BoxedLoaderCreator = match &self.creator_spec {
            Some(spec) => setup_loader_creator(registry, spec)?,
            None => Box::new(AutoLoaderCreator::new()),
        };
        let loader = creator.create(registry, dataset)?;
        Ok(Box::new(loader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::collect_samples;
    use serde_json::json;

    #[test]
    fn test_is_flow_creator_config() {
        let registry = Registry::with_builtins();
        assert!(is_flow_creator_config(
            &registry,
            &json!({ "kind": "IterableFlowCreator", "iterable": [] })
        ));
        assert!(!is_flow_creator_config(
            &registry,
            &json!({ "kind": "VanillaLoaderCreator" })
        ));
    }

    #[test]
    fn test_iterable_flow_from_literal_samples() {
        let registry = Registry::with_builtins();
        let creator = setup_flow_creator(
            &registry,
            &json!({ "kind": "IterableFlowCreator", "iterable": [1, 2, 3] }),
        )
        .unwrap();
        let pipe = creator.create(&registry).unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_iterable_flow_from_pipeline_config() {
        let registry = Registry::with_builtins();
        let creator = setup_flow_creator(
            &registry,
            &json!({
                "kind": "IterableFlowCreator",
                "iterable": [
                    { "kind": "SourceWrapper", "data": [1, 2, 3, 4] },
                    { "kind": "Batcher", "batch_size": 2 }
                ]
            }),
        )
        .unwrap();
        let pipe = creator.create(&registry).unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!([1, 2]), json!([3, 4])]);
    }

    #[test]
    fn test_iterable_flow_rejects_scalar() {
        let registry = Registry::with_builtins();
        let creator = setup_flow_creator(
            &registry,
            &json!({ "kind": "IterableFlowCreator", "iterable": 5 }),
        )
        .unwrap();
        let err = creator.create(&registry).unwrap_err();
        assert!(matches!(err, PipewrightError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_uncached_flow_builds_fresh_pipes() {
        let mut registry = Registry::with_builtins();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = std::sync::Arc::clone(&calls);
        registry.register_stage("Counted", move |_reg, params, _inputs| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            params.finish()?;
            Ok(Box::new(SourceWrapper::from_samples(vec![json!(1)])) as BoxedPipe)
        });

        let creator = setup_flow_creator(
            &registry,
            &json!({ "kind": "IterableFlowCreator", "iterable": { "kind": "Counted" } }),
        )
        .unwrap();
        creator.create(&registry).unwrap();
        creator.create(&registry).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cached_flow_builds_once_and_stays_iterable() {
        let mut registry = Registry::with_builtins();
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = std::sync::Arc::clone(&calls);
        registry.register_stage("Counted", move |_reg, params, _inputs| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            params.finish()?;
            Ok(Box::new(SourceWrapper::from_samples(vec![json!(1), json!(2)])) as BoxedPipe)
        });

        let creator = setup_flow_creator(
            &registry,
            &json!({
                "kind": "IterableFlowCreator",
                "iterable": { "kind": "Counted" },
                "cache": true
            }),
        )
        .unwrap();
        let first = creator.create(&registry).unwrap();
        let second = creator.create(&registry).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        // Both handles replay the same underlying pipe.
        assert_eq!(collect_samples(&*first), vec![json!(1), json!(2)]);
        assert_eq!(collect_samples(&*second), vec![json!(1), json!(2)]);
        assert_eq!(collect_samples(&*first), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_loader_flow_with_explicit_creator() {
        let registry = Registry::with_builtins();
        let creator = setup_flow_creator(
            &registry,
            &json!({
                "kind": "LoaderFlowCreator",
                "dataset": [1, 2, 3, 4],
                "creator": { "kind": "VanillaLoaderCreator", "batch_size": 2 }
            }),
        )
        .unwrap();
        let pipe = creator.create(&registry).unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!([1, 2]), json!([3, 4])]);
    }

    #[test]
    fn test_loader_flow_with_dataset_descriptor_and_default_creator() {
        let _guard = crate::data::loader::env_guard();
        std::env::remove_var("RANK");
        std::env::remove_var("WORLD_SIZE");
        let registry = Registry::with_builtins();
        let creator = setup_flow_creator(
            &registry,
            &json!({
                "kind": "LoaderFlowCreator",
                "dataset": { "kind": "InMemoryDataset", "data": [7, 8] }
            }),
        )
        .unwrap();
        let pipe = creator.create(&registry).unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!([7]), json!([8])]);
    }
}
