//! Sequential pipeline construction.
//!
//! A pipeline configuration is either a single stage descriptor or an
//! ordered sequence of them. A single descriptor is constructed with all
//! of the caller's source pipes as its positional inputs. A sequence is
//! threaded: the first stage receives the caller's source pipes, every
//! later stage receives exactly one input, the stage built just before
//! it. The final stage is returned as-is, with no wrapper around it.
//!
//! # Contract
//!
//! * An empty configuration fails before any stage is constructed.
//! * Construction is strictly left to right; a failing stage stops the
//!   chain and its error is returned unchanged.
//! * The caller's configuration value is never mutated.

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::errors::{PipewrightError, Result};
use crate::pipes::BoxedPipe;
use crate::registry::Registry;

/// Build a pipeline from an already-parsed configuration.
pub fn build_pipeline(
    registry: &Registry,
    config: &PipelineConfig,
    source_inputs: Vec<BoxedPipe>,
) -> Result<BoxedPipe> {
    let stages = config.stages();
    let (first, rest) = stages
        .split_first()
        .ok_or_else(|| PipewrightError::empty_config("pipeline has no stages"))?;

    let mut pipe = registry.build_stage(first, source_inputs)?;
    for stage in rest {
        pipe = registry.build_stage(stage, vec![pipe])?;
    }
    Ok(pipe)
}

/// Build a pipeline straight from a JSON value.
pub fn build_pipeline_from_value(
    registry: &Registry,
    value: &Value,
    source_inputs: Vec<BoxedPipe>,
) -> Result<BoxedPipe> {
    let config = PipelineConfig::from_value(value)?;
    build_pipeline(registry, &config, source_inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{collect_samples, SourceWrapper};
    use serde_json::json;

    fn source(samples: serde_json::Value) -> BoxedPipe {
        let items = samples.as_array().unwrap().clone();
        Box::new(SourceWrapper::from_samples(items))
    }

    #[test]
    fn test_single_stage_receives_all_sources() {
        let registry = Registry::with_builtins();
        let pipe = build_pipeline_from_value(
            &registry,
            &json!({ "kind": "Zipper" }),
            vec![source(json!([1, 2])), source(json!([10, 20]))],
        )
        .unwrap();
        assert_eq!(
            collect_samples(&*pipe),
            vec![json!([1, 10]), json!([2, 20])]
        );
    }

    #[test]
    fn test_chain_threads_previous_stage() {
        let registry = Registry::with_builtins();
        let pipe = build_pipeline_from_value(
            &registry,
            &json!([
                { "kind": "SourceWrapper", "data": [1, 2, 3, 4] },
                { "kind": "Batcher", "batch_size": 2 }
            ]),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!([1, 2]), json!([3, 4])]);
    }

    #[test]
    fn test_chain_first_stage_gets_source_inputs() {
        let registry = Registry::with_builtins();
        let pipe = build_pipeline_from_value(
            &registry,
            &json!([
                { "kind": "Zipper" },
                { "kind": "Batcher", "batch_size": 2 }
            ]),
            vec![source(json!([1, 2])), source(json!([10, 20]))],
        )
        .unwrap();
        assert_eq!(collect_samples(&*pipe), vec![json!([[1, 10], [2, 20]])]);
    }

    #[test]
    fn test_last_stage_returned_unwrapped() {
        let registry = Registry::with_builtins();
        let pipe = build_pipeline_from_value(
            &registry,
            &json!([{ "kind": "SourceWrapper", "data": [7] }]),
            Vec::new(),
        )
        .unwrap();
        // A single-element chain is the stage itself.
        assert_eq!(pipe.len_hint(), Some(1));
        assert_eq!(collect_samples(&*pipe), vec![json!(7)]);
    }

    #[test]
    fn test_empty_chain_rejected_before_construction() {
        let registry = Registry::with_builtins();
        let config = PipelineConfig::Chain(Vec::new());
        let err = build_pipeline(&registry, &config, Vec::new()).unwrap_err();
        assert!(matches!(err, PipewrightError::EmptyConfig { .. }));
    }

    #[test]
    fn test_empty_value_rejected() {
        let registry = Registry::with_builtins();
        for value in [json!({}), json!([])] {
            let err = build_pipeline_from_value(&registry, &value, Vec::new()).unwrap_err();
            assert!(matches!(err, PipewrightError::EmptyConfig { .. }));
        }
    }

    #[test]
    fn test_failure_mid_chain_propagates_verbatim() {
        let registry = Registry::with_builtins();
        let err = build_pipeline_from_value(
            &registry,
            &json!([
                { "kind": "SourceWrapper", "data": [1] },
                { "kind": "NoSuchStage" },
                { "kind": "Batcher", "batch_size": 2 }
            ]),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipewrightError::UnknownKind { ref namespace, ref kind }
                if namespace == "stage" && kind == "NoSuchStage"
        ));
    }

    #[test]
    fn test_config_value_not_mutated() {
        let registry = Registry::with_builtins();
        let value = json!([
            { "kind": "SourceWrapper", "data": [1, 2] },
            { "kind": "Shuffler", "seed": 3 }
        ]);
        let before = value.clone();
        build_pipeline_from_value(&registry, &value, Vec::new()).unwrap();
        assert_eq!(value, before);
    }
}
