//! Registration tables and recursive descriptor resolution.
//!
//! Construction is table-driven: each constructible family (stages,
//! transforms, datasets, data creators, pipe / loader / flow creators)
//! has its own table mapping a kind identifier to a factory closure.
//! [`Registry::with_builtins`] populates every table once, at process
//! start; looking up a kind that was never registered fails with a typed
//! [`UnknownKind`](crate::errors::PipewrightError::UnknownKind) error
//! naming the table and the identifier.
//!
//! # Nested descriptor resolution
//!
//! Before a factory runs, every parameter of its descriptor is classified
//! into an [`Arg`]:
//!
//! | parameter value | classified as |
//! |-----------------|---------------|
//! | mapping with a `kind` registered in this table | [`Arg::Built`] (constructed recursively, no positional inputs) |
//! | non-empty sequence of such mappings | [`Arg::BuiltSeq`] (each constructed, in order) |
//! | anything else | [`Arg::Value`] (raw) |
//!
//! Classification is per-table, so a descriptor whose kind belongs to a
//! different family (say, a transform parameter on a stage) stays raw and
//! the factory routes it to the right table itself. Factories consume
//! their arguments through [`Params`]; whatever they leave behind is
//! rejected, the moral equivalent of an unexpected keyword argument.
//!
//! All classification copies values out of the descriptor; a caller's
//! configuration is never mutated and can be built any number of times.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{json_type_name, StageDescriptor};
use crate::creators::{BoxedFlowCreator, BoxedLoaderCreator, BoxedPipeCreator};
use crate::data::{BoxedDataCreator, InMemoryDataset, SharedDataset, StaticDataCreator};
use crate::errors::{PipewrightError, Result};
use crate::pipes::{
    Batcher, BoxedPipe, Concater, DictBatcher, Mapper, Multiplexer, Shuffler, SourceWrapper,
    Zipper,
};
use crate::transforms::{BoxedTransform, Compose, Rename, Scale, Select};

/// Enter a tracing span for an object construction (when the `tracing`
/// feature is enabled). When disabled, this is a no-op and the compiler
/// eliminates it.
macro_rules! trace_build {
    ($namespace:expr, $kind:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("build", namespace = $namespace, kind = $kind).entered();
    };
}

/// Factory for stage kinds: registry access (for nested and
/// cross-table construction), resolved parameters, and the positional
/// upstream pipes routed to this stage.
pub type StageFactory =
    Box<dyn Fn(&Registry, Params<BoxedPipe>, Vec<BoxedPipe>) -> Result<BoxedPipe> + Send + Sync>;

/// Factory for the input-less families.
pub type Factory<T> = Box<dyn Fn(&Registry, Params<T>) -> Result<T> + Send + Sync>;

// ─── Resolved parameters ────────────────────────────────────────────────────

/// One resolved parameter value.
#[derive(Debug)]
pub enum Arg<T> {
    /// A plain value; the factory deserializes it or routes it to
    /// another table.
    Value(Value),
    /// A nested descriptor, already constructed in this table.
    Built(T),
    /// A sequence of nested descriptors, each constructed in order.
    BuiltSeq(Vec<T>),
}

/// The resolved parameters handed to a factory.
///
/// Extraction removes parameters as they are consumed; [`Params::finish`]
/// rejects anything left over. Factories report their own bad values via
/// [`Params::invalid`], which carries the kind under construction.
#[derive(Debug)]
pub struct Params<T> {
    namespace: &'static str,
    kind: String,
    args: FxHashMap<String, Arg<T>>,
}

impl<T> Params<T> {
    /// The kind under construction (for factory-side error messages).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// `true` while `name` has not been consumed.
    pub fn contains(&self, name: &str) -> bool {
        self.args.contains_key(name)
    }

    /// An [`InvalidParam`](PipewrightError::InvalidParam) for this kind.
    pub fn invalid(&self, name: &str, message: impl Into<String>) -> PipewrightError {
        PipewrightError::invalid_param(&self.kind, name, message)
    }

    /// Consume a plain parameter, deserialized into `D`.
    pub fn take<D: DeserializeOwned>(&mut self, name: &str) -> Result<Option<D>> {
        match self.args.remove(name) {
            None => Ok(None),
            Some(Arg::Value(value)) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| self.invalid(name, err.to_string())),
            Some(Arg::Built(_)) | Some(Arg::BuiltSeq(_)) => Err(self.invalid(
                name,
                "got a nested descriptor where a plain value was expected",
            )),
        }
    }

    /// Like [`take`](Self::take), but the parameter must be present.
    pub fn require<D: DeserializeOwned>(&mut self, name: &str) -> Result<D> {
        match self.take(name)? {
            Some(value) => Ok(value),
            None => Err(self.invalid(name, "missing required parameter")),
        }
    }

    /// Consume a plain parameter as a raw JSON value, for factories that
    /// route it to another table themselves.
    pub fn take_raw(&mut self, name: &str) -> Result<Option<Value>> {
        match self.args.remove(name) {
            None => Ok(None),
            Some(Arg::Value(value)) => Ok(Some(value)),
            Some(Arg::Built(_)) | Some(Arg::BuiltSeq(_)) => Err(self.invalid(
                name,
                "got a nested descriptor where a plain value was expected",
            )),
        }
    }

    /// Consume a nested constructed object.
    ///
    /// A descriptor-shaped value that was *not* constructed means its
    /// kind is not in this table; that surfaces as the typed unknown-kind
    /// error rather than a generic type mismatch.
    pub fn take_built(&mut self, name: &str) -> Result<Option<T>> {
        match self.args.remove(name) {
            None => Ok(None),
            Some(Arg::Built(built)) => Ok(Some(built)),
            Some(Arg::BuiltSeq(_)) => Err(self.invalid(
                name,
                "got a sequence of descriptors where a single one was expected",
            )),
            Some(Arg::Value(value)) => match StageDescriptor::from_value(&value) {
                Ok(nested) => Err(PipewrightError::unknown_kind(self.namespace, nested.kind)),
                Err(_) => Err(self.invalid(
                    name,
                    format!(
                        "expected a nested {} descriptor, got {}",
                        self.namespace,
                        json_type_name(&value)
                    ),
                )),
            },
        }
    }

    /// Consume a sequence of nested constructed objects.
    ///
    /// An explicitly empty sequence is accepted (there is nothing to
    /// construct); a sequence that stayed raw names the kinds it carries
    /// so the registration gap is visible.
    pub fn take_built_seq(&mut self, name: &str) -> Result<Option<Vec<T>>> {
        match self.args.remove(name) {
            None => Ok(None),
            Some(Arg::BuiltSeq(built)) => Ok(Some(built)),
            Some(Arg::Built(_)) => Err(self.invalid(
                name,
                "got a single descriptor where a sequence was expected",
            )),
            Some(Arg::Value(Value::Array(items))) if items.is_empty() => Ok(Some(Vec::new())),
            Some(Arg::Value(Value::Array(items))) => {
                let mut kinds = Vec::new();
                for item in &items {
                    match StageDescriptor::from_value(item) {
                        Ok(nested) => kinds.push(nested.kind),
                        Err(_) => {
                            return Err(self.invalid(
                                name,
                                format!(
                                    "expected a sequence of {} descriptors, but one element is {}",
                                    self.namespace,
                                    json_type_name(item)
                                ),
                            ))
                        }
                    }
                }
                Err(self.invalid(
                    name,
                    format!(
                        "not every kind in [{}] is registered as a {}",
                        kinds.join(", "),
                        self.namespace
                    ),
                ))
            }
            Some(Arg::Value(other)) => Err(self.invalid(
                name,
                format!(
                    "expected a sequence of nested {} descriptors, got {}",
                    self.namespace,
                    json_type_name(&other)
                ),
            )),
        }
    }

    /// Reject leftover parameters.
    pub fn finish(self) -> Result<()> {
        if self.args.is_empty() {
            return Ok(());
        }
        let mut names: Vec<&String> = self.args.keys().collect();
        names.sort();
        Err(PipewrightError::invalid_param(
            &self.kind,
            names[0],
            "unexpected parameter",
        ))
    }
}

// ─── Registration tables ────────────────────────────────────────────────────

/// One registration table. Registering an already-present kind replaces
/// the earlier factory.
struct Table<F> {
    namespace: &'static str,
    factories: FxHashMap<String, F>,
}

impl<F> Table<F> {
    fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            factories: FxHashMap::default(),
        }
    }

    fn register(&mut self, kind: impl Into<String>, factory: F) {
        self.factories.insert(kind.into(), factory);
    }

    fn get(&self, kind: &str) -> Result<&F> {
        self.factories
            .get(kind)
            .ok_or_else(|| PipewrightError::unknown_kind(self.namespace, kind))
    }

    fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// The registration tables for every constructible family.
pub struct Registry {
    stages: Table<StageFactory>,
    transforms: Table<Factory<BoxedTransform>>,
    datasets: Table<Factory<SharedDataset>>,
    data_creators: Table<Factory<BoxedDataCreator>>,
    pipe_creators: Table<Factory<BoxedPipeCreator>>,
    loader_creators: Table<Factory<BoxedLoaderCreator>>,
    flow_creators: Table<Factory<BoxedFlowCreator>>,
}

impl Registry {
    /// An empty registry: nothing can be built until kinds are registered.
    pub fn new() -> Self {
        Self {
            stages: Table::new("stage"),
            transforms: Table::new("transform"),
            datasets: Table::new("dataset"),
            data_creators: Table::new("data creator"),
            pipe_creators: Table::new("pipe creator"),
            loader_creators: Table::new("loader creator"),
            flow_creators: Table::new("flow creator"),
        }
    }

    /// A registry with every built-in kind registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register_stage("SourceWrapper", SourceWrapper::from_config);
        registry.register_stage("Batcher", Batcher::from_config);
        registry.register_stage("DictBatcher", DictBatcher::from_config);
        registry.register_stage("Multiplexer", Multiplexer::from_config);
        registry.register_stage("Zipper", Zipper::from_config);
        registry.register_stage("Concater", Concater::from_config);
        registry.register_stage("Shuffler", Shuffler::from_config);
        registry.register_stage("Mapper", Mapper::from_config);

        registry.register_transform("Compose", Compose::from_config);
        registry.register_transform("Scale", Scale::from_config);
        registry.register_transform("Select", Select::from_config);
        registry.register_transform("Rename", Rename::from_config);

        registry.register_dataset("InMemoryDataset", InMemoryDataset::from_config);
        registry.register_data_creator("StaticDataCreator", StaticDataCreator::from_config);

        registry.register_pipe_creator(
            "SequentialPipeCreator",
            crate::creators::SequentialPipeCreator::from_config,
        );
        registry.register_pipe_creator(
            "DictBatcherPipeCreator",
            crate::creators::DictBatcherPipeCreator::from_config,
        );

        registry.register_loader_creator(
            "VanillaLoaderCreator",
            crate::creators::VanillaLoaderCreator::from_config,
        );
        registry.register_loader_creator(
            "DistributedLoaderCreator",
            crate::creators::DistributedLoaderCreator::from_config,
        );
        registry.register_loader_creator(
            "AutoLoaderCreator",
            crate::creators::AutoLoaderCreator::from_config,
        );

        registry.register_flow_creator(
            "IterableFlowCreator",
            crate::creators::IterableFlowCreator::from_config,
        );
        registry.register_flow_creator(
            "LoaderFlowCreator",
            crate::creators::LoaderFlowCreator::from_config,
        );

        registry
    }

    // ─── Stages ─────────────────────────────────────────────────────────

    pub fn register_stage(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedPipe>, Vec<BoxedPipe>) -> Result<BoxedPipe>
            + Send
            + Sync
            + 'static,
    ) {
        self.stages.register(kind, Box::new(factory));
    }

    pub fn has_stage(&self, kind: &str) -> bool {
        self.stages.contains(kind)
    }

    pub fn stage_kinds(&self) -> Vec<&str> {
        self.stages.kinds()
    }

    /// Construct a stage from its descriptor and positional upstreams.
    pub fn build_stage(
        &self,
        descriptor: &StageDescriptor,
        inputs: Vec<BoxedPipe>,
    ) -> Result<BoxedPipe> {
        trace_build!("stage", &descriptor.kind);
        let factory = self.stages.get(&descriptor.kind)?;
        let params = self.resolve(
            "stage",
            |reg, kind| reg.stages.contains(kind),
            |reg, nested| reg.build_stage(nested, Vec::new()),
            descriptor,
        )?;
        factory(self, params, inputs)
    }

    // ─── Transforms ─────────────────────────────────────────────────────

    pub fn register_transform(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedTransform>) -> Result<BoxedTransform>
            + Send
            + Sync
            + 'static,
    ) {
        self.transforms.register(kind, Box::new(factory));
    }

    pub fn has_transform(&self, kind: &str) -> bool {
        self.transforms.contains(kind)
    }

    pub fn transform_kinds(&self) -> Vec<&str> {
        self.transforms.kinds()
    }

    pub fn build_transform(&self, descriptor: &StageDescriptor) -> Result<BoxedTransform> {
        trace_build!("transform", &descriptor.kind);
        let factory = self.transforms.get(&descriptor.kind)?;
        let params = self.resolve(
            "transform",
            |reg, kind| reg.transforms.contains(kind),
            |reg, nested| reg.build_transform(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Datasets ───────────────────────────────────────────────────────

    pub fn register_dataset(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<SharedDataset>) -> Result<SharedDataset>
            + Send
            + Sync
            + 'static,
    ) {
        self.datasets.register(kind, Box::new(factory));
    }

    pub fn has_dataset(&self, kind: &str) -> bool {
        self.datasets.contains(kind)
    }

    pub fn dataset_kinds(&self) -> Vec<&str> {
        self.datasets.kinds()
    }

    pub fn build_dataset(&self, descriptor: &StageDescriptor) -> Result<SharedDataset> {
        trace_build!("dataset", &descriptor.kind);
        let factory = self.datasets.get(&descriptor.kind)?;
        let params = self.resolve(
            "dataset",
            |reg, kind| reg.datasets.contains(kind),
            |reg, nested| reg.build_dataset(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Data creators ──────────────────────────────────────────────────

    pub fn register_data_creator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedDataCreator>) -> Result<BoxedDataCreator>
            + Send
            + Sync
            + 'static,
    ) {
        self.data_creators.register(kind, Box::new(factory));
    }

    pub fn has_data_creator(&self, kind: &str) -> bool {
        self.data_creators.contains(kind)
    }

    pub fn data_creator_kinds(&self) -> Vec<&str> {
        self.data_creators.kinds()
    }

    pub fn build_data_creator(&self, descriptor: &StageDescriptor) -> Result<BoxedDataCreator> {
        trace_build!("data_creator", &descriptor.kind);
        let factory = self.data_creators.get(&descriptor.kind)?;
        let params = self.resolve(
            "data creator",
            |reg, kind| reg.data_creators.contains(kind),
            |reg, nested| reg.build_data_creator(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Pipe creators ──────────────────────────────────────────────────

    pub fn register_pipe_creator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedPipeCreator>) -> Result<BoxedPipeCreator>
            + Send
            + Sync
            + 'static,
    ) {
        self.pipe_creators.register(kind, Box::new(factory));
    }

    pub fn has_pipe_creator(&self, kind: &str) -> bool {
        self.pipe_creators.contains(kind)
    }

    pub fn pipe_creator_kinds(&self) -> Vec<&str> {
        self.pipe_creators.kinds()
    }

    pub fn build_pipe_creator(&self, descriptor: &StageDescriptor) -> Result<BoxedPipeCreator> {
        trace_build!("pipe_creator", &descriptor.kind);
        let factory = self.pipe_creators.get(&descriptor.kind)?;
        let params = self.resolve(
            "pipe creator",
            |reg, kind| reg.pipe_creators.contains(kind),
            |reg, nested| reg.build_pipe_creator(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Loader creators ────────────────────────────────────────────────

    pub fn register_loader_creator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedLoaderCreator>) -> Result<BoxedLoaderCreator>
            + Send
            + Sync
            + 'static,
    ) {
        self.loader_creators.register(kind, Box::new(factory));
    }

    pub fn has_loader_creator(&self, kind: &str) -> bool {
        self.loader_creators.contains(kind)
    }

    pub fn loader_creator_kinds(&self) -> Vec<&str> {
        self.loader_creators.kinds()
    }

    pub fn build_loader_creator(
        &self,
        descriptor: &StageDescriptor,
    ) -> Result<BoxedLoaderCreator> {
        trace_build!("loader_creator", &descriptor.kind);
        let factory = self.loader_creators.get(&descriptor.kind)?;
        let params = self.resolve(
            "loader creator",
            |reg, kind| reg.loader_creators.contains(kind),
            |reg, nested| reg.build_loader_creator(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Flow creators ──────────────────────────────────────────────────

    pub fn register_flow_creator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Registry, Params<BoxedFlowCreator>) -> Result<BoxedFlowCreator>
            + Send
            + Sync
            + 'static,
    ) {
        self.flow_creators.register(kind, Box::new(factory));
    }

    pub fn has_flow_creator(&self, kind: &str) -> bool {
        self.flow_creators.contains(kind)
    }

    pub fn flow_creator_kinds(&self) -> Vec<&str> {
        self.flow_creators.kinds()
    }

    pub fn build_flow_creator(&self, descriptor: &StageDescriptor) -> Result<BoxedFlowCreator> {
        trace_build!("flow_creator", &descriptor.kind);
        let factory = self.flow_creators.get(&descriptor.kind)?;
        let params = self.resolve(
            "flow creator",
            |reg, kind| reg.flow_creators.contains(kind),
            |reg, nested| reg.build_flow_creator(nested),
            descriptor,
        )?;
        factory(self, params)
    }

    // ─── Classification ─────────────────────────────────────────────────

    /// Classify every parameter of `descriptor` for one table.
    fn resolve<T>(
        &self,
        namespace: &'static str,
        is_registered: impl Fn(&Self, &str) -> bool,
        build_nested: impl Fn(&Self, &StageDescriptor) -> Result<T>,
        descriptor: &StageDescriptor,
    ) -> Result<Params<T>> {
        let mut args = FxHashMap::default();
        for (name, value) in &descriptor.params {
            let arg = if StageDescriptor::is_descriptor_shaped(value) {
                let nested = StageDescriptor::from_value(value)?;
                if is_registered(self, &nested.kind) {
                    Arg::Built(build_nested(self, &nested)?)
                } else {
                    Arg::Value(value.clone())
                }
            } else {
                match value {
                    Value::Array(items)
                        if !items.is_empty()
                            && items.iter().all(StageDescriptor::is_descriptor_shaped) =>
                    {
                        let nested = items
                            .iter()
                            .map(StageDescriptor::from_value)
                            .collect::<Result<Vec<_>>>()?;
                        if nested.iter().all(|d| is_registered(self, &d.kind)) {
                            let built = nested
                                .iter()
                                .map(|d| build_nested(self, d))
                                .collect::<Result<Vec<_>>>()?;
                            Arg::BuiltSeq(built)
                        } else {
                            Arg::Value(value.clone())
                        }
                    }
                    other => Arg::Value(other.clone()),
                }
            };
            args.insert(name.clone(), arg);
        }
        Ok(Params {
            namespace,
            kind: descriptor.kind.clone(),
            args,
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("stages", &self.stages.kinds())
            .field("transforms", &self.transforms.kinds())
            .field("datasets", &self.datasets.kinds())
            .field("data_creators", &self.data_creators.kinds())
            .field("pipe_creators", &self.pipe_creators.kinds())
            .field("loader_creators", &self.loader_creators.kinds())
            .field("flow_creators", &self.flow_creators.kinds())
            .finish()
    }
}
