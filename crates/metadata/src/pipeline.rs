//! The resolution pipeline.
//!
//! [`MetadataPipeline`] loads the declared metadata of a class from its sources, runs the
//! stages in priority order and stores the result in the cache:
//!
//! ```text
//! cache (-10) -> short name (30) -> input/output (20) -> defaults (10) -> formats (5)
//! ```
//!
//! The stage order is fixed when the pipeline is built.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::{InMemoryMetadataCache, MetadataCache};
use crate::config::MetadataConfig;
use crate::error::MetadataResult;
use crate::operation::Operation;
use crate::resource::ResourceDescriptor;
use crate::source::{MetadataSource, MetadataSources};
use crate::stages::{
    FormatsStage, InputOutputStage, MetadataStage, OperationDefaultsStage, ShortNameStage,
};

/// Resolves resource classes into complete descriptors.
pub trait ResourceMetadataFactory: Send + Sync {
    /// Returns the resolved descriptor of `class`.
    fn create(&self, class: &str) -> MetadataResult<Arc<ResourceDescriptor>>;

    /// Every class that can be resolved.
    fn resource_classes(&self) -> Vec<String>;

    /// Returns an operation of `class`: the named one, or the first declared one when
    /// `name` is `None`.
    fn operation(&self, class: &str, name: Option<&str>) -> MetadataResult<Operation> {
        let descriptor = self.create(class)?;
        match name {
            Some(name) => descriptor.operation(name).cloned(),
            None => descriptor.default_operation().cloned(),
        }
    }
}

/// Builder for [`MetadataPipeline`].
pub struct MetadataPipelineBuilder {
    config: Arc<MetadataConfig>,
    sources: MetadataSources,
    stages: Vec<Box<dyn MetadataStage>>,
    default_stages: bool,
    cache: Option<Arc<dyn MetadataCache>>,
}

impl MetadataPipelineBuilder {
    pub fn new(config: MetadataConfig) -> Self {
        Self {
            config: Arc::new(config),
            sources: MetadataSources::new(),
            stages: Vec::new(),
            default_stages: true,
            cache: None,
        }
    }

    /// Adds a metadata source. Sources registered first take precedence.
    pub fn source(mut self, source: impl MetadataSource + 'static) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds a custom stage, ordered among the others by its priority.
    pub fn stage(mut self, stage: impl MetadataStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Leaves out the built-in stages.
    pub fn without_default_stages(mut self) -> Self {
        self.default_stages = false;
        self
    }

    /// Replaces the default in-memory cache.
    pub fn cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> MetadataPipeline {
        let mut stages = self.stages;
        if self.default_stages {
            stages.push(Box::new(ShortNameStage));
            stages.push(Box::new(InputOutputStage));
            stages.push(Box::new(OperationDefaultsStage::new(Arc::clone(&self.config))));
            stages.push(Box::new(FormatsStage::new(Arc::clone(&self.config))));
        }
        // Stable: equal priorities keep their registration order.
        stages.sort_by_key(|stage| std::cmp::Reverse(stage.priority()));

        MetadataPipeline {
            config: self.config,
            sources: self.sources,
            stages,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(InMemoryMetadataCache::new())),
            classes: RwLock::new(None),
        }
    }
}

/// The default [`ResourceMetadataFactory`].
pub struct MetadataPipeline {
    config: Arc<MetadataConfig>,
    sources: MetadataSources,
    stages: Vec<Box<dyn MetadataStage>>,
    cache: Arc<dyn MetadataCache>,
    classes: RwLock<Option<Arc<Vec<String>>>>,
}

impl MetadataPipeline {
    pub fn builder(config: MetadataConfig) -> MetadataPipelineBuilder {
        MetadataPipelineBuilder::new(config)
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs the stages without touching the cache.
    pub fn resolve(&self, class: &str) -> MetadataResult<ResourceDescriptor> {
        let mut descriptor = self.sources.load(class)?;
        for stage in &self.stages {
            debug!(class, stage = stage.name(), priority = stage.priority(), "Applying metadata stage");
            descriptor = stage.apply(descriptor)?;
        }
        Ok(descriptor)
    }

    /// Resolves every known class, surfacing configuration errors eagerly.
    pub fn warm_up(&self) -> MetadataResult<usize> {
        let classes = self.resource_classes();
        for class in &classes {
            self.create(class)?;
        }
        Ok(classes.len())
    }

    /// Drops the cached descriptor of `class`.
    pub fn invalidate(&self, class: &str) {
        self.cache.invalidate(class);
    }

    /// Drops every cached descriptor and the class list.
    pub fn clear(&self) {
        self.cache.clear();
        *self.classes.write() = None;
    }
}

impl ResourceMetadataFactory for MetadataPipeline {
    fn create(&self, class: &str) -> MetadataResult<Arc<ResourceDescriptor>> {
        self.cache
            .get_or_compute(class, &|| self.resolve(class).map(Arc::new))
    }

    fn resource_classes(&self) -> Vec<String> {
        if let Some(classes) = self.classes.read().as_ref() {
            return Vec::clone(classes);
        }
        let classes = Arc::new(self.sources.resource_classes());
        let mut cached = self.classes.write();
        Vec::clone(cached.get_or_insert(classes))
    }
}

impl std::fmt::Debug for MetadataPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataPipeline")
            .field("sources", &self.sources)
            .field("stages", &self.stage_names())
            .finish()
    }
}
