//! Raw metadata sources.
//!
//! A source knows the declared (unresolved) metadata of some classes. Several sources
//! are combined by [`MetadataSources`]: the first source that knows a class provides the
//! base descriptor and the following ones only fill what is still unset.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{MetadataError, MetadataResult};
use crate::resource::ResourceDescriptor;

/// Provides declared metadata for resource classes.
pub trait MetadataSource: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Classes this source declares, in declaration order.
    fn resource_classes(&self) -> Vec<String>;

    /// Returns the declared descriptor of `class`, or `None` if this source does not
    /// know it.
    fn load(&self, class: &str) -> MetadataResult<Option<ResourceDescriptor>>;
}

/// Resources declared in code.
#[derive(Debug, Default, Clone)]
pub struct DeclaredResources {
    resources: Vec<ResourceDescriptor>,
}

impl DeclaredResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a resource. A class can only be declared once.
    pub fn declare(&mut self, resource: ResourceDescriptor) -> MetadataResult<()> {
        if self.resources.iter().any(|r| r.class() == resource.class()) {
            return Err(MetadataError::invalid(format!(
                "resource class \"{}\" is declared twice",
                resource.class()
            )));
        }
        self.resources.push(resource);
        Ok(())
    }

    /// Builder form of [`DeclaredResources::declare`].
    pub fn with(mut self, resource: ResourceDescriptor) -> MetadataResult<Self> {
        self.declare(resource)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl MetadataSource for DeclaredResources {
    fn name(&self) -> &str {
        "declared"
    }

    fn resource_classes(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.class().to_string()).collect()
    }

    fn load(&self, class: &str) -> MetadataResult<Option<ResourceDescriptor>> {
        Ok(self.resources.iter().find(|r| r.class() == class).cloned())
    }
}

/// Ordered collection of sources.
#[derive(Default)]
pub struct MetadataSources {
    sources: Vec<Box<dyn MetadataSource>>,
}

impl MetadataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source. Earlier sources take precedence.
    pub fn push(&mut self, source: impl MetadataSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl MetadataSource + 'static) -> Self {
        self.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every class known by at least one source, without duplicates.
    pub fn resource_classes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.sources
            .iter()
            .flat_map(|source| source.resource_classes())
            .filter(|class| seen.insert(class.clone()))
            .collect()
    }

    /// Loads the declared descriptor of `class` with its parents applied.
    pub fn load(&self, class: &str) -> MetadataResult<ResourceDescriptor> {
        let mut descriptor = self.load_merged(class)?;

        let mut visited = vec![class.to_string()];
        let mut next = descriptor.parent().map(str::to_string);
        while let Some(parent_class) = next {
            if visited.contains(&parent_class) {
                visited.push(parent_class);
                return Err(MetadataError::invalid(format!(
                    "inheritance cycle: {}",
                    visited.join(" -> ")
                )));
            }
            let parent = self.load_merged(&parent_class)?;
            debug!(class, parent = %parent_class, "Inheriting resource metadata");
            descriptor = descriptor.inherit_from(&parent);
            next = parent.parent().map(str::to_string);
            visited.push(parent_class);
        }

        Ok(descriptor)
    }

    fn load_merged(&self, class: &str) -> MetadataResult<ResourceDescriptor> {
        let mut merged: Option<ResourceDescriptor> = None;
        for source in &self.sources {
            let Some(found) = source.load(class)? else {
                continue;
            };
            debug!(class, source = source.name(), "Loaded declared metadata");
            merged = Some(match merged {
                Some(base) => base.copy_from(&found),
                None => found,
            });
        }
        merged.ok_or_else(|| MetadataError::not_supported(class))
    }
}

impl std::fmt::Debug for MetadataSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataSources")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
