//! Global metadata configuration.
//!
//! Defaults applied by the resolution stages when neither an operation nor its resource
//! configures a value.
//!
//! ```json
//! {
//!   "formats": { "jsonld": ["application/ld+json"], "json": ["application/json"] },
//!   "patchFormats": { "json": ["application/merge-patch+json"] },
//!   "pagination": { "enabled": true, "itemsPerPage": 30 },
//!   "defaultIdentifiers": ["id"]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MetadataError, MetadataResult};

/// Pagination defaults for collection operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PaginationDefaults {
    pub enabled: bool,
    pub items_per_page: u32,
    pub maximum_items_per_page: Option<u32>,
    pub client_enabled: bool,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            items_per_page: 30,
            maximum_items_per_page: None,
            client_enabled: false,
        }
    }
}

/// Configuration shared by every resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Format name to mime types.
    pub formats: BTreeMap<String, Vec<String>>,
    /// Formats accepted by `PATCH` operations.
    pub patch_formats: BTreeMap<String, Vec<String>>,
    pub pagination: PaginationDefaults,
    /// Identifier properties used when a resource declares none.
    pub default_identifiers: Vec<String>,
    /// Prefix prepended to every generated URI template.
    pub route_prefix: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        let mut formats = BTreeMap::new();
        formats.insert("jsonld".to_string(), vec!["application/ld+json".to_string()]);
        formats.insert("json".to_string(), vec!["application/json".to_string()]);

        let mut patch_formats = BTreeMap::new();
        patch_formats.insert(
            "json".to_string(),
            vec!["application/merge-patch+json".to_string()],
        );

        Self {
            formats,
            patch_formats,
            pagination: PaginationDefaults::default(),
            default_identifiers: vec!["id".to_string()],
            route_prefix: None,
        }
    }
}

impl MetadataConfig {
    /// Loads a configuration file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> MetadataResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| MetadataError::ConfigLoadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let config: MetadataConfig =
            serde_json::from_str(&content).map_err(|e| MetadataError::ConfigLoadFailed {
                path: path.display().to_string(),
                message: format!("Invalid JSON: {}", e),
            })?;

        config.validate()?;
        info!(path = %path.display(), formats = config.formats.len(), "Loaded metadata configuration");
        Ok(config)
    }

    /// Checks that the configuration can be used by the resolution stages.
    pub fn validate(&self) -> MetadataResult<()> {
        if self.formats.is_empty() {
            return Err(MetadataError::invalid("at least one format must be configured"));
        }
        if let Some((name, _)) = self
            .formats
            .iter()
            .chain(self.patch_formats.iter())
            .find(|(_, mimes)| mimes.is_empty())
        {
            return Err(MetadataError::invalid(format!(
                "format \"{}\" declares no mime type",
                name
            )));
        }
        if self.pagination.items_per_page == 0 {
            return Err(MetadataError::invalid("itemsPerPage must be greater than 0"));
        }
        if let Some(max) = self.pagination.maximum_items_per_page {
            if max < self.pagination.items_per_page {
                return Err(MetadataError::invalid(
                    "maximumItemsPerPage cannot be lower than itemsPerPage",
                ));
            }
        }
        if self.default_identifiers.is_empty() {
            return Err(MetadataError::invalid("defaultIdentifiers cannot be empty"));
        }
        Ok(())
    }

    /// Returns true when the format name is configured.
    pub fn is_known_format(&self, name: &str) -> bool {
        self.formats.contains_key(name) || self.patch_formats.contains_key(name)
    }

    /// Configured format names in a stable order.
    pub fn format_names(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }

    pub fn patch_format_names(&self) -> Vec<String> {
        self.patch_formats.keys().cloned().collect()
    }
}
