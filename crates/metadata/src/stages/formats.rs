use std::sync::Arc;

use super::MetadataStage;
use crate::config::MetadataConfig;
use crate::error::{MetadataError, MetadataResult};
use crate::operation::OperationKind;
use crate::resource::ResourceDescriptor;

/// Resolves the formats accepted and produced by each operation.
#[derive(Debug, Clone)]
pub struct FormatsStage {
    config: Arc<MetadataConfig>,
}

impl FormatsStage {
    pub fn new(config: Arc<MetadataConfig>) -> Self {
        Self { config }
    }

    fn check(&self, formats: &[String], class: &str) -> MetadataResult<()> {
        match formats.iter().find(|f| !self.config.is_known_format(f)) {
            Some(unknown) => Err(MetadataError::invalid(format!(
                "Unsupported format \"{}\" on resource class \"{}\"",
                unknown, class
            ))),
            None => Ok(()),
        }
    }

    /// Keeps the configured formats of `declared`, in declaration order.
    fn intersect(&self, declared: &[String]) -> Vec<String> {
        declared
            .iter()
            .filter(|f| self.config.is_known_format(f))
            .cloned()
            .collect()
    }
}

impl MetadataStage for FormatsStage {
    fn name(&self) -> &'static str {
        "formats"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn apply(&self, descriptor: ResourceDescriptor) -> MetadataResult<ResourceDescriptor> {
        let class = descriptor.class().to_string();
        let resource = descriptor.fields();
        for formats in [
            &resource.formats,
            &resource.input_formats,
            &resource.output_formats,
        ]
        .into_iter()
        .flatten()
        {
            self.check(formats, &class)?;
        }
        let resource_formats = resource.formats.clone();

        descriptor.map_operations(|operation, _| {
            let mut fields = operation.fields().clone();
            for formats in [&fields.formats, &fields.input_formats, &fields.output_formats]
                .into_iter()
                .flatten()
            {
                self.check(formats, &class)?;
            }

            let formats = fields
                .formats
                .clone()
                .or_else(|| resource_formats.clone())
                .unwrap_or_else(|| self.config.format_names());
            let formats = self.intersect(&formats);

            if fields.input_formats.is_none() {
                fields.input_formats = Some(if operation.kind() == OperationKind::Patch {
                    self.config.patch_format_names()
                } else {
                    formats.clone()
                });
            }
            if fields.output_formats.is_none() {
                fields.output_formats = Some(formats.clone());
            }
            fields.formats = Some(formats);
            Ok(operation.with_fields(fields))
        })
    }
}
