use tracing::debug;

use super::MetadataStage;
use super::short_name::short_name_of;
use crate::error::{MetadataError, MetadataResult};
use crate::operation::IoOverride;
use crate::resource::ResourceDescriptor;

/// Resolves input and output class overrides.
///
/// Class overrides get a name (the short name of the class) and resource level overrides
/// are copied to operations that do not declare their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputOutputStage;

fn normalize(io: Option<IoOverride>, class: &str, key: &str) -> MetadataResult<Option<IoOverride>> {
    match io {
        Some(IoOverride::Class { class: io_class, name }) => {
            if io_class.trim().is_empty() {
                return Err(MetadataError::invalid(format!(
                    "{} class of \"{}\" cannot be empty",
                    key, class
                )));
            }
            let name = name.unwrap_or_else(|| short_name_of(&io_class).to_string());
            Ok(Some(IoOverride::Class {
                class: io_class,
                name: Some(name),
            }))
        }
        other => Ok(other),
    }
}

impl MetadataStage for InputOutputStage {
    fn name(&self) -> &'static str {
        "input_output"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn apply(&self, descriptor: ResourceDescriptor) -> MetadataResult<ResourceDescriptor> {
        let class = descriptor.class().to_string();
        let mut fields = descriptor.fields().clone();
        fields.input = normalize(fields.input, &class, "input")?;
        fields.output = normalize(fields.output, &class, "output")?;
        let resource_input = fields.input.clone();
        let resource_output = fields.output.clone();
        let descriptor = descriptor.with_fields(fields);

        descriptor.map_operations(|operation, _| {
            let mut op_fields = operation.fields().clone();
            if op_fields.input.is_none() {
                op_fields.input = resource_input.clone();
            }
            if op_fields.output.is_none() {
                op_fields.output = resource_output.clone();
            }
            op_fields.input = normalize(op_fields.input, &class, "input")?;
            op_fields.output = normalize(op_fields.output, &class, "output")?;
            if op_fields.input.is_some() || op_fields.output.is_some() {
                debug!(class = %class, operation = ?operation.name(), "Resolved input/output");
            }
            Ok(operation.with_fields(op_fields))
        })
    }
}
