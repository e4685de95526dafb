use tracing::debug;

use super::MetadataStage;
use crate::error::{MetadataError, MetadataResult};
use crate::resource::ResourceDescriptor;

/// Returns the last segment of a class path.
///
/// `App\Entity\Company`, `app::entity::Company`, `app.entity.Company` and
/// `app/entity/Company` all give `Company`.
pub fn short_name_of(class: &str) -> &str {
    class
        .rsplit(|c| c == '\\' || c == ':' || c == '.' || c == '/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(class)
}

/// Derives the short name of a resource from its class and copies it to every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortNameStage;

impl MetadataStage for ShortNameStage {
    fn name(&self) -> &'static str {
        "short_name"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn apply(&self, descriptor: ResourceDescriptor) -> MetadataResult<ResourceDescriptor> {
        let descriptor = match descriptor.short_name() {
            Some(_) => descriptor,
            None => {
                let short_name = short_name_of(descriptor.class()).to_string();
                if short_name.is_empty() {
                    return Err(MetadataError::invalid(format!(
                        "cannot derive a short name from class \"{}\"",
                        descriptor.class()
                    )));
                }
                debug!(class = descriptor.class(), %short_name, "Derived short name");
                descriptor.with_short_name(short_name)
            }
        };

        let short_name = descriptor.short_name().unwrap_or_default().to_string();
        descriptor.map_operations(|operation, _| {
            Ok(match operation.short_name() {
                Some(_) => operation,
                None => operation.with_short_name(short_name.clone()),
            })
        })
    }
}
