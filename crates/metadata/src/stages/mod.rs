//! Resolution stages.
//!
//! Each stage takes a descriptor and returns it with more fields filled. Stages never
//! overwrite a value that is already set, so applying a stage twice yields the same
//! descriptor as applying it once.
//!
//! | Stage | Priority |
//! |-------|----------|
//! | [`ShortNameStage`] | 30 |
//! | [`InputOutputStage`] | 20 |
//! | [`OperationDefaultsStage`] | 10 |
//! | [`FormatsStage`] | 5 |
//!
//! Higher priorities run first.

mod formats;
mod input_output;
mod operation_defaults;
mod short_name;

pub use formats::FormatsStage;
pub use input_output::InputOutputStage;
pub use operation_defaults::OperationDefaultsStage;
pub use short_name::{ShortNameStage, short_name_of};

use crate::error::MetadataResult;
use crate::resource::ResourceDescriptor;

/// One transformation of the resolution pipeline.
pub trait MetadataStage: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Stages with a higher priority run first.
    fn priority(&self) -> i32;

    /// Fills the fields this stage is responsible for.
    fn apply(&self, descriptor: ResourceDescriptor) -> MetadataResult<ResourceDescriptor>;
}
