//! Resource descriptors.

use serde::Serialize;

use crate::error::{MetadataError, MetadataResult};
use crate::operation::{MetadataFields, Operation};

/// A resource class and the operations it exposes.
///
/// Operation names are unique within a descriptor. Operations that have not been named
/// yet (before the defaults stage ran) are allowed and never clash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    identifiers: Vec<String>,
    #[serde(flatten)]
    fields: MetadataFields,
    operations: Vec<Operation>,
}

impl ResourceDescriptor {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            parent: None,
            identifiers: Vec::new(),
            fields: MetadataFields::default(),
            operations: Vec::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Class this resource inherits defaults from.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn fields(&self) -> &MetadataFields {
        &self.fields
    }

    pub fn short_name(&self) -> Option<&str> {
        self.fields.short_name.as_deref()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Looks up an operation by name.
    pub fn operation(&self, name: &str) -> MetadataResult<&Operation> {
        self.operations
            .iter()
            .find(|op| op.name() == Some(name))
            .ok_or_else(|| MetadataError::OperationNotFound {
                class: self.class.clone(),
                operation: name.to_string(),
            })
    }

    /// The first declared operation.
    pub fn default_operation(&self) -> MetadataResult<&Operation> {
        self.operations
            .first()
            .ok_or_else(|| MetadataError::OperationNotFound {
                class: self.class.clone(),
                operation: "<default>".to_string(),
            })
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = identifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fields(mut self, fields: MetadataFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.fields.short_name = Some(short_name.into());
        self
    }

    /// Appends an operation, failing if its name is already taken.
    pub fn with_operation(mut self, operation: Operation) -> MetadataResult<Self> {
        if let Some(name) = operation.name() {
            if self.operations.iter().any(|op| op.name() == Some(name)) {
                return Err(MetadataError::DuplicateOperation {
                    class: self.class.clone(),
                    name: name.to_string(),
                });
            }
        }
        self.operations.push(operation);
        Ok(self)
    }

    /// Replaces the whole operation list, checking name uniqueness.
    pub fn with_operations(self, operations: Vec<Operation>) -> MetadataResult<Self> {
        let mut descriptor = Self {
            operations: Vec::with_capacity(operations.len()),
            ..self
        };
        for operation in operations {
            descriptor = descriptor.with_operation(operation)?;
        }
        Ok(descriptor)
    }

    /// Applies `f` to every operation, keeping the order and re-checking names.
    pub fn map_operations<F>(self, mut f: F) -> MetadataResult<Self>
    where
        F: FnMut(Operation, &ResourceDescriptor) -> MetadataResult<Operation>,
    {
        let mut mapped = Vec::with_capacity(self.operations.len());
        for operation in &self.operations {
            mapped.push(f(operation.clone(), &self)?);
        }
        self.with_operations(mapped)
    }

    /// Fills unset fields and identifiers from `source` and appends the source
    /// operations whose names are not already declared here.
    pub fn copy_from(mut self, source: &ResourceDescriptor) -> Self {
        self.fields = self.fields.copy_from(&source.fields);
        if self.identifiers.is_empty() && !source.identifiers.is_empty() {
            self.identifiers = source.identifiers.clone();
        }
        if self.parent.is_none() {
            self.parent = source.parent.clone();
        }
        for operation in &source.operations {
            let taken = match operation.name() {
                Some(name) => self.operations.iter().any(|op| op.name() == Some(name)),
                None => false,
            };
            if !taken {
                self.operations.push(operation.clone());
            }
        }
        self
    }

    /// Inherits fields and identifiers from a parent resource, leaving operations alone.
    ///
    /// The short name names the class itself and is never inherited.
    pub fn inherit_from(mut self, parent: &ResourceDescriptor) -> Self {
        let short_name = self.fields.short_name.take();
        self.fields = self.fields.copy_from(&parent.fields);
        self.fields.short_name = short_name;
        if self.identifiers.is_empty() {
            self.identifiers = parent.identifiers.clone();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

    fn company() -> ResourceDescriptor {
        ResourceDescriptor::new("App\\Entity\\Company")
            .with_operation(Operation::new(OperationKind::Get).with_name("company_get"))
            .unwrap()
    }

    #[test]
    fn test_duplicate_operation_rejected() {
        let err = company()
            .with_operation(Operation::new(OperationKind::Put).with_name("company_get"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateOperation { .. }));
    }

    #[test]
    fn test_unnamed_operations_never_clash() {
        let descriptor = ResourceDescriptor::new("Company")
            .with_operation(Operation::new(OperationKind::Get))
            .unwrap()
            .with_operation(Operation::new(OperationKind::Get))
            .unwrap();
        assert_eq!(descriptor.operations().len(), 2);
    }

    #[test]
    fn test_operation_lookup() {
        let descriptor = company();
        assert_eq!(
            descriptor.operation("company_get").unwrap().kind(),
            OperationKind::Get
        );
        assert!(matches!(
            descriptor.operation("missing"),
            Err(MetadataError::OperationNotFound { .. })
        ));
        assert_eq!(
            descriptor.default_operation().unwrap().name(),
            Some("company_get")
        );
        assert!(ResourceDescriptor::new("Empty").default_operation().is_err());
    }

    #[test]
    fn test_copy_from_is_non_destructive() {
        let target = company().with_short_name("Company");
        let source = ResourceDescriptor::new("App\\Entity\\Company")
            .with_short_name("Organisation")
            .with_identifiers(["uuid"])
            .with_operation(Operation::new(OperationKind::Put).with_name("company_get"))
            .unwrap()
            .with_operation(Operation::new(OperationKind::Delete).with_name("company_delete"))
            .unwrap();

        let merged = target.copy_from(&source);
        assert_eq!(merged.short_name(), Some("Company"));
        assert_eq!(merged.identifiers(), ["uuid".to_string()]);
        assert_eq!(merged.operations().len(), 2);
        assert_eq!(
            merged.operation("company_get").unwrap().kind(),
            OperationKind::Get
        );
    }

    #[test]
    fn test_inherit_from_skips_operations() {
        let parent = company().with_identifiers(["code"]);
        let child = ResourceDescriptor::new("App\\Entity\\Startup").inherit_from(&parent);
        assert_eq!(child.identifiers(), ["code".to_string()]);
        assert!(child.operations().is_empty());
    }
}
