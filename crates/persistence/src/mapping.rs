//! Persistence mappings.
//!
//! A [`ClassMapping`] tells the query backends how a resource class is stored: its table
//! (or collection), identifier fields, field types and associations. Link resolution
//! reads association kinds and owning sides from here.
//!
//! Mapping files are JSON documents:
//!
//! ```json
//! {
//!   "classes": [
//!     {
//!       "class": "App\\Entity\\Employee",
//!       "table": "employee",
//!       "identifiers": ["id"],
//!       "fields": [{ "name": "id", "type": "integer" }, { "name": "name", "type": "string" }],
//!       "associations": [
//!         { "name": "company", "kind": "many_to_one", "target": "App\\Entity\\Company", "inversedBy": "employees" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LinkError, MappingError, StorageResult};

/// Declared type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Uuid,
}

impl FieldType {
    /// Returns true for date and datetime fields.
    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// A scalar field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Column name, defaults to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default)]
    pub nullable: bool,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            column: None,
            nullable: false,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Cardinality of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    pub fn is_to_many(&self) -> bool {
        matches!(self, AssociationKind::OneToMany | AssociationKind::ManyToMany)
    }

    pub fn is_to_one(&self) -> bool {
        !self.is_to_many()
    }
}

/// Link table of a many-to-many association, seen from the owning side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinTable {
    pub name: String,
    /// Column referencing the owning class.
    pub join_column: String,
    /// Column referencing the target class.
    pub inverse_join_column: String,
}

/// A relation from one class to another.
///
/// The owning side holds the reference: it declares no `mapped_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssociationMapping {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inversed_by: Option<String>,
    /// Foreign key column of an owning to-one association, defaults to `{name}_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<JoinTable>,
}

impl AssociationMapping {
    pub fn new(name: impl Into<String>, kind: AssociationKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            mapped_by: None,
            inversed_by: None,
            join_column: None,
            join_table: None,
        }
    }

    pub fn mapped_by(mut self, property: impl Into<String>) -> Self {
        self.mapped_by = Some(property.into());
        self
    }

    pub fn inversed_by(mut self, property: impl Into<String>) -> Self {
        self.inversed_by = Some(property.into());
        self
    }

    pub fn with_join_column(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into());
        self
    }

    pub fn with_join_table(
        mut self,
        name: impl Into<String>,
        join_column: impl Into<String>,
        inverse_join_column: impl Into<String>,
    ) -> Self {
        self.join_table = Some(JoinTable {
            name: name.into(),
            join_column: join_column.into(),
            inverse_join_column: inverse_join_column.into(),
        });
        self
    }

    pub fn is_owning_side(&self) -> bool {
        self.mapped_by.is_none()
    }

    pub fn is_to_many(&self) -> bool {
        self.kind.is_to_many()
    }

    /// Foreign key column of an owning to-one association.
    pub fn join_column(&self) -> String {
        self.join_column
            .clone()
            .unwrap_or_else(|| format!("{}_id", self.name))
    }
}

/// How one class is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClassMapping {
    pub class: String,
    pub table: String,
    /// Document collection, defaults to the table name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub associations: Vec<AssociationMapping>,
}

impl ClassMapping {
    pub fn new(class: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            table: table.into(),
            collection: None,
            identifiers: vec!["id".to_string()],
            fields: Vec::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_identifiers<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifiers = identifiers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_association(mut self, association: AssociationMapping) -> Self {
        self.associations.push(association);
        self
    }

    pub fn collection_name(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.table)
    }

    pub fn field(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared type of a scalar field.
    pub fn type_of_field(&self, name: &str) -> Option<FieldType> {
        self.field(name).map(|f| f.field_type)
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.associations.iter().any(|a| a.name == name)
    }

    pub fn association(&self, name: &str) -> StorageResult<&AssociationMapping> {
        self.associations
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| {
                LinkError::UnknownAssociation {
                    class: self.class.clone(),
                    property: name.to_string(),
                }
                .into()
            })
    }

    /// Column storing `name`: a field column, or the foreign key of an owning to-one
    /// association.
    pub fn column(&self, name: &str) -> StorageResult<String> {
        if let Some(field) = self.field(name) {
            return Ok(field.column().to_string());
        }
        match self.associations.iter().find(|a| a.name == name) {
            Some(assoc) if assoc.is_owning_side() && assoc.kind.is_to_one() => {
                Ok(assoc.join_column())
            }
            _ => Err(MappingError::UnknownField {
                class: self.class.clone(),
                field: name.to_string(),
            }
            .into()),
        }
    }

    /// Column of the single identifier.
    pub fn identifier_column(&self) -> StorageResult<String> {
        match self.identifiers.as_slice() {
            [id] => self.column(id),
            _ => Err(MappingError::InvalidMapping {
                class: self.class.clone(),
                message: "a single identifier is required here".to_string(),
            }
            .into()),
        }
    }

    /// Document field storing `name`. A sole identifier is stored as `_id`.
    pub fn document_field(&self, name: &str) -> String {
        match self.identifiers.as_slice() {
            [id] if id == name => "_id".to_string(),
            _ => name.to_string(),
        }
    }

    fn validate(&self) -> Result<(), MappingError> {
        let invalid = |message: String| MappingError::InvalidMapping {
            class: self.class.clone(),
            message,
        };

        if self.table.trim().is_empty() {
            return Err(invalid("table cannot be empty".to_string()));
        }
        if self.identifiers.is_empty() {
            return Err(invalid("at least one identifier is required".to_string()));
        }
        if let Some(id) = self.identifiers.iter().find(|id| self.field(id).is_none()) {
            return Err(invalid(format!("identifier '{}' is not a mapped field", id)));
        }
        for assoc in &self.associations {
            if self.field(&assoc.name).is_some() {
                return Err(invalid(format!(
                    "'{}' is declared both as a field and an association",
                    assoc.name
                )));
            }
            if assoc.kind == AssociationKind::OneToMany && assoc.mapped_by.is_none() {
                return Err(invalid(format!(
                    "one-to-many association '{}' requires mappedBy",
                    assoc.name
                )));
            }
            if assoc.kind == AssociationKind::ManyToMany
                && assoc.is_owning_side()
                && assoc.join_table.is_none()
            {
                return Err(invalid(format!(
                    "owning many-to-many association '{}' requires a joinTable",
                    assoc.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingFile {
    #[serde(default)]
    classes: Vec<ClassMapping>,
}

/// Registry of class mappings, keyed by class name.
#[derive(Debug, Default, Clone)]
pub struct MappingRegistry {
    classes: HashMap<String, Arc<ClassMapping>>,
    order: Vec<String>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping. Each class can only be registered once.
    pub fn register(&mut self, mapping: ClassMapping) -> StorageResult<()> {
        mapping.validate()?;
        if self.classes.contains_key(&mapping.class) {
            return Err(MappingError::DuplicateClass {
                class: mapping.class,
            }
            .into());
        }
        self.order.push(mapping.class.clone());
        self.classes.insert(mapping.class.clone(), Arc::new(mapping));
        Ok(())
    }

    pub fn with(mut self, mapping: ClassMapping) -> StorageResult<Self> {
        self.register(mapping)?;
        Ok(self)
    }

    pub fn get(&self, class: &str) -> StorageResult<&ClassMapping> {
        self.classes
            .get(class)
            .map(|m| m.as_ref())
            .ok_or_else(|| {
                MappingError::ClassNotMapped {
                    class: class.to_string(),
                }
                .into()
            })
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Mapped classes in registration order.
    pub fn classes(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Checks that association targets are mapped and that inverse sides point at an
    /// association of the target.
    pub fn validate(&self) -> StorageResult<()> {
        for class in &self.order {
            let mapping = self.get(class)?;
            for assoc in &mapping.associations {
                let target = self.get(&assoc.target).map_err(|_| MappingError::InvalidMapping {
                    class: class.clone(),
                    message: format!(
                        "association '{}' targets unmapped class '{}'",
                        assoc.name, assoc.target
                    ),
                })?;
                if let Some(mapped_by) = &assoc.mapped_by {
                    if !target.has_association(mapped_by) {
                        return Err(MappingError::InvalidMapping {
                            class: class.clone(),
                            message: format!(
                                "association '{}' is mapped by unknown '{}.{}'",
                                assoc.name, assoc.target, mapped_by
                            ),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Parses a JSON mapping document. `origin` names it in error messages.
    pub fn from_json(content: &str, origin: &str) -> StorageResult<Self> {
        let mut registry = Self::new();
        registry.add_document(content, origin)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Loads and validates every mapping file.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> StorageResult<Self> {
        let mut registry = Self::new();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| MappingError::LoadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            registry.add_document(&content, &path.display().to_string())?;
        }
        registry.validate()?;
        Ok(registry)
    }

    fn add_document(&mut self, content: &str, origin: &str) -> StorageResult<()> {
        let file: MappingFile =
            serde_json::from_str(content).map_err(|e| MappingError::LoadFailed {
                path: origin.to_string(),
                message: format!("Invalid JSON: {}", e),
            })?;
        let count = file.classes.len();
        for mapping in file.classes {
            self.register(mapping)?;
        }
        info!(origin, classes = count, "Loaded persistence mappings");
        Ok(())
    }
}
