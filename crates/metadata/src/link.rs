//! Links between resource classes.
//!
//! A [`Link`] describes one URI variable (or GraphQL argument) of an operation: which
//! class the captured identifier belongs to, and how that class is related to the
//! resource being fetched.
//!
//! | `from_property` | `to_property` | Meaning |
//! |-----------------|---------------|---------|
//! | unset | unset | identifier filter on `from_class` itself |
//! | set | unset | `from_class.from_property` points at the target |
//! | unset | set | `to_class.to_property` points back at `from_class` |
//!
//! Setting both is rejected by [`Link::validate`].

use serde::Serialize;

use crate::error::{MetadataError, MetadataResult};

/// One URI variable of an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to_property: Option<String>,
    identifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expanded_value: Option<String>,
}

impl Link {
    /// Creates an empty link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an identifier filter on `class`.
    pub fn identifier_filter<I, S>(
        parameter_name: impl Into<String>,
        class: impl Into<String>,
        identifiers: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new()
            .with_parameter_name(parameter_name)
            .with_from_class(class)
            .with_identifiers(identifiers)
    }

    pub fn parameter_name(&self) -> Option<&str> {
        self.parameter_name.as_deref()
    }

    pub fn from_class(&self) -> Option<&str> {
        self.from_class.as_deref()
    }

    pub fn to_class(&self) -> Option<&str> {
        self.to_class.as_deref()
    }

    pub fn from_property(&self) -> Option<&str> {
        self.from_property.as_deref()
    }

    pub fn to_property(&self) -> Option<&str> {
        self.to_property.as_deref()
    }

    /// Identifier properties of `from_class` captured by this link.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn expanded_value(&self) -> Option<&str> {
        self.expanded_value.as_deref()
    }

    /// Expanded links carry no filtering semantics.
    pub fn is_expanded(&self) -> bool {
        self.expanded_value.is_some()
    }

    /// Returns true when the link filters `from_class` by its own identifiers.
    pub fn is_identifier_filter(&self) -> bool {
        self.from_property.is_none() && self.to_property.is_none()
    }

    pub fn with_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.parameter_name = Some(name.into());
        self
    }

    pub fn with_from_class(mut self, class: impl Into<String>) -> Self {
        self.from_class = Some(class.into());
        self
    }

    pub fn with_to_class(mut self, class: impl Into<String>) -> Self {
        self.to_class = Some(class.into());
        self
    }

    pub fn with_from_property(mut self, property: impl Into<String>) -> Self {
        self.from_property = Some(property.into());
        self
    }

    pub fn with_to_property(mut self, property: impl Into<String>) -> Self {
        self.to_property = Some(property.into());
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

    pub fn with_expanded_value(mut self, value: impl Into<String>) -> Self {
        self.expanded_value = Some(value.into());
        self
    }

    /// Checks the structural invariants of the link.
    pub fn validate(&self) -> MetadataResult<()> {
        let name = self.parameter_name.as_deref().unwrap_or("<unnamed>");

        if self.identifiers.is_empty() {
            return Err(MetadataError::invalid(format!(
                "link \"{}\" declares no identifier",
                name
            )));
        }

        if self.from_property.is_some() && self.to_property.is_some() {
            return Err(MetadataError::invalid(format!(
                "link \"{}\" cannot declare both fromProperty and toProperty",
                name
            )));
        }

        if !self.is_identifier_filter() && self.from_class.is_none() {
            return Err(MetadataError::invalid(format!(
                "link \"{}\" declares a relation property without fromClass",
                name
            )));
        }

        Ok(())
    }
}
