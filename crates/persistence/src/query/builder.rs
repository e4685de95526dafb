//! The query builder adapter.
//!
//! Link resolution is written once against [`LinkQueryBuilder`]. A backend receives
//! joins, equality predicates, bound parameters and chains of correlated subqueries,
//! and translates them into its own query language.

use std::fmt;

use serde::Serialize;

use crate::error::StorageResult;

use super::name_generator::QueryNameGenerator;
use super::value::QueryValue;

/// A field reached through an alias: `alias.field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldRef {
    pub alias: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(alias: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.field)
    }
}

/// A named parameter and its typed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: QueryValue,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: QueryValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// `field = :parameter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub field: FieldRef,
    pub parameter: String,
}

impl Condition {
    pub fn new(field: FieldRef, parameter: impl Into<String>) -> Self {
        Self {
            field,
            parameter: parameter.into(),
        }
    }
}

/// How a joined alias is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum JoinTarget {
    /// Follows an association of an alias already in the query: `parent.property`.
    Association { parent: String, property: String },
    /// Joins a class by an explicit equality: `left = right`, where `right` belongs to
    /// the joined alias.
    Class { left: FieldRef, right: FieldRef },
}

/// An inner join introducing `alias` for rows of `class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub alias: String,
    pub class: String,
    pub target: JoinTarget,
}

impl Join {
    pub fn association(
        alias: impl Into<String>,
        class: impl Into<String>,
        parent: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            class: class.into(),
            target: JoinTarget::Association {
                parent: parent.into(),
                property: property.into(),
            },
        }
    }

    pub fn class(
        alias: impl Into<String>,
        class: impl Into<String>,
        left: FieldRef,
        right: FieldRef,
    ) -> Self {
        Self {
            alias: alias.into(),
            class: class.into(),
            target: JoinTarget::Class { left, right },
        }
    }

    /// Alias this join hangs from.
    pub fn parent_alias(&self) -> &str {
        match &self.target {
            JoinTarget::Association { parent, .. } => parent,
            JoinTarget::Class { left, .. } => &left.alias,
        }
    }
}

/// `outer IN (SELECT select FROM class alias INNER JOIN member ... WHERE conditions)`
///
/// Used instead of a join for to-many associations so that each matching row appears
/// once. In a chain, every subquery sits inside the `WHERE` of the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelatedSubquery {
    pub outer: FieldRef,
    pub class: String,
    pub alias: String,
    /// The to-many association, joined from `alias`.
    pub member: Join,
    pub select: FieldRef,
    /// Joins resolved after this subquery was opened.
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
}

/// The capabilities link resolution needs from a query backend.
pub trait LinkQueryBuilder {
    /// Alias of the resource being fetched.
    fn root_alias(&self) -> &str;

    /// Class of the resource being fetched.
    fn root_class(&self) -> &str;

    /// The name generator owned by this query.
    fn names(&mut self) -> &mut QueryNameGenerator;

    fn join(&mut self, join: Join) -> StorageResult<()>;

    /// Adds `field = :binding` and binds the parameter.
    fn match_equals(&mut self, field: FieldRef, binding: Binding) -> StorageResult<()>;

    fn match_in(&mut self, field: FieldRef, values: Vec<QueryValue>) -> StorageResult<()>;

    /// Binds a parameter referenced from a subquery condition.
    fn set_parameter(&mut self, binding: Binding) -> StorageResult<()>;

    /// Adds a chain of nested subqueries as one conjunctive predicate.
    fn correlated_subquery_in(&mut self, chain: Vec<CorrelatedSubquery>) -> StorageResult<()>;
}
