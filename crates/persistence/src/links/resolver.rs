//! Link resolution.
//!
//! Turns the identifiers captured from a nested URI into joins and predicates that scope
//! a query to one path of the object graph. Links are walked from the fetched resource
//! back to the root of the URI, consuming one identifier per relation link:
//!
//! - a link without relation property filters its own class by identifier;
//! - a `to_property` follows an association of the current alias;
//! - a `from_property` on an owning to-one association joins `from_class` on its foreign
//!   key, on an inverse to-one it follows the `mapped_by` side;
//! - anything to-many opens a correlated `IN` subquery instead of joining, and every later
//!   link is resolved inside that subquery.

use std::collections::VecDeque;

use tracing::debug;
use trellis_metadata::Link;
use trellis_metadata::stages::short_name_of;

use crate::error::{BackendError, LinkError, MappingError, StorageResult};
use crate::mapping::{ClassMapping, MappingRegistry};
use crate::query::{
    Binding, Condition, CorrelatedSubquery, FieldRef, Join, LinkQueryBuilder, QueryValue,
};

/// Identifiers captured from a URI, in path order (root first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierChain {
    entries: Vec<(String, String)>,
}

impl IdentifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdentifierChain {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Number of identifiers a list of links consumes.
///
/// Expanded links and links without `from_class` take none, identifier filters take one
/// per identifier property and relation links take exactly one.
pub fn expected_identifier_count(links: &[Link]) -> usize {
    links
        .iter()
        .filter(|l| !l.is_expanded() && l.from_class().is_some())
        .map(|l| {
            if l.is_identifier_filter() {
                l.identifiers().len()
            } else {
                1
            }
        })
        .sum()
}

/// Resolves links against the persistence mappings.
#[derive(Debug, Clone, Copy)]
pub struct LinkResolver<'a> {
    mappings: &'a MappingRegistry,
}

/// Where the walk currently stands.
struct Cursor {
    alias: String,
    class: String,
    identifiers: Vec<String>,
}

impl<'a> LinkResolver<'a> {
    pub fn new(mappings: &'a MappingRegistry) -> Self {
        Self { mappings }
    }

    /// Adds to `builder` the joins and predicates scoping `resource_class` to the
    /// captured `identifiers`.
    ///
    /// Nothing is emitted when there are no identifiers or no links. The identifier count
    /// must match [`expected_identifier_count`].
    pub fn build_link_predicates<B>(
        &self,
        builder: &mut B,
        identifiers: &IdentifierChain,
        links: &[Link],
        resource_class: &str,
    ) -> StorageResult<()>
    where
        B: LinkQueryBuilder + ?Sized,
    {
        if identifiers.is_empty() || links.is_empty() {
            return Ok(());
        }

        let expected = expected_identifier_count(links);
        if expected != identifiers.len() {
            return Err(LinkError::IdentifierCountMismatch {
                expected,
                actual: identifiers.len(),
            }
            .into());
        }

        let resource = self.mappings.get(resource_class)?;
        let root = builder.root_alias().to_string();
        let mut values: VecDeque<(&str, &str)> = identifiers.iter().rev().collect();
        // Previous identifiers start as those of the last declared link.
        let seed = match links.last().map(Link::identifiers) {
            Some(last) if !last.is_empty() => last.to_vec(),
            _ => resource.identifiers.clone(),
        };
        let mut cursor = Cursor {
            alias: root.clone(),
            class: resource_class.to_string(),
            identifiers: seed,
        };
        let mut deferred: Vec<CorrelatedSubquery> = Vec::new();

        for link in links.iter().rev() {
            let Some(from_class) = link.from_class() else {
                continue;
            };
            if link.is_expanded() {
                continue;
            }
            let from_mapping = self.mappings.get(from_class)?;
            let identifier_properties = link.identifiers();

            if link.is_identifier_filter() {
                let alias = if from_class == resource_class && deferred.is_empty() {
                    root.clone()
                } else if cursor.class == from_class {
                    cursor.alias.clone()
                } else {
                    return Err(LinkError::UnreachableLink {
                        class: from_class.to_string(),
                    }
                    .into());
                };
                for property in identifier_properties {
                    let raw = next_value(&mut values, link)?;
                    let value = self.coerce(from_mapping, link, property, raw)?;
                    let binding = parameter(builder, property, value);
                    emit_equals(builder, &mut deferred, FieldRef::new(&alias, property), binding)?;
                }
                cursor = Cursor {
                    alias,
                    class: from_class.to_string(),
                    identifiers: identifier_properties.to_vec(),
                };
                continue;
            }

            let ([previous_identifier], [identifier_property]) =
                (cursor.identifiers.as_slice(), identifier_properties)
            else {
                return Err(LinkError::CompositeIdentifier.into());
            };
            let previous_identifier = previous_identifier.clone();
            let raw = next_value(&mut values, link)?;
            let value = self.coerce(from_mapping, link, identifier_property, raw)?;

            let alias = if let Some(from_property) = link.from_property() {
                let association = from_mapping.association(from_property)?;
                if association.is_to_many() {
                    // SELECT m.prev FROM From next INNER JOIN next.fromProperty m WHERE next.id = :p
                    let member = builder.names().generate_join_alias(from_property);
                    let next = builder.names().generate_join_alias(&alias_base(from_class));
                    let binding = parameter(builder, identifier_property, value);
                    deferred.push(CorrelatedSubquery {
                        outer: FieldRef::new(&cursor.alias, &previous_identifier),
                        class: from_class.to_string(),
                        alias: next.clone(),
                        member: Join::association(
                            &member,
                            &association.target,
                            &next,
                            from_property,
                        ),
                        select: FieldRef::new(&member, &previous_identifier),
                        joins: Vec::new(),
                        conditions: vec![Condition::new(
                            FieldRef::new(&next, identifier_property),
                            &binding.name,
                        )],
                    });
                    builder.set_parameter(binding)?;
                    next
                } else if let Some(mapped_by) = association.mapped_by.as_deref() {
                    let alias = builder.names().generate_join_alias(mapped_by);
                    let binding = parameter(builder, identifier_property, value);
                    self.mappings.get(&cursor.class)?.association(mapped_by)?;
                    let join = Join::association(&alias, from_class, &cursor.alias, mapped_by);
                    emit_join(builder, &mut deferred, join)?;
                    emit_equals(
                        builder,
                        &mut deferred,
                        FieldRef::new(&alias, identifier_property),
                        binding,
                    )?;
                    alias
                } else {
                    let alias = builder.names().generate_join_alias(&alias_base(from_class));
                    let binding = parameter(builder, identifier_property, value);
                    let join = Join::class(
                        &alias,
                        from_class,
                        FieldRef::new(&cursor.alias, &previous_identifier),
                        FieldRef::new(&alias, from_property),
                    );
                    emit_join(builder, &mut deferred, join)?;
                    emit_equals(
                        builder,
                        &mut deferred,
                        FieldRef::new(&alias, identifier_property),
                        binding,
                    )?;
                    alias
                }
            } else if let Some(to_property) = link.to_property() {
                let owner = self.mappings.get(&cursor.class)?;
                let association = owner.association(to_property)?;
                if association.is_to_many() {
                    // SELECT next.prev FROM Current next INNER JOIN next.toProperty m WHERE m.id = :p
                    let member = builder.names().generate_join_alias(to_property);
                    let next = builder.names().generate_join_alias(&alias_base(&cursor.class));
                    let binding = parameter(builder, identifier_property, value);
                    deferred.push(CorrelatedSubquery {
                        outer: FieldRef::new(&cursor.alias, &previous_identifier),
                        class: cursor.class.clone(),
                        alias: next.clone(),
                        member: Join::association(&member, from_class, &next, to_property),
                        select: FieldRef::new(&next, &previous_identifier),
                        joins: Vec::new(),
                        conditions: vec![Condition::new(
                            FieldRef::new(&member, identifier_property),
                            &binding.name,
                        )],
                    });
                    builder.set_parameter(binding)?;
                    member
                } else {
                    let alias = builder.names().generate_join_alias(to_property);
                    let binding = parameter(builder, identifier_property, value);
                    let join = Join::association(&alias, from_class, &cursor.alias, to_property);
                    emit_join(builder, &mut deferred, join)?;
                    emit_equals(
                        builder,
                        &mut deferred,
                        FieldRef::new(&alias, identifier_property),
                        binding,
                    )?;
                    alias
                }
            } else {
                continue;
            };

            cursor = Cursor {
                alias,
                class: from_class.to_string(),
                identifiers: vec![identifier_property.clone()],
            };
        }

        let subqueries = deferred.len();
        if !deferred.is_empty() {
            builder.correlated_subquery_in(deferred)?;
        }
        debug!(
            class = resource_class,
            links = links.len(),
            identifiers = identifiers.len(),
            subqueries,
            "Resolved link predicates"
        );
        Ok(())
    }

    /// Types a captured value with the declared type of `class.property`.
    fn coerce(
        &self,
        mapping: &ClassMapping,
        link: &Link,
        property: &str,
        raw: &str,
    ) -> StorageResult<QueryValue> {
        let field_type = mapping
            .type_of_field(property)
            .ok_or_else(|| MappingError::UnknownField {
                class: mapping.class.clone(),
                field: property.to_string(),
            })?;
        QueryValue::coerce(raw, field_type).map_err(|expected| {
            LinkError::InvalidIdentifier {
                parameter: link.parameter_name().unwrap_or(property).to_string(),
                value: raw.to_string(),
                expected,
            }
            .into()
        })
    }
}

fn parameter<B>(builder: &mut B, property: &str, value: QueryValue) -> Binding
where
    B: LinkQueryBuilder + ?Sized,
{
    Binding::new(builder.names().generate_parameter_name(property), value)
}

/// Takes the next captured value. The count is checked up front, so running out means a
/// link consumed more identifiers than [`expected_identifier_count`] accounted for.
fn next_value<'v>(values: &mut VecDeque<(&str, &'v str)>, consumer: &Link) -> StorageResult<&'v str> {
    values.pop_front().map(|(_, v)| v).ok_or_else(|| {
        BackendError::query_failed(
            "link resolver",
            format!(
                "no identifier left for link '{}'",
                consumer.parameter_name().unwrap_or("<unnamed>")
            ),
        )
        .into()
    })
}

/// Alias stem for a class: its lowercased short name.
fn alias_base(class: &str) -> String {
    short_name_of(class).to_lowercase()
}

/// Joins go into the innermost open subquery when there is one.
fn emit_join<B>(builder: &mut B, deferred: &mut [CorrelatedSubquery], join: Join) -> StorageResult<()>
where
    B: LinkQueryBuilder + ?Sized,
{
    match deferred.last_mut() {
        Some(subquery) => {
            subquery.joins.push(join);
            Ok(())
        }
        None => builder.join(join),
    }
}

fn emit_equals<B>(
    builder: &mut B,
    deferred: &mut [CorrelatedSubquery],
    field: FieldRef,
    binding: Binding,
) -> StorageResult<()>
where
    B: LinkQueryBuilder + ?Sized,
{
    match deferred.last_mut() {
        Some(subquery) => {
            subquery
                .conditions
                .push(Condition::new(field, binding.name.clone()));
            builder.set_parameter(binding)
        }
        None => builder.match_equals(field, binding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_next_value_takes_values_in_order() {
        let link = Link::new().with_parameter_name("companyId");
        let mut values: VecDeque<(&str, &str)> = VecDeque::from([("companyId", "1"), ("id", "2")]);

        assert_eq!(next_value(&mut values, &link).unwrap(), "1");
        assert_eq!(next_value(&mut values, &link).unwrap(), "2");
    }

    #[test]
    fn test_running_out_of_values_is_an_internal_error() {
        let link = Link::new().with_parameter_name("employeeId");
        let mut values: VecDeque<(&str, &str)> = VecDeque::new();

        let err = next_value(&mut values, &link).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::QueryFailed { .. })
        ));
        assert_eq!(
            err.to_string(),
            "query failed on link resolver: no identifier left for link 'employeeId'"
        );
    }
}
