//! Date range filtering of document queries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::query::{AggregationPlan, QueryValue, parse_datetime};

/// How documents without a value are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullManagement {
    ExcludeNull,
    IncludeNullBefore,
    IncludeNullAfter,
    IncludeNullBeforeAndAfter,
}

impl NullManagement {
    fn includes_null(&self, operator: DateOperator) -> bool {
        match self {
            NullManagement::ExcludeNull => false,
            NullManagement::IncludeNullBefore => operator.is_before(),
            NullManagement::IncludeNullAfter => !operator.is_before(),
            NullManagement::IncludeNullBeforeAndAfter => true,
        }
    }
}

impl FromStr for NullManagement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclude_null" => Ok(NullManagement::ExcludeNull),
            "include_null_before" => Ok(NullManagement::IncludeNullBefore),
            "include_null_after" => Ok(NullManagement::IncludeNullAfter),
            "include_null_before_and_after" => Ok(NullManagement::IncludeNullBeforeAndAfter),
            other => Err(format!("unknown null management: {}", other)),
        }
    }
}

/// A bound of a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOperator {
    Before,
    StrictlyBefore,
    After,
    StrictlyAfter,
}

impl DateOperator {
    /// In the order they are applied.
    pub const ALL: [DateOperator; 4] = [
        DateOperator::Before,
        DateOperator::StrictlyBefore,
        DateOperator::After,
        DateOperator::StrictlyAfter,
    ];

    /// Query parameter name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateOperator::Before => "before",
            DateOperator::StrictlyBefore => "strictly_before",
            DateOperator::After => "after",
            DateOperator::StrictlyAfter => "strictly_after",
        }
    }

    pub fn match_operator(&self) -> &'static str {
        match self {
            DateOperator::Before => "$lte",
            DateOperator::StrictlyBefore => "$lt",
            DateOperator::After => "$gte",
            DateOperator::StrictlyAfter => "$gt",
        }
    }

    pub fn is_before(&self) -> bool {
        matches!(self, DateOperator::Before | DateOperator::StrictlyBefore)
    }
}

impl fmt::Display for DateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters the fetched collection on date properties.
///
/// Only enabled properties that are mapped as date or datetime fields of the fetched
/// class are filtered. A value that is not a date skips its bound with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    properties: BTreeMap<String, Option<NullManagement>>,
}

impl DateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables filtering on `property`.
    pub fn with_property(mut self, property: impl Into<String>, nulls: Option<NullManagement>) -> Self {
        self.properties.insert(property.into(), nulls);
        self
    }

    pub fn is_enabled(&self, property: &str) -> bool {
        self.properties.contains_key(property)
    }

    /// Adds `$match` stages for `property` to the root pipeline of `plan`.
    ///
    /// `values` maps operator names (`before`, `strictly_before`, `after`,
    /// `strictly_after`) to dates. Returns the number of stages added.
    pub fn apply(
        &self,
        plan: &mut AggregationPlan<'_>,
        property: &str,
        values: &BTreeMap<String, String>,
    ) -> usize {
        let Some(nulls) = self.properties.get(property).copied() else {
            debug!(property, "Date filter not enabled for property");
            return 0;
        };
        let Ok(mapping) = plan.mappings().get(plan.class()) else {
            return 0;
        };
        match mapping.type_of_field(property) {
            Some(field_type) if field_type.is_date() => {}
            _ => {
                debug!(property, class = %mapping.class, "Not a mapped date field");
                return 0;
            }
        }

        let field = mapping.document_field(property);
        let mut stages = Vec::new();
        if nulls == Some(NullManagement::ExcludeNull) {
            stages.push(match_field(&field, json!({ "$ne": null })));
        }

        for operator in DateOperator::ALL {
            let Some(raw) = values.get(operator.as_str()) else {
                continue;
            };
            if raw.trim().is_empty() {
                continue;
            }
            let Some(date) = parse_datetime(raw) else {
                warn!(
                    field = %field,
                    value = %raw,
                    "Invalid filter ignored: the field has a wrong date format"
                );
                continue;
            };

            let comparison = match_condition(
                operator.match_operator(),
                QueryValue::DateTime(date).to_json(),
            );
            let bound = match_condition(&field, comparison);
            let stage = if nulls.is_some_and(|n| n.includes_null(operator)) {
                json!({ "$match": { "$or": [bound, match_condition(&field, Value::Null)] } })
            } else {
                json!({ "$match": bound })
            };
            stages.push(stage);
        }

        let added = stages.len();
        for stage in stages {
            plan.add_root_stage(stage);
        }
        added
    }
}

fn match_condition(field: &str, condition: Value) -> Value {
    let mut filter = Map::new();
    filter.insert(field.to_string(), condition);
    Value::Object(filter)
}

fn match_field(field: &str, condition: Value) -> Value {
    json!({ "$match": match_condition(field, condition) })
}
