//! An in-memory document store.
//!
//! Evaluates the subset of aggregation stages the document backend emits: `$match`
//! (equality, `$in`, `$ne`, `$eq`, `$lt`, `$lte`, `$gt`, `$gte`, `$or`, `$and`) and
//! `$lookup` with `localField`/`foreignField`. Field paths may be dotted; arrays on the
//! way are traversed and match when any element does.

use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{BackendError, StorageResult};

use super::value::parse_datetime;

const BACKEND: &str = "memory";

/// Something that runs aggregation pipelines over named collections.
pub trait DocumentSource: Send + Sync {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StorageResult<Vec<Value>>;
}

/// Collections of JSON documents held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, document: Value) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    pub fn insert_many(&self, collection: &str, documents: impl IntoIterator<Item = Value>) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn snapshot(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn lookup(&self, documents: &mut [Value], body: &Value) -> StorageResult<()> {
        let field = |name: &str| {
            body.get(name).and_then(Value::as_str).ok_or_else(|| {
                BackendError::query_failed(BACKEND, format!("$lookup requires '{}'", name))
            })
        };
        let from = field("from")?;
        let local_field = field("localField")?;
        let foreign_field = field("foreignField")?;
        let target = field("as")?;

        let foreign = self.snapshot(from);
        for document in documents.iter_mut() {
            let local = values_at(document, local_field);
            let joined: Vec<Value> = foreign
                .iter()
                .filter(|candidate| {
                    values_at(candidate, foreign_field)
                        .iter()
                        .any(|v| local.contains(v))
                })
                .cloned()
                .collect();
            if let Value::Object(map) = document {
                map.insert(target.to_string(), Value::Array(joined));
            }
        }
        Ok(())
    }
}

impl DocumentSource for InMemoryDocumentStore {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StorageResult<Vec<Value>> {
        let mut documents = self.snapshot(collection);
        for stage in pipeline {
            let (operator, body) = single_entry(stage)
                .ok_or_else(|| BackendError::query_failed(BACKEND, "a stage needs exactly one operator"))?;
            match operator {
                "$match" => {
                    let filter = body.as_object().ok_or_else(|| {
                        BackendError::query_failed(BACKEND, "$match expects an object")
                    })?;
                    documents.retain(|document| matches(document, filter));
                }
                "$lookup" => self.lookup(&mut documents, body)?,
                other => return Err(BackendError::unsupported(BACKEND, other).into()),
            }
        }
        trace!(collection, stages = pipeline.len(), results = documents.len(), "Aggregated");
        Ok(documents)
    }
}

fn single_entry(stage: &Value) -> Option<(&str, &Value)> {
    let map = stage.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.iter().next().map(|(k, v)| (k.as_str(), v))
}

/// Values found at a dotted path, with arrays flattened.
pub(crate) fn values_at(document: &Value, path: &str) -> Vec<Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.get(segment) {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    let mut values = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => values.extend(items.iter().cloned()),
            other => values.push(other.clone()),
        }
    }
    values
}

fn matches(document: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| match key.as_str() {
        "$or" => expected
            .as_array()
            .is_some_and(|branches| branches.iter().any(|b| matches_branch(document, b))),
        "$and" => expected
            .as_array()
            .is_some_and(|branches| branches.iter().all(|b| matches_branch(document, b))),
        path => matches_field(&values_at(document, path), expected),
    })
}

fn matches_branch(document: &Value, branch: &Value) -> bool {
    branch.as_object().is_some_and(|f| matches(document, f))
}

fn matches_field(values: &[Value], expected: &Value) -> bool {
    match expected {
        Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => {
            ops.iter().all(|(op, operand)| apply_operator(values, op, operand))
        }
        other => equals(values, other),
    }
}

/// Equality with document semantics: `null` also matches a missing field.
fn equals(values: &[Value], expected: &Value) -> bool {
    if expected.is_null() && values.is_empty() {
        return true;
    }
    values.iter().any(|v| v == expected)
}

fn apply_operator(values: &[Value], op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => equals(values, operand),
        "$ne" => !equals(values, operand),
        "$in" => operand
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| equals(values, c))),
        "$lt" => values.iter().any(|v| compare(v, operand) == Some(Ordering::Less)),
        "$lte" => values
            .iter()
            .any(|v| matches!(compare(v, operand), Some(Ordering::Less | Ordering::Equal))),
        "$gt" => values.iter().any(|v| compare(v, operand) == Some(Ordering::Greater)),
        "$gte" => values
            .iter()
            .any(|v| matches!(compare(v, operand), Some(Ordering::Greater | Ordering::Equal))),
        _ => false,
    }
}

/// Orders numbers numerically and strings as timestamps when both parse as one.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => match (parse_datetime(a), parse_datetime(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        _ => None,
    }
}
