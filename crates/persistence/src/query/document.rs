//! Document aggregation plans.
//!
//! Link resolution against a document store produces a tree of pipelines kept in an
//! arena: node 0 aggregates the fetched collection and every join or correlated
//! subquery adds a node below the node its parent alias lives in. Each non-root node
//! carries a [`Feed`]: after it runs, the values found at `source_path` in its results
//! restrict its parent with `target_field $in [...]`.
//!
//! [`AggregationPlan::execute`] runs the nodes from the last to the first, so children
//! always complete before their parent and no recursion is needed.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{BackendError, MappingError, StorageResult};
use crate::mapping::{ClassMapping, MappingRegistry};

use super::builder::{
    Binding, CorrelatedSubquery, FieldRef, Join, JoinTarget, LinkQueryBuilder,
};
use super::memory::{DocumentSource, values_at};
use super::name_generator::QueryNameGenerator;
use super::relational::ROOT_ALIAS;
use super::value::QueryValue;

const BACKEND: &str = "document";

/// How a node's results restrict its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub source_path: String,
    pub target_field: String,
}

/// One pipeline of the plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    pub class: String,
    pub collection: String,
    pub alias: String,
    pub parent: Option<usize>,
    pub feed: Option<Feed>,
    pub stages: Vec<Value>,
}

/// Where an alias lives: a node, and a path prefix when the alias names documents
/// embedded by a `$lookup`.
#[derive(Debug, Clone)]
struct AliasTarget {
    node: usize,
    prefix: String,
    class: String,
}

/// A document query under construction.
#[derive(Debug)]
pub struct AggregationPlan<'a> {
    mappings: &'a MappingRegistry,
    root_alias: String,
    names: QueryNameGenerator,
    nodes: Vec<PipelineNode>,
    aliases: HashMap<String, AliasTarget>,
    parameters: Vec<Binding>,
}

impl<'a> AggregationPlan<'a> {
    pub fn new(mappings: &'a MappingRegistry, class: &str) -> StorageResult<Self> {
        let mapping = mappings.get(class)?;
        let mut aliases = HashMap::new();
        aliases.insert(
            ROOT_ALIAS.to_string(),
            AliasTarget {
                node: 0,
                prefix: String::new(),
                class: class.to_string(),
            },
        );
        Ok(Self {
            mappings,
            root_alias: ROOT_ALIAS.to_string(),
            names: QueryNameGenerator::new(),
            nodes: vec![PipelineNode {
                class: class.to_string(),
                collection: mapping.collection_name().to_string(),
                alias: ROOT_ALIAS.to_string(),
                parent: None,
                feed: None,
                stages: Vec::new(),
            }],
            aliases,
            parameters: Vec::new(),
        })
    }

    pub fn mappings(&self) -> &'a MappingRegistry {
        self.mappings
    }

    pub fn class(&self) -> &str {
        &self.nodes[0].class
    }

    pub fn nodes(&self) -> &[PipelineNode] {
        &self.nodes
    }

    /// Static stages of the pipeline at `index`, node 0 being the fetched collection.
    pub fn pipeline(&self, index: usize) -> Option<&[Value]> {
        self.nodes.get(index).map(|n| n.stages.as_slice())
    }

    pub fn parameters(&self) -> &[Binding] {
        &self.parameters
    }

    /// Appends a stage to the root pipeline.
    pub fn add_root_stage(&mut self, stage: Value) {
        self.nodes[0].stages.push(stage);
    }

    /// Returns true once any stage restricts the result.
    pub fn is_scoped(&self) -> bool {
        self.nodes.len() > 1 || !self.nodes[0].stages.is_empty()
    }

    /// The plan as JSON, one entry per node.
    pub fn to_json(&self) -> Value {
        json!({ "nodes": self.nodes })
    }

    /// Runs every node against `source` and returns the documents of the root
    /// collection.
    pub fn execute(&self, source: &dyn DocumentSource) -> StorageResult<Vec<Value>> {
        let mut fed: Vec<Vec<Value>> = vec![Vec::new(); self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate().rev() {
            let mut pipeline = node.stages.clone();
            pipeline.append(&mut fed[index]);
            let documents = source.aggregate(&node.collection, &pipeline)?;
            debug!(
                node = index,
                collection = %node.collection,
                results = documents.len(),
                "Executed pipeline node"
            );
            if index == 0 {
                return Ok(documents);
            }

            let (Some(parent), Some(feed)) = (node.parent, &node.feed) else {
                continue;
            };
            let mut values: Vec<Value> = Vec::new();
            for document in &documents {
                for value in values_at(document, &feed.source_path) {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
            }
            fed[parent].push(match_stage(&feed.target_field, json!({ "$in": values })));
        }
        Ok(Vec::new())
    }

    fn resolve(&self, alias: &str) -> StorageResult<AliasTarget> {
        self.aliases.get(alias).cloned().ok_or_else(|| {
            MappingError::UnknownAlias {
                alias: alias.to_string(),
            }
            .into()
        })
    }

    /// Node and document path of `alias.field`.
    fn field_path(&self, field: &FieldRef) -> StorageResult<(usize, String)> {
        let target = self.resolve(&field.alias)?;
        let mapping = self.mappings.get(&target.class)?;
        Ok((
            target.node,
            join_path(&target.prefix, &mapping.document_field(&field.field)),
        ))
    }

    fn add_node(
        &mut self,
        class: &str,
        alias: &str,
        parent: usize,
        feed: Option<Feed>,
    ) -> StorageResult<usize> {
        if self.aliases.contains_key(alias) {
            return Err(BackendError::query_failed(
                BACKEND,
                format!("alias '{}' is already bound", alias),
            )
            .into());
        }
        let mapping = self.mappings.get(class)?;
        self.nodes.push(PipelineNode {
            class: class.to_string(),
            collection: mapping.collection_name().to_string(),
            alias: alias.to_string(),
            parent: Some(parent),
            feed,
            stages: Vec::new(),
        });
        let index = self.nodes.len() - 1;
        self.aliases.insert(
            alias.to_string(),
            AliasTarget {
                node: index,
                prefix: String::new(),
                class: class.to_string(),
            },
        );
        Ok(index)
    }

    fn push_match(&mut self, node: usize, path: String, condition: Value) {
        self.nodes[node].stages.push(match_stage(&path, condition));
    }

    fn bound(&self, name: &str) -> StorageResult<QueryValue> {
        self.parameters
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.value.clone())
            .ok_or_else(|| {
                BackendError::query_failed(BACKEND, format!("parameter '{}' is not bound", name))
                    .into()
            })
    }

    /// Opens one subquery of a chain and returns its node.
    fn open_subquery(&mut self, subquery: &CorrelatedSubquery) -> StorageResult<usize> {
        let mappings = self.mappings;
        let (outer_node, outer_path) = self.field_path(&subquery.outer)?;
        let owner = mappings.get(&subquery.class)?;
        let node = self.add_node(&subquery.class, &subquery.alias, outer_node, None)?;

        let JoinTarget::Association { parent, property } = &subquery.member.target else {
            return Err(BackendError::unsupported(BACKEND, "subquery member joined by class").into());
        };
        if parent != &subquery.alias {
            return Err(MappingError::UnknownAlias {
                alias: parent.clone(),
            }
            .into());
        }
        let association = owner.association(property)?;
        let member = mappings.get(&subquery.member.class)?;
        let lookup = match &association.mapped_by {
            None => json!({
                "from": member.collection_name(),
                "localField": owner.document_field(property),
                "foreignField": identifier_field(member)?,
                "as": property,
            }),
            Some(mapped_by) => json!({
                "from": member.collection_name(),
                "localField": identifier_field(owner)?,
                "foreignField": member.document_field(mapped_by),
                "as": property,
            }),
        };
        self.nodes[node].stages.push(json!({ "$lookup": lookup }));
        self.aliases.insert(
            subquery.member.alias.clone(),
            AliasTarget {
                node,
                prefix: property.clone(),
                class: subquery.member.class.clone(),
            },
        );

        let (select_node, select_path) = self.field_path(&subquery.select)?;
        if select_node != node {
            return Err(BackendError::unsupported(
                BACKEND,
                "subquery selecting outside its own pipeline",
            )
            .into());
        }
        self.nodes[node].feed = Some(Feed {
            source_path: select_path,
            target_field: outer_path,
        });
        Ok(node)
    }
}

impl LinkQueryBuilder for AggregationPlan<'_> {
    fn root_alias(&self) -> &str {
        &self.root_alias
    }

    fn root_class(&self) -> &str {
        self.class()
    }

    fn names(&mut self) -> &mut QueryNameGenerator {
        &mut self.names
    }

    fn join(&mut self, join: Join) -> StorageResult<()> {
        let mappings = self.mappings;
        let target = mappings.get(&join.class)?;
        let (parent, feed) = match &join.target {
            JoinTarget::Association { parent, property } => {
                let from = self.resolve(parent)?;
                let from_mapping = mappings.get(&from.class)?;
                let association = from_mapping.association(property)?;
                let feed = match &association.mapped_by {
                    None => Feed {
                        source_path: identifier_field(target)?,
                        target_field: join_path(&from.prefix, &from_mapping.document_field(property)),
                    },
                    Some(mapped_by) => Feed {
                        source_path: target.document_field(mapped_by),
                        target_field: join_path(&from.prefix, &identifier_field(from_mapping)?),
                    },
                };
                (from.node, feed)
            }
            JoinTarget::Class { left, right } => {
                let (node, path) = self.field_path(left)?;
                let feed = Feed {
                    source_path: target.document_field(&right.field),
                    target_field: path,
                };
                (node, feed)
            }
        };
        self.add_node(&join.class, &join.alias, parent, Some(feed))?;
        Ok(())
    }

    fn match_equals(&mut self, field: FieldRef, binding: Binding) -> StorageResult<()> {
        let (node, path) = self.field_path(&field)?;
        self.push_match(node, path, binding.value.to_json());
        self.set_parameter(binding)
    }

    fn match_in(&mut self, field: FieldRef, values: Vec<QueryValue>) -> StorageResult<()> {
        let (node, path) = self.field_path(&field)?;
        let values: Vec<Value> = values.iter().map(QueryValue::to_json).collect();
        self.push_match(node, path, json!({ "$in": values }));
        Ok(())
    }

    fn set_parameter(&mut self, binding: Binding) -> StorageResult<()> {
        match self.parameters.iter_mut().find(|b| b.name == binding.name) {
            Some(existing) => existing.value = binding.value,
            None => self.parameters.push(binding),
        }
        Ok(())
    }

    fn correlated_subquery_in(&mut self, chain: Vec<CorrelatedSubquery>) -> StorageResult<()> {
        for subquery in &chain {
            self.open_subquery(subquery)?;
            for join in &subquery.joins {
                self.join(join.clone())?;
            }
            for condition in &subquery.conditions {
                let value = self.bound(&condition.parameter)?;
                let (node, path) = self.field_path(&condition.field)?;
                self.push_match(node, path, value.to_json());
            }
        }
        Ok(())
    }
}

fn match_stage(path: &str, condition: Value) -> Value {
    let mut filter = Map::new();
    filter.insert(path.to_string(), condition);
    json!({ "$match": filter })
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn identifier_field(mapping: &ClassMapping) -> StorageResult<String> {
    match mapping.identifiers.as_slice() {
        [id] => Ok(mapping.document_field(id)),
        _ => Err(MappingError::InvalidMapping {
            class: mapping.class.clone(),
            message: "a single identifier is required here".to_string(),
        }
        .into()),
    }
}
