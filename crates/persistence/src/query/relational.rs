//! Relational query plans.
//!
//! A [`QueryPlan`] records what link resolution asked for and renders it either as
//! readable object-query text ([`QueryPlan::to_dql`]) or as SQL against the mapped
//! tables ([`QueryPlan::to_sql`]).

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{BackendError, MappingError, StorageResult};
use crate::mapping::{AssociationKind, ClassMapping, MappingRegistry};

use super::builder::{
    Binding, Condition, CorrelatedSubquery, FieldRef, Join, JoinTarget, LinkQueryBuilder,
};
use super::name_generator::QueryNameGenerator;
use super::sql::SqlFragment;
use super::value::QueryValue;

const BACKEND: &str = "relational";

/// Default alias of the fetched resource.
pub const ROOT_ALIAS: &str = "o";

/// A conjunct of the `WHERE` clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Predicate {
    Equals(Condition),
    In {
        field: FieldRef,
        values: Vec<QueryValue>,
    },
    Subquery {
        chain: Vec<CorrelatedSubquery>,
    },
}

/// A relational query under construction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    class: String,
    root_alias: String,
    #[serde(skip)]
    names: QueryNameGenerator,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    parameters: Vec<Binding>,
}

impl QueryPlan {
    pub fn new(class: impl Into<String>) -> Self {
        Self::with_root_alias(class, ROOT_ALIAS)
    }

    pub fn with_root_alias(class: impl Into<String>, root_alias: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            root_alias: root_alias.into(),
            names: QueryNameGenerator::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Bound parameters in binding order.
    pub fn parameters(&self) -> &[Binding] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&QueryValue> {
        self.parameters
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    /// Returns true once any predicate restricts the result.
    pub fn is_scoped(&self) -> bool {
        !self.predicates.is_empty()
    }

    fn is_bound(&self, alias: &str) -> bool {
        alias == self.root_alias || self.joins.iter().any(|j| j.alias == alias)
    }

    /// Renders the plan as object-query text, with `:name` parameters.
    pub fn to_dql(&self) -> String {
        let mut dql = format!(
            "SELECT {root} FROM {} {root}",
            self.class,
            root = self.root_alias
        );
        for join in &self.joins {
            dql.push(' ');
            dql.push_str(&dql_join(join));
        }
        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self.predicates.iter().map(dql_predicate).collect();
            dql.push_str(" WHERE ");
            dql.push_str(&clauses.join(" AND "));
        }
        dql
    }

    /// Renders the plan as SQL over the mapped tables.
    ///
    /// Fails when a class is not mapped, an association is unknown or a referenced
    /// parameter was never bound.
    pub fn to_sql(&self, mappings: &MappingRegistry) -> StorageResult<SqlFragment> {
        let root = mappings.get(&self.class)?;
        let mut renderer = SqlRenderer {
            mappings,
            aliases: self.alias_classes(),
            parameters: &self.parameters,
            fragment: SqlFragment::new(format!(
                "SELECT {alias}.* FROM {} {alias}",
                root.table,
                alias = self.root_alias
            )),
        };

        for join in &self.joins {
            renderer.join(join)?;
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            renderer
                .fragment
                .push_str(if i == 0 { " WHERE " } else { " AND " });
            renderer.predicate(predicate)?;
        }
        Ok(renderer.fragment)
    }

    fn alias_classes(&self) -> HashMap<String, String> {
        let mut aliases = HashMap::new();
        aliases.insert(self.root_alias.clone(), self.class.clone());
        for join in &self.joins {
            aliases.insert(join.alias.clone(), join.class.clone());
        }
        for predicate in &self.predicates {
            if let Predicate::Subquery { chain } = predicate {
                for subquery in chain {
                    aliases.insert(subquery.alias.clone(), subquery.class.clone());
                    aliases.insert(subquery.member.alias.clone(), subquery.member.class.clone());
                    for join in &subquery.joins {
                        aliases.insert(join.alias.clone(), join.class.clone());
                    }
                }
            }
        }
        aliases
    }
}

impl LinkQueryBuilder for QueryPlan {
    fn root_alias(&self) -> &str {
        &self.root_alias
    }

    fn root_class(&self) -> &str {
        &self.class
    }

    fn names(&mut self) -> &mut QueryNameGenerator {
        &mut self.names
    }

    fn join(&mut self, join: Join) -> StorageResult<()> {
        if self.is_bound(&join.alias) {
            return Err(BackendError::query_failed(
                BACKEND,
                format!("alias '{}' is already bound", join.alias),
            )
            .into());
        }
        if !self.is_bound(join.parent_alias()) {
            return Err(MappingError::UnknownAlias {
                alias: join.parent_alias().to_string(),
            }
            .into());
        }
        self.joins.push(join);
        Ok(())
    }

    fn match_equals(&mut self, field: FieldRef, binding: Binding) -> StorageResult<()> {
        let condition = Condition::new(field, binding.name.clone());
        self.set_parameter(binding)?;
        self.predicates.push(Predicate::Equals(condition));
        Ok(())
    }

    fn match_in(&mut self, field: FieldRef, values: Vec<QueryValue>) -> StorageResult<()> {
        self.predicates.push(Predicate::In { field, values });
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
        if chain.is_empty() {
            return Ok(());
        }
        self.predicates.push(Predicate::Subquery { chain });
        Ok(())
    }
}

fn dql_join(join: &Join) -> String {
    match &join.target {
        JoinTarget::Association { parent, property } => {
            format!("INNER JOIN {}.{} {}", parent, property, join.alias)
        }
        JoinTarget::Class { left, right } => format!(
            "INNER JOIN {} {} WITH {} = {}",
            join.class, join.alias, left, right
        ),
    }
}

fn dql_condition(condition: &Condition) -> String {
    format!("{} = :{}", condition.field, condition.parameter)
}

fn dql_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Equals(condition) => dql_condition(condition),
        Predicate::In { values, .. } if values.is_empty() => "1 = 0".to_string(),
        Predicate::In { field, values } => {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("{} IN ({})", field, values.join(", "))
        }
        Predicate::Subquery { chain } => {
            let mut dql = String::new();
            for (i, subquery) in chain.iter().enumerate() {
                dql.push_str(&format!(
                    "{} IN (SELECT {} FROM {} {} {}",
                    subquery.outer,
                    subquery.select,
                    subquery.class,
                    subquery.alias,
                    dql_join(&subquery.member)
                ));
                for join in &subquery.joins {
                    dql.push(' ');
                    dql.push_str(&dql_join(join));
                }
                let clauses: Vec<String> = subquery.conditions.iter().map(dql_condition).collect();
                let nested = i + 1 < chain.len();
                if !clauses.is_empty() || nested {
                    dql.push_str(" WHERE ");
                    dql.push_str(&clauses.join(" AND "));
                    if nested && !clauses.is_empty() {
                        dql.push_str(" AND ");
                    }
                }
            }
            dql.push_str(&")".repeat(chain.len()));
            dql
        }
    }
}

struct SqlRenderer<'a> {
    mappings: &'a MappingRegistry,
    aliases: HashMap<String, String>,
    parameters: &'a [Binding],
    fragment: SqlFragment,
}

impl<'a> SqlRenderer<'a> {
    fn class_of(&self, alias: &str) -> StorageResult<&'a ClassMapping> {
        let mappings = self.mappings;
        let class = self.aliases.get(alias).ok_or_else(|| MappingError::UnknownAlias {
            alias: alias.to_string(),
        })?;
        mappings.get(class)
    }

    fn column(&self, field: &FieldRef) -> StorageResult<String> {
        let mapping = self.class_of(&field.alias)?;
        Ok(format!("{}.{}", field.alias, mapping.column(&field.field)?))
    }

    fn bound(&self, name: &str) -> StorageResult<&'a QueryValue> {
        let parameters = self.parameters;
        parameters
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
            .ok_or_else(|| {
                BackendError::query_failed(BACKEND, format!("parameter '{}' is not bound", name))
                    .into()
            })
    }

    fn join(&mut self, join: &Join) -> StorageResult<()> {
        let mappings = self.mappings;
        let target = mappings.get(&join.class)?;
        let alias = &join.alias;
        let target_id = target.identifier_column()?;

        let sql = match &join.target {
            JoinTarget::Association { parent, property } => {
                let parent_mapping = self.class_of(parent)?;
                let association = parent_mapping.association(property)?;
                match (association.kind, &association.mapped_by) {
                    (AssociationKind::ManyToMany, mapped_by) => {
                        let (table, parent_column, target_column) = match mapped_by {
                            None => {
                                let table = association.join_table.as_ref().ok_or_else(|| {
                                    missing_join_table(parent_mapping, property)
                                })?;
                                (&table.name, &table.join_column, &table.inverse_join_column)
                            }
                            Some(mapped_by) => {
                                let owning = target.association(mapped_by)?;
                                let table = owning
                                    .join_table
                                    .as_ref()
                                    .ok_or_else(|| missing_join_table(target, mapped_by))?;
                                (&table.name, &table.inverse_join_column, &table.join_column)
                            }
                        };
                        let link = format!("{}_jt", alias);
                        format!(
                            " INNER JOIN {table} {link} ON {link}.{parent_column} = {parent}.{} \
                             INNER JOIN {} {alias} ON {alias}.{target_id} = {link}.{target_column}",
                            parent_mapping.identifier_column()?,
                            target.table,
                        )
                    }
                    (_, None) => format!(
                        " INNER JOIN {} {alias} ON {alias}.{target_id} = {parent}.{}",
                        target.table,
                        association.join_column()
                    ),
                    (_, Some(mapped_by)) => {
                        let owning = target.association(mapped_by)?;
                        format!(
                            " INNER JOIN {} {alias} ON {alias}.{} = {parent}.{}",
                            target.table,
                            owning.join_column(),
                            parent_mapping.identifier_column()?
                        )
                    }
                }
            }
            JoinTarget::Class { left, right } => format!(
                " INNER JOIN {} {alias} ON {} = {}",
                target.table,
                self.column(left)?,
                self.column(right)?
            ),
        };
        self.fragment.push_str(&sql);
        Ok(())
    }

    fn condition(&mut self, condition: &Condition) -> StorageResult<()> {
        let column = self.column(&condition.field)?;
        let value = self.bound(&condition.parameter)?;
        let placeholder = self.fragment.add_param(value.to_sql_param());
        self.fragment
            .push_str(&format!("{} = {}", column, placeholder));
        Ok(())
    }

    fn predicate(&mut self, predicate: &Predicate) -> StorageResult<()> {
        match predicate {
            Predicate::Equals(condition) => self.condition(condition),
            Predicate::In { values, .. } if values.is_empty() => {
                self.fragment.push_str("1 = 0");
                Ok(())
            }
            Predicate::In { field, values } => {
                let column = self.column(field)?;
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| self.fragment.add_param(v.to_sql_param()))
                    .collect();
                self.fragment
                    .push_str(&format!("{} IN ({})", column, placeholders.join(", ")));
                Ok(())
            }
            Predicate::Subquery { chain } => self.subquery_chain(chain),
        }
    }

    fn subquery_chain(&mut self, chain: &[CorrelatedSubquery]) -> StorageResult<()> {
        for (i, subquery) in chain.iter().enumerate() {
            let table = &self.mappings.get(&subquery.class)?.table;
            let head = format!(
                "{} IN (SELECT {} FROM {} {}",
                self.column(&subquery.outer)?,
                self.column(&subquery.select)?,
                table,
                subquery.alias
            );
            self.fragment.push_str(&head);
            self.join(&subquery.member)?;
            for join in &subquery.joins {
                self.join(join)?;
            }

            let nested = i + 1 < chain.len();
            if subquery.conditions.is_empty() && !nested {
                continue;
            }
            self.fragment.push_str(" WHERE ");
            for (j, condition) in subquery.conditions.iter().enumerate() {
                if j > 0 {
                    self.fragment.push_str(" AND ");
                }
                self.condition(condition)?;
            }
            if nested && !subquery.conditions.is_empty() {
                self.fragment.push_str(" AND ");
            }
        }
        self.fragment.push_str(&")".repeat(chain.len()));
        Ok(())
    }
}

fn missing_join_table(mapping: &ClassMapping, property: &str) -> MappingError {
    MappingError::InvalidMapping {
        class: mapping.class.clone(),
        message: format!("many-to-many association '{}' has no joinTable", property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::mapping::{AssociationMapping, FieldMapping, FieldType};
    use crate::query::sql::SqlParam;

    fn registry() -> MappingRegistry {
        MappingRegistry::new()
            .with(
                ClassMapping::new("Company", "company")
                    .with_field(FieldMapping::new("id", FieldType::Integer))
                    .with_association(
                        AssociationMapping::new("employees", AssociationKind::OneToMany, "Employee")
                            .mapped_by("company"),
                    ),
            )
            .unwrap()
            .with(
                ClassMapping::new("Employee", "employee")
                    .with_field(FieldMapping::new("id", FieldType::Integer))
                    .with_association(AssociationMapping::new(
                        "company",
                        AssociationKind::ManyToOne,
                        "Company",
                    )),
            )
            .unwrap()
    }

    #[test]
    fn test_unscoped_plan() {
        let plan = QueryPlan::new("Employee");
        assert_eq!(plan.to_dql(), "SELECT o FROM Employee o");
        assert!(!plan.is_scoped());
        let sql = plan.to_sql(&registry()).unwrap();
        assert_eq!(sql.sql, "SELECT o.* FROM employee o");
    }

    #[test]
    fn test_owning_join() {
        let mut plan = QueryPlan::new("Employee");
        plan.join(Join::association("company_a1", "Company", "o", "company"))
            .unwrap();
        plan.match_equals(
            FieldRef::new("company_a1", "id"),
            Binding::new("id_p2", QueryValue::Integer(7)),
        )
        .unwrap();

        assert_eq!(
            plan.to_dql(),
            "SELECT o FROM Employee o INNER JOIN o.company company_a1 WHERE company_a1.id = :id_p2"
        );
        let sql = plan.to_sql(&registry()).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT o.* FROM employee o INNER JOIN company company_a1 ON company_a1.id = o.company_id WHERE company_a1.id = ?1"
        );
        assert_eq!(sql.params, vec![SqlParam::Integer(7)]);
    }

    #[test]
    fn test_inverse_join() {
        let mut plan = QueryPlan::new("Company");
        plan.join(Join::association("employees_a1", "Employee", "o", "employees"))
            .unwrap();
        let sql = plan.to_sql(&registry()).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT o.* FROM company o INNER JOIN employee employees_a1 ON employees_a1.company_id = o.id"
        );
    }

    #[test]
    fn test_subquery_rendering() {
        let mut plan = QueryPlan::new("Employee");
        plan.set_parameter(Binding::new("id_p2", QueryValue::Integer(3)))
            .unwrap();
        plan.correlated_subquery_in(vec![CorrelatedSubquery {
            outer: FieldRef::new("o", "id"),
            class: "Company".to_string(),
            alias: "company_a3".to_string(),
            member: Join::association("employees_a1", "Employee", "company_a3", "employees"),
            select: FieldRef::new("employees_a1", "id"),
            joins: Vec::new(),
            conditions: vec![Condition::new(FieldRef::new("company_a3", "id"), "id_p2")],
        }])
        .unwrap();

        assert_eq!(
            plan.to_dql(),
            "SELECT o FROM Employee o WHERE o.id IN (SELECT employees_a1.id FROM Company company_a3 \
             INNER JOIN company_a3.employees employees_a1 WHERE company_a3.id = :id_p2)"
        );
        let sql = plan.to_sql(&registry()).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT o.* FROM employee o WHERE o.id IN (SELECT employees_a1.id FROM company company_a3 \
             INNER JOIN employee employees_a1 ON employees_a1.company_id = company_a3.id \
             WHERE company_a3.id = ?1)"
        );
        assert_eq!(sql.params, vec![SqlParam::Integer(3)]);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let mut plan = QueryPlan::new("Employee");
        plan.match_in(FieldRef::new("o", "id"), Vec::new()).unwrap();
        assert_eq!(plan.to_dql(), "SELECT o FROM Employee o WHERE 1 = 0");

        plan.match_in(
            FieldRef::new("o", "id"),
            vec![QueryValue::Integer(1), QueryValue::Integer(2)],
        )
        .unwrap();
        let sql = plan.to_sql(&registry()).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT o.* FROM employee o WHERE 1 = 0 AND o.id IN (?1, ?2)"
        );
    }

    #[test]
    fn test_join_rejects_unknown_parent_and_rebinding() {
        let mut plan = QueryPlan::new("Employee");
        let err = plan
            .join(Join::association("company_a1", "Company", "x", "company"))
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Mapping(MappingError::UnknownAlias { .. })
        ));

        plan.join(Join::association("company_a1", "Company", "o", "company"))
            .unwrap();
        assert!(plan
            .join(Join::association("company_a1", "Company", "o", "company"))
            .is_err());
    }

    #[test]
    fn test_unbound_parameter_fails_rendering() {
        let mut plan = QueryPlan::new("Employee");
        plan.predicates.push(Predicate::Equals(Condition::new(
            FieldRef::new("o", "id"),
            "missing_p1",
        )));
        assert!(matches!(
            plan.to_sql(&registry()),
            Err(StorageError::Backend(BackendError::QueryFailed { .. }))
        ));
    }

    #[test]
    fn test_rebinding_a_parameter_replaces_its_value() {
        let mut plan = QueryPlan::new("Employee");
        plan.set_parameter(Binding::new("id_p1", QueryValue::Integer(1)))
            .unwrap();
        plan.set_parameter(Binding::new("id_p1", QueryValue::Integer(2)))
            .unwrap();
        assert_eq!(plan.parameters().len(), 1);
        assert_eq!(plan.parameter("id_p1"), Some(&QueryValue::Integer(2)));
    }
}
