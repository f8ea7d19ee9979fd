//! Query struct and core implementation.

use super::condition::Conditions;
use super::helpers::validate_identifier;
use super::types::{Direction, Joiner};
use crate::descriptor::EntityRef;
use crate::Result;

/// A group of conditions joined by one connective, plus the connective that
/// attaches the group to the groups before it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub conditions: Conditions,
    /// Joins conditions inside the group
    pub joiner: Joiner,
    /// Joins this group to the preceding one; ignored for the first group
    pub group_joiner: Joiner,
}

/// A pure-data description of a read against one entity's datasource.
///
/// Building a query never touches a connection. Hand it to
/// [`Mapper::execute`](crate::Mapper::execute) or
/// [`Mapper::count`](crate::Mapper::count) to run it.
#[derive(Debug, Clone)]
pub struct Query {
    entity: EntityRef,
    datasource: String,
    /// SELECT columns (empty means SELECT *)
    fields: Vec<String>,
    groups: Vec<ConditionGroup>,
    order_by_clauses: Vec<(String, Direction)>,
    group_by_columns: Vec<String>,
    limit_value: Option<u64>,
    offset_value: Option<u64>,
}

impl Query {
    /// Creates a query over `datasource` producing `entity` instances.
    ///
    /// # Errors
    ///
    /// Returns error if the datasource name is invalid.
    pub fn new(entity: EntityRef, datasource: &str) -> Result<Self> {
        validate_identifier(datasource)?;
        Ok(Self {
            entity,
            datasource: datasource.to_string(),
            fields: Vec::new(),
            groups: Vec::new(),
            order_by_clauses: Vec::new(),
            group_by_columns: Vec::new(),
            limit_value: None,
            offset_value: None,
        })
    }

    /// Restricts the projected columns.
    pub fn select_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Result<Self> {
        let mut cols = Vec::with_capacity(fields.len());
        for field in fields {
            let field = field.as_ref();
            if field != "*" {
                validate_identifier(field)?;
            }
            cols.push(field.to_string());
        }
        self.fields = cols;
        Ok(self)
    }

    /// Appends an AND-joined condition group, attached with AND.
    pub fn where_clause(self, conditions: Conditions) -> Result<Self> {
        self.where_with(conditions, Joiner::And, Joiner::And)
    }

    /// Appends an AND-joined condition group, attached with AND.
    ///
    /// Same as [`where_clause`](Self::where_clause); use
    /// [`where_with`](Self::where_with) for OR-joined groups.
    pub fn and_where(self, conditions: Conditions) -> Result<Self> {
        self.where_with(conditions, Joiner::And, Joiner::And)
    }

    /// Appends an AND-joined condition group, attached with OR.
    pub fn or_where(self, conditions: Conditions) -> Result<Self> {
        self.where_with(conditions, Joiner::And, Joiner::Or)
    }

    /// Appends a condition group.
    ///
    /// # Arguments
    ///
    /// * `conditions` - Conditions of the group; an empty set adds nothing
    /// * `joiner` - Connective between the group's conditions
    /// * `group_joiner` - Connective to the previous group
    pub fn where_with(mut self, conditions: Conditions, joiner: Joiner, group_joiner: Joiner) -> Result<Self> {
        if conditions.is_empty() {
            return Ok(self);
        }
        for cond in &conditions {
            validate_identifier(&cond.field)?;
        }
        self.groups.push(ConditionGroup {
            conditions,
            joiner,
            group_joiner,
        });
        Ok(self)
    }

    /// Adds an ORDER BY clause.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Result<Self> {
        validate_identifier(field)?;
        self.order_by_clauses.push((field.to_string(), direction));
        Ok(self)
    }

    /// Adds a GROUP BY column.
    pub fn group_by(mut self, field: &str) -> Result<Self> {
        validate_identifier(field)?;
        self.group_by_columns.push(field.to_string());
        Ok(self)
    }

    /// Sets the LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_value = Some(limit);
        self
    }

    /// Sets the OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_value = Some(offset);
        self
    }

    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn groups(&self) -> &[ConditionGroup] {
        &self.groups
    }

    pub fn order_by_clauses(&self) -> &[(String, Direction)] {
        &self.order_by_clauses
    }

    pub fn group_by_columns(&self) -> &[String] {
        &self.group_by_columns
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit_value
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset_value
    }
}
