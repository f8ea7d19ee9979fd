//! SELECT and WHERE rendering.

use super::builder::{ConditionGroup, Query};
use super::condition::Condition;
use super::dialect::Dialect;
use super::statement::{Binder, Statement};
use super::types::Operator;
use crate::{Result, SpotError, Value};

impl Dialect {
    /// Renders a SELECT for `query`.
    ///
    /// Clause order is WHERE, GROUP BY, ORDER BY, LIMIT, OFFSET.
    pub fn build_select(&self, query: &Query) -> Result<Statement> {
        let mut binder = Binder::new();

        let columns = if query.fields().is_empty() {
            "*".to_string()
        } else {
            query
                .fields()
                .iter()
                .map(|f| if f == "*" { f.clone() } else { self.quote_identifier(f) })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.quote_identifier(query.datasource()));
        sql.push_str(&self.build_where(query.groups(), &mut binder)?);

        if !query.group_by_columns().is_empty() {
            let cols: Vec<String> = query
                .group_by_columns()
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            sql.push_str(&format!(" GROUP BY {}", cols.join(", ")));
        }

        if !query.order_by_clauses().is_empty() {
            let parts: Vec<String> = query
                .order_by_clauses()
                .iter()
                .map(|(field, dir)| format!("{} {}", self.quote_identifier(field), dir.to_sql()))
                .collect();
            sql.push_str(&format!(" ORDER BY {}", parts.join(", ")));
        }

        match (query.limit_value(), query.offset_value()) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset)),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // both backends need a LIMIT before OFFSET
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {}", self.max_limit(), offset)),
            (None, None) => {}
        }

        Ok(Statement::with_binds(sql, binder.into_binds()))
    }

    /// Renders `SELECT COUNT(*)` over the query's conditions.
    ///
    /// Projection, ordering and paging do not apply to counts.
    pub fn build_count(&self, query: &Query) -> Result<Statement> {
        let mut binder = Binder::new();
        let mut sql = format!(
            "SELECT COUNT(*) AS {} FROM {}",
            self.quote_identifier("count"),
            self.quote_identifier(query.datasource())
        );
        sql.push_str(&self.build_where(query.groups(), &mut binder)?);
        Ok(Statement::with_binds(sql, binder.into_binds()))
    }

    fn max_limit(&self) -> &'static str {
        match self {
            Dialect::Mysql => "18446744073709551615",
            Dialect::Sqlite => "-1",
        }
    }

    /// Renders ` WHERE ...` for the groups, or an empty string when there are none.
    pub(crate) fn build_where(&self, groups: &[ConditionGroup], binder: &mut Binder) -> Result<String> {
        if groups.is_empty() {
            return Ok(String::new());
        }
        let mut sql = String::from(" WHERE ");
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(group.group_joiner.to_sql());
                sql.push(' ');
            }
            let parts = group
                .conditions
                .iter()
                .map(|cond| self.build_condition(cond, binder))
                .collect::<Result<Vec<_>>>()?;
            let joiner = format!(" {} ", group.joiner.to_sql());
            sql.push_str(&format!("( {} )", parts.join(&joiner)));
        }
        Ok(sql)
    }

    /// Renders one condition, binding its values.
    pub(crate) fn build_condition(&self, cond: &Condition, binder: &mut Binder) -> Result<String> {
        let column = self.quote_identifier(&cond.field);

        match (cond.operator, &cond.value) {
            (Operator::All, _) => Err(SpotError::UnsupportedOperator(format!(
                "{} on field '{}'",
                Operator::All.token(),
                cond.field
            ))),
            (Operator::Eq, Value::Null) => Ok(format!("{} IS NULL", column)),
            (Operator::Ne, Value::Null) => Ok(format!("{} IS NOT NULL", column)),
            (Operator::Eq, Value::Array(items)) => {
                if items.is_empty() {
                    return Ok("1 = 0".to_string());
                }
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| binder.bind(&cond.field, item.clone()))
                    .collect();
                Ok(format!("{} IN ({})", column, placeholders.join(", ")))
            }
            (Operator::Ne, Value::Array(items)) => {
                if items.is_empty() {
                    return Ok("1 = 1".to_string());
                }
                Ok(format!("{} NOT IN ({})", column, self.escape_literal(&cond.value)))
            }
            (op, Value::Array(_)) => Err(SpotError::UnsupportedOperator(format!(
                "{} does not accept a list value (field '{}')",
                op.token(),
                cond.field
            ))),
            (Operator::Regex, value) => match self {
                Dialect::Mysql => {
                    let placeholder = binder.bind(&cond.field, value.clone());
                    Ok(format!("{} REGEXP {}", column, placeholder))
                }
                Dialect::Sqlite => Err(SpotError::UnsupportedOperator(format!(
                    "{} is not available on {}",
                    Operator::Regex.token(),
                    self
                ))),
            },
            (Operator::FullText, value) => match self {
                Dialect::Mysql => {
                    let placeholder = binder.bind(&cond.field, value.clone());
                    Ok(format!("MATCH({}) AGAINST({})", column, placeholder))
                }
                Dialect::Sqlite => Err(SpotError::UnsupportedOperator(format!(
                    "{} is not available on {}",
                    Operator::FullText.token(),
                    self
                ))),
            },
            (op, value) => {
                let placeholder = binder.bind(&cond.field, value.clone());
                Ok(format!("{} {} {}", column, op.to_sql(), placeholder))
            }
        }
    }
}
