//! INSERT, UPDATE, DELETE and datasource-level statements.

use super::builder::ConditionGroup;
use super::condition::Conditions;
use super::dialect::Dialect;
use super::helpers::validate_identifier;
use super::statement::{Binder, Statement};
use super::types::Joiner;
use crate::{Record, Result, SpotError};

impl Dialect {
    /// Builds an INSERT for one row.
    ///
    /// # Arguments
    ///
    /// * `datasource` - Target table
    /// * `data` - Column -> value pairs, in column order
    pub fn build_insert(&self, datasource: &str, data: &Record) -> Result<Statement> {
        validate_identifier(datasource)?;
        let table = self.quote_identifier(datasource);

        if data.is_empty() {
            let sql = match self {
                Dialect::Mysql => format!("INSERT INTO {} () VALUES ()", table),
                Dialect::Sqlite => format!("INSERT INTO {} DEFAULT VALUES", table),
            };
            return Ok(Statement::new(sql));
        }

        let mut binder = Binder::new();
        let mut columns = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (field, value) in data {
            validate_identifier(field)?;
            columns.push(self.quote_identifier(field));
            placeholders.push(binder.bind(field, value.clone()));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Statement::with_binds(sql, binder.into_binds()))
    }

    /// Builds an UPDATE setting `data` on rows matching `conditions`.
    ///
    /// # Errors
    ///
    /// Returns error if `data` is empty or a name is invalid.
    pub fn build_update(&self, datasource: &str, data: &Record, conditions: &Conditions) -> Result<Statement> {
        validate_identifier(datasource)?;
        if data.is_empty() {
            return Err(SpotError::Query("UPDATE requires at least one column".to_string()));
        }

        let mut binder = Binder::new();
        let mut assignments = Vec::with_capacity(data.len());
        for (field, value) in data {
            validate_identifier(field)?;
            let placeholder = binder.bind(field, value.clone());
            assignments.push(format!("{} = {}", self.quote_identifier(field), placeholder));
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.quote_identifier(datasource),
            assignments.join(", ")
        );
        sql.push_str(&self.build_where(&single_group(conditions), &mut binder)?);
        Ok(Statement::with_binds(sql, binder.into_binds()))
    }

    /// Builds a DELETE for rows matching `conditions`.
    ///
    /// Empty conditions delete every row.
    pub fn build_delete(&self, datasource: &str, conditions: &Conditions) -> Result<Statement> {
        validate_identifier(datasource)?;
        let mut binder = Binder::new();
        let mut sql = format!("DELETE FROM {}", self.quote_identifier(datasource));
        sql.push_str(&self.build_where(&single_group(conditions), &mut binder)?);
        Ok(Statement::with_binds(sql, binder.into_binds()))
    }

    /// Builds a statement removing every row of the datasource.
    pub fn build_truncate(&self, datasource: &str) -> Result<Statement> {
        validate_identifier(datasource)?;
        let table = self.quote_identifier(datasource);
        let sql = match self {
            Dialect::Mysql => format!("TRUNCATE TABLE {}", table),
            Dialect::Sqlite => format!("DELETE FROM {}", table),
        };
        Ok(Statement::new(sql))
    }

    /// Builds a DROP TABLE for the datasource.
    pub fn build_drop(&self, datasource: &str) -> Result<Statement> {
        validate_identifier(datasource)?;
        Ok(Statement::new(format!("DROP TABLE {}", self.quote_identifier(datasource))))
    }

    /// Builds a CREATE DATABASE. SQLite databases are files and have no
    /// statement form.
    pub fn build_create_database(&self, name: &str) -> Result<Statement> {
        validate_identifier(name)?;
        match self {
            Dialect::Mysql => Ok(Statement::new(format!("CREATE DATABASE {}", self.quote_identifier(name)))),
            Dialect::Sqlite => Err(SpotError::UnsupportedOperation(
                "SQLite databases are created as files".to_string(),
            )),
        }
    }

    /// Builds a DROP DATABASE (MySQL only).
    pub fn build_drop_database(&self, name: &str) -> Result<Statement> {
        validate_identifier(name)?;
        match self {
            Dialect::Mysql => Ok(Statement::new(format!("DROP DATABASE {}", self.quote_identifier(name)))),
            Dialect::Sqlite => Err(SpotError::UnsupportedOperation(
                "SQLite databases are removed as files".to_string(),
            )),
        }
    }
}

fn single_group(conditions: &Conditions) -> Vec<ConditionGroup> {
    if conditions.is_empty() {
        return Vec::new();
    }
    vec![ConditionGroup {
        conditions: conditions.clone(),
        joiner: Joiner::And,
        group_joiner: Joiner::And,
    }]
}
