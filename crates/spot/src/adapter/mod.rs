//! Storage adapters.
//!
//! The mapper talks to storage exclusively through the [`Adapter`] trait.
//! [`SqlAdapter`] implements it over a SQLx pool for MySQL or SQLite.

mod decode;
mod sql;

use async_trait::async_trait;
use indexmap::IndexMap;

pub use sql::SqlAdapter;

use crate::descriptor::FieldSpec;
use crate::query::{Conditions, Dialect, Query};
use crate::schema::{self, LiveColumn, MigrateOptions, MigrationReport};
use crate::{Record, Result, Value};

/// Storage operations used by the mapper.
#[async_trait]
pub trait Adapter: Send + Sync + std::fmt::Debug {
    /// Connection name, used in logs.
    fn name(&self) -> &str;

    fn dialect(&self) -> Dialect;

    /// Runs a SELECT and returns the raw rows.
    async fn read(&self, query: &Query) -> Result<Vec<Record>>;

    /// Counts rows matching the query's conditions.
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Inserts one row and returns the generated id, if any.
    async fn create(&self, datasource: &str, data: &Record) -> Result<Option<Value>>;

    /// Updates matching rows and returns the affected row count.
    async fn update(&self, datasource: &str, data: &Record, conditions: &Conditions) -> Result<u64>;

    /// Deletes matching rows and returns the affected row count.
    async fn delete(&self, datasource: &str, conditions: &Conditions) -> Result<u64>;

    /// Runs raw SQL with `:name` placeholders bound from `binds`.
    async fn query(&self, sql: &str, binds: &Record) -> Result<Vec<Record>>;

    async fn truncate_datasource(&self, datasource: &str) -> Result<()>;

    async fn drop_datasource(&self, datasource: &str) -> Result<()>;

    async fn create_database(&self, name: &str) -> Result<()>;

    async fn drop_database(&self, name: &str) -> Result<()>;

    /// Live columns of `datasource`, or `None` when it does not exist.
    async fn describe_datasource(&self, datasource: &str) -> Result<Option<Vec<LiveColumn>>>;

    /// Executes one schema statement.
    async fn execute_ddl(&self, sql: &str) -> Result<()>;

    /// Creates or updates `datasource` to hold `fields`.
    async fn migrate(
        &self,
        datasource: &str,
        fields: &IndexMap<String, FieldSpec>,
        options: &MigrateOptions,
    ) -> Result<MigrationReport> {
        schema::migrate(self, datasource, fields, options).await
    }
}
