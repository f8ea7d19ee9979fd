//! SQLx-backed adapter for MySQL and SQLite.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::{debug, instrument, warn};

use super::decode::{bind_mysql, bind_sqlite, mysql_row_to_record, sqlite_row_to_record};
use super::Adapter;
use crate::connection::{Connection, Pool};
use crate::log::QueryLog;
use crate::query::{Conditions, Dialect, Query, Statement};
use crate::schema::LiveColumn;
use crate::{Record, Result, SpotError, Value};

const MYSQL_DESCRIBE: &str = "SELECT COLUMN_NAME AS name, COLUMN_TYPE AS column_type, \
     COLUMN_DEFAULT AS column_default, IS_NULLABLE AS is_nullable \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = :table \
     ORDER BY ORDINAL_POSITION";

const SQLITE_DESCRIBE: &str = "SELECT name, type AS column_type, dflt_value AS column_default, \
     CASE WHEN \"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable \
     FROM pragma_table_info(:table) \
     ORDER BY cid";

/// Result of a statement that returns no rows.
struct Executed {
    rows_affected: u64,
    last_insert_id: Option<Value>,
}

/// Relational adapter over a pooled [`Connection`].
///
/// Every statement goes through the shared [`QueryLog`]. Statements slower
/// than the configured threshold are reported with `warn!`.
#[derive(Debug, Clone)]
pub struct SqlAdapter {
    name: String,
    connection: Connection,
    log: Arc<QueryLog>,
    slow_query_threshold: Duration,
}

impl SqlAdapter {
    pub fn new(name: impl Into<String>, connection: Connection, log: Arc<QueryLog>) -> Self {
        Self {
            name: name.into(),
            connection,
            log,
            slow_query_threshold: Duration::from_secs(1),
        }
    }

    /// Sets the duration above which a statement is logged as slow.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Records the statement and flags it when slow.
    fn finish(&self, statement: &Statement, elapsed: Duration) {
        self.log.record(&self.name, statement, elapsed);
        if elapsed >= self.slow_query_threshold {
            warn!(
                adapter = %self.name,
                sql = %statement.sql.chars().take(100).collect::<String>(),
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_query_threshold.as_millis() as u64,
                "Slow query detected"
            );
        }
    }

    /// Maps a driver error, singling out missing tables.
    fn classify(&self, err: sqlx::Error, statement: &Statement, datasource: &str) -> SpotError {
        warn!(
            adapter = %self.name,
            sql = %statement.sql.chars().take(50).collect::<String>(),
            error = %err,
            "Query failed"
        );
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            if self
                .dialect()
                .is_missing_table_error(code.as_deref(), db_err.message())
            {
                return SpotError::DatasourceMissing {
                    datasource: datasource.to_string(),
                    message: db_err.message().to_string(),
                };
            }
        }
        SpotError::from(err)
    }

    async fn fetch(&self, statement: &Statement, datasource: &str) -> Result<Vec<Record>> {
        let (sql, values) = statement.to_positional(self.dialect())?;
        let start = Instant::now();

        match self.connection.pool() {
            Pool::Mysql(pool) => {
                let rows = bind_mysql(sqlx::query(&sql), values).fetch_all(pool).await;
                self.finish(statement, start.elapsed());
                let rows = rows.map_err(|e| self.classify(e, statement, datasource))?;
                rows.iter().map(mysql_row_to_record).collect()
            }
            Pool::Sqlite(pool) => {
                let rows = bind_sqlite(sqlx::query(&sql), values).fetch_all(pool).await;
                self.finish(statement, start.elapsed());
                let rows = rows.map_err(|e| self.classify(e, statement, datasource))?;
                rows.iter().map(sqlite_row_to_record).collect()
            }
        }
    }

    async fn execute(&self, statement: &Statement, datasource: &str) -> Result<Executed> {
        let (sql, values) = statement.to_positional(self.dialect())?;
        let start = Instant::now();

        let executed = match self.connection.pool() {
            Pool::Mysql(pool) => {
                let result = bind_mysql(sqlx::query(&sql), values).execute(pool).await;
                self.finish(statement, start.elapsed());
                let result = result.map_err(|e| self.classify(e, statement, datasource))?;
                let id = result.last_insert_id();
                Executed {
                    rows_affected: result.rows_affected(),
                    last_insert_id: (id != 0).then(|| Value::from(id)),
                }
            }
            Pool::Sqlite(pool) => {
                let result = bind_sqlite(sqlx::query(&sql), values).execute(pool).await;
                self.finish(statement, start.elapsed());
                let result = result.map_err(|e| self.classify(e, statement, datasource))?;
                let id = result.last_insert_rowid();
                Executed {
                    rows_affected: result.rows_affected(),
                    last_insert_id: (id != 0).then_some(Value::Int(id)),
                }
            }
        };

        debug!(rows_affected = executed.rows_affected, "Statement executed");
        Ok(executed)
    }

    /// Path of a SQLite database file; `sqlite://` prefixes are accepted.
    fn sqlite_path(name: &str) -> &str {
        name.strip_prefix("sqlite://")
            .or_else(|| name.strip_prefix("sqlite:"))
            .unwrap_or(name)
    }
}

#[async_trait]
impl Adapter for SqlAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn dialect(&self) -> Dialect {
        self.connection.dialect()
    }

    #[instrument(skip(self, query), fields(adapter = %self.name, datasource = %query.datasource()))]
    async fn read(&self, query: &Query) -> Result<Vec<Record>> {
        let statement = self.dialect().build_select(query)?;
        self.fetch(&statement, query.datasource()).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let statement = self.dialect().build_count(query)?;
        let rows = self.fetch(&statement, query.datasource()).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(u64::try_from(count).unwrap_or(0))
    }

    #[instrument(skip(self, data), fields(adapter = %self.name))]
    async fn create(&self, datasource: &str, data: &Record) -> Result<Option<Value>> {
        let statement = self.dialect().build_insert(datasource, data)?;
        Ok(self.execute(&statement, datasource).await?.last_insert_id)
    }

    #[instrument(skip(self, data, conditions), fields(adapter = %self.name))]
    async fn update(&self, datasource: &str, data: &Record, conditions: &Conditions) -> Result<u64> {
        let statement = self.dialect().build_update(datasource, data, conditions)?;
        Ok(self.execute(&statement, datasource).await?.rows_affected)
    }

    #[instrument(skip(self, conditions), fields(adapter = %self.name))]
    async fn delete(&self, datasource: &str, conditions: &Conditions) -> Result<u64> {
        let statement = self.dialect().build_delete(datasource, conditions)?;
        Ok(self.execute(&statement, datasource).await?.rows_affected)
    }

    async fn query(&self, sql: &str, binds: &Record) -> Result<Vec<Record>> {
        let statement = Statement::with_binds(sql, binds.clone());
        self.fetch(&statement, "").await
    }

    async fn truncate_datasource(&self, datasource: &str) -> Result<()> {
        let statement = self.dialect().build_truncate(datasource)?;
        self.execute(&statement, datasource).await?;
        Ok(())
    }

    async fn drop_datasource(&self, datasource: &str) -> Result<()> {
        let statement = self.dialect().build_drop(datasource)?;
        self.execute(&statement, datasource).await?;
        Ok(())
    }

    /// On SQLite, `name` is a database file path which is created empty.
    async fn create_database(&self, name: &str) -> Result<()> {
        match self.dialect() {
            Dialect::Mysql => {
                let statement = self.dialect().build_create_database(name)?;
                self.execute(&statement, "").await?;
            }
            Dialect::Sqlite => {
                let options = SqliteConnectOptions::new()
                    .filename(Self::sqlite_path(name))
                    .create_if_missing(true);
                let pool = sqlx::SqlitePool::connect_with(options).await?;
                pool.close().await;
            }
        }
        Ok(())
    }

    /// On SQLite, `name` is a database file path which is removed.
    async fn drop_database(&self, name: &str) -> Result<()> {
        match self.dialect() {
            Dialect::Mysql => {
                let statement = self.dialect().build_drop_database(name)?;
                self.execute(&statement, "").await?;
            }
            Dialect::Sqlite => {
                tokio::fs::remove_file(Self::sqlite_path(name)).await.map_err(|e| {
                    SpotError::Database(format!("Failed to remove database '{}': {}", name, e))
                })?;
            }
        }
        Ok(())
    }

    async fn describe_datasource(&self, datasource: &str) -> Result<Option<Vec<LiveColumn>>> {
        let sql = match self.dialect() {
            Dialect::Mysql => MYSQL_DESCRIBE,
            Dialect::Sqlite => SQLITE_DESCRIBE,
        };
        let mut binds = Record::new();
        binds.insert("table".to_string(), Value::from(datasource));

        let rows = self.fetch(&Statement::with_binds(sql, binds), datasource).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.iter().filter_map(LiveColumn::from_record).collect()))
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        self.execute(&Statement::new(sql), "").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PoolConfig;

    async fn memory_adapter() -> SqlAdapter {
        let connection = Connection::new("sqlite::memory:", &PoolConfig::default()).await.unwrap();
        SqlAdapter::new("test", connection, Arc::new(QueryLog::default()))
    }

    #[test]
    fn test_sqlite_path() {
        assert_eq!(SqlAdapter::sqlite_path("sqlite://data/app.db"), "data/app.db");
        assert_eq!(SqlAdapter::sqlite_path("sqlite:app.db"), "app.db");
        assert_eq!(SqlAdapter::sqlite_path("/tmp/app.db"), "/tmp/app.db");
    }

    #[tokio::test]
    async fn test_create_read_and_log() {
        let adapter = memory_adapter().await;
        adapter
            .execute_ddl("CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, title VARCHAR(255))")
            .await
            .unwrap();

        let mut data = Record::new();
        data.insert("title".to_string(), Value::from("Hello"));
        let id = adapter.create("posts", &data).await.unwrap();
        assert_eq!(id, Some(Value::Int(1)));

        let rows = adapter
            .query("SELECT * FROM posts WHERE title = :title", &data)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));

        let last = adapter.log.last().unwrap();
        assert_eq!(last.sql, "SELECT * FROM posts WHERE title = :title");
        assert_eq!(last.adapter, "test");
    }

    #[tokio::test]
    async fn test_missing_table_is_classified() {
        let adapter = memory_adapter().await;
        let err = adapter.delete("ghosts", &Conditions::new()).await.unwrap_err();
        match err {
            SpotError::DatasourceMissing { datasource, .. } => assert_eq!(datasource, "ghosts"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_describe_datasource() {
        let adapter = memory_adapter().await;
        assert_eq!(adapter.describe_datasource("posts").await.unwrap(), None);

        adapter
            .execute_ddl("CREATE TABLE posts (id INTEGER NOT NULL, status VARCHAR(20) DEFAULT 'draft')")
            .await
            .unwrap();
        let columns = adapter.describe_datasource("posts").await.unwrap().unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert!(!columns[0].nullable);
        assert_eq!(columns[1].base_type(), "varchar");
        assert_eq!(columns[1].normalized_default().as_deref(), Some("draft"));
    }
}
