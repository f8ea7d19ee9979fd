//! Bounded in-memory log of executed statements.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::query::Statement;
use crate::Record;

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    /// Name of the connection that ran it
    pub adapter: String,
    pub sql: String,
    pub binds: Record,
    pub elapsed: Duration,
}

/// Query log settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryLogSettings {
    pub enabled: bool,
    /// Oldest entries are dropped beyond this many
    pub capacity: usize,
}

impl Default for QueryLogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
        }
    }
}

/// Records every statement the adapters execute.
///
/// Shared by all connections of a [`Config`](crate::Config). Recording
/// never fails and never blocks on I/O.
#[derive(Debug)]
pub struct QueryLog {
    enabled: bool,
    capacity: usize,
    entries: Mutex<VecDeque<LoggedQuery>>,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(QueryLogSettings::default())
    }
}

impl QueryLog {
    pub fn new(settings: QueryLogSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// A log that keeps nothing.
    pub fn disabled() -> Self {
        Self::new(QueryLogSettings {
            enabled: false,
            capacity: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, adapter: &str, statement: &Statement, elapsed: Duration) {
        debug!(
            adapter = adapter,
            sql = %statement.sql,
            binds = statement.binds.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Executed statement"
        );
        if !self.enabled || self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LoggedQuery {
            adapter: adapter.to_string(),
            sql: statement.sql.clone(),
            binds: statement.binds.clone(),
            elapsed,
        });
    }

    /// Snapshot of the logged statements, oldest first.
    pub fn entries(&self) -> Vec<LoggedQuery> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<LoggedQuery> {
        self.entries.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let log = QueryLog::new(QueryLogSettings {
            enabled: true,
            capacity: 2,
        });
        for sql in ["SELECT 1", "SELECT 2", "SELECT 3"] {
            log.record("default", &Statement::new(sql), Duration::from_millis(1));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sql, "SELECT 2");
        assert_eq!(log.last().map(|e| e.sql), Some("SELECT 3".to_string()));
    }

    #[test]
    fn test_disabled_log_keeps_nothing() {
        let log = QueryLog::disabled();
        log.record("default", &Statement::new("SELECT 1"), Duration::ZERO);
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear() {
        let log = QueryLog::default();
        log.record("default", &Statement::new("SELECT 1"), Duration::ZERO);
        assert_eq!(log.len(), 1);
        log.clear();
        assert!(log.is_empty());
    }
}
