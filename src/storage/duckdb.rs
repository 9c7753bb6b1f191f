//! DuckDB query executor.
//!
//! DuckDB is an embedded analytical database, which makes it a natural home
//! for the gateway's workload: wide columnar scans for row listings and
//! grouped aggregates whose GROUP BY/ORDER BY line up with physical layout.
//! The connection is owned behind an async mutex; queries run as prepared
//! statements with the plan's parameters bound, and rows come back as JSON
//! objects keyed by column name.
//!
//! # Configuration
//!
//! ```toml
//! [store]
//! connection = "events.db"   # or ":memory:"
//!
//! [store.options]
//! threads = "4"              # optional
//! max_memory = "2GB"         # optional
//! read_only = "false"        # optional
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, Value as SqlValue};
use duckdb::{params_from_iter, AccessMode, Config, Connection};
use serde_json::{Map, Number, Value};
use tokio::sync::Mutex;

use crate::query::QueryPlan;
use crate::storage::{StorageBackend, StoreError};

/// Days between 0001-01-01 (CE) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// DuckDB-backed implementation of [`StorageBackend`].
#[derive(Clone)]
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Opens a connection with engine options applied.
    ///
    /// Recognized options: `threads`, `max_memory`, `read_only`. Unknown
    /// options are ignored.
    pub fn new_with_options(
        connection_string: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, StoreError> {
        let mut config = Config::default();
        if let Some(threads) = options.get("threads").and_then(|s| s.parse::<i64>().ok()) {
            config = config.threads(threads)?;
        }
        if let Some(max_memory) = options.get("max_memory") {
            config = config.max_memory(max_memory)?;
        }
        if options.get("read_only").map(String::as_str) == Some("true") {
            config = config.access_mode(AccessMode::ReadOnly)?;
        }

        let conn = Connection::open_with_flags(connection_string, config)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store with default options.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new_with_options(":memory:", &HashMap::new())
    }

    /// Runs a batch of statements, used for schema setup and data loading.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DuckDbBackend {
    async fn init(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS windows_events (
                EventTime TIMESTAMP,
                Hostname VARCHAR,
                EventID BIGINT,
                SourceName VARCHAR,
                Severity VARCHAR,
                Message VARCHAR,
                EventType VARCHAR,
                Keywords VARCHAR,
                SeverityValue BIGINT,
                ProviderGuid VARCHAR,
                Version BIGINT,
                Task BIGINT,
                OpcodeValue BIGINT,
                RecordNumber BIGINT,
                ProcessID BIGINT,
                ThreadID BIGINT,
                Channel VARCHAR,
                Opcode VARCHAR,
                EventReceivedTime TIMESTAMP,
                SourceModuleName VARCHAR,
                SourceModuleType VARCHAR,
                host VARCHAR,
                port BIGINT,
                source_type VARCHAR,
                "timestamp" TIMESTAMP,
                ActivityID VARCHAR,
                CallerProcessId BIGINT,
                CallerProcessName VARCHAR,
                Category VARCHAR,
                SubjectDomainName VARCHAR,
                SubjectLogonId VARCHAR,
                SubjectUserName VARCHAR,
                SubjectUserSid VARCHAR,
                TargetDomainName VARCHAR,
                TargetSid VARCHAR,
                TargetUserName VARCHAR,
                raw_data VARCHAR
            );

            CREATE INDEX IF NOT EXISTS idx_events_time ON windows_events(EventTime);
            "#,
        )?;
        Ok(())
    }

    async fn fetch_rows(&self, plan: QueryPlan) -> Result<Vec<Value>, StoreError> {
        tracing::debug!(sql = %plan.sql, params = ?plan.params, "executing query");

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&plan.sql)?;
        let mut rows = stmt.query(params_from_iter(plan.params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let stmt = row.as_ref();
            let columns = stmt.column_count();
            let mut object = Map::with_capacity(columns);
            for idx in 0..columns {
                let name = stmt.column_name(idx)?.to_string();
                let value: SqlValue = row.get(idx)?;
                object.insert(name, sql_value_to_json(value));
            }
            out.push(Value::Object(object));
        }
        Ok(out)
    }
}

/// Converts a DuckDB cell into its JSON representation.
fn sql_value_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Boolean(b) => Value::Bool(b),
        SqlValue::TinyInt(n) => Value::from(n),
        SqlValue::SmallInt(n) => Value::from(n),
        SqlValue::Int(n) => Value::from(n),
        SqlValue::BigInt(n) => Value::from(n),
        SqlValue::HugeInt(n) => Value::String(n.to_string()),
        SqlValue::UTinyInt(n) => Value::from(n),
        SqlValue::USmallInt(n) => Value::from(n),
        SqlValue::UInt(n) => Value::from(n),
        SqlValue::UBigInt(n) => Value::from(n),
        SqlValue::Float(f) => Number::from_f64(f as f64).map_or(Value::Null, Value::Number),
        SqlValue::Double(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Decimal(d) => Value::String(d.to_string()),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        SqlValue::Timestamp(unit, raw) => timestamp_to_json(unit, raw),
        SqlValue::Date32(days) => {
            NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
                .map_or(Value::Null, |date| {
                    Value::String(date.format("%Y-%m-%d").to_string())
                })
        }
        other => Value::String(format!("{:?}", other)),
    }
}

fn timestamp_to_json(unit: TimeUnit, raw: i64) -> Value {
    let micros = match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map_or(Value::Null, |ts| {
        Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string())
    })
}
