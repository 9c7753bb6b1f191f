//! Analytical query construction.
//!
//! A [`QueryPlan`] is a deterministic compilation of a [`FilterSet`] plus a
//! [`QueryIntent`] into SQL with bound parameters. Filter values, including
//! the `from`/`to` time bounds, are never interpolated into the query text;
//! they travel as placeholders and are bound by the executor. The builder
//! itself never fails: any filter set yields a syntactically complete plan.

use crate::filter::FilterSet;

/// Table holding the ingested Windows event records.
pub const EVENTS_TABLE: &str = "windows_events";

/// Shared cache key for the aggregate stats payload. Aggregates ignore
/// request filters, so every stats request maps to this one entry.
pub const STATS_KEY: &str = "stats_all";

/// Diagnostic passthrough query for `/test`.
pub const PROBE_SQL: &str =
    "SELECT EventTime, Hostname, EventID, Message FROM windows_events LIMIT 1";

/// Diagnostic passthrough query for `/test-severity`.
pub const PROBE_SEVERITY_SQL: &str = "SELECT DISTINCT Severity, count(*) AS count \
     FROM windows_events GROUP BY Severity ORDER BY count DESC";

/// Explicit column projection for row listings.
///
/// A fixed superset of the fields the dashboard renders; selecting named
/// columns instead of `*` keeps transfer volume bounded.
pub const EVENT_COLUMNS: [&str; 37] = [
    "EventTime",
    "Hostname",
    "EventID",
    "SourceName",
    "Severity",
    "Message",
    "EventType",
    "Keywords",
    "SeverityValue",
    "ProviderGuid",
    "Version",
    "Task",
    "OpcodeValue",
    "RecordNumber",
    "ProcessID",
    "ThreadID",
    "Channel",
    "Opcode",
    "EventReceivedTime",
    "SourceModuleName",
    "SourceModuleType",
    "host",
    "port",
    "source_type",
    "\"timestamp\"",
    "ActivityID",
    "CallerProcessId",
    "CallerProcessName",
    "Category",
    "SubjectDomainName",
    "SubjectLogonId",
    "SubjectUserName",
    "SubjectUserSid",
    "TargetDomainName",
    "TargetSid",
    "TargetUserName",
    "raw_data",
];

/// The analytical shape a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Paginated row listing ordered by event time descending.
    ListRows,
    /// Total row count for the filter set; never paginated.
    CountRows,
    /// One of the fixed-shape dashboard aggregates.
    Aggregate(StatsDimension),
}

impl QueryIntent {
    fn key_prefix(&self) -> &'static str {
        match self {
            QueryIntent::ListRows => "logs",
            QueryIntent::CountRows => "count",
            QueryIntent::Aggregate(_) => "stats",
        }
    }
}

/// Dimensions of the dashboard stats fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsDimension {
    /// Events per calendar date, newest 30 buckets.
    DailyVolume,
    /// Events per severity, all buckets.
    Severity,
    /// Top 10 source names by count.
    SourceName,
    /// Top 10 event types by count.
    EventType,
}

impl StatsDimension {
    fn sql(&self) -> &'static str {
        match self {
            StatsDimension::DailyVolume => {
                "SELECT CAST(EventTime AS DATE) AS event_date, count(*) AS count \
                 FROM windows_events GROUP BY event_date ORDER BY event_date DESC LIMIT 30"
            }
            StatsDimension::Severity => {
                "SELECT Severity, count(*) AS count \
                 FROM windows_events GROUP BY Severity ORDER BY count DESC"
            }
            StatsDimension::SourceName => {
                "SELECT SourceName, count(*) AS count \
                 FROM windows_events GROUP BY SourceName ORDER BY count DESC LIMIT 10"
            }
            StatsDimension::EventType => {
                "SELECT EventType, count(*) AS count \
                 FROM windows_events GROUP BY EventType ORDER BY count DESC LIMIT 10"
            }
        }
    }
}

/// A compiled query: SQL text with `?` placeholders plus bound values in
/// placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub sql: String,
    pub params: Vec<String>,
}

impl QueryPlan {
    /// Compiles a filter set and intent into an executable plan.
    pub fn build(filter: &FilterSet, intent: QueryIntent) -> Self {
        match intent {
            QueryIntent::ListRows => {
                let (clauses, params) = predicates(filter);
                let mut sql = format!(
                    "SELECT {} FROM {}",
                    EVENT_COLUMNS.join(", "),
                    EVENTS_TABLE
                );
                push_where(&mut sql, &clauses);
                sql.push_str(" ORDER BY EventTime DESC");
                sql.push_str(&format!(" LIMIT {} OFFSET {}", filter.limit, filter.offset()));
                Self { sql, params }
            }
            QueryIntent::CountRows => {
                let (clauses, params) = predicates(filter);
                let mut sql = format!("SELECT count(*) AS count FROM {}", EVENTS_TABLE);
                push_where(&mut sql, &clauses);
                Self { sql, params }
            }
            QueryIntent::Aggregate(dimension) => Self::aggregate(dimension),
        }
    }

    /// Plan for one of the fixed aggregate shapes. Filters do not apply.
    pub fn aggregate(dimension: StatsDimension) -> Self {
        Self::raw(dimension.sql())
    }

    /// Full unfiltered dump ordered by event time descending. Unbounded by
    /// design; the caller owns the resource risk.
    pub fn dump_all() -> Self {
        Self::raw(format!(
            "SELECT {} FROM {} ORDER BY EventTime DESC",
            EVENT_COLUMNS.join(", "),
            EVENTS_TABLE
        ))
    }

    /// Wraps a fixed SQL string with no bound parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Renders the plan as a single SQL string with parameters inlined as
    /// quoted literals, single quotes doubled. Used for debug logging; the
    /// executor always runs the placeholder form.
    pub fn render(&self) -> String {
        let mut sql = self.sql.clone();
        for param in &self.params {
            let literal = format!("'{}'", escape_literal(param));
            if let Some(pos) = sql.find('?') {
                sql.replace_range(pos..pos + 1, &literal);
            }
        }
        sql
    }
}

/// Doubles every single quote so the value is safe inside a quoted literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Derives the canonical cache key for an intent and filter combination.
///
/// Row listings key on all filter fields plus pagination; counts drop the
/// pagination fields; all aggregates share [`STATS_KEY`].
pub fn cache_key(intent: QueryIntent, filter: &FilterSet) -> String {
    match intent {
        QueryIntent::Aggregate(_) => STATS_KEY.to_string(),
        QueryIntent::ListRows => format!("{}:{}", intent.key_prefix(), filter.canonical(true)),
        QueryIntent::CountRows => format!("{}:{}", intent.key_prefix(), filter.canonical(false)),
    }
}

/// One predicate per non-empty filter field, in a fixed order, with the bound
/// value pushed in matching position.
fn predicates(filter: &FilterSet) -> (Vec<&'static str>, Vec<String>) {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if !filter.search.is_empty() {
        clauses.push("Message LIKE ?");
        params.push(format!("%{}%", filter.search));
    }
    if !filter.severity.is_empty() {
        clauses.push("Severity = ?");
        params.push(filter.severity.clone());
    }
    if !filter.hostname.is_empty() {
        clauses.push("Hostname = ?");
        params.push(filter.hostname.clone());
    }
    if !filter.source_name.is_empty() {
        clauses.push("SourceName = ?");
        params.push(filter.source_name.clone());
    }
    if !filter.event_type.is_empty() {
        clauses.push("EventType = ?");
        params.push(filter.event_type.clone());
    }
    if !filter.from.is_empty() {
        clauses.push("EventTime >= ?");
        params.push(filter.from.clone());
    }
    if !filter.to.is_empty() {
        clauses.push("EventTime <= ?");
        params.push(filter.to.clone());
    }

    (clauses, params)
}

/// Appends `WHERE <c1> AND <c2> ...` only when at least one clause exists.
fn push_where(sql: &mut String, clauses: &[&str]) {
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}
