/*!
# Evquery: query gateway and result cache for Windows event logs

Evquery sits in front of a columnar analytics store (DuckDB) holding Windows
event-log records. It accepts filtered, paginated HTTP requests from a
dashboard, compiles them into parameterized analytical SQL, executes them
against the store, and caches results for 30 seconds to absorb repeated
identical queries.

## Key pieces

- **Filter model** ([`filter`]): permissive normalization of raw query-string
  parameters into an immutable filter set with clamped pagination.
- **Query builder** ([`query`]): deterministic compilation of a filter set and
  query intent (row listing, count, aggregate) into SQL with bound parameters.
- **Result cache** ([`cache`]): TTL-keyed store with lazy expiry and a
  periodic sweep, keyed on the canonical intent + filter representation.
- **Storage** ([`storage`]): the `StorageBackend` execution seam and its
  DuckDB implementation.
- **Service** ([`service`]): the axum router wiring filters, cache, and store
  together behind the dashboard's HTTP endpoints.

## Usage

```rust,no_run
use evquery_core::cache::ResultCache;
use evquery_core::service::{router, AppState};
use evquery_core::storage::duckdb::DuckDbBackend;
use evquery_core::storage::StorageBackend;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let backend = DuckDbBackend::new_in_memory()?;
    backend.init().await?;

    let cache = ResultCache::with_default_ttl();
    let _sweeper = cache.spawn_sweeper();

    let app = router(AppState::new(Arc::new(backend), cache));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:3001").await?;
    axum::serve(listener, app).await?;
    Ok(())
}
```

For configuration options see the [`config`] module.
*/

pub mod cache;
pub mod config;
pub mod filter;
pub mod query;
pub mod service;
pub mod storage;

pub use cache::ResultCache;
pub use filter::FilterSet;
pub use query::{QueryIntent, QueryPlan, StatsDimension};
pub use storage::{StorageBackend, StoreError};
