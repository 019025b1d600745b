//! Durable alarm store on PostgreSQL.
//!
//! Owns the authoritative alarm rows; the scheduler only ever holds a
//! projection. All access goes through the bounded connection pool and
//! prepared statements; the compare-and-set operations here are the
//! sole defense against duplicate firing across replicas.

pub mod alarms;
pub mod descriptions;
pub mod error;
pub mod pool;

pub use error::StoreError;
pub use pool::{init_pool, run_migrations};
