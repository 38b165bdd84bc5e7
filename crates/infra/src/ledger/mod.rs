//! Token ledger boundary.
//!
//! Persists issued token records and performs atomic rotation and bulk
//! revocation. Backends: in-memory (tests/dev) and Postgres.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryTokenLedger;
pub use postgres::PostgresTokenLedger;
pub use r#trait::{LedgerError, NewTokenRecord, Rotation, TokenLedger, TokenRecord};
