//! Identity store: lookup, creation and update of admin, consumer and
//! supplier accounts.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
pub use r#trait::{IdentityError, IdentityStore};
