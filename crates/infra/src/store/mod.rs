//! Transactional account storage boundary.
//!
//! Users, access requests and sessions live behind one store so a decision,
//! the user it provisions and the sessions it revokes commit atomically.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryAccountStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccountStore;
pub use r#trait::{AccountStore, AccountTx, StoreError};
