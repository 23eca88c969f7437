//! Infrastructure Layer
//!
//! Store implementations: PostgreSQL for the running service, in-memory for
//! tests and database-less local runs.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityStore;
