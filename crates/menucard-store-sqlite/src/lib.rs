//! SQLite backend for the menucard entitlement service.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. A single [`SqliteStore`] implements
//! both [`menucard_core::store::EntitlementStore`] and a local
//! [`menucard_core::identity::IdentityProvider`].

mod encode;
mod identity;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
