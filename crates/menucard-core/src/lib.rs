//! Core types and trait definitions for the menucard entitlement service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; backends implement its traits.

pub mod account;
pub mod entitlement;
pub mod error;
pub mod identity;
pub mod order;
pub mod policy;
pub mod store;

pub use error::{Error, Result};
