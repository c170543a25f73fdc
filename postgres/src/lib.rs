//! Postgres naming primitives used by the bulk importer.
//!
//! Table, column and staging names cannot be bound as statement parameters, so every name that
//! ends up in generated SQL goes through [`identifier`] first.

pub mod identifier;
pub mod staging;
#[cfg(feature = "tokio")]
pub mod tokio;
pub mod types;
