//! Helpers for testing bulk imports.
//!
//! [`session::MemorySession`] records every statement and `COPY` payload without a database.
//! [`database`] creates throwaway Postgres databases for integration tests, configured from the
//! `TESTS_DATABASE_*` environment variables.

pub mod database;
pub mod mapping;
pub mod session;
