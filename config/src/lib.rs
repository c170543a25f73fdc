//! Configuration types shared by the bulk importer crates.
//!
//! Everything in here is plain data that can be deserialized from a configuration source and
//! validated before use. The importer converts these settings into its own immutable forms.

pub mod shared;

pub use secrecy::SecretString;
