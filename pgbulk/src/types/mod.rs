//! Data model shared by the encoder, the executors and the importer.
//!
//! [`Value`] is the runtime value extracted from an entity column, [`TableMapping`] describes how
//! entities of one shape map to a relation.

mod mapping;
mod numeric;
mod value;

pub use mapping::*;
pub use numeric::*;
pub use value::*;

pub use postgres::types::TableName;
