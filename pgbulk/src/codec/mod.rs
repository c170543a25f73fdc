//! Conversion of [`Value`]s into the text tokens a CSV `COPY` stream expects.
//!
//! A [`CodecRegistry`] maps value types to [`ValueCodec`]s. Applications can register their own
//! codecs for built-in kinds, enum types or custom value types; registrations for an exact type
//! take precedence over everything else.

mod array;
mod builtin;
mod hex;
mod registry;

use std::fmt;

pub use array::write_array_literal;
pub use hex::{BYTEA_HEX_PREFIX, write_bytea_hex};
pub use registry::CodecRegistry;

use config::shared::NullMode;

use crate::error::BulkResult;
use crate::types::Value;

/// State available to a codec while it encodes a value.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    /// Registry the value was resolved through, used to encode nested values.
    pub registry: &'a CodecRegistry,
    /// Null representation of the running load.
    pub null_mode: NullMode,
}

impl EncodeContext<'_> {
    /// Encodes a nested value through the same registry.
    pub fn encode_nested(&self, value: &Value, out: &mut String) -> BulkResult<()> {
        self.registry.encode_into(value, self.null_mode, out)
    }
}

/// Turns a non-null value into its wire token.
pub trait ValueCodec: Send + Sync {
    /// Appends the token for `value` to `out`.
    ///
    /// Never called with [`Value::Null`].
    fn encode(&self, value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()>;
}

/// A [`ValueCodec`] backed by a closure.
pub struct FnCodec<F>(F);

impl<F> FnCodec<F>
where
    F: Fn(&Value, &mut String) -> BulkResult<()> + Send + Sync,
{
    pub fn new(encode: F) -> Self {
        Self(encode)
    }
}

impl<F> ValueCodec for FnCodec<F>
where
    F: Fn(&Value, &mut String) -> BulkResult<()> + Send + Sync,
{
    fn encode(&self, value: &Value, _ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        (self.0)(value, out)
    }
}

impl<F> fmt::Debug for FnCodec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

/// Appends the [`fmt::Display`] rendering of `value` to `out`.
pub(crate) fn write_display(out: &mut String, value: impl fmt::Display) {
    use std::fmt::Write;

    // Writing into a `String` only fails if `Display` itself errors.
    let _ = write!(out, "{value}");
}
