use chrono::SecondsFormat;

use crate::bulk_error;
use crate::codec::array::ArrayCodec;
use crate::codec::{EncodeContext, ValueCodec, write_bytea_hex, write_display};
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::types::{Value, ValueKind};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Codec for one built-in [`ValueKind`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuiltinCodec {
    kind: ValueKind,
}

impl BuiltinCodec {
    pub(crate) fn new(kind: ValueKind) -> Self {
        Self { kind }
    }
}

/// Every kind with a built-in codec.
pub(crate) const BUILTIN_KINDS: &[ValueKind] = &[
    ValueKind::Bool,
    ValueKind::I16,
    ValueKind::I32,
    ValueKind::I64,
    ValueKind::U32,
    ValueKind::F32,
    ValueKind::F64,
    ValueKind::Numeric,
    ValueKind::String,
    ValueKind::Bytes,
    ValueKind::Date,
    ValueKind::Time,
    ValueKind::Timestamp,
    ValueKind::TimestampTz,
    ValueKind::Uuid,
    ValueKind::Json,
];

impl ValueCodec for BuiltinCodec {
    fn encode(&self, value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        if value.kind() != Some(self.kind) {
            return Err(unexpected_value(&format!("{:?}", self.kind), value));
        }

        write_builtin(value, ctx, out)
    }
}

/// Renders enum values as their member name.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnumCodec;

impl ValueCodec for EnumCodec {
    fn encode(&self, value: &Value, _ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        match value {
            Value::Enum { member, .. } => {
                out.push_str(member);
                Ok(())
            }
            other => Err(unexpected_value("enum", other)),
        }
    }
}

/// Encodes a custom value through the built-in value it wraps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PrimitiveCodec;

impl ValueCodec for PrimitiveCodec {
    fn encode(&self, value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        match value {
            Value::Custom(custom) => match custom.as_primitive() {
                Some(primitive) => ctx.encode_nested(&primitive, out),
                None => Err(unexpected_value("primitive wrapper", value)),
            },
            other => Err(unexpected_value("primitive wrapper", other)),
        }
    }
}

/// Last resort: custom values render through `Display`, built-in values through their
/// built-in token.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextFallbackCodec;

impl ValueCodec for TextFallbackCodec {
    fn encode(&self, value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        match value {
            Value::Custom(custom) => {
                write_display(out, custom);
                Ok(())
            }
            other => write_builtin(other, ctx, out),
        }
    }
}

fn write_float(out: &mut String, value: f64, is_nan: bool, is_infinite: bool) {
    if is_nan {
        out.push_str("NaN");
    } else if is_infinite {
        out.push_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        write_display(out, value);
    }
}

fn write_builtin(value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
    match value {
        Value::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        Value::I16(v) => write_display(out, v),
        Value::I32(v) => write_display(out, v),
        Value::I64(v) => write_display(out, v),
        Value::U32(v) => write_display(out, v),
        Value::F32(v) => {
            if v.is_finite() {
                write_display(out, v);
            } else {
                write_float(out, f64::from(*v), v.is_nan(), v.is_infinite());
            }
        }
        Value::F64(v) => write_float(out, *v, v.is_nan(), v.is_infinite()),
        Value::Numeric(v) => write_display(out, v),
        Value::String(v) => out.push_str(v),
        Value::Bytes(v) => write_bytea_hex(v, out),
        Value::Date(v) => write_display(out, v.format(DATE_FORMAT)),
        Value::Time(v) => write_display(out, v.format(TIME_FORMAT)),
        Value::Timestamp(v) => write_display(out, v.format(TIMESTAMP_FORMAT)),
        Value::TimestampTz(v) => out.push_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Value::Uuid(v) => write_display(out, v.hyphenated()),
        Value::Json(v) => write_display(out, v),
        Value::Enum { .. } => EnumCodec.encode(value, ctx, out)?,
        Value::Array(_) | Value::List(_) => ArrayCodec.encode(value, ctx, out)?,
        Value::Custom(_) => TextFallbackCodec.encode(value, ctx, out)?,
        Value::Null => return Err(unexpected_value("non-null value", value)),
    }

    Ok(())
}

/// Error returned when a codec is handed a value it cannot encode.
pub(crate) fn unexpected_value(expected: &str, value: &Value) -> BulkError {
    bulk_error!(
        ErrorKind::EncodingFailed,
        "Codec received an unexpected value",
        format!("Expected {expected}, got {value:?}")
    )
}
