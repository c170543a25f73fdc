use crate::codec::{EncodeContext, ValueCodec};
use crate::error::BulkResult;
use crate::types::Value;

/// Token used for null array elements regardless of the load's null mode.
const NULL_ELEMENT: &str = "NULL";

/// Encodes arrays and lists as Postgres array literals.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArrayCodec;

impl ValueCodec for ArrayCodec {
    fn encode(&self, value: &Value, ctx: &EncodeContext<'_>, out: &mut String) -> BulkResult<()> {
        match value {
            Value::Array(elements) | Value::List(elements) => {
                write_array_literal(elements, ctx, out)
            }
            other => Err(super::builtin::unexpected_value("array", other)),
        }
    }
}

/// Appends `{e1,e2,...}` to `out`, encoding every element through the context's registry.
///
/// Null elements become `NULL`. Element tokens that are empty or contain a structural character
/// are double quoted with `"` and `\` escaped. Nested arrays are written as sub-literals.
pub fn write_array_literal(
    elements: &[Value],
    ctx: &EncodeContext<'_>,
    out: &mut String,
) -> BulkResult<()> {
    out.push('{');

    let mut element_token = String::new();
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }

        match element {
            Value::Null => out.push_str(NULL_ELEMENT),
            Value::Array(nested) | Value::List(nested) => write_array_literal(nested, ctx, out)?,
            element => {
                element_token.clear();
                ctx.encode_nested(element, &mut element_token)?;
                push_element(&element_token, out);
            }
        }
    }

    out.push('}');

    Ok(())
}

fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || token.eq_ignore_ascii_case(NULL_ELEMENT)
        || token
            .chars()
            .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace())
}

fn push_element(token: &str, out: &mut String) {
    if !needs_quoting(token) {
        out.push_str(token);
        return;
    }

    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}
