use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use config::shared::NullMode;

use crate::codec::array::ArrayCodec;
use crate::codec::builtin::{
    BUILTIN_KINDS, BuiltinCodec, EnumCodec, PrimitiveCodec, TextFallbackCodec,
};
use crate::codec::{EncodeContext, FnCodec, ValueCodec};
use crate::error::BulkResult;
use crate::types::{TypeKey, Value, ValueKind};

static DEFAULT_REGISTRY: LazyLock<Arc<CodecRegistry>> =
    LazyLock::new(|| Arc::new(CodecRegistry::with_builtins()));

/// Table of codecs keyed by value type.
///
/// Resolution for a non-null value, first match wins:
///
/// 1. a codec registered for the value's exact [`TypeKey`],
/// 2. enum values: the codec registered for [`ValueKind::Enum`], else the member name,
/// 3. arrays: the codec registered for [`ValueKind::Array`], else an array literal,
/// 4. lists: the codec registered for [`ValueKind::List`], else an array literal,
/// 5. custom values wrapping a built-in value: the codec of that value,
/// 6. custom values: the codec of the nearest registered supertype,
/// 7. the textual fallback.
///
/// Null values always encode as the [`NullMode`] token.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<TypeKey, Arc<dyn ValueCodec>>,
}

impl CodecRegistry {
    /// Creates a registry without any registered codec. Values still encode through the
    /// fallbacks.
    pub fn new() -> CodecRegistry {
        Self::default()
    }

    /// Creates a registry with a codec for every built-in kind.
    pub fn with_builtins() -> CodecRegistry {
        let mut registry = Self::new();
        for kind in BUILTIN_KINDS {
            registry.register(*kind, BuiltinCodec::new(*kind));
        }
        registry.register(ValueKind::Enum, EnumCodec);
        registry.register(ValueKind::Array, ArrayCodec);
        registry.register(ValueKind::List, ArrayCodec);

        registry
    }

    /// Returns the process wide built-in registry. It is never mutated.
    pub fn shared_default() -> Arc<CodecRegistry> {
        Arc::clone(&DEFAULT_REGISTRY)
    }

    /// Registers `codec` for `key`, replacing any previous registration.
    pub fn register<K, C>(&mut self, key: K, codec: C)
    where
        K: Into<TypeKey>,
        C: ValueCodec + 'static,
    {
        self.codecs.insert(key.into(), Arc::new(codec));
    }

    /// Registers a closure as the codec for `key`.
    pub fn register_fn<K, F>(&mut self, key: K, encode: F)
    where
        K: Into<TypeKey>,
        F: Fn(&Value, &mut String) -> BulkResult<()> + Send + Sync + 'static,
    {
        self.register(key, FnCodec::new(encode));
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.codecs.contains_key(key)
    }

    /// Returns the codec used for a non-null `value`.
    pub fn resolve(&self, value: &Value) -> &dyn ValueCodec {
        if let Some(codec) = value.type_key().and_then(|key| self.codecs.get(&key)) {
            return codec.as_ref();
        }

        match value {
            Value::Enum { .. } => self.registered_or(ValueKind::Enum, &EnumCodec),
            Value::Array(_) => self.registered_or(ValueKind::Array, &ArrayCodec),
            Value::List(_) => self.registered_or(ValueKind::List, &ArrayCodec),
            Value::Custom(custom) => {
                if custom.as_primitive().is_some() {
                    return &PrimitiveCodec;
                }

                custom
                    .supertypes()
                    .into_iter()
                    .find_map(|supertype| self.codecs.get(&TypeKey::Named(supertype)))
                    .map(|codec| codec.as_ref())
                    .unwrap_or(&TextFallbackCodec)
            }
            _ => &TextFallbackCodec,
        }
    }

    /// Encodes `value` into a new token.
    pub fn encode(&self, value: &Value, null_mode: NullMode) -> BulkResult<String> {
        let mut out = String::new();
        self.encode_into(value, null_mode, &mut out)?;

        Ok(out)
    }

    /// Appends the token for `value` to `out`.
    pub fn encode_into(&self, value: &Value, null_mode: NullMode, out: &mut String) -> BulkResult<()> {
        if value.is_null() {
            out.push_str(null_mode.token());
            return Ok(());
        }

        let ctx = EncodeContext {
            registry: self,
            null_mode,
        };
        self.resolve(value).encode(value, &ctx, out)
    }

    fn registered_or<'a>(&'a self, kind: ValueKind, fallback: &'a dyn ValueCodec) -> &'a dyn ValueCodec {
        self.codecs
            .get(&TypeKey::Builtin(kind))
            .map(|codec| codec.as_ref())
            .unwrap_or(fallback)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("types", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}
