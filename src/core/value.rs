//! Host-neutral value model - the tagged representation for every datum
//! crossing the caller/backend boundary.
//!
//! Design: a tagged union with exhaustive matching at every consumption site.
//! A value's tag fully determines which payload is valid; payload access only
//! happens through tag-checked accessors. Conversions are explicit and follow
//! a documented coercion table; dispatch never coerces implicitly.

use crate::errors::DispatchError;
use once_cell::sync::Lazy;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type names accepted in backend declarations and diagnostics.
static TYPE_NAMES: Lazy<HashMap<&'static str, TypeTag>> = Lazy::new(|| {
    let mut names = HashMap::new();
    names.insert("null", TypeTag::Null);
    names.insert("bool", TypeTag::Bool);
    names.insert("int", TypeTag::Int);
    names.insert("long", TypeTag::Int);
    names.insert("float", TypeTag::Float);
    names.insert("double", TypeTag::Float);
    names.insert("str", TypeTag::String);
    names.insert("string", TypeTag::String);
    names.insert("array", TypeTag::Array);
    names.insert("map", TypeTag::Map);
    names.insert("function", TypeTag::Function);
    names.insert("opaque", TypeTag::Opaque);
    names
});

/// Type tags used for dispatch and argument checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Bool,
    Int,
    Float,
    String,
    Array,
    Map,
    Function,
    Opaque,
}

impl TypeTag {
    /// Look up a tag by declaration name ("str", "double", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        TYPE_NAMES.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Map => "map",
            Self::Function => "function",
            Self::Opaque => "opaque",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference to a callable symbol owned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub backend: String,
    pub symbol: String,
}

impl FunctionRef {
    pub fn new(backend: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            symbol: symbol.into(),
        }
    }
}

struct OpaqueInner {
    backend: String,
    data: Option<Box<dyn Any + Send + Sync>>,
    finalizer: Option<Box<dyn FnOnce(Box<dyn Any + Send + Sync>) + Send + Sync>>,
}

impl Drop for OpaqueInner {
    fn drop(&mut self) {
        // The finalizer runs exactly once, when the last reference drops.
        if let (Some(finalizer), Some(data)) = (self.finalizer.take(), self.data.take()) {
            finalizer(data);
        }
    }
}

/// Backend-defined payload with a delegated destructor.
///
/// Clones share the underlying payload; the registered finalizer is invoked
/// exactly once when the last clone is dropped.
#[derive(Clone)]
pub struct OpaqueValue {
    inner: Arc<OpaqueInner>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(backend: impl Into<String>, data: T) -> Self {
        Self {
            inner: Arc::new(OpaqueInner {
                backend: backend.into(),
                data: Some(Box::new(data)),
                finalizer: None,
            }),
        }
    }

    pub fn with_finalizer<T, F>(backend: impl Into<String>, data: T, finalizer: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(Box<dyn Any + Send + Sync>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(OpaqueInner {
                backend: backend.into(),
                data: Some(Box::new(data)),
                finalizer: Some(Box::new(finalizer)),
            }),
        }
    }

    /// Tag of the backend that produced this payload.
    pub fn backend(&self) -> &str {
        &self.inner.backend
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.data.as_ref().and_then(|data| data.downcast_ref())
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("backend", &self.inner.backend)
            .finish_non_exhaustive()
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Host-neutral value crossing the boundary.
///
/// A value exclusively owns its payload: deeply for String/Array/Map,
/// through the delegated finalizer for Opaque. Map preserves insertion
/// order; it is an ordered mapping, not a hash map.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Function(FunctionRef),
    Opaque(OpaqueValue),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Null => TypeTag::Null,
            Self::Bool(_) => TypeTag::Bool,
            Self::Int(_) => TypeTag::Int,
            Self::Float(_) => TypeTag::Float,
            Self::String(_) => TypeTag::String,
            Self::Array(_) => TypeTag::Array,
            Self::Map(_) => TypeTag::Map,
            Self::Function(_) => TypeTag::Function,
            Self::Opaque(_) => TypeTag::Opaque,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Strict accessor: `Some` only when the tag matches exactly.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Self::Function(fref) => Some(fref),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueValue> {
        match self {
            Self::Opaque(opaque) => Some(opaque),
            _ => None,
        }
    }

    /// Convert to a host string.
    ///
    /// Coercion table (pairs not listed fail with `TypeMismatch`):
    ///
    /// | from  | to     | result                     |
    /// |-------|--------|----------------------------|
    /// | Int   | String | decimal rendering          |
    /// | Float | String | shortest round-trip form   |
    /// | Bool  | String | `"true"` / `"false"`       |
    pub fn to_string_value(&self) -> Result<String, DispatchError> {
        match self {
            Self::String(value) => Ok(value.clone()),
            Self::Int(value) => Ok(value.to_string()),
            Self::Float(value) => Ok(value.to_string()),
            Self::Bool(value) => Ok(value.to_string()),
            other => Err(DispatchError::type_mismatch(TypeTag::String, other.tag())),
        }
    }

    /// Convert to a host integer. Coercion table: Bool widens to 1/0.
    pub fn to_int(&self) -> Result<i64, DispatchError> {
        match self {
            Self::Int(value) => Ok(*value),
            Self::Bool(value) => Ok(i64::from(*value)),
            other => Err(DispatchError::type_mismatch(TypeTag::Int, other.tag())),
        }
    }

    /// Convert to a host float. Coercion table: Int widens (exact below 2^53).
    pub fn to_float(&self) -> Result<f64, DispatchError> {
        match self {
            Self::Float(value) => Ok(*value),
            Self::Int(value) => Ok(*value as f64),
            other => Err(DispatchError::type_mismatch(TypeTag::Float, other.tag())),
        }
    }

    /// Convert to a host bool. No coercions are allowed for this pair.
    pub fn to_bool(&self) -> Result<bool, DispatchError> {
        match self {
            Self::Bool(value) => Ok(*value),
            other => Err(DispatchError::type_mismatch(TypeTag::Bool, other.tag())),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}
