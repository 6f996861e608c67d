//! Backend abstraction - pluggable language engines behind one dispatch seam.
//!
//! Design: composition over a trait-object vtable. A backend implements the
//! five lifecycle operations {initialize, load, invoke, destroy_value,
//! finalize} and advertises capability flags; everything else (ordering,
//! serialization, error translation) is owned by the registry and the layers
//! above it. Backend-native failures surface as [`BackendError`] and are
//! translated into boundary error kinds at the loader/invoker - they never
//! cross the boundary as native control flow.

pub mod mock;
pub mod registry;

use crate::core::{TypeTag, Value};
use std::fmt;
use std::path::PathBuf;

pub use registry::{BackendRegistry, BackendSlot, BackendState};

/// Capability flags advertised by a backend at registration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub load_file: bool,
    pub load_buffer: bool,
    pub invoke_async: bool,
    /// Backends without this flag are serialized by the registry with a
    /// per-backend lock; backends with it manage their own synchronization.
    pub thread_safe: bool,
}

/// Backend-defined source locator. Contents are opaque to the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Buffer { name: String, contents: String },
}

impl Source {
    /// Display name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Buffer { name, .. } => name.clone(),
        }
    }
}

/// Declared parameter and return tags of one callable symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeTag>,
    pub returns: TypeTag,
}

impl Signature {
    pub fn new(params: Vec<TypeTag>, returns: TypeTag) -> Self {
        Self { params, returns }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// One exported symbol of a loaded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub symbol: String,
    pub signature: Signature,
}

/// Result of a successful backend load: a backend-side unit id plus the
/// fully populated export set. There is no lazy symbol discovery.
#[derive(Debug, Clone)]
pub struct LoadedUnit {
    pub unit: u64,
    pub exports: Vec<Export>,
}

/// Backend-native failure, carried as a plain message across the seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// One pluggable language engine.
///
/// Methods take `&self`; implementations that mutate internal state either
/// declare `thread_safe` and synchronize themselves, or rely on the
/// registry's per-backend serialization lock.
pub trait Backend: Send + Sync {
    /// Unique short tag ("mock", "py", ...). One live instance per tag.
    fn tag(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn initialize(&self) -> Result<(), BackendError>;

    /// Parse/compile all sources into one unit, atomically: either every
    /// source is accepted and the full export set is returned, or the whole
    /// load fails and no backend-side state survives.
    fn load(&self, sources: &[Source]) -> Result<LoadedUnit, BackendError>;

    /// Invoke an exported symbol. Arity and tags were already checked by the
    /// invoker against the declared signature.
    fn invoke(&self, unit: u64, symbol: &str, args: &[Value]) -> Result<Value, BackendError>;

    /// Hook invoked when a value produced by this backend is released.
    fn destroy_value(&self, _value: &Value) {}

    /// Hook invoked when a loaded unit is dropped ahead of finalize.
    fn unload(&self, _unit: u64) {}

    fn finalize(&self) -> Result<(), BackendError>;
}
