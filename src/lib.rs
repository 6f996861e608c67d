//! polycall - typed foreign-function dispatch and value marshaling
//!
//! A host-neutral value model, a registry of pluggable language backends, an
//! atomic module loader, and a typed invoker, reached through one explicitly
//! constructed [`Runtime`] context.

// Core modules
pub mod core;
pub mod backend;
pub mod loader;
pub mod invoke;
pub mod errors;
pub mod runtime;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use crate::core::{FunctionRef, OpaqueValue, TypeTag, Value, ValueHandle};
pub use backend::{Backend, BackendError, BackendRegistry, Capabilities, Export, Signature, Source};
pub use config::{Config, LoadOptions};
pub use errors::{DispatchError, ErrorKind};
pub use loader::{Module, ModuleSet};
pub use logging::init_logging;
pub use runtime::Runtime;
