//! The boundary context object.
//!
//! `Runtime` is the single explicitly constructed context every API entry
//! point goes through - there is no module-level global state. Lifecycle:
//! construct, register backends, `initialize` exactly once, load and call,
//! `destroy` at shutdown. Destroy is idempotent and unwinds whatever subset
//! of initialization succeeded.

use crate::backend::{Backend, BackendRegistry, Source};
use crate::config::{Config, LoadOptions};
use crate::core::{HandleTable, TypeTag, Value, ValueHandle};
use crate::errors::DispatchError;
use crate::invoke;
use crate::loader::{self, ModuleSet};
use crate::logging;
use parking_lot::{RwLock, RwLockReadGuard};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Created,
    Ready,
    Destroyed,
}

/// Typed foreign-function dispatch context.
pub struct Runtime {
    config: Config,
    registry: BackendRegistry,
    modules: ModuleSet,
    handles: HandleTable,
    state: RwLock<LifecycleState>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            registry: BackendRegistry::new(),
            modules: ModuleSet::new(),
            handles: HandleTable::new(),
            state: RwLock::new(LifecycleState::Created),
        }
    }

    /// Register a language backend under its tag.
    ///
    /// Backends registered before `initialize` are initialized with the
    /// runtime; backends registered afterwards are initialized on the spot.
    pub fn register(&self, backend: Box<dyn Backend>) -> Result<(), DispatchError> {
        let state = *self.state.read();
        match state {
            LifecycleState::Destroyed => {
                Err(DispatchError::teardown("cannot register on a destroyed runtime"))
            }
            LifecycleState::Created => {
                self.registry.register(backend)?;
                Ok(())
            }
            LifecycleState::Ready => {
                let slot = self.registry.register(backend)?;
                slot.initialize();
                Ok(())
            }
        }
    }

    /// Bring the runtime up. Must run before any load or call; a second call
    /// on a live runtime is a logged no-op.
    pub fn initialize(&self) -> Result<(), DispatchError> {
        let mut state = self.state.write();
        match *state {
            LifecycleState::Created => {
                let enabled = self.registry.initialize_all();
                logging::log_runtime_init(enabled);
                *state = LifecycleState::Ready;
                Ok(())
            }
            LifecycleState::Ready => {
                logging::warn!(target: "runtime", "initialize called twice");
                Ok(())
            }
            LifecycleState::Destroyed => {
                Err(DispatchError::teardown("cannot initialize a destroyed runtime"))
            }
        }
    }

    /// Tear the runtime down: force-release outstanding values in reverse
    /// creation order, unload modules in reverse load order, finalize
    /// backends in reverse registration order. Idempotent - a second call is
    /// a success no-op. Safe after a partial initialize; only what came up
    /// is unwound.
    pub fn destroy(&self) -> Result<(), DispatchError> {
        let mut state = self.state.write();
        if *state == LifecycleState::Destroyed {
            return Ok(());
        }

        logging::log_runtime_shutdown();

        let released = self.handles.release_all();
        if released > 0 {
            logging::log_values_released(released);
        }

        for module in self.modules.clear() {
            if let Ok(slot) = self.registry.lookup(module.backend()) {
                slot.backend().unload(module.unit());
            }
        }

        let result = self.registry.finalize_all();
        *state = LifecycleState::Destroyed;
        result
    }

    fn ready(&self) -> Result<RwLockReadGuard<'_, LifecycleState>, DispatchError> {
        let state = self.state.read();
        match *state {
            LifecycleState::Ready => Ok(state),
            LifecycleState::Created => Err(DispatchError::not_initialized()),
            LifecycleState::Destroyed => {
                Err(DispatchError::not_initialized().with_context("runtime was destroyed"))
            }
        }
    }

    /// Load one or more script files against the backend registered under
    /// `tag`. Atomic: if any source fails to parse, nothing is loaded.
    pub fn load_from_file(
        &self,
        tag: &str,
        paths: &[&str],
        options: Option<LoadOptions>,
    ) -> Result<(), DispatchError> {
        let _state = self.ready()?;
        let sources = paths
            .iter()
            .map(|path| Source::File(PathBuf::from(path)))
            .collect();
        loader::load(&self.registry, &self.modules, tag, sources, &self.options(options))
    }

    /// Load an in-memory buffer against the backend registered under `tag`.
    pub fn load_from_memory(
        &self,
        tag: &str,
        name: &str,
        contents: &str,
        options: Option<LoadOptions>,
    ) -> Result<(), DispatchError> {
        let _state = self.ready()?;
        let sources = vec![Source::Buffer {
            name: name.to_string(),
            contents: contents.to_string(),
        }];
        loader::load(&self.registry, &self.modules, tag, sources, &self.options(options))
    }

    fn options(&self, options: Option<LoadOptions>) -> LoadOptions {
        options.unwrap_or(LoadOptions {
            isolation: self.config.load.isolation,
            module_name: None,
        })
    }

    /// Invoke a loaded symbol with typed arguments.
    ///
    /// `expected` must match both the argument values and the callee's
    /// declared signature; no coercion happens during dispatch. The returned
    /// handle owns the result until `release`.
    pub fn call(
        &self,
        name: &str,
        expected: &[TypeTag],
        args: &[Value],
    ) -> Result<ValueHandle, DispatchError> {
        let _state = self.ready()?;
        let value = invoke::invoke(&self.registry, &self.modules, name, expected, args)?;
        Ok(self.handles.track(value))
    }

    /// Drop every module owned by `tag` ahead of teardown.
    pub fn unload(&self, tag: &str) -> Result<(), DispatchError> {
        let _state = self.ready()?;
        let slot = self.registry.lookup(tag)?;
        for module in self.modules.remove_backend(tag) {
            slot.backend().unload(module.unit());
        }
        Ok(())
    }

    /// Every visible symbol in resolution order, as `module::symbol`.
    pub fn symbols(&self) -> Vec<String> {
        self.modules.symbols()
    }

    /// Clone out the value behind a handle.
    pub fn value(&self, handle: ValueHandle) -> Result<Value, DispatchError> {
        self.handles.get(handle)
    }

    /// Convert the value behind `handle` to a host string (coercion table
    /// applies; see the value model).
    pub fn to_string(&self, handle: ValueHandle) -> Result<String, DispatchError> {
        self.handles.with(handle, |value| value.to_string_value())?
    }

    pub fn to_int(&self, handle: ValueHandle) -> Result<i64, DispatchError> {
        self.handles.with(handle, |value| value.to_int())?
    }

    pub fn to_float(&self, handle: ValueHandle) -> Result<f64, DispatchError> {
        self.handles.with(handle, |value| value.to_float())?
    }

    pub fn to_bool(&self, handle: ValueHandle) -> Result<bool, DispatchError> {
        self.handles.with(handle, |value| value.to_bool())?
    }

    /// Release a boundary value. Releasing the same handle twice fails with
    /// `InvalidHandle`.
    pub fn release(&self, handle: ValueHandle) -> Result<(), DispatchError> {
        let value = self.handles.get(handle)?;
        if let Value::Opaque(opaque) = &value {
            if let Ok(slot) = self.registry.lookup(opaque.backend()) {
                slot.backend().destroy_value(&value);
            }
        }
        self.handles.release(handle)
    }

    /// Outstanding boundary values.
    pub fn live_values(&self) -> usize {
        self.handles.len()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Compensating cleanup for callers that never reached destroy().
        let _ = self.destroy();
    }
}
