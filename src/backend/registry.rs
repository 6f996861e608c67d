//! Backend registry - tracks available language backends by tag and owns
//! their lifecycle.
//!
//! Backends initialize in registration order and finalize in reverse order,
//! so a backend may assume anything registered before it is still alive at
//! its own teardown. A backend whose initialize fails is marked Disabled and
//! is never retried; loads against it fail with `BackendUnavailable`.

use super::{Backend, BackendError};
use crate::errors::DispatchError;
use crate::logging;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// Lifecycle state of one registered backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Registered,
    Enabled,
    Disabled,
    Finalized,
}

/// One registered backend plus its registry-side bookkeeping.
pub struct BackendSlot {
    backend: Box<dyn Backend>,
    state: RwLock<BackendState>,
    // Present only for backends that did not declare thread_safe.
    serialize: Option<Mutex<()>>,
}

impl std::fmt::Debug for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSlot")
            .field("tag", &self.backend.tag())
            .field("state", &self.state.read())
            .field("serialize", &self.serialize.is_some())
            .finish()
    }
}

impl BackendSlot {
    fn new(backend: Box<dyn Backend>) -> Self {
        let serialize = if backend.capabilities().thread_safe {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self {
            backend,
            state: RwLock::new(BackendState::Registered),
            serialize,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn tag(&self) -> &str {
        self.backend.tag()
    }

    pub fn state(&self) -> BackendState {
        *self.state.read()
    }

    /// Fails with `BackendUnavailable` unless this backend is Enabled.
    pub fn ensure_enabled(&self) -> Result<(), DispatchError> {
        match self.state() {
            BackendState::Enabled => Ok(()),
            _ => Err(DispatchError::backend_unavailable(self.tag())),
        }
    }

    /// Acquire the per-backend serialization lock, if this backend needs one.
    /// Calls against a non-thread-safe backend block here until the current
    /// call completes; there is no timeout.
    pub fn serialized(&self) -> Option<MutexGuard<'_, ()>> {
        self.serialize.as_ref().map(|lock| lock.lock())
    }

    /// Run this backend's initialize, moving it to Enabled or Disabled.
    pub(crate) fn initialize(&self) -> bool {
        match self.backend.initialize() {
            Ok(()) => {
                *self.state.write() = BackendState::Enabled;
                true
            }
            Err(err) => {
                logging::log_backend_disabled(self.tag(), &err.message);
                *self.state.write() = BackendState::Disabled;
                false
            }
        }
    }

    fn finalize(&self) -> Result<(), BackendError> {
        let finalized = {
            let mut state = self.state.write();
            let run = *state == BackendState::Enabled;
            *state = BackendState::Finalized;
            run
        };
        if finalized {
            self.backend.finalize()
        } else {
            Ok(())
        }
    }
}

/// Process-wide set of registered backends.
pub struct BackendRegistry {
    by_tag: DashMap<String, Arc<BackendSlot>>,
    // Registration order, for ordered init and reverse-order teardown.
    order: Mutex<Vec<Arc<BackendSlot>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            by_tag: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Register a backend under its tag. Exactly one live instance per tag.
    pub fn register(&self, backend: Box<dyn Backend>) -> Result<Arc<BackendSlot>, DispatchError> {
        let tag = backend.tag().to_string();
        let slot = Arc::new(BackendSlot::new(backend));

        match self.by_tag.entry(tag.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(DispatchError::duplicate_tag(tag));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&slot));
            }
        }

        self.order.lock().push(Arc::clone(&slot));
        logging::log_backend_registered(&tag);
        Ok(slot)
    }

    pub fn lookup(&self, tag: &str) -> Result<Arc<BackendSlot>, DispatchError> {
        self.by_tag
            .get(tag)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DispatchError::unknown_backend(tag))
    }

    /// Initialize every registered backend in registration order. Backends
    /// that fail are marked Disabled, not removed. Returns the enabled count.
    pub fn initialize_all(&self) -> usize {
        let slots: Vec<_> = self.order.lock().clone();
        let mut enabled = 0;
        for slot in &slots {
            if slot.state() == BackendState::Registered && slot.initialize() {
                enabled += 1;
            }
        }
        enabled
    }

    /// Finalize in reverse registration order. Failures do not stop the
    /// sweep; they are aggregated into one `TeardownError`.
    pub fn finalize_all(&self) -> Result<(), DispatchError> {
        let slots: Vec<_> = self.order.lock().clone();
        let mut failures = Vec::new();
        for slot in slots.iter().rev() {
            if let Err(err) = slot.finalize() {
                failures.push(format!("{}: {}", slot.tag(), err.message));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::teardown(failures.join("; ")))
        }
    }

    /// Registered tags in registration order.
    pub fn tags(&self) -> Vec<String> {
        self.order.lock().iter().map(|slot| slot.tag().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, LoadedUnit, Source};
    use crate::core::Value;
    use crate::errors::ErrorKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct ProbeBackend {
        tag: String,
        fail_init: bool,
        log: Arc<StdMutex<Vec<String>>>,
    }

    impl Backend for ProbeBackend {
        fn tag(&self) -> &str {
            &self.tag
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities { load_file: true, ..Capabilities::default() }
        }

        fn initialize(&self) -> Result<(), BackendError> {
            self.log.lock().unwrap().push(format!("init {}", self.tag));
            if self.fail_init {
                Err(BackendError::new("init refused"))
            } else {
                Ok(())
            }
        }

        fn load(&self, _sources: &[Source]) -> Result<LoadedUnit, BackendError> {
            Ok(LoadedUnit { unit: 0, exports: Vec::new() })
        }

        fn invoke(&self, _unit: u64, _symbol: &str, _args: &[Value]) -> Result<Value, BackendError> {
            Ok(Value::Null)
        }

        fn finalize(&self) -> Result<(), BackendError> {
            self.log.lock().unwrap().push(format!("fini {}", self.tag));
            Ok(())
        }
    }

    fn probe(tag: &str, fail_init: bool, log: &Arc<StdMutex<Vec<String>>>) -> Box<ProbeBackend> {
        Box::new(ProbeBackend {
            tag: tag.to_string(),
            fail_init,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_register_then_lookup_returns_same_backend() {
        let registry = BackendRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let slot = registry.register(probe("mock", false, &log)).unwrap();

        let found = registry.lookup("mock").unwrap();
        assert!(Arc::ptr_eq(&slot, &found));
        assert_eq!(found.tag(), "mock");
    }

    #[test]
    fn test_duplicate_tag_is_rejected() {
        let registry = BackendRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register(probe("mock", false, &log)).unwrap();

        let err = registry.register(probe("mock", false, &log)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateTag { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_tag_lookup_fails() {
        let registry = BackendRegistry::new();
        let err = registry.lookup("rb").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownBackend { .. }));
    }

    #[test]
    fn test_failed_initialize_marks_disabled() {
        let registry = BackendRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register(probe("bad", true, &log)).unwrap();
        registry.register(probe("good", false, &log)).unwrap();

        assert_eq!(registry.initialize_all(), 1);

        let bad = registry.lookup("bad").unwrap();
        assert_eq!(bad.state(), BackendState::Disabled);
        let err = bad.ensure_enabled().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BackendUnavailable { .. }));

        assert_eq!(registry.lookup("good").unwrap().state(), BackendState::Enabled);
    }

    #[test]
    fn test_init_in_order_finalize_in_reverse() {
        let registry = BackendRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register(probe("a", false, &log)).unwrap();
        registry.register(probe("b", false, &log)).unwrap();

        registry.initialize_all();
        registry.finalize_all().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init a", "init b", "fini b", "fini a"]
        );
    }

    #[test]
    fn test_disabled_backend_is_not_finalized() {
        let registry = BackendRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register(probe("bad", true, &log)).unwrap();

        registry.initialize_all();
        registry.finalize_all().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["init bad"]);
    }

    #[test]
    fn test_non_thread_safe_backend_gets_serialization_lock() {
        struct Inline(AtomicBool);
        impl Backend for Inline {
            fn tag(&self) -> &str {
                "inline"
            }
            fn capabilities(&self) -> Capabilities {
                Capabilities {
                    thread_safe: self.0.load(Ordering::SeqCst),
                    ..Capabilities::default()
                }
            }
            fn initialize(&self) -> Result<(), BackendError> {
                Ok(())
            }
            fn load(&self, _: &[Source]) -> Result<LoadedUnit, BackendError> {
                Ok(LoadedUnit { unit: 0, exports: Vec::new() })
            }
            fn invoke(&self, _: u64, _: &str, _: &[Value]) -> Result<Value, BackendError> {
                Ok(Value::Null)
            }
            fn finalize(&self) -> Result<(), BackendError> {
                Ok(())
            }
        }

        let registry = BackendRegistry::new();
        let serial = registry.register(Box::new(Inline(AtomicBool::new(false)))).unwrap();
        assert!(serial.serialized().is_some());

        let registry = BackendRegistry::new();
        let safe = registry.register(Box::new(Inline(AtomicBool::new(true)))).unwrap();
        assert!(safe.serialized().is_none());
    }
}
