//! Boundary ownership tracking.
//!
//! Every value handed outward across the boundary is tracked here under a
//! numeric handle. Callers release handles explicitly; a release of an
//! unknown or already-released handle reports `InvalidHandle` instead of
//! touching freed state. Teardown force-releases whatever is still
//! outstanding, in reverse creation order.

use crate::core::Value;
use crate::errors::DispatchError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Caller-visible handle to a tracked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueHandle(u64);

impl ValueHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Arena of live boundary values.
pub struct HandleTable {
    values: DashMap<u64, Value>,
    // Creation order, for deterministic reverse-order teardown.
    order: Mutex<Vec<u64>>,
    next_id: AtomicU64,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
            order: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Track a value and hand out its handle.
    pub fn track(&self, value: Value) -> ValueHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.values.insert(id, value);
        self.order.lock().push(id);
        ValueHandle(id)
    }

    /// Clone out the tracked value.
    pub fn get(&self, handle: ValueHandle) -> Result<Value, DispatchError> {
        self.values
            .get(&handle.0)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::invalid_handle(handle.0))
    }

    /// Run `f` against the tracked value without cloning it.
    pub fn with<R>(
        &self,
        handle: ValueHandle,
        f: impl FnOnce(&Value) -> R,
    ) -> Result<R, DispatchError> {
        self.values
            .get(&handle.0)
            .map(|entry| f(entry.value()))
            .ok_or_else(|| DispatchError::invalid_handle(handle.0))
    }

    /// Release a handle, dropping the owned value.
    pub fn release(&self, handle: ValueHandle) -> Result<(), DispatchError> {
        match self.values.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(DispatchError::invalid_handle(handle.0)),
        }
    }

    /// Force-release every outstanding handle in reverse creation order.
    /// Returns how many were still live.
    pub fn release_all(&self) -> usize {
        let mut order = self.order.lock();
        let mut released = 0;
        for id in order.drain(..).rev() {
            if self.values.remove(&id).is_some() {
                released += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
