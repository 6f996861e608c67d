//! Shared test backend: a closure-driven engine standing in for a real
//! language runtime.

#![allow(dead_code)]

use polycall::backend::LoadedUnit;
use polycall::{Backend, BackendError, Capabilities, Export, Signature, Source, Value};
use std::sync::atomic::{AtomicU64, Ordering};

type Handler = Box<dyn Fn(&[Value]) -> Result<Value, BackendError> + Send + Sync>;

/// Backend whose exported functions are plain Rust closures.
pub struct ScriptedBackend {
    tag: String,
    thread_safe: bool,
    fail_init: bool,
    functions: Vec<(String, Signature, Handler)>,
    next_unit: AtomicU64,
}

impl ScriptedBackend {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            thread_safe: true,
            fail_init: false,
            functions: Vec::new(),
            next_unit: AtomicU64::new(1),
        }
    }

    pub fn thread_safe(mut self, thread_safe: bool) -> Self {
        self.thread_safe = thread_safe;
        self
    }

    pub fn fail_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_function(
        mut self,
        name: &str,
        signature: Signature,
        handler: impl Fn(&[Value]) -> Result<Value, BackendError> + Send + Sync + 'static,
    ) -> Self {
        self.functions.push((name.to_string(), signature, Box::new(handler)));
        self
    }
}

impl Backend for ScriptedBackend {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            load_file: true,
            load_buffer: true,
            invoke_async: false,
            thread_safe: self.thread_safe,
        }
    }

    fn initialize(&self) -> Result<(), BackendError> {
        if self.fail_init {
            Err(BackendError::new("scripted backend refused to start"))
        } else {
            Ok(())
        }
    }

    fn load(&self, _sources: &[Source]) -> Result<LoadedUnit, BackendError> {
        Ok(LoadedUnit {
            unit: self.next_unit.fetch_add(1, Ordering::SeqCst),
            exports: self
                .functions
                .iter()
                .map(|(name, signature, _)| Export {
                    symbol: name.clone(),
                    signature: signature.clone(),
                })
                .collect(),
        })
    }

    fn invoke(&self, _unit: u64, symbol: &str, args: &[Value]) -> Result<Value, BackendError> {
        let handler = self
            .functions
            .iter()
            .find(|(name, _, _)| name == symbol)
            .map(|(_, _, handler)| handler)
            .ok_or_else(|| BackendError::new(format!("unknown symbol '{}'", symbol)))?;
        handler(args)
    }

    fn finalize(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Concatenate string arguments in order, the way the sum.py fixture does.
pub fn concat_handler(args: &[Value]) -> Result<Value, BackendError> {
    let mut out = String::new();
    for arg in args {
        out.push_str(
            arg.as_str()
                .ok_or_else(|| BackendError::new("sum expects strings"))?,
        );
    }
    Ok(Value::from(out))
}
