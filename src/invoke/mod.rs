//! Typed invocation.
//!
//! Resolution searches loaded modules in load order, first match wins;
//! callers needing determinism under shadowing use scoped `module::symbol`
//! names. Arity and argument tags are checked against both the caller's
//! expectation and the callee's declared signature before the backend is
//! touched, so a rejected call has no side effect on the callee. No coercion
//! happens here - coercion lives in the value model's explicit conversions.
//!
//! Backend-native failures, including panics, are translated into
//! `CalleeError`; they never propagate past the boundary.

use crate::backend::BackendRegistry;
use crate::core::{TypeTag, Value};
use crate::errors::DispatchError;
use crate::loader::ModuleSet;
use crate::logging;
use std::panic::{self, AssertUnwindSafe};

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "backend panicked".to_string()
    }
}

/// Resolve `symbol`, check the invocation against its declared signature,
/// and dispatch it to the owning backend. On success exactly one new value
/// is returned; argument values are borrowed and never consumed or mutated.
pub(crate) fn invoke(
    registry: &BackendRegistry,
    modules: &ModuleSet,
    symbol: &str,
    expected: &[TypeTag],
    args: &[Value],
) -> Result<Value, DispatchError> {
    let (module, export) = modules
        .resolve(symbol)
        .ok_or_else(|| DispatchError::unknown_symbol(symbol))?;
    let declared = &export.signature;

    if expected.len() != declared.arity() {
        return Err(DispatchError::arity_mismatch(symbol, declared.arity(), expected.len()));
    }
    if args.len() != expected.len() {
        return Err(DispatchError::arity_mismatch(symbol, expected.len(), args.len()));
    }

    for (index, (arg, want)) in args.iter().zip(expected.iter()).enumerate() {
        if *want != declared.params[index] {
            return Err(DispatchError::type_mismatch(declared.params[index], *want)
                .with_context(format!("parameter {} of '{}'", index, symbol)));
        }
        if arg.tag() != *want {
            return Err(DispatchError::type_mismatch(*want, arg.tag())
                .with_context(format!("argument {} of '{}'", index, symbol)));
        }
    }

    let slot = registry.lookup(module.backend())?;
    slot.ensure_enabled()?;

    logging::log_invoke(symbol, args.len());
    let outcome = {
        let _serial = slot.serialized();
        panic::catch_unwind(AssertUnwindSafe(|| {
            slot.backend().invoke(module.unit(), &export.symbol, args)
        }))
    };

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            logging::log_invoke_failed(symbol, &err.message);
            Err(DispatchError::callee_error(symbol, err.message))
        }
        Err(payload) => {
            let message = panic_message(payload);
            logging::log_invoke_failed(symbol, &message);
            Err(DispatchError::callee_error(symbol, message))
        }
    }
}
