//! Reference mock backend - the conformance fixture.
//!
//! The mock "language" is a line-oriented declaration format:
//!
//! ```text
//! # comment
//! fn three_str(str, str, str) -> str
//! fn two_doubles(double, double) -> double
//! ```
//!
//! Loading fully populates the export set; nothing is discovered lazily.
//! Every invocation answers with a canned literal chosen by the declared
//! return tag: "Hello World" for strings, 65536 for ints, 0.2 for floats,
//! true for bools. Any malformed line fails the whole load.

use super::{Backend, BackendError, Capabilities, Export, LoadedUnit, Signature, Source};
use crate::core::{TypeTag, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

pub const MOCK_TAG: &str = "mock";

/// Built-in backend answering every call with a canned literal.
pub struct MockBackend {
    // unit id -> symbol -> declared return tag
    units: RwLock<HashMap<u64, HashMap<String, TypeTag>>>,
    next_unit: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
            next_unit: AtomicU64::new(1),
        }
    }

    fn parse_type(name: &str, line_no: usize) -> Result<TypeTag, BackendError> {
        TypeTag::from_name(name).ok_or_else(|| {
            BackendError::new(format!("line {}: unknown type '{}'", line_no, name))
        })
    }

    /// Parse one declaration source. All-or-nothing: the first malformed
    /// line aborts the parse.
    fn parse_declarations(name: &str, contents: &str) -> Result<Vec<Export>, BackendError> {
        let mut exports = Vec::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim().trim_end_matches(';').trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let rest = line.strip_prefix("fn ").ok_or_else(|| {
                BackendError::new(format!("{}: line {}: expected 'fn'", name, line_no))
            })?;

            let open = rest.find('(').ok_or_else(|| {
                BackendError::new(format!("{}: line {}: missing '('", name, line_no))
            })?;
            let close = rest.find(')').ok_or_else(|| {
                BackendError::new(format!("{}: line {}: missing ')'", name, line_no))
            })?;
            if close < open {
                return Err(BackendError::new(format!(
                    "{}: line {}: mismatched parentheses",
                    name, line_no
                )));
            }

            let symbol = rest[..open].trim();
            if symbol.is_empty() {
                return Err(BackendError::new(format!(
                    "{}: line {}: missing function name",
                    name, line_no
                )));
            }

            let params_src = rest[open + 1..close].trim();
            let mut params = Vec::new();
            if !params_src.is_empty() {
                for part in params_src.split(',') {
                    params.push(Self::parse_type(part.trim(), line_no)?);
                }
            }

            let returns_src = rest[close + 1..]
                .trim()
                .strip_prefix("->")
                .ok_or_else(|| {
                    BackendError::new(format!(
                        "{}: line {}: missing '-> <type>'",
                        name, line_no
                    ))
                })?
                .trim();
            let returns = Self::parse_type(returns_src, line_no)?;

            exports.push(Export {
                symbol: symbol.to_string(),
                signature: Signature::new(params, returns),
            });
        }

        Ok(exports)
    }

    fn canned(returns: TypeTag) -> Value {
        match returns {
            TypeTag::String => Value::from("Hello World"),
            TypeTag::Int => Value::from(65536i64),
            TypeTag::Float => Value::from(0.2),
            TypeTag::Bool => Value::from(true),
            TypeTag::Array => Value::Array(Vec::new()),
            TypeTag::Map => Value::Map(Vec::new()),
            _ => Value::Null,
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MockBackend {
    fn tag(&self) -> &str {
        MOCK_TAG
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            load_file: true,
            load_buffer: true,
            invoke_async: false,
            thread_safe: true,
        }
    }

    fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn load(&self, sources: &[Source]) -> Result<LoadedUnit, BackendError> {
        // Parse everything before committing anything.
        let mut exports = Vec::new();
        for source in sources {
            let parsed = match source {
                Source::File(path) => {
                    let contents = fs::read_to_string(path)?;
                    Self::parse_declarations(&source.name(), &contents)?
                }
                Source::Buffer { name, contents } => {
                    Self::parse_declarations(name, contents)?
                }
            };
            exports.extend(parsed);
        }

        let unit = self.next_unit.fetch_add(1, Ordering::SeqCst);
        let table = exports
            .iter()
            .map(|export| (export.symbol.clone(), export.signature.returns))
            .collect();
        self.units.write().insert(unit, table);

        Ok(LoadedUnit { unit, exports })
    }

    fn invoke(&self, unit: u64, symbol: &str, _args: &[Value]) -> Result<Value, BackendError> {
        let units = self.units.read();
        let table = units
            .get(&unit)
            .ok_or_else(|| BackendError::new(format!("unknown unit {}", unit)))?;
        let returns = table
            .get(symbol)
            .ok_or_else(|| BackendError::new(format!("unknown symbol '{}'", symbol)))?;
        Ok(Self::canned(*returns))
    }

    fn unload(&self, unit: u64) {
        self.units.write().remove(&unit);
    }

    fn finalize(&self) -> Result<(), BackendError> {
        self.units.write().clear();
        Ok(())
    }
}
