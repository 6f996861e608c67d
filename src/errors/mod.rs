use crate::core::TypeTag;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized,
    DuplicateTag { tag: String },
    UnknownBackend { tag: String },
    BackendUnavailable { tag: String },
    LoadFailed { tag: String, message: String },
    UnknownSymbol { symbol: String },
    ArityMismatch { symbol: String, expected: usize, found: usize },
    TypeMismatch { expected: String, found: String },
    CalleeError { symbol: String, message: String },
    InvalidHandle { id: u64 },
    TeardownError { message: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => {
                write!(f, "runtime has not been initialized")
            }
            Self::DuplicateTag { tag } => {
                write!(f, "backend tag '{}' is already registered", tag)
            }
            Self::UnknownBackend { tag } => {
                write!(f, "no backend registered for tag '{}'", tag)
            }
            Self::BackendUnavailable { tag } => {
                write!(f, "backend '{}' is disabled and cannot serve requests", tag)
            }
            Self::LoadFailed { tag, message } => {
                write!(f, "load against backend '{}' failed: {}", tag, message)
            }
            Self::UnknownSymbol { symbol } => {
                write!(f, "no loaded module exports symbol '{}'", symbol)
            }
            Self::ArityMismatch { symbol, expected, found } => {
                write!(
                    f,
                    "arity mismatch calling '{}': expected {} arguments, found {}",
                    symbol, expected, found
                )
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
            Self::CalleeError { symbol, message } => {
                write!(f, "callee '{}' failed: {}", symbol, message)
            }
            Self::InvalidHandle { id } => {
                write!(f, "invalid or already released value handle {}", id)
            }
            Self::TeardownError { message } => {
                write!(f, "teardown failed: {}", message)
            }
        }
    }
}

/// Boundary error carried by every fallible API entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub kind: ErrorKind,
    pub context: Option<String>,
}

impl DispatchError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, context: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorKind::NotInitialized)
    }

    pub fn duplicate_tag(tag: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateTag { tag: tag.into() })
    }

    pub fn unknown_backend(tag: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownBackend { tag: tag.into() })
    }

    pub fn backend_unavailable(tag: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendUnavailable { tag: tag.into() })
    }

    pub fn load_failed(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LoadFailed {
            tag: tag.into(),
            message: message.into(),
        })
    }

    pub fn unknown_symbol(symbol: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSymbol { symbol: symbol.into() })
    }

    pub fn arity_mismatch(symbol: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            symbol: symbol.into(),
            expected,
            found,
        })
    }

    pub fn type_mismatch(expected: TypeTag, found: TypeTag) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.name().to_string(),
            found: found.name().to_string(),
        })
    }

    pub fn callee_error(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CalleeError {
            symbol: symbol.into(),
            message: message.into(),
        })
    }

    pub fn invalid_handle(id: u64) -> Self {
        Self::new(ErrorKind::InvalidHandle { id })
    }

    pub fn teardown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TeardownError { message: message.into() })
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for DispatchError {}
