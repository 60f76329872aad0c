//! Error taxonomy for the marshaling bridge
//!
//! Native-domain failures are not errors here: they travel through
//! `CallOutcome::Failed`. Everything in `BridgeError` aborts the operation.

use crate::config::ConfigError;
use crate::interop::{LoadError, SymbolError};
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Coarse classification of a `BridgeError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The descriptor asks for something the engine cannot marshal
    BindingDefinition,
    /// The dynamic caller passed something the descriptor rejects
    Usage,
    /// Library loading, configuration, host object system
    Environment,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unable to marshal {0}")]
    Unsupported(String),

    #[error("bad argument #{position} ({message})")]
    BadArgument { position: usize, message: String },

    #[error("{compound}: `{element}' not readable")]
    NotReadable { compound: String, element: String },

    #[error("{compound}: `{element}' not writable")]
    NotWritable { compound: String, element: String },

    #[error("{compound}: no `{element}'")]
    NoElement { compound: String, element: String },

    #[error("`{0}' not present in repo")]
    NotInRepo(String),

    #[error("don't know how to handle {0}->GValue")]
    GenericUnsupported(String),

    #[error("{0}: array length cannot be determined")]
    UnknownLength(String),

    #[error("{0}: only structures can be allocated inline")]
    InlineObject(String),

    #[error("`{0}' is not a function")]
    NotCallable(String),

    #[error("unable to resolve {0}")]
    Unresolved(String),

    #[error("out of native memory allocating {0} bytes")]
    OutOfMemory(usize),

    #[error(transparent)]
    Library(#[from] LoadError),

    #[error("symbol `{symbol}': {source}")]
    Symbol {
        symbol: String,
        #[source]
        source: SymbolError,
    },

    #[error("object system: {0}")]
    ObjectSystem(String),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    pub fn bad_argument(position: usize, message: impl Into<String>) -> Self {
        Self::BadArgument {
            position,
            message: message.into(),
        }
    }

    /// `expected` expected, got `found`
    pub fn type_mismatch(position: usize, expected: &str, found: &str) -> Self {
        Self::bad_argument(position, format!("{expected} expected, got {found}"))
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unsupported(_)
            | Self::NotInRepo(_)
            | Self::GenericUnsupported(_)
            | Self::UnknownLength(_)
            | Self::InlineObject(_)
            | Self::NotCallable(_) => ErrorClass::BindingDefinition,
            Self::BadArgument { .. }
            | Self::NotReadable { .. }
            | Self::NotWritable { .. }
            | Self::NoElement { .. }
            | Self::Hook(_) => ErrorClass::Usage,
            Self::Unresolved(_)
            | Self::OutOfMemory(_)
            | Self::Library(_)
            | Self::Symbol { .. }
            | Self::ObjectSystem(_)
            | Self::Config(_) => ErrorClass::Environment,
        }
    }
}
