//! Interoperability - marshaling values and calling native functions
//!
//! Design: conversions are driven entirely by runtime type descriptors
//!
//! Architecture:
//! - `types.rs` - native slot union and the primitive conversion table
//! - `scratch.rs` - per-operation native allocations
//! - `marshal.rs` - slot <-> dynamic value conversion
//! - `array.rs` - array buffers (raw, vector, zero-terminated)
//! - `generic.rs` - generic value containers for object properties
//! - `abi.rs` - prepared call frames (libffi)
//! - `call.rs` - function binding and invocation
//! - `library.rs` - dynamic library loading (dlopen/LoadLibrary)

mod abi;
mod array;
mod call;
mod generic;
mod library;
mod marshal;
mod scratch;
mod types;

pub use abi::CallFrame;
pub use array::{is_zero_element, terminated_len};
pub use call::{CallOutcome, Callable};
pub use generic::{GenericType, GenericValue};
pub use library::{Library, LoadError, SymbolError};
pub use marshal::unsupported;
pub use scratch::Scratch;
pub use types::{NativeSlot, Scalar};
