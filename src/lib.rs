//! dynbridge - dynamic marshaling bridge between dynamic values and native code
//!
//! Given runtime type descriptors for native functions, structures and
//! objects, the bridge converts values between the dynamic `Value` model and
//! native call-frame slots, invokes native functions through a generic call
//! interface, and manages the lifetime of native memory exposed as compound
//! handles.

pub mod compound;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod ffi;
pub mod interop;
pub mod logging;
pub mod objects;
pub mod value;

// Re-export core types
pub use compound::{CompoundHandle, CompoundKind, Ownership, Registry, TypeHooks};
pub use config::BridgeConfig;
pub use context::{Lookup, MarshalingContext};
pub use descriptor::{BaseInfo, Catalog, MetadataRepository, Transfer, TypeInfo};
pub use error::{BridgeError, BridgeResult, ErrorClass};
pub use interop::{CallOutcome, Callable};
pub use objects::{BasicObjects, NoObjects, ObjectSystem};
pub use value::Value;

/// Bridge initialization (logging from the environment)
#[no_mangle]
pub extern "C" fn dynbridge_init() {
    logging::init();
    tracing::info!(event = "bridge_init", version = env!("CARGO_PKG_VERSION"), "dynbridge initialized");
}
