//! Native-side helper ABI
//!
//! C-callable functions native libraries use to hand data to the bridge:
//! - `vector.rs` - reference-counted vector buffers
//! - `error.rs` - error records of the throwing convention
//! - `object.rs` - header-based reference-counted objects

pub mod error;
pub mod object;
pub mod vector;

pub use error::{dynbridge_error_free, dynbridge_error_new, dynbridge_set_error, NativeError};
pub use object::{
    dynbridge_object_new, dynbridge_object_ref, dynbridge_object_refcount, dynbridge_object_type,
    dynbridge_object_unref, ObjectHeader,
};
pub use vector::{
    dynbridge_vector_new, dynbridge_vector_ref, dynbridge_vector_refcount, dynbridge_vector_unref,
    NativeVector,
};

use core::ffi::{c_char, c_void};

/// Copy a string into `malloc` memory, the form native strings are passed in
///
/// # Safety
/// `s` must be NULL or NUL-terminated. The result is released with
/// `dynbridge_free`.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_strdup(s: *const c_char) -> *mut c_char {
    if s.is_null() {
        return core::ptr::null_mut();
    }
    libc::strdup(s)
}

/// Release memory handed over by the bridge (strings, raw array buffers)
///
/// # Safety
/// Null-safe; otherwise `ptr` must come from the C allocator.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_free(ptr: *mut c_void) {
    libc::free(ptr);
}
