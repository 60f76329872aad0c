//! Native error record for the throwing convention
//!
//! A throwing function receives a trailing `NativeError **` argument. On
//! failure it stores a record created with `dynbridge_error_new`; the bridge
//! surfaces it and releases it.

use core::ffi::{c_char, CStr};
use tracing::trace;

#[repr(C)]
#[derive(Debug)]
pub struct NativeError {
    pub domain: u32,
    pub code: i32,
    pub message: *mut c_char,
}

impl NativeError {
    /// Message and code of a native error, releasing the record
    ///
    /// # Safety
    /// `error` must be a non-NULL record from `dynbridge_error_new` that
    /// nothing else references.
    pub unsafe fn take(error: *mut NativeError) -> (String, i32) {
        let message = if (*error).message.is_null() {
            String::new()
        } else {
            CStr::from_ptr((*error).message).to_string_lossy().into_owned()
        };
        let code = (*error).code;
        dynbridge_error_free(error);
        (message, code)
    }
}

/// Allocate an error record, copying `message`
///
/// # Safety
/// `message` must be NULL or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_error_new(
    domain: u32,
    code: i32,
    message: *const c_char,
) -> *mut NativeError {
    let error = libc::malloc(core::mem::size_of::<NativeError>()) as *mut NativeError;
    if error.is_null() {
        return error;
    }
    let message = if message.is_null() {
        core::ptr::null_mut()
    } else {
        libc::strdup(message)
    };
    error.write(NativeError { domain, code, message });
    trace!(event = "error_new", domain = domain, code = code);
    error
}

/// Store a new error into `*slot` if the slot is present and empty
///
/// # Safety
/// `slot` must be NULL or point to a writable `NativeError *`.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_set_error(
    slot: *mut *mut NativeError,
    domain: u32,
    code: i32,
    message: *const c_char,
) {
    if slot.is_null() || !(*slot).is_null() {
        return;
    }
    *slot = dynbridge_error_new(domain, code, message);
}

/// Release an error record
///
/// # Safety
/// Null-safe; otherwise `error` must come from `dynbridge_error_new`.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_error_free(error: *mut NativeError) {
    if error.is_null() {
        return;
    }
    libc::free((*error).message as *mut _);
    libc::free(error as *mut _);
}
