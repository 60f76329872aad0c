//! Object lifecycle - C API for reference-counted native objects
//!
//! Every object starts with an `ObjectHeader`; the object pointer and the
//! header pointer are the same address, so native code can treat any object
//! as a header instance.

use core::ffi::c_void;
use std::sync::atomic::{fence, AtomicU32, Ordering};
use tracing::{debug, trace};

#[repr(C)]
#[derive(Debug)]
pub struct ObjectHeader {
    pub type_id: usize,
    pub size: usize,
    refcount: AtomicU32,
    _reserved: u32,
}

impl ObjectHeader {
    #[inline]
    unsafe fn from_object<'a>(obj: *const c_void) -> &'a ObjectHeader {
        &*(obj as *const ObjectHeader)
    }
}

/// Create a zeroed object of `size` bytes (header included) with refcount 1
///
/// Returns NULL on allocation failure.
#[no_mangle]
pub extern "C" fn dynbridge_object_new(type_id: usize, size: usize) -> *mut c_void {
    let size = size.max(core::mem::size_of::<ObjectHeader>());
    // SAFETY: fresh allocation, header written before the pointer escapes
    unsafe {
        let obj = libc::calloc(1, size);
        if obj.is_null() {
            return obj;
        }
        (obj as *mut ObjectHeader).write(ObjectHeader {
            type_id,
            size,
            refcount: AtomicU32::new(1),
            _reserved: 0,
        });
        debug!(address = ?obj, type_id = type_id, "Object allocated");
        obj
    }
}

/// Increment reference count
///
/// # Safety
/// Null-safe; otherwise `obj` must be a live object.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_object_ref(obj: *mut c_void) -> *mut c_void {
    if obj.is_null() {
        return obj;
    }
    let old = ObjectHeader::from_object(obj)
        .refcount
        .fetch_add(1, Ordering::Relaxed);
    debug_assert!(old < u32::MAX, "refcount overflow");
    obj
}

/// Decrement reference count, destroying the object at zero
///
/// # Safety
/// Null-safe; otherwise `obj` must be a live object.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_object_unref(obj: *mut c_void) {
    release(obj);
}

/// Current reference count (for debugging/testing)
///
/// # Safety
/// Returns 0 for NULL; otherwise `obj` must be a live object.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_object_refcount(obj: *const c_void) -> u32 {
    if obj.is_null() {
        return 0;
    }
    ObjectHeader::from_object(obj).refcount.load(Ordering::Relaxed)
}

/// Runtime type recorded in the header
///
/// # Safety
/// Returns 0 for NULL; otherwise `obj` must be a live object.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_object_type(obj: *const c_void) -> usize {
    if obj.is_null() {
        return 0;
    }
    ObjectHeader::from_object(obj).type_id
}

/// Drop one reference; true when the object was destroyed
pub(crate) unsafe fn release(obj: *mut c_void) -> bool {
    if obj.is_null() {
        return false;
    }

    let old = ObjectHeader::from_object(obj)
        .refcount
        .fetch_sub(1, Ordering::Release);
    debug_assert!(old > 0, "refcount underflow");

    if old == 1 {
        // Synchronize with all previous decrements
        fence(Ordering::Acquire);
        destroy_object(obj);
        true
    } else {
        false
    }
}

#[cold]
#[inline(never)]
unsafe fn destroy_object(obj: *mut c_void) {
    trace!(event = "object_destroy", address = ?obj);
    libc::free(obj);
}
