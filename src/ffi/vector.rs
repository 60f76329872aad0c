//! Growable vector buffer - C API with atomic reference counting
//!
//! The header owns its data buffer. Both are released when the last
//! reference is dropped.

use std::sync::atomic::{fence, AtomicU32, Ordering};
use tracing::trace;

#[repr(C)]
#[derive(Debug)]
pub struct NativeVector {
    pub data: *mut u8,
    pub len: usize,
    pub element_size: usize,
    refcount: AtomicU32,
}

impl NativeVector {
    /// Copy `len` elements of `element_size` bytes into a new vector
    ///
    /// One extra zeroed element is always allocated so zero-terminated
    /// consumers can scan the buffer. Returns NULL on allocation failure.
    ///
    /// # Safety
    /// `data` must be NULL (zero-filled vector) or point to `len * element_size`
    /// readable bytes.
    pub unsafe fn from_raw(data: *const u8, len: usize, element_size: usize) -> *mut NativeVector {
        let bytes = len.saturating_add(1).saturating_mul(element_size.max(1));
        let buffer = libc::calloc(1, bytes) as *mut u8;
        if buffer.is_null() {
            return core::ptr::null_mut();
        }
        if !data.is_null() {
            core::ptr::copy_nonoverlapping(data, buffer, len * element_size);
        }
        Self::adopt(buffer, len, element_size)
    }

    /// Wrap an existing `malloc` buffer; the vector takes ownership of it
    ///
    /// # Safety
    /// `data` must come from `malloc`/`calloc` and not be freed elsewhere.
    pub unsafe fn adopt(data: *mut u8, len: usize, element_size: usize) -> *mut NativeVector {
        let header = libc::malloc(core::mem::size_of::<NativeVector>()) as *mut NativeVector;
        if header.is_null() {
            libc::free(data as *mut _);
            return core::ptr::null_mut();
        }
        header.write(NativeVector {
            data,
            len,
            element_size,
            refcount: AtomicU32::new(1),
        });
        trace!(event = "vector_new", len = len, address = ?header);
        header
    }
}

/// Create a zero-filled vector of `len` elements
#[no_mangle]
pub extern "C" fn dynbridge_vector_new(len: usize, element_size: usize) -> *mut NativeVector {
    // SAFETY: NULL source means zero-filled
    unsafe { NativeVector::from_raw(core::ptr::null(), len, element_size) }
}

/// Increment reference count
///
/// # Safety
/// Null-safe; otherwise `vector` must be a live vector.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_vector_ref(vector: *mut NativeVector) -> *mut NativeVector {
    if vector.is_null() {
        return vector;
    }
    let old = (*vector).refcount.fetch_add(1, Ordering::Relaxed);
    debug_assert!(old < u32::MAX, "refcount overflow");
    vector
}

/// Decrement reference count, freeing data and header at zero
///
/// # Safety
/// Null-safe; otherwise `vector` must be a live vector.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_vector_unref(vector: *mut NativeVector) {
    if vector.is_null() {
        return;
    }

    let old = (*vector).refcount.fetch_sub(1, Ordering::Release);
    debug_assert!(old > 0, "refcount underflow");

    if old == 1 {
        // Synchronize with all previous decrements
        fence(Ordering::Acquire);
        destroy_vector(vector);
    }
}

/// Current reference count (for debugging/testing)
///
/// # Safety
/// Returns 0 for NULL; otherwise `vector` must be a live vector.
#[no_mangle]
pub unsafe extern "C" fn dynbridge_vector_refcount(vector: *const NativeVector) -> u32 {
    if vector.is_null() {
        return 0;
    }
    (*vector).refcount.load(Ordering::Relaxed)
}

#[cold]
#[inline(never)]
unsafe fn destroy_vector(vector: *mut NativeVector) {
    trace!(event = "vector_destroy", address = ?vector);
    libc::free((*vector).data as *mut _);
    libc::free(vector as *mut _);
}
