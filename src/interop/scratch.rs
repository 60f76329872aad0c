//! Per-operation native allocations
//!
//! Strings and array buffers built from dynamic values live in native memory
//! tracked here. A scratch arena frees everything it still tracks on drop;
//! allocations handed to native code are detached first.

use crate::error::{BridgeError, BridgeResult};
use crate::ffi::{dynbridge_vector_unref, NativeVector};
use core::ffi::{c_char, c_void};

#[derive(Debug)]
enum Allocation {
    Malloc(*mut c_void),
    Vector(*mut NativeVector),
}

#[derive(Debug, Default)]
pub struct Scratch {
    allocations: Vec<Allocation>,
    detached: bool,
}

impl Scratch {
    /// Arena released when dropped
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena whose allocations all belong to native code
    pub fn detached() -> Self {
        Self {
            allocations: Vec::new(),
            detached: true,
        }
    }

    /// Position to pass to `detach_from`
    #[inline]
    pub fn mark(&self) -> usize {
        self.allocations.len()
    }

    /// Hand every allocation made since `mark` over to native code
    pub fn detach_from(&mut self, mark: usize) {
        self.allocations.truncate(mark);
    }

    /// Number of allocations still owned by the arena
    #[inline]
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// NUL-terminated copy of `s` in `malloc` memory
    pub fn strdup(&mut self, s: &str) -> BridgeResult<*mut c_char> {
        let buffer = self.alloc_zeroed(s.len() + 1)?;
        // SAFETY: buffer holds len + 1 zeroed bytes
        unsafe {
            core::ptr::copy_nonoverlapping(s.as_ptr(), buffer, s.len());
        }
        Ok(buffer as *mut c_char)
    }

    /// Zeroed `malloc` buffer of `size` bytes
    pub fn alloc_zeroed(&mut self, size: usize) -> BridgeResult<*mut u8> {
        // SAFETY: calloc with a non-zero size
        let buffer = unsafe { libc::calloc(1, size.max(1)) };
        if buffer.is_null() {
            return Err(BridgeError::OutOfMemory(size));
        }
        if !self.detached {
            self.allocations.push(Allocation::Malloc(buffer));
        }
        Ok(buffer as *mut u8)
    }

    /// Zero-filled vector buffer of `len` elements plus one terminator element
    pub fn vector(&mut self, len: usize, element_size: usize) -> BridgeResult<*mut NativeVector> {
        // SAFETY: NULL source means zero-filled
        let vector = unsafe { NativeVector::from_raw(core::ptr::null(), len, element_size) };
        if vector.is_null() {
            return Err(BridgeError::OutOfMemory(len * element_size));
        }
        if !self.detached {
            self.allocations.push(Allocation::Vector(vector));
        }
        Ok(vector)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for allocation in self.allocations.drain(..).rev() {
            // SAFETY: tracked allocations are owned by the arena
            unsafe {
                match allocation {
                    Allocation::Malloc(ptr) => libc::free(ptr),
                    Allocation::Vector(vector) => dynbridge_vector_unref(vector),
                }
            }
        }
    }
}
