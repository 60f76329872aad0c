//! Call-frame descriptors
//!
//! Wraps a prepared libffi `Cif`: the platform calling convention is
//! resolved once at bind time and reused for every invocation.

use core::ffi::c_void;
use libffi::middle::{Cif, CodePtr, Type};

/// Prepared ABI description of one native signature
pub struct CallFrame {
    cif: Cif,
    arg_count: usize,
}

impl core::fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CallFrame {{ args: {} }}", self.arg_count)
    }
}

impl CallFrame {
    pub fn prepare(args: Vec<Type>, result: Type) -> Self {
        let arg_count = args.len();
        Self {
            cif: Cif::new(args, result),
            arg_count,
        }
    }

    /// Native arguments, including the instance and error slots
    #[inline]
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    /// Perform the call
    ///
    /// # Safety
    /// `code` must match the prepared signature. `args` must hold
    /// `arg_count` pointers to correctly typed values and `result` must be
    /// large enough for the return type widened to a full register.
    pub unsafe fn call(&self, code: CodePtr, result: *mut c_void, args: &mut [*mut c_void]) {
        debug_assert_eq!(args.len(), self.arg_count);
        libffi::raw::ffi_call(
            self.cif.as_raw_ptr(),
            Some(*code.as_fun()),
            result,
            args.as_mut_ptr(),
        );
    }
}
