//! Shared libraries backing a namespace
//!
//! The context opens each library once and keeps it for its own lifetime, so
//! resolved addresses stay valid for every callable bound against it.

use core::ffi::{c_char, c_void};
use core::ptr::NonNull;
use std::ffi::CString;
use thiserror::Error;

#[derive(Debug)]
pub struct Library {
    handle: NonNull<c_void>,
    name: String,
}

impl Library {
    /// Open a library by soname or path
    pub fn load(name: &str) -> Result<Self, LoadError> {
        let soname = CString::new(name).map_err(|_| LoadError::InvalidName)?;
        // SAFETY: soname is NUL-terminated
        let handle = unsafe { sys::open(soname.as_ptr()) }.map_err(|reason| LoadError::LoadFailed {
            library: name.to_string(),
            reason,
        })?;
        Ok(Self {
            handle,
            name: name.to_string(),
        })
    }

    /// The running executable and everything it already links
    #[cfg(unix)]
    pub fn this_process() -> Result<Self, LoadError> {
        const NAME: &str = "<process>";
        // SAFETY: a NULL filename is documented to return the main program
        let handle = unsafe { sys::open(core::ptr::null()) }.map_err(|reason| LoadError::LoadFailed {
            library: NAME.to_string(),
            reason,
        })?;
        Ok(Self {
            handle,
            name: NAME.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of an exported symbol
    pub fn symbol(&self, symbol: &str) -> Result<*const (), SymbolError> {
        let symbol = CString::new(symbol).map_err(|_| SymbolError::InvalidName)?;
        // SAFETY: the handle stays open until self is dropped
        let address = unsafe { sys::resolve(self.handle, symbol.as_ptr()) };
        if address.is_null() {
            return Err(SymbolError::NotFound {
                library: self.name.clone(),
            });
        }
        Ok(address as *const ())
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: the handle came from sys::open and is closed exactly once
        unsafe { sys::close(self.handle) }
    }
}

#[cfg(unix)]
mod sys {
    use super::*;
    use std::ffi::CStr;

    pub unsafe fn open(soname: *const c_char) -> Result<NonNull<c_void>, String> {
        NonNull::new(libc::dlopen(soname, libc::RTLD_NOW)).ok_or_else(|| last_error())
    }

    pub unsafe fn resolve(handle: NonNull<c_void>, symbol: *const c_char) -> *mut c_void {
        libc::dlsym(handle.as_ptr(), symbol)
    }

    pub unsafe fn close(handle: NonNull<c_void>) {
        libc::dlclose(handle.as_ptr());
    }

    unsafe fn last_error() -> String {
        let message = libc::dlerror();
        if message.is_null() {
            "unknown dlopen failure".to_string()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use winapi::shared::minwindef::HMODULE;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::{FreeLibrary, GetProcAddress, LoadLibraryA};

    pub unsafe fn open(soname: *const c_char) -> Result<NonNull<c_void>, String> {
        NonNull::new(LoadLibraryA(soname) as *mut c_void)
            .ok_or_else(|| format!("LoadLibrary failed with code {}", GetLastError()))
    }

    pub unsafe fn resolve(handle: NonNull<c_void>, symbol: *const c_char) -> *mut c_void {
        GetProcAddress(handle.as_ptr() as HMODULE, symbol) as *mut c_void
    }

    pub unsafe fn close(handle: NonNull<c_void>) {
        FreeLibrary(handle.as_ptr() as HMODULE);
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("library name contains a NUL byte")]
    InvalidName,

    #[error("unable to open `{library}': {reason}")]
    LoadFailed { library: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("symbol name contains a NUL byte")]
    InvalidName,

    #[error("not exported by `{library}'")]
    NotFound { library: String },
}
