//! Host object system interface
//!
//! The bridge never manipulates object reference counts or runtime types
//! directly; it goes through `ObjectSystem`. `BasicObjects` is a complete
//! implementation over the header objects of `ffi::object`.

use crate::descriptor::RuntimeType;
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::object as native;
use crate::interop::GenericValue;
use core::ffi::c_void;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::warn;

/// Reference counting, runtime typing and generic properties of native objects
pub trait ObjectSystem {
    fn ref_object(&self, object: *mut c_void);

    fn unref_object(&self, object: *mut c_void);

    /// Runtime type of a live instance
    fn instance_type(&self, object: *mut c_void) -> RuntimeType;

    /// Whether `ty` is `ancestor` or derives from it
    fn is_a(&self, ty: RuntimeType, ancestor: RuntimeType) -> bool;

    fn type_name(&self, ty: RuntimeType) -> String;

    /// Fill `value` (already initialized to the property's type)
    ///
    /// Object payloads must carry a reference owned by `value`.
    fn get_property(&self, object: *mut c_void, name: &str, value: &mut GenericValue) -> BridgeResult<()>;

    fn set_property(&self, object: *mut c_void, name: &str, value: &GenericValue) -> BridgeResult<()>;
}

/// Object system for hosts without reference-counted objects
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObjects;

impl ObjectSystem for NoObjects {
    fn ref_object(&self, object: *mut c_void) {
        warn!(address = ?object, "ref on a host without an object system");
    }

    fn unref_object(&self, object: *mut c_void) {
        warn!(address = ?object, "unref on a host without an object system");
    }

    fn instance_type(&self, _object: *mut c_void) -> RuntimeType {
        RuntimeType::INVALID
    }

    fn is_a(&self, ty: RuntimeType, ancestor: RuntimeType) -> bool {
        ty == ancestor
    }

    fn type_name(&self, ty: RuntimeType) -> String {
        format!("<type {:#x}>", ty.0)
    }

    fn get_property(&self, _object: *mut c_void, name: &str, _value: &mut GenericValue) -> BridgeResult<()> {
        Err(BridgeError::ObjectSystem(format!("no object system to read `{name}'")))
    }

    fn set_property(&self, _object: *mut c_void, name: &str, _value: &GenericValue) -> BridgeResult<()> {
        Err(BridgeError::ObjectSystem(format!("no object system to write `{name}'")))
    }
}

#[derive(Debug)]
struct TypeNode {
    name: String,
    parent: Option<RuntimeType>,
    properties: Vec<String>,
}

/// Object system over `ffi::object` headers
///
/// Types are registered locally with their parent and property names.
/// Property values live in a side table keyed by instance address.
#[derive(Debug, Default)]
pub struct BasicObjects {
    types: RefCell<HashMap<RuntimeType, TypeNode>>,
    properties: RefCell<HashMap<(usize, String), GenericValue>>,
}

impl BasicObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; property names are inherited by derived types
    pub fn register_type(
        &self,
        ty: RuntimeType,
        name: &str,
        parent: Option<RuntimeType>,
        properties: &[&str],
    ) {
        self.types.borrow_mut().insert(
            ty,
            TypeNode {
                name: name.to_string(),
                parent,
                properties: properties.iter().map(|p| p.to_string()).collect(),
            },
        );
    }

    /// New instance with one reference owned by the caller
    pub fn instantiate(&self, ty: RuntimeType) -> *mut c_void {
        native::dynbridge_object_new(ty.0, core::mem::size_of::<native::ObjectHeader>())
    }

    pub fn refcount(&self, object: *mut c_void) -> u32 {
        // SAFETY: callers pass live header objects
        unsafe { native::dynbridge_object_refcount(object) }
    }

    fn has_property(&self, ty: RuntimeType, name: &str) -> bool {
        let types = self.types.borrow();
        let mut current = Some(ty);
        while let Some(ty) = current {
            let Some(node) = types.get(&ty) else {
                return false;
            };
            if node.properties.iter().any(|p| p == name) {
                return true;
            }
            current = node.parent;
        }
        false
    }

    fn check_property(&self, object: *mut c_void, name: &str) -> BridgeResult<()> {
        let ty = self.instance_type(object);
        if self.has_property(ty, name) {
            Ok(())
        } else {
            Err(BridgeError::ObjectSystem(format!(
                "{}: no property `{}'",
                self.type_name(ty),
                name
            )))
        }
    }

    /// Drop the side-table entries of a destroyed instance
    fn forget(&self, object: *mut c_void) {
        let stale: Vec<GenericValue> = {
            let mut properties = self.properties.borrow_mut();
            let keys: Vec<_> = properties
                .keys()
                .filter(|(address, _)| *address == object as usize)
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| properties.remove(&key))
                .collect()
        };
        for mut value in stale {
            value.unset(self);
        }
    }
}

impl ObjectSystem for BasicObjects {
    fn ref_object(&self, object: *mut c_void) {
        // SAFETY: callers pass live header objects
        unsafe {
            native::dynbridge_object_ref(object);
        }
    }

    fn unref_object(&self, object: *mut c_void) {
        // SAFETY: callers pass live header objects
        if unsafe { native::release(object) } {
            self.forget(object);
        }
    }

    fn instance_type(&self, object: *mut c_void) -> RuntimeType {
        // SAFETY: callers pass live header objects
        RuntimeType(unsafe { native::dynbridge_object_type(object) })
    }

    fn is_a(&self, ty: RuntimeType, ancestor: RuntimeType) -> bool {
        let types = self.types.borrow();
        let mut current = Some(ty);
        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }
            current = types.get(&ty).and_then(|node| node.parent);
        }
        false
    }

    fn type_name(&self, ty: RuntimeType) -> String {
        self.types
            .borrow()
            .get(&ty)
            .map_or_else(|| format!("<type {:#x}>", ty.0), |node| node.name.clone())
    }

    fn get_property(&self, object: *mut c_void, name: &str, value: &mut GenericValue) -> BridgeResult<()> {
        self.check_property(object, name)?;
        let stored = self
            .properties
            .borrow()
            .get(&(object as usize, name.to_string()))
            .map(|stored| stored.duplicate(self));
        if let Some(stored) = stored {
            value.unset(self);
            *value = stored;
        }
        Ok(())
    }

    fn set_property(&self, object: *mut c_void, name: &str, value: &GenericValue) -> BridgeResult<()> {
        self.check_property(object, name)?;
        let copy = value.duplicate(self);
        let old = self
            .properties
            .borrow_mut()
            .insert((object as usize, name.to_string()), copy);
        if let Some(mut old) = old {
            old.unset(self);
        }
        Ok(())
    }
}
