//! Element access on compound handles
//!
//! Structures expose fields at their native offsets, objects expose
//! properties through the object system. Names the descriptor does not know
//! fall through to the type's index/newindex hooks.

use super::CompoundHandle;
use crate::context::MarshalingContext;
use crate::descriptor::{Element, FieldInfo, PropertyInfo, Transfer};
use crate::error::{BridgeError, BridgeResult};
use crate::interop::Scratch;
use crate::value::Value;
use std::rc::Rc;
use tracing::trace;

/// Argument position of the new value in element writes
const NEWVALUE_POSITION: usize = 3;

impl MarshalingContext {
    /// Read element `name` of a handle
    ///
    /// Methods read as their raw descriptor (`Value::Info`).
    pub fn read_element(&self, handle: &Rc<CompoundHandle>, name: &str) -> BridgeResult<Value> {
        let origin = Rc::clone(handle.origin());
        trace!(compound = %origin.full_name(), element = name, "element read");

        let result = match origin.find_element(name) {
            Some(Element::Field(field)) => self.read_field(handle, field),
            Some(Element::Property(property)) => self.read_property(handle, property),
            Some(Element::Method(method)) => Ok(Value::Info(Rc::clone(method))),
            None => match self.registry().hooks_for(&origin).index {
                Some(index) => index(self, handle, name),
                None => Err(BridgeError::NoElement {
                    compound: origin.full_name(),
                    element: name.to_string(),
                }),
            },
        };
        result.map_err(|err| self.abort("read_element", err))
    }

    /// Write element `name` of a handle
    pub fn write_element(&self, handle: &Rc<CompoundHandle>, name: &str, value: Value) -> BridgeResult<()> {
        let origin = Rc::clone(handle.origin());
        trace!(compound = %origin.full_name(), element = name, "element write");

        let result = match origin.find_element(name) {
            Some(Element::Field(field)) => self.write_field(handle, field, &value),
            Some(Element::Property(property)) => self.write_property(handle, property, &value),
            Some(Element::Method(_)) => Err(BridgeError::NotWritable {
                compound: origin.full_name(),
                element: name.to_string(),
            }),
            None => match self.registry().hooks_for(&origin).newindex {
                Some(newindex) => newindex(self, handle, name, value),
                None => Err(BridgeError::NoElement {
                    compound: origin.full_name(),
                    element: name.to_string(),
                }),
            },
        };
        result.map_err(|err| self.abort("write_element", err))
    }

    fn read_field(&self, handle: &CompoundHandle, field: &FieldInfo) -> BridgeResult<Value> {
        if !field.flags.readable {
            return Err(BridgeError::NotReadable {
                compound: handle.type_name(),
                element: field.name.clone(),
            });
        }
        // SAFETY: the handle address points to a live instance of its origin
        unsafe {
            let slot = (handle.address() as *mut u8).add(field.offset);
            self.to_dynamic_checked(&field.ty, Transfer::Nothing, slot)
        }
    }

    fn write_field(&self, handle: &CompoundHandle, field: &FieldInfo, value: &Value) -> BridgeResult<()> {
        if !field.flags.writable {
            return Err(BridgeError::NotWritable {
                compound: handle.type_name(),
                element: field.name.clone(),
            });
        }
        let mut scratch = Scratch::new();
        // SAFETY: the handle address points to a live instance of its origin
        unsafe {
            let slot = (handle.address() as *mut u8).add(field.offset);
            self.from_dynamic_checked(value, NEWVALUE_POSITION, &field.ty, slot, false, &mut scratch)?;
        }
        // Memory stored into a field belongs to the structure
        scratch.detach_from(0);
        Ok(())
    }

    fn read_property(&self, handle: &CompoundHandle, property: &PropertyInfo) -> BridgeResult<Value> {
        if !property.flags.readable {
            return Err(BridgeError::NotReadable {
                compound: handle.type_name(),
                element: property.name.clone(),
            });
        }
        let objects = self.objects();
        let mut container = self.generic_init(&property.ty)?;
        let result = objects
            .get_property(handle.address(), &property.name, &mut container)
            .and_then(|_| self.generic_store(&container, &property.ty));
        container.unset(objects);
        result
    }

    fn write_property(&self, handle: &CompoundHandle, property: &PropertyInfo, value: &Value) -> BridgeResult<()> {
        if !property.flags.writable {
            return Err(BridgeError::NotWritable {
                compound: handle.type_name(),
                element: property.name.clone(),
            });
        }
        let objects = self.objects();
        let mut container = self.generic_init(&property.ty)?;
        let result = self
            .generic_load(&mut container, value, NEWVALUE_POSITION, &property.ty)
            .and_then(|_| objects.set_property(handle.address(), &property.name, &container));
        container.unset(objects);
        result
    }
}
