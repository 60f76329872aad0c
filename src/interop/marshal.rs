//! Value marshaling engine
//!
//! Converts one native slot to or from a dynamic value, driven by its type
//! descriptor. Arrays recurse per element; structures and objects go through
//! the compound registry.

use super::scratch::Scratch;
use crate::context::MarshalingContext;
use crate::descriptor::{InfoKind, TypeInfo, Transfer};
use crate::error::{BridgeError, BridgeResult};
use crate::value::Value;
use core::ffi::c_void;

/// Error for a descriptor the engine produced nothing for
pub fn unsupported(ty: &TypeInfo) -> BridgeError {
    BridgeError::Unsupported(ty.describe())
}

impl MarshalingContext {
    /// Native slot -> dynamic value
    ///
    /// `Ok(None)` means the descriptor is not marshalable, which is distinct
    /// from `Some(Value::Nil)` (an absent value, e.g. a NULL pointer).
    ///
    /// # Safety
    /// `slot` must point to a value laid out as `ty` describes, owned
    /// according to `transfer`.
    pub unsafe fn to_dynamic(
        &self,
        ty: &TypeInfo,
        transfer: Transfer,
        slot: *mut u8,
    ) -> BridgeResult<Option<Value>> {
        match ty {
            TypeInfo::Primitive(kind) => {
                let value = kind.push(kind.read(slot));
                if transfer != Transfer::Nothing {
                    kind.release(slot);
                }
                Ok(Some(value))
            }
            TypeInfo::Array(array) => self.array_to_dynamic(array, transfer, slot).map(Some),
            TypeInfo::Interface(info) => match info.kind() {
                // Flags pass through as plain integers
                InfoKind::Enum(e) => Ok(Some(e.storage.push(e.storage.read(slot)))),
                InfoKind::Struct(_) | InfoKind::Object(_) | InfoKind::Interface(_) => {
                    let transfer = match transfer {
                        Transfer::Container => Transfer::Nothing,
                        other => other,
                    };
                    let mut address = (slot as *const *mut c_void).read_unaligned();
                    self.registry().store(info, &mut address, transfer).map(Some)
                }
                _ => Ok(None),
            },
            TypeInfo::Void | TypeInfo::Unsupported(_) => Ok(None),
        }
    }

    /// Like `to_dynamic`, failing on unmarshalable descriptors
    ///
    /// # Safety
    /// Same as `to_dynamic`.
    pub unsafe fn to_dynamic_checked(
        &self,
        ty: &TypeInfo,
        transfer: Transfer,
        slot: *mut u8,
    ) -> BridgeResult<Value> {
        self.to_dynamic(ty, transfer, slot)?
            .ok_or_else(|| unsupported(ty))
    }

    /// Dynamic value -> native slot
    ///
    /// Returns the number of dynamic values consumed; zero means the
    /// descriptor is not marshalable. `position` is the 1-based argument
    /// position reported in errors.
    ///
    /// # Safety
    /// `slot` must point to writable storage large enough for `ty`.
    pub unsafe fn from_dynamic(
        &self,
        value: &Value,
        position: usize,
        ty: &TypeInfo,
        slot: *mut u8,
        optional: bool,
        scratch: &mut Scratch,
    ) -> BridgeResult<usize> {
        match ty {
            TypeInfo::Primitive(kind) => {
                let scalar = kind.check(value, position, optional)?;
                kind.write(slot, &scalar, scratch)?;
                Ok(1)
            }
            TypeInfo::Array(array) => {
                self.array_from_dynamic(value, position, array, slot, optional, scratch)?;
                Ok(1)
            }
            TypeInfo::Interface(info) => match info.kind() {
                InfoKind::Enum(e) => {
                    let scalar = e.storage.check(value, position, optional)?;
                    e.storage.write(slot, &scalar, scratch)?;
                    Ok(1)
                }
                InfoKind::Struct(_) | InfoKind::Object(_) | InfoKind::Interface(_) => {
                    let address = self.registry().load(value, position, info, optional)?;
                    (slot as *mut *mut c_void).write_unaligned(address);
                    Ok(1)
                }
                _ => Ok(0),
            },
            TypeInfo::Void | TypeInfo::Unsupported(_) => Ok(0),
        }
    }

    /// Like `from_dynamic`, failing on unmarshalable descriptors
    ///
    /// # Safety
    /// Same as `from_dynamic`.
    pub unsafe fn from_dynamic_checked(
        &self,
        value: &Value,
        position: usize,
        ty: &TypeInfo,
        slot: *mut u8,
        optional: bool,
        scratch: &mut Scratch,
    ) -> BridgeResult<()> {
        match self.from_dynamic(value, position, ty, slot, optional, scratch)? {
            0 => Err(unsupported(ty)),
            _ => Ok(()),
        }
    }
}
