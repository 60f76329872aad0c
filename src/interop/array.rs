//! Array marshaling
//!
//! Element count comes from, in priority order, the fixed size of the
//! descriptor, the length of a vector buffer, or a zero-terminator scan.

use super::marshal::unsupported;
use super::scratch::Scratch;
use crate::context::MarshalingContext;
use crate::descriptor::{ArrayInfo, ArrayKind, Transfer};
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::{dynbridge_vector_unref, NativeVector};
use crate::value::Value;
use core::ffi::c_void;
use tracing::warn;

/// Whether the `size` bytes at `element` are all zero
///
/// # Safety
/// `element` must point to `size` readable bytes.
#[inline]
pub unsafe fn is_zero_element(element: *const u8, size: usize) -> bool {
    core::slice::from_raw_parts(element, size).iter().all(|b| *b == 0)
}

/// Number of elements before the first all-zero element, bounded by `limit`
///
/// # Safety
/// `data` must be readable up to the terminator or `limit` elements.
pub unsafe fn terminated_len(data: *const u8, element_size: usize, limit: usize) -> usize {
    (0..limit)
        .find(|index| is_zero_element(data.add(index * element_size), element_size))
        .unwrap_or(limit)
}

impl MarshalingContext {
    pub(crate) unsafe fn array_to_dynamic(
        &self,
        array: &ArrayInfo,
        transfer: Transfer,
        slot: *mut u8,
    ) -> BridgeResult<Value> {
        let buffer = (slot as *const *mut c_void).read_unaligned();
        if buffer.is_null() {
            return Ok(Value::Nil);
        }

        let element_size = array.element.storage_size();
        let (data, known_len) = match array.kind {
            ArrayKind::C => (buffer as *const u8, array.fixed_size),
            ArrayKind::Vector => {
                let vector = &*(buffer as *const NativeVector);
                (vector.data as *const u8, array.fixed_size.or(Some(vector.len)))
            }
        };

        let len = match known_len {
            Some(len) => len,
            None if array.zero_terminated => {
                let limit = self.config().marshal.zero_terminated_limit;
                let len = terminated_len(data, element_size, limit);
                if len == limit {
                    warn!(limit = limit, "zero terminator not found within scan limit");
                }
                len
            }
            None => return Err(BridgeError::UnknownLength(array.element.describe())),
        };

        // Elements are only owned when the whole array is
        let element_transfer = match transfer {
            Transfer::Everything => Transfer::Everything,
            _ => Transfer::Nothing,
        };

        let items = (0..len)
            .map(|index| {
                let element = data.add(index * element_size) as *mut u8;
                self.to_dynamic_checked(&array.element, element_transfer, element)
            })
            .collect::<BridgeResult<Vec<_>>>();

        // An owned buffer is released whether or not every element converted
        if transfer != Transfer::Nothing {
            match array.kind {
                ArrayKind::C => libc::free(buffer),
                ArrayKind::Vector => dynbridge_vector_unref(buffer as *mut NativeVector),
            }
        }

        items.map(Value::List)
    }

    pub(crate) unsafe fn array_from_dynamic(
        &self,
        value: &Value,
        position: usize,
        array: &ArrayInfo,
        slot: *mut u8,
        optional: bool,
        scratch: &mut Scratch,
    ) -> BridgeResult<()> {
        let items = match value {
            Value::Nil if optional => {
                (slot as *mut *mut c_void).write_unaligned(core::ptr::null_mut());
                return Ok(());
            }
            Value::List(items) => items,
            other => return Err(BridgeError::type_mismatch(position, "table", other.type_name())),
        };

        let len = match array.fixed_size {
            Some(fixed) if items.len() > fixed => {
                return Err(BridgeError::bad_argument(
                    position,
                    format!("at most {} elements expected, got {}", fixed, items.len()),
                ))
            }
            Some(fixed) => fixed,
            None => items.len(),
        };

        let element_size = array.element.storage_size();
        let (buffer, data) = match array.kind {
            ArrayKind::C => {
                let extra = usize::from(array.zero_terminated);
                let data = scratch.alloc_zeroed((len + extra) * element_size)?;
                (data as *mut c_void, data)
            }
            ArrayKind::Vector => {
                let vector = scratch.vector(len, element_size)?;
                (vector as *mut c_void, (*vector).data)
            }
        };

        for (index, item) in items.iter().enumerate() {
            let element = data.add(index * element_size);
            if self.from_dynamic(item, position, &array.element, element, false, scratch)? == 0 {
                return Err(unsupported(&array.element));
            }
        }

        (slot as *mut *mut c_void).write_unaligned(buffer);
        Ok(())
    }
}
