//! Native slot layout and the primitive conversion table
//!
//! Every primitive kind maps to a native field accessor, a push-to-dynamic
//! conversion, a read-from-dynamic conversion and an optional release rule.
//! All four are exhaustive matches over `PrimitiveKind`.

use super::scratch::Scratch;
use crate::descriptor::{InfoKind, PrimitiveKind, TypeInfo};
use crate::error::{BridgeError, BridgeResult};
use crate::value::Value;
use core::ffi::{c_char, c_void};
use libffi::middle::Type;
use std::ffi::CStr;

/// Untagged native argument slot
///
/// Large enough for any primitive or a raw address. Carries no ownership.
#[repr(C)]
pub union NativeSlot {
    pub v_boolean: i32,
    pub v_int8: i8,
    pub v_uint8: u8,
    pub v_int16: i16,
    pub v_uint16: u16,
    pub v_int32: i32,
    pub v_uint32: u32,
    pub v_int64: i64,
    pub v_uint64: u64,
    pub v_float: f32,
    pub v_double: f64,
    pub v_size: usize,
    pub v_pointer: *mut c_void,
}

impl NativeSlot {
    /// Zeroed slot
    #[inline]
    pub const fn null() -> Self {
        Self { v_uint64: 0 }
    }

    #[inline]
    pub const fn from_ptr(ptr: *mut c_void) -> Self {
        Self { v_pointer: ptr }
    }

    /// Raw view of the slot for the marshaling engine
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self as *mut Self as *mut u8
    }
}

impl Default for NativeSlot {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl Copy for NativeSlot {}
impl Clone for NativeSlot {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl core::fmt::Debug for NativeSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // SAFETY: every bit pattern is a valid u64
        write!(f, "NativeSlot({:#018x})", unsafe { self.v_uint64 })
    }
}

/// Primitive value in transit between a native slot and a dynamic value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(Option<String>),
}

impl Scalar {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Bool(b) => i64::from(*b),
            Self::Int(v) => *v,
            Self::UInt(v) => *v as i64,
            Self::Float(v) => *v as i64,
            Self::Str(_) => 0,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self {
            Self::UInt(v) => *v,
            Self::Float(v) if *v >= 0.0 => *v as u64,
            other => other.as_i64() as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::UInt(v) => *v as f64,
            Self::Float(v) => *v,
            other => other.as_i64() as f64,
        }
    }
}

impl PrimitiveKind {
    /// Native size in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Boolean | Self::Int32 | Self::UInt32 | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double => 8,
            Self::GType | Self::Utf8 | Self::Filename => core::mem::size_of::<usize>(),
        }
    }

    #[inline]
    pub const fn align(self) -> usize {
        self.size()
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::GType
        )
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::Utf8 | Self::Filename)
    }

    /// Call-frame type of the kind
    pub fn ffi_type(self) -> Type {
        match self {
            Self::Boolean => Type::c_int(),
            Self::Int8 => Type::i8(),
            Self::UInt8 => Type::u8(),
            Self::Int16 => Type::i16(),
            Self::UInt16 => Type::u16(),
            Self::Int32 => Type::i32(),
            Self::UInt32 => Type::u32(),
            Self::Int64 => Type::i64(),
            Self::UInt64 => Type::u64(),
            Self::Float => Type::f32(),
            Self::Double => Type::f64(),
            Self::GType => Type::usize(),
            Self::Utf8 | Self::Filename => Type::pointer(),
        }
    }

    /// Read-from-dynamic conversion
    ///
    /// With `optional`, nil converts to zero or NULL instead of failing.
    pub fn check(self, value: &Value, position: usize, optional: bool) -> BridgeResult<Scalar> {
        let nil = optional && value.is_nil();
        match self {
            Self::Boolean => Ok(Scalar::Bool(value.truthy())),
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => {
                if nil {
                    return Ok(Scalar::Int(0));
                }
                value
                    .as_int()
                    .map(Scalar::Int)
                    .ok_or_else(|| BridgeError::type_mismatch(position, "number", value.type_name()))
            }
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 | Self::GType => {
                if nil {
                    return Ok(Scalar::UInt(0));
                }
                match value {
                    Value::Float(v) if *v >= 0.0 => Ok(Scalar::UInt(*v as u64)),
                    other => other
                        .as_int()
                        .map(|v| Scalar::UInt(v as u64))
                        .ok_or_else(|| {
                            BridgeError::type_mismatch(position, "number", other.type_name())
                        }),
                }
            }
            Self::Float | Self::Double => {
                if nil {
                    return Ok(Scalar::Float(0.0));
                }
                value
                    .as_float()
                    .map(Scalar::Float)
                    .ok_or_else(|| BridgeError::type_mismatch(position, "number", value.type_name()))
            }
            Self::Utf8 | Self::Filename => {
                if nil {
                    return Ok(Scalar::Str(None));
                }
                value
                    .to_text()
                    .map(|s| Scalar::Str(Some(s)))
                    .ok_or_else(|| BridgeError::type_mismatch(position, "string", value.type_name()))
            }
        }
    }

    /// Push-to-dynamic conversion
    pub fn push(self, scalar: Scalar) -> Value {
        match scalar {
            Scalar::Bool(v) => Value::Bool(v),
            Scalar::Int(v) => Value::Int(v),
            Scalar::UInt(v) => match i64::try_from(v) {
                Ok(v) => Value::Int(v),
                Err(_) => Value::Float(v as f64),
            },
            Scalar::Float(v) => Value::Float(v),
            Scalar::Str(Some(s)) => Value::Str(s),
            Scalar::Str(None) => Value::Nil,
        }
    }

    /// Native field accessor (read)
    ///
    /// # Safety
    /// `ptr` must point to at least `self.size()` readable bytes laid out as
    /// this kind. String kinds must hold NULL or a NUL-terminated buffer.
    pub unsafe fn read(self, ptr: *const u8) -> Scalar {
        match self {
            Self::Boolean => Scalar::Bool((ptr as *const i32).read_unaligned() != 0),
            Self::Int8 => Scalar::Int((ptr as *const i8).read_unaligned().into()),
            Self::UInt8 => Scalar::UInt(ptr.read_unaligned().into()),
            Self::Int16 => Scalar::Int((ptr as *const i16).read_unaligned().into()),
            Self::UInt16 => Scalar::UInt((ptr as *const u16).read_unaligned().into()),
            Self::Int32 => Scalar::Int((ptr as *const i32).read_unaligned().into()),
            Self::UInt32 => Scalar::UInt((ptr as *const u32).read_unaligned().into()),
            Self::Int64 => Scalar::Int((ptr as *const i64).read_unaligned()),
            Self::UInt64 => Scalar::UInt((ptr as *const u64).read_unaligned()),
            Self::Float => Scalar::Float((ptr as *const f32).read_unaligned().into()),
            Self::Double => Scalar::Float((ptr as *const f64).read_unaligned()),
            Self::GType => Scalar::UInt((ptr as *const usize).read_unaligned() as u64),
            Self::Utf8 | Self::Filename => {
                let s = (ptr as *const *const c_char).read_unaligned();
                if s.is_null() {
                    Scalar::Str(None)
                } else {
                    Scalar::Str(Some(CStr::from_ptr(s).to_string_lossy().into_owned()))
                }
            }
        }
    }

    /// Native field accessor (write)
    ///
    /// Strings are copied into `scratch`-tracked native memory.
    ///
    /// # Safety
    /// `ptr` must point to at least `self.size()` writable bytes.
    pub unsafe fn write(self, ptr: *mut u8, scalar: &Scalar, scratch: &mut Scratch) -> BridgeResult<()> {
        match self {
            Self::Boolean => {
                let truth = match scalar {
                    Scalar::Bool(b) => *b,
                    other => other.as_i64() != 0,
                };
                (ptr as *mut i32).write_unaligned(i32::from(truth));
            }
            Self::Int8 => (ptr as *mut i8).write_unaligned(scalar.as_i64() as i8),
            Self::UInt8 => ptr.write_unaligned(scalar.as_u64() as u8),
            Self::Int16 => (ptr as *mut i16).write_unaligned(scalar.as_i64() as i16),
            Self::UInt16 => (ptr as *mut u16).write_unaligned(scalar.as_u64() as u16),
            Self::Int32 => (ptr as *mut i32).write_unaligned(scalar.as_i64() as i32),
            Self::UInt32 => (ptr as *mut u32).write_unaligned(scalar.as_u64() as u32),
            Self::Int64 => (ptr as *mut i64).write_unaligned(scalar.as_i64()),
            Self::UInt64 => (ptr as *mut u64).write_unaligned(scalar.as_u64()),
            Self::Float => (ptr as *mut f32).write_unaligned(scalar.as_f64() as f32),
            Self::Double => (ptr as *mut f64).write_unaligned(scalar.as_f64()),
            Self::GType => (ptr as *mut usize).write_unaligned(scalar.as_u64() as usize),
            Self::Utf8 | Self::Filename => {
                let s = match scalar {
                    Scalar::Str(Some(s)) => scratch.strdup(s)?,
                    _ => core::ptr::null_mut(),
                };
                (ptr as *mut *mut c_char).write_unaligned(s);
            }
        }
        Ok(())
    }

    /// Release rule, run after pushing a value whose transfer is not NOTHING
    ///
    /// # Safety
    /// `ptr` must hold a value of this kind owned by the caller.
    pub unsafe fn release(self, ptr: *const u8) {
        match self {
            Self::Utf8 | Self::Filename => {
                let s = (ptr as *const *mut c_void).read_unaligned();
                if !s.is_null() {
                    libc::free(s);
                }
            }
            Self::Boolean
            | Self::Int8
            | Self::UInt8
            | Self::Int16
            | Self::UInt16
            | Self::Int32
            | Self::UInt32
            | Self::Int64
            | Self::UInt64
            | Self::Float
            | Self::Double
            | Self::GType => {}
        }
    }

    /// Narrow a widened integral return register in place
    ///
    /// The call interface returns integrals smaller than a register as a full
    /// register-sized value.
    ///
    /// # Safety
    /// `slot` must be a return slot just written by the call interface.
    pub unsafe fn normalize_return(self, slot: &mut NativeSlot) {
        let wide = slot.v_size;
        match self {
            Self::Boolean | Self::Int32 => slot.v_int32 = wide as i32,
            Self::UInt32 => slot.v_uint32 = wide as u32,
            Self::Int8 => slot.v_int8 = wide as i8,
            Self::UInt8 => slot.v_uint8 = wide as u8,
            Self::Int16 => slot.v_int16 = wide as i16,
            Self::UInt16 => slot.v_uint16 = wide as u16,
            Self::Int64
            | Self::UInt64
            | Self::Float
            | Self::Double
            | Self::GType
            | Self::Utf8
            | Self::Filename => {}
        }
    }
}

impl TypeInfo {
    /// Primitive storage of the slot, resolving enums and flags to their backing kind
    pub fn storage_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            Self::Interface(info) => match info.kind() {
                InfoKind::Enum(info) => Some(info.storage),
                _ => None,
            },
            _ => None,
        }
    }

    /// Size of one element of this type inside an array buffer
    ///
    /// Interfaces, arrays and opaque tags are stored as pointers.
    pub fn storage_size(&self) -> usize {
        self.storage_kind()
            .map_or(core::mem::size_of::<*mut c_void>(), PrimitiveKind::size)
    }

    /// Call-frame type of an IN argument or return value of this type
    pub fn ffi_type(&self) -> Type {
        match self {
            Self::Void => Type::void(),
            other => other.storage_kind().map_or_else(Type::pointer, PrimitiveKind::ffi_type),
        }
    }
}
