//! Generic value container used for object property get/set
//!
//! A `GenericValue` is tagged with a container type derived from a
//! descriptor. Object payloads hold one reference owned by the container,
//! released by `unset`.

use super::types::Scalar;
use crate::context::MarshalingContext;
use crate::descriptor::{InfoKind, PrimitiveKind, RuntimeType, TypeInfo};
use crate::error::{BridgeError, BridgeResult};
use crate::objects::ObjectSystem;
use crate::value::Value;
use core::ffi::c_void;

/// Container type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericType {
    Invalid,
    Boolean,
    Char,
    UChar,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
    GType,
    String,
    Enum(RuntimeType),
    Flags(RuntimeType),
    Object(RuntimeType),
}

impl From<PrimitiveKind> for GenericType {
    fn from(kind: PrimitiveKind) -> Self {
        match kind {
            PrimitiveKind::Boolean => Self::Boolean,
            PrimitiveKind::Int8 => Self::Char,
            PrimitiveKind::UInt8 => Self::UChar,
            PrimitiveKind::Int16 | PrimitiveKind::Int32 => Self::Int,
            PrimitiveKind::UInt16 | PrimitiveKind::UInt32 => Self::UInt,
            PrimitiveKind::Int64 => Self::Int64,
            PrimitiveKind::UInt64 => Self::UInt64,
            PrimitiveKind::Float => Self::Float,
            PrimitiveKind::Double => Self::Double,
            PrimitiveKind::GType => Self::GType,
            PrimitiveKind::Utf8 | PrimitiveKind::Filename => Self::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Empty,
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(Option<String>),
    Object(*mut c_void),
}

/// Tagged generic value container
#[derive(Debug)]
pub struct GenericValue {
    ty: GenericType,
    payload: Payload,
}

impl GenericValue {
    /// Zero-initialized container of the given type
    pub fn new(ty: GenericType) -> Self {
        let payload = match ty {
            GenericType::Invalid => Payload::Empty,
            GenericType::Boolean
            | GenericType::Char
            | GenericType::Int
            | GenericType::Int64
            | GenericType::Enum(_) => Payload::Int(0),
            GenericType::UChar
            | GenericType::UInt
            | GenericType::UInt64
            | GenericType::GType
            | GenericType::Flags(_) => Payload::UInt(0),
            GenericType::Float | GenericType::Double => Payload::Double(0.0),
            GenericType::String => Payload::Str(None),
            GenericType::Object(_) => Payload::Object(core::ptr::null_mut()),
        };
        Self { ty, payload }
    }

    #[inline]
    pub fn value_type(&self) -> GenericType {
        self.ty
    }

    /// Store a primitive, narrowing to the container type
    pub fn set_scalar(&mut self, scalar: &Scalar) {
        self.payload = match self.ty {
            GenericType::Boolean => Payload::Int(i64::from(match scalar {
                Scalar::Bool(b) => *b,
                other => other.as_i64() != 0,
            })),
            GenericType::Char => Payload::Int(scalar.as_i64() as i8 as i64),
            GenericType::Int | GenericType::Enum(_) => Payload::Int(scalar.as_i64() as i32 as i64),
            GenericType::Int64 => Payload::Int(scalar.as_i64()),
            GenericType::UChar => Payload::UInt(scalar.as_u64() as u8 as u64),
            GenericType::UInt | GenericType::Flags(_) => Payload::UInt(scalar.as_u64() as u32 as u64),
            GenericType::UInt64 | GenericType::GType => Payload::UInt(scalar.as_u64()),
            GenericType::Float => Payload::Double(scalar.as_f64() as f32 as f64),
            GenericType::Double => Payload::Double(scalar.as_f64()),
            GenericType::String => Payload::Str(match scalar {
                Scalar::Str(s) => s.clone(),
                _ => None,
            }),
            GenericType::Invalid | GenericType::Object(_) => return,
        };
    }

    /// Primitive view of the payload
    pub fn scalar(&self) -> Scalar {
        match (&self.payload, self.ty) {
            (Payload::Int(v), GenericType::Boolean) => Scalar::Bool(*v != 0),
            (Payload::Int(v), _) => Scalar::Int(*v),
            (Payload::UInt(v), _) => Scalar::UInt(*v),
            (Payload::Double(v), _) => Scalar::Float(*v),
            (Payload::Str(s), _) => Scalar::Str(s.clone()),
            (Payload::Empty, _) | (Payload::Object(_), _) => Scalar::Int(0),
        }
    }

    /// Store an object, taking a reference for the container
    pub fn set_object(&mut self, object: *mut c_void, objects: &dyn ObjectSystem) {
        if !matches!(self.ty, GenericType::Object(_)) {
            return;
        }
        if !object.is_null() {
            objects.ref_object(object);
        }
        let old = core::mem::replace(&mut self.payload, Payload::Object(object));
        if let Payload::Object(old) = old {
            if !old.is_null() {
                objects.unref_object(old);
            }
        }
    }

    /// Object payload, borrowed from the container
    pub fn object(&self) -> *mut c_void {
        match self.payload {
            Payload::Object(object) => object,
            _ => core::ptr::null_mut(),
        }
    }

    /// Independent copy; object payloads gain a reference
    pub fn duplicate(&self, objects: &dyn ObjectSystem) -> Self {
        if let Payload::Object(object) = self.payload {
            if !object.is_null() {
                objects.ref_object(object);
            }
        }
        Self {
            ty: self.ty,
            payload: self.payload.clone(),
        }
    }

    /// Release the payload, leaving a zeroed container of the same type
    pub fn unset(&mut self, objects: &dyn ObjectSystem) {
        let old = core::mem::replace(self, Self::new(self.ty));
        if let Payload::Object(object) = old.payload {
            if !object.is_null() {
                objects.unref_object(object);
            }
        }
    }
}

impl MarshalingContext {
    /// Initialize a container for values described by `ty`
    pub fn generic_init(&self, ty: &TypeInfo) -> BridgeResult<GenericValue> {
        let gtype = match ty {
            TypeInfo::Primitive(kind) => GenericType::from(*kind),
            TypeInfo::Interface(info) => {
                let runtime_type = || {
                    info.runtime_type()
                        .ok_or_else(|| BridgeError::NotInRepo(info.full_name()))
                };
                match info.kind() {
                    InfoKind::Enum(e) if e.is_flags => GenericType::Flags(runtime_type()?),
                    InfoKind::Enum(_) => GenericType::Enum(runtime_type()?),
                    InfoKind::Object(_) | InfoKind::Interface(_) => {
                        GenericType::Object(runtime_type()?)
                    }
                    InfoKind::Struct(_) => {
                        return Err(BridgeError::GenericUnsupported("struct".into()))
                    }
                    _ => return Err(BridgeError::GenericUnsupported(info.full_name())),
                }
            }
            other => return Err(BridgeError::GenericUnsupported(other.describe())),
        };
        Ok(GenericValue::new(gtype))
    }

    /// Dynamic value -> container
    pub fn generic_load(
        &self,
        container: &mut GenericValue,
        value: &Value,
        position: usize,
        ty: &TypeInfo,
    ) -> BridgeResult<()> {
        if let Some(kind) = ty.storage_kind() {
            let scalar = kind.check(value, position, false)?;
            container.set_scalar(&scalar);
            return Ok(());
        }
        match ty.interface_info() {
            Some(info) if matches!(container.value_type(), GenericType::Object(_)) => {
                let object = self.registry().load(value, position, info, false)?;
                container.set_object(object, self.objects());
                Ok(())
            }
            _ => Err(BridgeError::GenericUnsupported(ty.describe())),
        }
    }

    /// Container -> dynamic value
    ///
    /// Object payloads are wrapped with NOTHING transfer; the container keeps
    /// its own reference until `unset`.
    pub fn generic_store(&self, container: &GenericValue, ty: &TypeInfo) -> BridgeResult<Value> {
        if let Some(kind) = ty.storage_kind() {
            return Ok(kind.push(container.scalar()));
        }
        match ty.interface_info() {
            Some(info) if matches!(container.value_type(), GenericType::Object(_)) => {
                let mut address = container.object();
                // SAFETY: the container holds a live reference to the object
                unsafe {
                    self.registry()
                        .store(info, &mut address, crate::descriptor::Transfer::Nothing)
                }
            }
            _ => Err(BridgeError::GenericUnsupported(ty.describe())),
        }
    }
}
