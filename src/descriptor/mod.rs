//! Type descriptors - read-only view over the metadata repository
//!
//! Descriptors are immutable and shared through `Rc`. Nothing in this module
//! mutates a descriptor after construction; the accessor methods are plain
//! queries with no state of their own.
//!
//! Layout:
//! - `TypeInfo` - the tag of a single value slot (primitive, array, interface)
//! - `BaseInfo` - a named entry (struct, object, enum, function, constant)
//! - `repository.rs` - lookup trait and the in-memory `Catalog`

mod repository;


pub use repository::{Catalog, MetadataRepository};

use std::ffi::CString;
use std::rc::Rc;

/// Closed set of primitive storage kinds
///
/// The per-kind native layout, dynamic conversion and release rules live in
/// `interop::types` and are matched exhaustively there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// C `int` used as a truth value
    Boolean,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    /// Pointer-sized runtime type identifier
    GType,
    /// NUL-terminated UTF-8 string
    Utf8,
    /// NUL-terminated string in filesystem encoding
    Filename,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 14] = [
        Self::Boolean,
        Self::Int8,
        Self::UInt8,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Float,
        Self::Double,
        Self::GType,
        Self::Utf8,
        Self::Filename,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "gboolean",
            Self::Int8 => "gint8",
            Self::UInt8 => "guint8",
            Self::Int16 => "gint16",
            Self::UInt16 => "guint16",
            Self::Int32 => "gint32",
            Self::UInt32 => "guint32",
            Self::Int64 => "gint64",
            Self::UInt64 => "guint64",
            Self::Float => "gfloat",
            Self::Double => "gdouble",
            Self::GType => "GType",
            Self::Utf8 => "utf8",
            Self::Filename => "filename",
        }
    }
}

/// Ownership-passing convention attached to a value at a marshaling boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Sender keeps ownership; receiver may acquire independently
    Nothing,
    /// Ownership passes to the receiver
    Everything,
    /// Brand-new handle with inline storage; the address is an output
    Container,
}

/// Parameter direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    InOut,
}

/// Identifier of a type registered with the host object system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeType(pub usize);

impl RuntimeType {
    pub const INVALID: RuntimeType = RuntimeType(0);

    /// Highest identifier reserved for fundamental types
    pub const FUNDAMENTAL_MAX: usize = 255 << 2;

    /// Derived types take part in ancestry checks; fundamentals do not
    #[inline]
    pub const fn is_derived(self) -> bool {
        self.0 > Self::FUNDAMENTAL_MAX
    }
}

// ============================================================================
// Value-slot descriptors
// ============================================================================

/// Tag of a single value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Void,
    Primitive(PrimitiveKind),
    Array,
    Interface,
    Unsupported,
}

/// Descriptor of a single value slot
#[derive(Debug, Clone)]
pub enum TypeInfo {
    Void,
    Primitive(PrimitiveKind),
    Array(Box<ArrayInfo>),
    Interface(Rc<BaseInfo>),
    /// Tags the engine has no marshaling for (lists, hash tables, ...)
    Unsupported(String),
}

impl TypeInfo {
    pub fn array(array: ArrayInfo) -> Self {
        Self::Array(Box::new(array))
    }

    pub fn interface(info: &Rc<BaseInfo>) -> Self {
        Self::Interface(Rc::clone(info))
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Void => TypeTag::Void,
            Self::Primitive(kind) => TypeTag::Primitive(*kind),
            Self::Array(_) => TypeTag::Array,
            Self::Interface(_) => TypeTag::Interface,
            Self::Unsupported(_) => TypeTag::Unsupported,
        }
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn array_info(&self) -> Option<&ArrayInfo> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Element descriptor of an array
    pub fn element(&self) -> Option<&TypeInfo> {
        self.array_info().map(|array| &array.element)
    }

    pub fn interface_info(&self) -> Option<&Rc<BaseInfo>> {
        match self {
            Self::Interface(info) => Some(info),
            _ => None,
        }
    }

    /// Human-readable description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Primitive(kind) => kind.name().to_string(),
            Self::Array(array) => format!("array of {}", array.element.describe()),
            Self::Interface(info) => info.full_name(),
            Self::Unsupported(name) => name.clone(),
        }
    }
}

/// Buffer layout of an array value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Raw contiguous buffer, released with `free`
    C,
    /// Growable vector buffer with its own reference count
    Vector,
}

#[derive(Debug, Clone)]
pub struct ArrayInfo {
    pub element: TypeInfo,
    pub kind: ArrayKind,
    pub zero_terminated: bool,
    pub fixed_size: Option<usize>,
}

impl ArrayInfo {
    pub fn c(element: TypeInfo) -> Self {
        Self {
            element,
            kind: ArrayKind::C,
            zero_terminated: false,
            fixed_size: None,
        }
    }

    pub fn vector(element: TypeInfo) -> Self {
        Self {
            element,
            kind: ArrayKind::Vector,
            zero_terminated: false,
            fixed_size: None,
        }
    }

    pub fn zero_terminated(mut self) -> Self {
        self.zero_terminated = true;
        self
    }

    pub fn fixed(mut self, size: usize) -> Self {
        self.fixed_size = Some(size);
        self
    }
}

// ============================================================================
// Named entries
// ============================================================================

/// Kind of a named repository entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    Function,
    Struct,
    Enum,
    Flags,
    Object,
    Interface,
    Constant,
    Other,
}

#[derive(Debug)]
pub enum InfoKind {
    Function(FunctionInfo),
    Struct(StructInfo),
    Enum(EnumInfo),
    Object(ObjectInfo),
    Interface(InterfaceInfo),
    Constant(ConstantInfo),
    Other,
}

/// Named entry of the metadata repository
#[derive(Debug)]
pub struct BaseInfo {
    namespace: String,
    name: String,
    container: Option<String>,
    kind: InfoKind,
}

impl BaseInfo {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: InfoKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            container: None,
            kind,
        }
    }

    pub fn new_struct(namespace: &str, name: &str, info: StructInfo) -> Self {
        Self::new(namespace, name, InfoKind::Struct(info))
    }

    pub fn new_object(namespace: &str, name: &str, info: ObjectInfo) -> Self {
        Self::new(namespace, name, InfoKind::Object(info))
    }

    pub fn new_enum(namespace: &str, name: &str, info: EnumInfo) -> Self {
        Self::new(namespace, name, InfoKind::Enum(info))
    }

    pub fn new_function(namespace: &str, name: &str, info: FunctionInfo) -> Self {
        Self::new(namespace, name, InfoKind::Function(info))
    }

    pub fn new_constant(namespace: &str, name: &str, info: ConstantInfo) -> Self {
        Self::new(namespace, name, InfoKind::Constant(info))
    }

    /// Name of the type this entry belongs to (methods only)
    pub fn in_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    #[inline]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn container_name(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// `Namespace.Name`, the key hooks and handle origins are recorded under
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    #[inline]
    pub fn kind(&self) -> &InfoKind {
        &self.kind
    }

    pub fn info_type(&self) -> InfoType {
        match &self.kind {
            InfoKind::Function(_) => InfoType::Function,
            InfoKind::Struct(_) => InfoType::Struct,
            InfoKind::Enum(info) if info.is_flags => InfoType::Flags,
            InfoKind::Enum(_) => InfoType::Enum,
            InfoKind::Object(_) => InfoType::Object,
            InfoKind::Interface(_) => InfoType::Interface,
            InfoKind::Constant(_) => InfoType::Constant,
            InfoKind::Other => InfoType::Other,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionInfo> {
        match &self.kind {
            InfoKind::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructInfo> {
        match &self.kind {
            InfoKind::Struct(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectInfo> {
        match &self.kind {
            InfoKind::Object(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumInfo> {
        match &self.kind {
            InfoKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&ConstantInfo> {
        match &self.kind {
            InfoKind::Constant(info) => Some(info),
            _ => None,
        }
    }

    /// Native size of a structure, zero for everything else
    pub fn size(&self) -> usize {
        self.as_struct().map_or(0, |info| info.size)
    }

    /// Runtime type registered for this entry, if it exposes one
    pub fn runtime_type(&self) -> Option<RuntimeType> {
        match &self.kind {
            InfoKind::Struct(info) => info.runtime_type,
            InfoKind::Object(info) => info.runtime_type,
            InfoKind::Interface(info) => info.runtime_type,
            InfoKind::Enum(info) => info.runtime_type,
            _ => None,
        }
    }

    /// Instances of objects and interfaces carry their type at runtime
    pub fn is_instance_type(&self) -> bool {
        matches!(self.kind, InfoKind::Object(_) | InfoKind::Interface(_))
            && self.runtime_type().map_or(false, RuntimeType::is_derived)
    }

    pub fn methods(&self) -> &[Rc<BaseInfo>] {
        match &self.kind {
            InfoKind::Struct(info) => &info.methods,
            InfoKind::Object(info) => &info.methods,
            InfoKind::Interface(info) => &info.methods,
            _ => &[],
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<BaseInfo>> {
        self.methods().iter().find(|method| method.name() == name)
    }

    /// Static element lookup: fields, then properties, then methods
    pub fn find_element(&self, name: &str) -> Option<Element<'_>> {
        let element = match &self.kind {
            InfoKind::Struct(info) => info
                .fields
                .iter()
                .find(|field| field.name == name)
                .map(Element::Field),
            InfoKind::Object(info) => info
                .properties
                .iter()
                .find(|property| property.name == name)
                .map(Element::Property),
            _ => None,
        };
        element.or_else(|| self.find_method(name).map(Element::Method))
    }
}

/// Entry found by `BaseInfo::find_element`
#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Field(&'a FieldInfo),
    Property(&'a PropertyInfo),
    Method(&'a Rc<BaseInfo>),
}

// ============================================================================
// Entry payloads
// ============================================================================

#[derive(Debug, Default)]
pub struct StructInfo {
    pub size: usize,
    pub runtime_type: Option<RuntimeType>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<Rc<BaseInfo>>,
}

impl StructInfo {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    pub fn method(mut self, method: Rc<BaseInfo>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn runtime_type(mut self, ty: RuntimeType) -> Self {
        self.runtime_type = Some(ty);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub readable: bool,
    pub writable: bool,
}

impl AccessFlags {
    pub const READABLE: Self = Self { readable: true, writable: false };
    pub const WRITABLE: Self = Self { readable: false, writable: true };
    pub const READWRITE: Self = Self { readable: true, writable: true };
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub offset: usize,
    pub ty: TypeInfo,
    pub flags: AccessFlags,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, offset: usize, ty: TypeInfo) -> Self {
        Self {
            name: name.into(),
            offset,
            ty,
            flags: AccessFlags::READWRITE,
        }
    }

    pub fn with_flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: TypeInfo,
    pub flags: AccessFlags,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self {
            name: name.into(),
            ty,
            flags: AccessFlags::READWRITE,
        }
    }

    pub fn with_flags(mut self, flags: AccessFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Default)]
pub struct ObjectInfo {
    pub runtime_type: Option<RuntimeType>,
    pub properties: Vec<PropertyInfo>,
    pub methods: Vec<Rc<BaseInfo>>,
}

impl ObjectInfo {
    pub fn new(runtime_type: RuntimeType) -> Self {
        Self {
            runtime_type: Some(runtime_type),
            ..Self::default()
        }
    }

    pub fn property(mut self, property: PropertyInfo) -> Self {
        self.properties.push(property);
        self
    }

    pub fn method(mut self, method: Rc<BaseInfo>) -> Self {
        self.methods.push(method);
        self
    }
}

#[derive(Debug, Default)]
pub struct InterfaceInfo {
    pub runtime_type: Option<RuntimeType>,
    pub methods: Vec<Rc<BaseInfo>>,
}

#[derive(Debug)]
pub struct EnumInfo {
    pub storage: PrimitiveKind,
    pub runtime_type: Option<RuntimeType>,
    pub is_flags: bool,
    pub values: Vec<(String, i64)>,
}

impl EnumInfo {
    pub fn new(storage: PrimitiveKind) -> Self {
        Self {
            storage,
            runtime_type: None,
            is_flags: false,
            values: Vec::new(),
        }
    }

    pub fn flags(storage: PrimitiveKind) -> Self {
        Self {
            is_flags: true,
            ..Self::new(storage)
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn runtime_type(mut self, ty: RuntimeType) -> Self {
        self.runtime_type = Some(ty);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags {
    pub is_method: bool,
    pub is_constructor: bool,
    pub throws: bool,
}

#[derive(Debug)]
pub struct FunctionInfo {
    pub symbol: String,
    pub flags: FunctionFlags,
    pub args: Vec<ArgInfo>,
    pub return_type: TypeInfo,
    pub caller_owns: Transfer,
    /// Resolved entry point; `None` resolves `symbol` in the namespace library
    pub address: Option<usize>,
}

impl FunctionInfo {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            flags: FunctionFlags::default(),
            args: Vec::new(),
            return_type: TypeInfo::Void,
            caller_owns: Transfer::Nothing,
            address: None,
        }
    }

    pub fn arg(mut self, arg: ArgInfo) -> Self {
        self.args.push(arg);
        self
    }

    pub fn returns(mut self, ty: TypeInfo, caller_owns: Transfer) -> Self {
        self.return_type = ty;
        self.caller_owns = caller_owns;
        self
    }

    pub fn method(mut self) -> Self {
        self.flags.is_method = true;
        self
    }

    pub fn constructor(mut self) -> Self {
        self.flags.is_constructor = true;
        self
    }

    pub fn throws(mut self) -> Self {
        self.flags.throws = true;
        self
    }

    pub fn address(mut self, address: usize) -> Self {
        self.address = Some(address);
        self
    }

    /// Instance methods receive `self` as an extra leading argument
    #[inline]
    pub fn has_self(&self) -> bool {
        self.flags.is_method && !self.flags.is_constructor
    }
}

#[derive(Debug, Clone)]
pub struct ArgInfo {
    pub name: String,
    pub ty: TypeInfo,
    pub direction: Direction,
    pub transfer: Transfer,
    pub optional: bool,
    pub may_be_null: bool,
    pub caller_allocates: bool,
}

impl ArgInfo {
    pub fn new(name: impl Into<String>, ty: TypeInfo, direction: Direction) -> Self {
        Self {
            name: name.into(),
            ty,
            direction,
            transfer: Transfer::Nothing,
            optional: false,
            may_be_null: false,
            caller_allocates: false,
        }
    }

    pub fn input(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self::new(name, ty, Direction::In)
    }

    pub fn output(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self::new(name, ty, Direction::Out)
    }

    pub fn inout(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self::new(name, ty, Direction::InOut)
    }

    pub fn transfer(mut self, transfer: Transfer) -> Self {
        self.transfer = transfer;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.may_be_null = true;
        self
    }

    pub fn caller_allocates(mut self) -> Self {
        self.caller_allocates = true;
        self
    }

    /// Nil input is accepted as zero/NULL
    #[inline]
    pub fn accepts_nil(&self) -> bool {
        self.optional || self.may_be_null
    }
}

/// Compile-time value of a constant entry
#[derive(Debug, Clone)]
pub enum ConstantValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Utf8(CString),
}

#[derive(Debug)]
pub struct ConstantInfo {
    pub ty: TypeInfo,
    pub value: ConstantValue,
}

impl ConstantInfo {
    pub fn new(ty: TypeInfo, value: ConstantValue) -> Self {
        Self { ty, value }
    }
}
