//! Handle lifetime across native calls: objects, owned structures, config

use dynbridge::descriptor::{
    ArgInfo, ArrayInfo, FieldInfo, FunctionInfo, ObjectInfo, PrimitiveKind, PropertyInfo,
    RuntimeType, StructInfo,
};
use dynbridge::ffi::{dynbridge_object_new, dynbridge_object_ref, ObjectHeader};
use dynbridge::{
    BaseInfo, BasicObjects, BridgeConfig, CallOutcome, Catalog, MarshalingContext, NoObjects,
    ObjectSystem, Transfer, TypeHooks, TypeInfo, Value,
};
use std::cell::Cell;
use std::io::Write;
use std::os::raw::c_void;
use std::rc::Rc;

const WIDGET: RuntimeType = RuntimeType(0x8000);

extern "C" fn demo_widget_new() -> *mut c_void {
    dynbridge_object_new(WIDGET.0, core::mem::size_of::<ObjectHeader>())
}

extern "C" fn demo_widget_self(widget: *mut c_void) -> *mut c_void {
    widget
}

unsafe extern "C" fn demo_widget_dup(widget: *mut c_void) -> *mut c_void {
    dynbridge_object_ref(widget)
}

unsafe extern "C" fn demo_buffer_new(size: u32) -> *mut c_void {
    let buffer = libc::calloc(1, 8) as *mut u32;
    *buffer = size;
    buffer as *mut c_void
}

fn widget_catalog() -> (Catalog, Rc<BaseInfo>) {
    let mut catalog = Catalog::new();
    let widget = catalog.insert(BaseInfo::new_object(
        "Demo",
        "Widget",
        ObjectInfo::new(WIDGET).property(PropertyInfo::new("label", TypeInfo::Primitive(PrimitiveKind::Utf8))),
    ));
    (catalog, widget)
}

fn function(name: &str, info: FunctionInfo) -> Rc<BaseInfo> {
    Rc::new(BaseInfo::new_function("Demo", name, info))
}

fn single(outcome: CallOutcome) -> Value {
    let mut values = outcome.into_values();
    assert_eq!(values.len(), 1);
    values.remove(0)
}

#[test]
fn test_object_lifetime_through_calls() {
    let (catalog, widget) = widget_catalog();
    let objects = Rc::new(BasicObjects::new());
    objects.register_type(WIDGET, "DemoWidget", None, &["label"]);
    let ctx = MarshalingContext::new(Rc::new(catalog), objects.clone());

    let new = function(
        "widget_new",
        FunctionInfo::new("demo_widget_new")
            .returns(TypeInfo::interface(&widget), Transfer::Everything)
            .address(demo_widget_new as usize),
    );
    let same = function(
        "widget_self",
        FunctionInfo::new("demo_widget_self")
            .arg(ArgInfo::input("widget", TypeInfo::interface(&widget)))
            .returns(TypeInfo::interface(&widget), Transfer::Nothing)
            .address(demo_widget_self as usize),
    );
    let dup = function(
        "widget_dup",
        FunctionInfo::new("demo_widget_dup")
            .arg(ArgInfo::input("widget", TypeInfo::interface(&widget)))
            .returns(TypeInfo::interface(&widget), Transfer::Everything)
            .address(demo_widget_dup as usize),
    );
    let bind = |info: &Rc<BaseInfo>| unsafe { ctx.bind(info).unwrap() };
    let (new, same, dup) = (bind(&new), bind(&same), bind(&dup));

    let first = single(ctx.invoke(&new, &[]).unwrap());
    let address = first.as_compound().unwrap().address();
    assert_eq!(objects.refcount(address), 1);

    // NOTHING and EVERYTHING returns of a live address resolve to the same handle
    let again = single(ctx.invoke(&same, &[first.clone()]).unwrap());
    let owned = single(ctx.invoke(&dup, &[first.clone()]).unwrap());
    assert_eq!(first, again);
    assert_eq!(first, owned);
    assert_eq!(objects.refcount(address), 1);
    assert_eq!(ctx.registry().live_handles(), 1);

    ctx.write_element(first.as_compound().unwrap(), "label", Value::from("ok")).unwrap();
    assert_eq!(ctx.read_element(again.as_compound().unwrap(), "label").unwrap(), Value::from("ok"));

    // keep the instance alive past the handles to observe the release
    objects.ref_object(address);
    drop((first, again, owned));
    assert_eq!(objects.refcount(address), 1);
    assert!(ctx.registry().cached(address).is_none());
    objects.unref_object(address);
}

#[test]
fn test_owned_struct_disposed_once() {
    let mut catalog = Catalog::new();
    let buffer = catalog.insert(BaseInfo::new_struct(
        "Demo",
        "Buffer",
        StructInfo::new(8).field(FieldInfo::new("size", 0, TypeInfo::Primitive(PrimitiveKind::UInt32))),
    ));
    let ctx = MarshalingContext::new(Rc::new(catalog), Rc::new(NoObjects));

    let disposed = Rc::new(Cell::new(0));
    let counter = Rc::clone(&disposed);
    ctx.register_hooks(
        "Demo",
        "Buffer",
        TypeHooks::new().on_dispose(move |handle| {
            counter.set(counter.get() + 1);
            unsafe { libc::free(handle.address()) };
        }),
    );

    let new = function(
        "buffer_new",
        FunctionInfo::new("demo_buffer_new")
            .arg(ArgInfo::input("size", TypeInfo::Primitive(PrimitiveKind::UInt32)))
            .returns(TypeInfo::interface(&buffer), Transfer::Everything)
            .address(demo_buffer_new as usize),
    );
    let callable = unsafe { ctx.bind(&new).unwrap() };

    let value = single(ctx.invoke(&callable, &[Value::Int(64)]).unwrap());
    let handle = value.as_compound().unwrap();
    assert!(handle.owns());
    assert_eq!(ctx.read_element(handle, "size").unwrap(), Value::Int(64));

    let copy = value.clone();
    drop(value);
    assert_eq!(disposed.get(), 0);
    drop(copy);
    assert_eq!(disposed.get(), 1);
    assert_eq!(ctx.registry().purge(), 0);
}

#[test]
fn test_config_file_scan_limit() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"warn\"\n\n[marshal]\nzero_terminated_limit = 2").unwrap();
    let config = BridgeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.marshal.zero_terminated_limit, 2);

    let ctx = MarshalingContext::with_config(Rc::new(Catalog::new()), Rc::new(NoObjects), config);
    let ty = TypeInfo::array(ArrayInfo::c(TypeInfo::Primitive(PrimitiveKind::Int32)).zero_terminated());
    let data: [i32; 5] = [7, 8, 9, 10, 0];
    let mut slot = data.as_ptr() as *mut c_void;
    let value = unsafe {
        ctx.to_dynamic_checked(&ty, Transfer::Nothing, &mut slot as *mut *mut c_void as *mut u8)
            .unwrap()
    };
    assert_eq!(value, Value::List(vec![Value::Int(7), Value::Int(8)]));
}
