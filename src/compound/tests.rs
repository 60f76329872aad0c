use super::*;
use crate::context::MarshalingContext;
use crate::descriptor::{
    AccessFlags, ArrayInfo, Catalog, FieldInfo, FunctionInfo, ObjectInfo, PrimitiveKind,
    PropertyInfo, RuntimeType, StructInfo, TypeInfo,
};
use crate::objects::BasicObjects;
use std::cell::{Cell, RefCell};

const WIDGET: RuntimeType = RuntimeType(0x4000);
const BUTTON: RuntimeType = RuntimeType(0x4100);

struct Fixture {
    ctx: MarshalingContext,
    objects: Rc<BasicObjects>,
    point: Rc<BaseInfo>,
    rect: Rc<BaseInfo>,
    widget: Rc<BaseInfo>,
    button: Rc<BaseInfo>,
}

fn int32() -> TypeInfo {
    TypeInfo::Primitive(PrimitiveKind::Int32)
}

fn fixture() -> Fixture {
    let mut catalog = Catalog::new();
    let length = Rc::new(
        BaseInfo::new_function("Demo", "length", FunctionInfo::new("demo_point_length").method())
            .in_container("Point"),
    );
    let point = catalog.insert(BaseInfo::new_struct(
        "Demo",
        "Point",
        StructInfo::new(12)
            .field(FieldInfo::new("x", 0, int32()))
            .field(FieldInfo::new("y", 4, int32()))
            .field(FieldInfo::new("id", 8, int32()).with_flags(AccessFlags::READABLE))
            .method(length),
    ));
    let rect = catalog.insert(BaseInfo::new_struct("Demo", "Rect", StructInfo::new(16)));
    let widget = catalog.insert(BaseInfo::new_object(
        "Demo",
        "Widget",
        ObjectInfo::new(WIDGET)
            .property(PropertyInfo::new("title", TypeInfo::Primitive(PrimitiveKind::Utf8)))
            .property(
                PropertyInfo::new("serial", int32()).with_flags(AccessFlags::READABLE),
            ),
    ));
    let button = catalog.insert(BaseInfo::new_object("Demo", "Button", ObjectInfo::new(BUTTON)));

    let objects = Rc::new(BasicObjects::new());
    objects.register_type(WIDGET, "DemoWidget", None, &["title", "serial"]);
    objects.register_type(BUTTON, "DemoButton", Some(WIDGET), &[]);

    let ctx = MarshalingContext::new(Rc::new(catalog), objects.clone());
    Fixture {
        ctx,
        objects,
        point,
        rect,
        widget,
        button,
    }
}

fn handle(value: &Value) -> &Rc<CompoundHandle> {
    value.as_compound().unwrap()
}

#[test]
fn test_transition_tables() {
    assert_eq!(acquisition(CompoundKind::Object, Transfer::Nothing), Acquisition::RefObject);
    assert_eq!(acquisition(CompoundKind::Struct, Transfer::Nothing), Acquisition::StructHook);
    assert_eq!(acquisition(CompoundKind::Struct, Transfer::Everything), Acquisition::Keep);
    assert_eq!(release(CompoundKind::Object, Ownership::Owned), Release::UnrefObject);
    assert_eq!(release(CompoundKind::Struct, Ownership::Owned), Release::DisposeStruct);
    assert_eq!(release(CompoundKind::Object, Ownership::NotOwned), Release::None);
}

#[test]
fn test_object_identity_and_refs() {
    let f = fixture();
    let registry = f.ctx.registry();
    let mut obj = f.objects.instantiate(WIDGET);

    let first = unsafe { registry.store(&f.widget, &mut obj, Transfer::Nothing).unwrap() };
    assert!(handle(&first).owns());
    assert_eq!(f.objects.refcount(obj), 2);

    let second = unsafe { registry.store(&f.widget, &mut obj, Transfer::Nothing).unwrap() };
    assert_eq!(first, second);
    assert_eq!(f.objects.refcount(obj), 2);
    assert_eq!(registry.live_handles(), 1);

    drop(first);
    drop(second);
    assert_eq!(f.objects.refcount(obj), 1);
    assert!(registry.cached(obj).is_none());
    f.objects.unref_object(obj);
}

#[test]
fn test_everything_transfer_on_cache_hit() {
    let f = fixture();
    let registry = f.ctx.registry();
    let mut obj = f.objects.instantiate(WIDGET);

    // the first store adopts the reference created by instantiate
    let first = unsafe { registry.store(&f.widget, &mut obj, Transfer::Everything).unwrap() };
    assert_eq!(f.objects.refcount(obj), 1);

    f.objects.ref_object(obj);
    let again = unsafe { registry.store(&f.widget, &mut obj, Transfer::Everything).unwrap() };
    assert_eq!(first, again);
    assert_eq!(f.objects.refcount(obj), 1);

    f.objects.ref_object(obj);
    drop(first);
    drop(again);
    assert_eq!(f.objects.refcount(obj), 1);
    f.objects.unref_object(obj);
}

#[test]
fn test_null_discipline() {
    let f = fixture();
    let registry = f.ctx.registry();
    let mut null = core::ptr::null_mut();

    let value = unsafe { registry.store(&f.widget, &mut null, Transfer::Everything).unwrap() };
    assert_eq!(value, Value::Nil);
    assert_eq!(registry.live_handles(), 0);

    assert!(registry.load(&Value::Nil, 1, &f.point, true).unwrap().is_null());
    let err = registry.load(&Value::Nil, 2, &f.point, false).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #2 (compound expected, got nil)");
}

#[test]
fn test_container_struct() {
    let f = fixture();
    let mut address = core::ptr::null_mut();
    let value = unsafe {
        f.ctx
            .registry()
            .store(&f.point, &mut address, Transfer::Container)
            .unwrap()
    };
    let point = handle(&value);
    assert!(!address.is_null());
    assert_eq!(point.address(), address);
    assert!(point.is_inline());
    assert!(!point.owns());

    f.ctx.write_element(point, "x", Value::Int(3)).unwrap();
    f.ctx.write_element(point, "y", Value::Float(4.0)).unwrap();
    assert_eq!(f.ctx.read_element(point, "x").unwrap(), Value::Int(3));
    assert_eq!(f.ctx.read_element(point, "y").unwrap(), Value::Int(4));
    assert_eq!(unsafe { *(address as *const i32).add(1) }, 4);

    // loading hands back the same storage
    assert_eq!(f.ctx.registry().load(&value, 1, &f.point, false).unwrap(), address);
    assert_eq!(f.ctx.registry().load(&value, 1, &f.point, false).unwrap(), address);
}

#[test]
fn test_objects_cannot_be_inline() {
    let f = fixture();
    let mut address = core::ptr::null_mut();
    let err = unsafe {
        f.ctx
            .registry()
            .store(&f.widget, &mut address, Transfer::Container)
            .unwrap_err()
    };
    assert!(matches!(err, BridgeError::InlineObject(_)));
    assert!(address.is_null());
}

#[test]
fn test_load_type_checks() {
    let f = fixture();
    let registry = f.ctx.registry();

    let mut obj = f.objects.instantiate(BUTTON);
    let button = unsafe { registry.store(&f.button, &mut obj, Transfer::Everything).unwrap() };
    // derived instances load as their ancestors
    assert_eq!(registry.load(&button, 1, &f.widget, false).unwrap(), obj);

    let mut other = f.objects.instantiate(WIDGET);
    let widget = unsafe { registry.store(&f.widget, &mut other, Transfer::Everything).unwrap() };
    let err = registry.load(&widget, 1, &f.button, false).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #1 (Demo.Button expected, got DemoWidget)");
    assert!(registry.load(&widget, 1, &f.button, true).unwrap().is_null());

    let mut address = core::ptr::null_mut();
    let point = unsafe { registry.store(&f.point, &mut address, Transfer::Container).unwrap() };
    let err = registry.load(&point, 3, &f.rect, false).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #3 (Demo.Rect expected, got Demo.Point)");
}

#[test]
fn test_struct_without_acquire_hook_is_unmanaged() {
    let f = fixture();
    let mut storage = [0i32; 3];
    let mut address = storage.as_mut_ptr() as *mut c_void;
    let value = unsafe {
        f.ctx
            .registry()
            .store(&f.point, &mut address, Transfer::Nothing)
            .unwrap()
    };
    assert!(!handle(&value).owns());
    assert!(!handle(&value).is_inline());
}

#[test]
fn test_acquire_and_dispose_hooks() {
    let f = fixture();
    let acquired = Rc::new(Cell::new(0));
    let disposed = Rc::new(Cell::new(0));
    let (a, d) = (Rc::clone(&acquired), Rc::clone(&disposed));
    f.ctx.register_hooks(
        "Demo",
        "Point",
        TypeHooks::new()
            .on_acquire(move |_| {
                a.set(a.get() + 1);
                Ok(())
            })
            .on_dispose(move |handle| {
                assert_eq!(handle.type_name(), "Demo.Point");
                d.set(d.get() + 1);
            }),
    );

    let mut storage = [0i32; 3];
    let mut address = storage.as_mut_ptr() as *mut c_void;
    let value = unsafe {
        f.ctx
            .registry()
            .store(&f.point, &mut address, Transfer::Nothing)
            .unwrap()
    };
    assert!(handle(&value).owns());
    assert_eq!(acquired.get(), 1);
    assert_eq!(disposed.get(), 0);

    drop(value);
    assert_eq!(disposed.get(), 1);
}

#[test]
fn test_struct_ownership_adopted_on_cache_hit() {
    let f = fixture();
    let disposed = Rc::new(Cell::new(0));
    let d = Rc::clone(&disposed);
    f.ctx.register_hooks("Demo", "Point", TypeHooks::new().on_dispose(move |_| d.set(d.get() + 1)));
    let registry = f.ctx.registry();

    let mut storage = [0i32; 3];
    let mut address = storage.as_mut_ptr() as *mut c_void;
    let borrowed = unsafe { registry.store(&f.point, &mut address, Transfer::Nothing).unwrap() };
    assert!(!handle(&borrowed).owns());

    let owned = unsafe { registry.store(&f.point, &mut address, Transfer::Everything).unwrap() };
    assert_eq!(borrowed, owned);
    assert!(handle(&borrowed).owns());

    // a second handover of memory already owned releases nothing
    let again = unsafe { registry.store(&f.point, &mut address, Transfer::Everything).unwrap() };
    assert_eq!(owned, again);
    assert_eq!(disposed.get(), 0);

    drop((borrowed, owned, again));
    assert_eq!(disposed.get(), 1);
}

#[test]
fn test_failing_acquire_hook() {
    let f = fixture();
    f.ctx.register_hooks(
        "Demo",
        "Point",
        TypeHooks::new().on_acquire(|_| Err(BridgeError::Hook("refused".into()))),
    );

    let mut storage = [0i32; 3];
    let mut address = storage.as_mut_ptr() as *mut c_void;
    let err = unsafe {
        f.ctx
            .registry()
            .store(&f.point, &mut address, Transfer::Nothing)
            .unwrap_err()
    };
    assert!(matches!(err, BridgeError::Hook(_)));
    assert!(f.ctx.registry().cached(address).is_none());
}

#[test]
fn test_nested_store_wins() {
    let f = fixture();
    let nested: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
    let disposed = Rc::new(Cell::new(0));
    let entered = Rc::new(Cell::new(false));

    let (slot, d, guard) = (Rc::clone(&nested), Rc::clone(&disposed), Rc::clone(&entered));
    f.ctx.register_hooks(
        "Demo",
        "Point",
        TypeHooks::new()
            .on_acquire(move |handle| {
                if !guard.replace(true) {
                    let mut address = handle.address();
                    let inner = unsafe {
                        handle
                            .registry()
                            .store(handle.origin(), &mut address, Transfer::Nothing)?
                    };
                    *slot.borrow_mut() = Some(inner);
                }
                Ok(())
            })
            .on_dispose(move |_| d.set(d.get() + 1)),
    );

    let mut storage = [0i32; 3];
    let mut address = storage.as_mut_ptr() as *mut c_void;
    let outer = unsafe {
        f.ctx
            .registry()
            .store(&f.point, &mut address, Transfer::Nothing)
            .unwrap()
    };
    let inner = nested.borrow_mut().take().unwrap();

    // the losing candidate was finalized without evicting the winner
    assert_eq!(outer, inner);
    assert_eq!(disposed.get(), 1);
    let cached = f.ctx.registry().cached(address).unwrap();
    assert!(Rc::ptr_eq(&cached, handle(&outer)));

    drop(cached);
    drop(inner);
    drop(outer);
    assert_eq!(disposed.get(), 2);
    assert_eq!(f.ctx.registry().live_handles(), 0);
}

#[test]
fn test_field_access_rules() {
    let f = fixture();
    let point = unsafe { f.ctx.get(&f.point).unwrap().unwrap() };
    let point = handle(&point);

    let err = f.ctx.write_element(point, "id", Value::Int(1)).unwrap_err();
    assert_eq!(err.to_string(), "Demo.Point: `id' not writable");
    assert_eq!(f.ctx.read_element(point, "id").unwrap(), Value::Int(0));

    let method = f.ctx.read_element(point, "length").unwrap();
    assert_eq!(method.as_info().map(|info| info.name()), Some("length"));
    let err = f.ctx.write_element(point, "length", Value::Nil).unwrap_err();
    assert!(matches!(err, BridgeError::NotWritable { .. }));

    let err = f.ctx.read_element(point, "z").unwrap_err();
    assert_eq!(err.to_string(), "Demo.Point: no `z'");

    let err = f.ctx.write_element(point, "x", Value::from("wide")).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #3 (number expected, got string)");
}

#[test]
fn test_failed_field_write_leaves_field_untouched() {
    let utf8 = TypeInfo::Primitive(PrimitiveKind::Utf8);
    let names = Rc::new(BaseInfo::new_struct(
        "Demo",
        "Names",
        StructInfo::new(8).field(FieldInfo::new(
            "names",
            0,
            TypeInfo::array(ArrayInfo::c(utf8).zero_terminated()),
        )),
    ));
    let ctx = MarshalingContext::new(Rc::new(Catalog::new()), Rc::new(BasicObjects::new()));
    let value = unsafe { ctx.get(&names).unwrap().unwrap() };
    let record = handle(&value);

    let bad = Value::List(vec![Value::from("a"), Value::List(vec![])]);
    let err = ctx.write_element(record, "names", bad).unwrap_err();
    assert_eq!(err.to_string(), "bad argument #3 (string expected, got table)");
    assert_eq!(ctx.read_element(record, "names").unwrap(), Value::Nil);

    let good = Value::List(vec![Value::from("a"), Value::from("b")]);
    ctx.write_element(record, "names", good.clone()).unwrap();
    assert_eq!(ctx.read_element(record, "names").unwrap(), good);

    // the stored array belongs to the structure now
    unsafe {
        let array = *(record.address() as *const *mut *mut c_void);
        libc::free(*array);
        libc::free(*array.add(1));
        libc::free(array as *mut c_void);
    }
}

#[test]
fn test_index_hooks() {
    let f = fixture();
    let written = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&written);
    f.ctx.register_hooks(
        "Demo",
        "Point",
        TypeHooks::new()
            .on_index(|ctx, handle, name| {
                let x = ctx.read_element(handle, "x")?;
                Ok(Value::Str(format!("{name}={x:?}")))
            })
            .on_newindex(move |_, _, name, value| {
                log.borrow_mut().push((name.to_string(), value));
                Ok(())
            }),
    );

    let point = unsafe { f.ctx.get(&f.point).unwrap().unwrap() };
    let point = handle(&point);
    f.ctx.write_element(point, "x", Value::Int(9)).unwrap();
    assert_eq!(f.ctx.read_element(point, "virtual").unwrap(), Value::from("virtual=9"));

    f.ctx.write_element(point, "extra", Value::Bool(true)).unwrap();
    assert_eq!(&*written.borrow(), &[("extra".to_string(), Value::Bool(true))]);
}

#[test]
fn test_object_properties() {
    let f = fixture();
    let mut obj = f.objects.instantiate(BUTTON);
    let value = unsafe {
        f.ctx
            .registry()
            .store(&f.widget, &mut obj, Transfer::Everything)
            .unwrap()
    };
    let widget = handle(&value);

    assert_eq!(f.ctx.read_element(widget, "title").unwrap(), Value::Nil);
    f.ctx.write_element(widget, "title", Value::from("Ok")).unwrap();
    assert_eq!(f.ctx.read_element(widget, "title").unwrap(), Value::from("Ok"));

    let err = f.ctx.write_element(widget, "serial", Value::Int(5)).unwrap_err();
    assert!(matches!(err, BridgeError::NotWritable { .. }));
    assert_eq!(f.ctx.read_element(widget, "serial").unwrap(), Value::Int(0));
}

#[test]
fn test_object_valued_property_refs() {
    let mut catalog = Catalog::new();
    let node_info = Rc::new(BaseInfo::new_object("Demo", "Node", ObjectInfo::new(WIDGET)));
    let holder = catalog.insert(BaseInfo::new_object(
        "Demo",
        "Holder",
        ObjectInfo::new(BUTTON).property(PropertyInfo::new("child", TypeInfo::interface(&node_info))),
    ));
    catalog.insert_rc(Rc::clone(&node_info));

    let objects = Rc::new(BasicObjects::new());
    objects.register_type(WIDGET, "DemoNode", None, &[]);
    objects.register_type(BUTTON, "DemoHolder", None, &["child"]);
    let ctx = MarshalingContext::new(Rc::new(catalog), objects.clone());

    let mut parent = objects.instantiate(BUTTON);
    let mut child = objects.instantiate(WIDGET);
    let parent_value = unsafe { ctx.registry().store(&holder, &mut parent, Transfer::Everything).unwrap() };
    let child_value = unsafe { ctx.registry().store(&node_info, &mut child, Transfer::Everything).unwrap() };

    ctx.write_element(handle(&parent_value), "child", child_value.clone()).unwrap();
    // the stored property holds its own reference
    assert_eq!(objects.refcount(child), 2);

    let read = ctx.read_element(handle(&parent_value), "child").unwrap();
    assert_eq!(read, child_value);
    assert_eq!(objects.refcount(child), 2);

    drop(read);
    drop(child_value);
    assert_eq!(objects.refcount(child), 1);
    drop(parent_value);
    assert!(ctx.registry().cached(child).is_none());
}

#[test]
fn test_display_format() {
    let f = fixture();
    let value = unsafe { f.ctx.get(&f.point).unwrap().unwrap() };
    let text = handle(&value).to_string();
    assert!(text.starts_with("lgi 0x"));
    assert!(text.ends_with(":Demo.Point"));
}
