//! Marshaling and invocation benchmarks
//!
//! Measures per-call overhead of the generic call path against the size of
//! the marshaled data.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynbridge::descriptor::{ArgInfo, ArrayInfo, FunctionInfo, PrimitiveKind};
use dynbridge::interop::{terminated_len, NativeSlot, Scratch};
use dynbridge::{BaseInfo, Catalog, MarshalingContext, NoObjects, Transfer, TypeInfo, Value};
use std::os::raw::c_void;
use std::rc::Rc;

extern "C" fn bench_add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

unsafe extern "C" fn bench_sum(values: *const i32, count: i32) -> i32 {
    (0..count as usize).map(|i| *values.add(i)).fold(0, i32::wrapping_add)
}

fn int32() -> TypeInfo {
    TypeInfo::Primitive(PrimitiveKind::Int32)
}

fn context() -> MarshalingContext {
    MarshalingContext::new(Rc::new(Catalog::new()), Rc::new(NoObjects))
}

fn bench_invoke(c: &mut Criterion) {
    let ctx = context();
    let add = Rc::new(BaseInfo::new_function(
        "Bench",
        "add",
        FunctionInfo::new("bench_add")
            .arg(ArgInfo::input("a", int32()))
            .arg(ArgInfo::input("b", int32()))
            .returns(int32(), Transfer::Nothing)
            .address(bench_add as usize),
    ));
    let callable = unsafe { ctx.bind(&add).unwrap() };
    let args = [Value::Int(20), Value::Int(22)];

    c.bench_function("invoke_add", |b| {
        b.iter(|| ctx.invoke(&callable, black_box(&args)).unwrap())
    });

    c.bench_function("bind_add", |b| b.iter(|| unsafe { ctx.bind(black_box(&add)).unwrap() }));
}

fn bench_array_argument(c: &mut Criterion) {
    let ctx = context();
    let sum = Rc::new(BaseInfo::new_function(
        "Bench",
        "sum",
        FunctionInfo::new("bench_sum")
            .arg(ArgInfo::input("values", TypeInfo::array(ArrayInfo::c(int32()))))
            .arg(ArgInfo::input("count", int32()))
            .returns(int32(), Transfer::Nothing)
            .address(bench_sum as usize),
    ));
    let callable = unsafe { ctx.bind(&sum).unwrap() };

    let mut group = c.benchmark_group("array_argument");
    for len in [4usize, 64, 1024] {
        let args = [
            Value::List((0..len as i64).map(Value::Int).collect()),
            Value::Int(len as i64),
        ];
        group.bench_with_input(BenchmarkId::from_parameter(len), &args, |b, args| {
            b.iter(|| ctx.invoke(&callable, black_box(args)).unwrap())
        });
    }
    group.finish();
}

fn bench_zero_terminated(c: &mut Criterion) {
    let ctx = context();
    let ty = TypeInfo::array(ArrayInfo::c(int32()).zero_terminated());

    let mut group = c.benchmark_group("zero_terminated");
    for len in [16usize, 256, 4096] {
        let mut data: Vec<i32> = (1..=len as i32).collect();
        data.push(0);

        group.bench_with_input(BenchmarkId::new("scan", len), &data, |b, data| {
            b.iter(|| unsafe { terminated_len(data.as_ptr() as *const u8, 4, usize::MAX) })
        });

        group.bench_with_input(BenchmarkId::new("to_dynamic", len), &data, |b, data| {
            b.iter(|| {
                let mut slot = NativeSlot::from_ptr(data.as_ptr() as *mut c_void);
                unsafe { ctx.to_dynamic_checked(&ty, Transfer::Nothing, slot.as_mut_ptr()).unwrap() }
            })
        });
    }
    group.finish();
}

fn bench_strings(c: &mut Criterion) {
    let ctx = context();
    let ty = TypeInfo::Primitive(PrimitiveKind::Utf8);
    let value = Value::from("a moderately sized native string");

    c.bench_function("string_from_dynamic", |b| {
        b.iter(|| {
            let mut slot = NativeSlot::null();
            let mut scratch = Scratch::new();
            unsafe {
                ctx.from_dynamic_checked(black_box(&value), 1, &ty, slot.as_mut_ptr(), false, &mut scratch)
                    .unwrap()
            }
        })
    });
}

criterion_group!(
    benches,
    bench_invoke,
    bench_array_argument,
    bench_zero_terminated,
    bench_strings
);
criterion_main!(benches);
