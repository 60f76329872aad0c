//! Generic function invocation
//!
//! `bind` prepares a call frame once per function descriptor; `invoke`
//! marshals dynamic arguments into the frame, performs the native call and
//! marshals the results back.
//!
//! Native frame layout: `[self] args... [error]`, with the return value in
//! its own slot.

use super::abi::CallFrame;
use super::marshal::unsupported;
use super::scratch::Scratch;
use super::types::NativeSlot;
use crate::context::MarshalingContext;
use crate::descriptor::{BaseInfo, Direction, FunctionInfo, Transfer, TypeInfo};
use crate::error::{BridgeError, BridgeResult};
use crate::ffi::NativeError;
use crate::logging::{log_native_call, log_native_error, log_native_return};
use crate::value::Value;
use core::ffi::c_void;
use libffi::middle::{CodePtr, Type};
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Frames up to this many slots stay on the stack
const INLINE_SLOTS: usize = 8;

type Slots = SmallVec<[NativeSlot; INLINE_SLOTS]>;

/// A function descriptor bound to its native entry point
pub struct Callable {
    frame: CallFrame,
    info: Rc<BaseInfo>,
    /// `Namespace.Container.name`, resolved at bind time
    name: String,
    address: usize,
}

impl Callable {
    #[inline]
    pub fn info(&self) -> &Rc<BaseInfo> {
        &self.info
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn address(&self) -> usize {
        self.address
    }

    #[inline]
    pub fn frame(&self) -> &CallFrame {
        &self.frame
    }

    fn function(&self) -> &FunctionInfo {
        match self.info.as_function() {
            Some(function) => function,
            None => unreachable!("callables are only bound from function descriptors"),
        }
    }

    /// Return slot + declared args + instance + error slot
    pub fn frame_size(&self) -> usize {
        let function = self.function();
        function.args.len()
            + 1
            + usize::from(function.has_self())
            + usize::from(function.flags.throws)
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lgi-functn: {} {:p}", self.name, self as *const Self)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("info", &self.info.full_name())
            .field("address", &format_args!("{:#x}", self.address))
            .field("frame", &self.frame)
            .finish()
    }
}

/// Result of an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Return value (unless void), then OUT/INOUT values in declaration order
    Returned(Vec<Value>),
    /// Error reported through the throwing convention
    Failed { message: String, code: i32 },
}

impl CallOutcome {
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Values as the scripting side receives them; failures are
    /// `[false, message, code]`
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Returned(values) => values,
            Self::Failed { message, code } => {
                vec![Value::Bool(false), Value::Str(message), Value::Int(code.into())]
            }
        }
    }
}

impl MarshalingContext {
    /// Prepare a reusable binding for a function descriptor
    ///
    /// # Safety
    /// The descriptor must match the native function it resolves to.
    pub unsafe fn bind(&self, info: &Rc<BaseInfo>) -> BridgeResult<Rc<Callable>> {
        let function = info
            .as_function()
            .ok_or_else(|| BridgeError::NotCallable(info.full_name()))?;

        let address = match function.address {
            Some(address) => address,
            None => {
                let library = self
                    .library_for(info.namespace())
                    .map_err(|err| self.abort("bind", err))?;
                library
                    .symbol(&function.symbol)
                    .map(|ptr| ptr as usize)
                    .map_err(|source| BridgeError::Symbol {
                        symbol: function.symbol.clone(),
                        source,
                    })
                    .map_err(|err| self.abort("bind", err))?
            }
        };

        let mut args = Vec::with_capacity(function.args.len() + 2);
        if function.has_self() {
            args.push(Type::pointer());
        }
        for arg in &function.args {
            args.push(match arg.direction {
                Direction::In => arg.ty.ffi_type(),
                Direction::Out | Direction::InOut => Type::pointer(),
            });
        }
        if function.flags.throws {
            args.push(Type::pointer());
        }

        let frame = CallFrame::prepare(args, function.return_type.ffi_type());
        debug!(
            function = %self.qualified_name(info),
            symbol = %function.symbol,
            args = frame.arg_count(),
            "function bound"
        );

        Ok(Rc::new(Callable {
            frame,
            info: Rc::clone(info),
            name: self.qualified_name(info),
            address,
        }))
    }

    /// Call a bound function with dynamic arguments
    ///
    /// Missing trailing arguments read as nil. Native errors come back as
    /// `CallOutcome::Failed`; everything else that goes wrong is an `Err`.
    pub fn invoke(&self, callable: &Callable, args: &[Value]) -> BridgeResult<CallOutcome> {
        // SAFETY: the binding was created from a descriptor matching the symbol
        unsafe { self.invoke_frame(callable, args) }.map_err(|err| self.abort("invoke", err))
    }

    unsafe fn invoke_frame(&self, callable: &Callable, args: &[Value]) -> BridgeResult<CallOutcome> {
        let function = callable.function();
        let symbol = function.symbol.as_str();
        let total = callable.frame_size();
        let nil = Value::Nil;
        let arg = |index: usize| args.get(index).unwrap_or(&nil);

        // slots[0] is the return value, native arguments follow
        let mut slots: Slots = SmallVec::from_elem(NativeSlot::null(), total);
        let mut storage: Slots = SmallVec::from_elem(NativeSlot::null(), total);
        let mut scratch = Scratch::new();
        let mut keep_alive: SmallVec<[Value; 2]> = SmallVec::new();
        let mut error: *mut NativeError = core::ptr::null_mut();

        let slot_base = slots.as_mut_ptr();
        let storage_base = storage.as_mut_ptr();

        let mut input = 0;
        let mut native = 1;

        if function.has_self() {
            let container = self
                .repository()
                .container_of(&callable.info)
                .ok_or_else(|| BridgeError::Unresolved(format!("container of {}", callable.info.full_name())))?;
            let instance = self.registry().load(arg(input), input + 1, &container, true)?;
            (*slot_base.add(native)).v_pointer = instance;
            input += 1;
            native += 1;
        }

        let first_arg = native;
        for param in &function.args {
            let slot = slot_base.add(native);
            match param.direction {
                Direction::In => {
                    let mark = scratch.mark();
                    input += self.consume(arg(input), input + 1, &param.ty, slot as *mut u8, param.accepts_nil(), &mut scratch)?;
                    if param.transfer != Transfer::Nothing {
                        scratch.detach_from(mark);
                    }
                }
                Direction::InOut => {
                    let cell = storage_base.add(native);
                    let mark = scratch.mark();
                    input += self.consume(arg(input), input + 1, &param.ty, cell as *mut u8, param.accepts_nil(), &mut scratch)?;
                    if param.transfer != Transfer::Nothing {
                        scratch.detach_from(mark);
                    }
                    (*slot).v_pointer = cell as *mut c_void;
                }
                Direction::Out => match param.ty.interface_info() {
                    Some(info) if param.caller_allocates => {
                        let mut address = core::ptr::null_mut();
                        let value = self.registry().store(info, &mut address, Transfer::Container)?;
                        (*slot).v_pointer = address;
                        keep_alive.push(value);
                    }
                    _ => (*slot).v_pointer = storage_base.add(native) as *mut c_void,
                },
            }
            native += 1;
        }

        if function.flags.throws {
            (*slot_base.add(native)).v_pointer = &mut error as *mut *mut NativeError as *mut c_void;
        }

        let mut arg_ptrs: SmallVec<[*mut c_void; INLINE_SLOTS]> =
            (1..total).map(|index| slot_base.add(index) as *mut c_void).collect();

        log_native_call(symbol, arg_ptrs.len());
        callable.frame.call(
            CodePtr(callable.address as *mut c_void),
            slot_base as *mut c_void,
            &mut arg_ptrs,
        );

        if !error.is_null() {
            let (message, code) = NativeError::take(error);
            log_native_error(symbol, &message, code);
            return Ok(CallOutcome::Failed { message, code });
        }

        let mut results = Vec::new();
        if !function.return_type.is_void() {
            let ret = &mut *slot_base;
            if let Some(kind) = function.return_type.storage_kind() {
                kind.normalize_return(ret);
            }
            results.push(self.to_dynamic_checked(&function.return_type, function.caller_owns, ret.as_mut_ptr())?);
        }

        for (offset, param) in function.args.iter().enumerate() {
            let index = first_arg + offset;
            let source = match param.direction {
                Direction::In => continue,
                Direction::Out if param.caller_allocates && param.ty.interface_info().is_some() => {
                    slot_base.add(index)
                }
                Direction::Out | Direction::InOut => storage_base.add(index),
            };
            results.push(self.to_dynamic_checked(&param.ty, param.transfer, source as *mut u8)?);
        }

        log_native_return(symbol, results.len());
        drop(keep_alive);
        Ok(CallOutcome::Returned(results))
    }

    unsafe fn consume(
        &self,
        value: &Value,
        position: usize,
        ty: &TypeInfo,
        slot: *mut u8,
        optional: bool,
        scratch: &mut Scratch,
    ) -> BridgeResult<usize> {
        match self.from_dynamic(value, position, ty, slot, optional, scratch)? {
            0 => Err(unsupported(ty)),
            consumed => Ok(consumed),
        }
    }
}
