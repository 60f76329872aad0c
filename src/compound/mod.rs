//! Compound handles - native structures and objects seen from the dynamic side
//!
//! Architecture:
//! - `CompoundHandle` wraps one native address with an ownership policy
//! - `Registry` creates handles (`store`), unwraps them (`load`) and keeps
//!   the identity cache so each address has at most one live handle
//! - `hooks.rs` - per-type acquire/dispose/index/newindex hooks
//! - `element.rs` - field and property access by element name
//!
//! Finalization is the handle's `Drop`: release per `release(kind, ownership)`
//! then eviction from the cache.

mod cache;
mod element;
mod hooks;

#[cfg(test)]
mod tests;

pub use hooks::{AcquireHook, DisposeHook, IndexHook, NewIndexHook, TypeHooks};

use crate::descriptor::{BaseInfo, InfoKind, Transfer};
use crate::error::{BridgeError, BridgeResult};
use crate::logging::{log_handle_created, log_handle_finalized};
use crate::objects::ObjectSystem;
use crate::value::Value;
use cache::IdentityCache;
use core::ffi::c_void;
use core::ptr::NonNull;
use hooks::NamespaceTable;
use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

/// What a handle wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundKind {
    Struct,
    /// Reference-counted instance (objects and interfaces)
    Object,
}

impl CompoundKind {
    pub fn of(info: &BaseInfo) -> Option<Self> {
        match info.kind() {
            InfoKind::Struct(_) => Some(Self::Struct),
            InfoKind::Object(_) | InfoKind::Interface(_) => Some(Self::Object),
            _ => None,
        }
    }
}

/// Whether finalizing the handle must release the native side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    NotOwned,
    Owned,
}

/// Step taken when a handle is created from a non-owning address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Keep the transfer as given
    Keep,
    /// Take a reference on the object and own it
    RefObject,
    /// Run the type's acquire hook; own only if one ran
    StructHook,
}

/// Step taken when a handle is finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    None,
    UnrefObject,
    DisposeStruct,
}

pub fn acquisition(kind: CompoundKind, transfer: Transfer) -> Acquisition {
    match (transfer, kind) {
        (Transfer::Nothing, CompoundKind::Object) => Acquisition::RefObject,
        (Transfer::Nothing, CompoundKind::Struct) => Acquisition::StructHook,
        (Transfer::Everything | Transfer::Container, _) => Acquisition::Keep,
    }
}

pub fn release(kind: CompoundKind, ownership: Ownership) -> Release {
    match (ownership, kind) {
        (Ownership::NotOwned, _) => Release::None,
        (Ownership::Owned, CompoundKind::Object) => Release::UnrefObject,
        (Ownership::Owned, CompoundKind::Struct) => Release::DisposeStruct,
    }
}

/// Zeroed storage embedded in a CONTAINER handle
struct InlineData {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl InlineData {
    const ALIGN: usize = 16;

    fn zeroed(size: usize) -> BridgeResult<Self> {
        let layout = Layout::from_size_align(size.max(1), Self::ALIGN)
            .map_err(|_| BridgeError::OutOfMemory(size))?;
        // SAFETY: layout has non-zero size
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        NonNull::new(ptr)
            .map(|ptr| Self { ptr, layout })
            .ok_or(BridgeError::OutOfMemory(size))
    }
}

impl Drop for InlineData {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with this layout
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Handle wrapping a native address
pub struct CompoundHandle {
    address: *mut c_void,
    ownership: Cell<Ownership>,
    kind: CompoundKind,
    origin: Rc<BaseInfo>,
    inline: Option<InlineData>,
    registry: Rc<Registry>,
}

impl CompoundHandle {
    #[inline]
    pub fn address(&self) -> *mut c_void {
        self.address
    }

    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.ownership.get()
    }

    #[inline]
    pub fn owns(&self) -> bool {
        self.ownership.get() == Ownership::Owned
    }

    #[inline]
    pub fn kind(&self) -> CompoundKind {
        self.kind
    }

    /// Descriptor the handle was created from
    #[inline]
    pub fn origin(&self) -> &Rc<BaseInfo> {
        &self.origin
    }

    /// `Namespace.Name` of the origin
    pub fn type_name(&self) -> String {
        self.origin.full_name()
    }

    /// Whether the native memory lives inside the handle
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inline.is_some()
    }

    #[inline]
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }
}

impl fmt::Display for CompoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lgi {:p}:{}", self as *const Self, self.origin.full_name())
    }
}

impl fmt::Debug for CompoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundHandle")
            .field("address", &self.address)
            .field("ownership", &self.ownership.get())
            .field("kind", &self.kind)
            .field("origin", &self.origin.full_name())
            .field("inline", &self.inline.is_some())
            .finish()
    }
}

impl Drop for CompoundHandle {
    fn drop(&mut self) {
        log_handle_finalized(&self.origin.full_name(), self.address as *const u8, self.owns());

        match release(self.kind, self.ownership.get()) {
            Release::None => {}
            Release::UnrefObject => self.registry.objects.unref_object(self.address),
            Release::DisposeStruct => match self.registry.hooks_for(&self.origin).dispose {
                Some(dispose) => dispose(self),
                None => warn!(
                    compound = %self.origin.full_name(),
                    address = ?self.address,
                    "owned structure has no dispose hook"
                ),
            },
        }

        // A fresh handle for the same address may already own the entry
        match self.registry.cache.try_borrow_mut() {
            Ok(mut cache) => {
                cache.evict(self.address as usize, self as *const Self);
            }
            Err(_) => warn!(address = ?self.address, "identity cache busy during finalization"),
        }
    }
}

/// Creates, caches and unwraps compound handles
pub struct Registry {
    cache: RefCell<IdentityCache>,
    hooks: RefCell<NamespaceTable>,
    objects: Rc<dyn ObjectSystem>,
}

impl Registry {
    pub fn new(objects: Rc<dyn ObjectSystem>) -> Rc<Self> {
        Rc::new(Self {
            cache: RefCell::new(IdentityCache::default()),
            hooks: RefCell::new(NamespaceTable::default()),
            objects,
        })
    }

    #[inline]
    pub fn objects(&self) -> &dyn ObjectSystem {
        &*self.objects
    }

    pub fn register_hooks(&self, namespace: &str, name: &str, hooks: TypeHooks) {
        let previous = self.hooks.borrow_mut().insert(namespace, name, hooks);
        // Old hooks may capture handles; drop them outside the borrow
        drop(previous);
    }

    /// Hooks of the handle's type (empty when none are registered)
    pub fn hooks_for(&self, info: &BaseInfo) -> TypeHooks {
        self.hooks
            .borrow()
            .get(info.namespace(), info.name())
            .cloned()
            .unwrap_or_default()
    }

    /// Live handle for an address, if any
    pub fn cached(&self, address: *mut c_void) -> Option<Rc<CompoundHandle>> {
        self.cache.borrow().lookup(address as usize)
    }

    /// Number of live handles in the identity cache
    pub fn live_handles(&self) -> usize {
        self.cache.borrow().live()
    }

    /// Drop cache entries of finalized handles
    pub fn purge(&self) -> usize {
        self.cache.borrow_mut().purge()
    }

    /// Wrap a native address in a handle
    ///
    /// NULL yields `Value::Nil` unless `transfer` is CONTAINER, which
    /// allocates zeroed inline storage and writes its address back.
    ///
    /// # Safety
    /// A non-NULL `address` must point to a live instance of `info`, owned
    /// according to `transfer`.
    pub unsafe fn store(
        self: &Rc<Self>,
        info: &Rc<BaseInfo>,
        address: &mut *mut c_void,
        transfer: Transfer,
    ) -> BridgeResult<Value> {
        let kind = CompoundKind::of(info).ok_or_else(|| BridgeError::Unsupported(info.full_name()))?;

        let inline = if transfer == Transfer::Container {
            if kind != CompoundKind::Struct {
                return Err(BridgeError::InlineObject(info.full_name()));
            }
            let data = InlineData::zeroed(info.size())?;
            *address = data.ptr.as_ptr() as *mut c_void;
            Some(data)
        } else {
            if address.is_null() {
                return Ok(Value::Nil);
            }
            if let Some(existing) = self.cached(*address) {
                trace!(address = ?*address, compound = %info.full_name(), "identity cache hit");
                if transfer == Transfer::Everything {
                    self.adopt_surplus(&existing);
                }
                return Ok(Value::Compound(existing));
            }
            None
        };

        let handle = CompoundHandle {
            address: *address,
            ownership: Cell::new(Ownership::NotOwned),
            kind,
            origin: Rc::clone(info),
            inline,
            registry: Rc::clone(self),
        };

        let ownership = match acquisition(kind, transfer) {
            Acquisition::Keep if transfer == Transfer::Everything => Ownership::Owned,
            Acquisition::Keep => Ownership::NotOwned,
            Acquisition::RefObject => {
                self.objects.ref_object(handle.address);
                Ownership::Owned
            }
            Acquisition::StructHook => match self.hooks_for(info).acquire {
                Some(acquire) => {
                    acquire(&handle)?;
                    Ownership::Owned
                }
                None => Ownership::NotOwned,
            },
        };
        handle.ownership.set(ownership);

        log_handle_created(&info.full_name(), handle.address as *const u8, handle.owns());

        let handle = Rc::new(handle);
        let winner = self.cache.borrow_mut().insert(handle.address as usize, &handle);
        match winner {
            Some(winner) => {
                trace!(address = ?handle.address, "nested store won; finalizing candidate");
                drop(handle);
                Ok(Value::Compound(winner))
            }
            None => Ok(Value::Compound(handle)),
        }
    }

    /// Ownership handed over for an address that already has a live handle
    ///
    /// Objects drop the extra reference. A borrowed structure becomes owned
    /// so its dispose hook runs once at finalization; a structure that is
    /// already owned keeps its handle and nothing is released.
    fn adopt_surplus(&self, existing: &CompoundHandle) {
        match (existing.kind, existing.ownership()) {
            (CompoundKind::Object, _) => self.objects.unref_object(existing.address),
            (CompoundKind::Struct, Ownership::NotOwned) => {
                trace!(address = ?existing.address, "cached structure adopts ownership");
                existing.ownership.set(Ownership::Owned);
            }
            (CompoundKind::Struct, Ownership::Owned) => warn!(
                compound = %existing.origin.full_name(),
                address = ?existing.address,
                "structure handed over twice; keeping the owning handle"
            ),
        }
    }

    /// Native address of a handle, checked against `info`
    ///
    /// Objects are checked by runtime-type ancestry, everything else by
    /// `Namespace.Name`. A mismatch with `optional` set yields NULL.
    pub fn load(
        &self,
        value: &Value,
        position: usize,
        info: &BaseInfo,
        optional: bool,
    ) -> BridgeResult<*mut c_void> {
        let handle = match value {
            Value::Compound(handle) => handle,
            other if optional => {
                trace!(found = other.type_name(), "optional compound absent");
                return Ok(core::ptr::null_mut());
            }
            other => {
                return Err(BridgeError::type_mismatch(position, "compound", other.type_name()))
            }
        };

        let mismatch = match info.runtime_type().filter(|_| info.is_instance_type()) {
            Some(expected) => {
                let actual = match handle.kind {
                    CompoundKind::Object => self.objects.instance_type(handle.address),
                    CompoundKind::Struct => crate::descriptor::RuntimeType::INVALID,
                };
                (!self.objects.is_a(actual, expected)).then(|| self.objects.type_name(actual))
            }
            None => {
                let expected = info.full_name();
                let actual = handle.type_name();
                (actual != expected).then_some(actual)
            }
        };

        match mismatch {
            None => Ok(handle.address),
            Some(_) if optional => Ok(core::ptr::null_mut()),
            Some(actual) => Err(BridgeError::type_mismatch(position, &info.full_name(), &actual)),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("cache", &self.cache)
            .field("hooks", &self.hooks)
            .finish()
    }
}
