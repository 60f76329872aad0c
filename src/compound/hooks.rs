//! Per-type hooks registered in the namespace table

use super::CompoundHandle;
use crate::context::MarshalingContext;
use crate::error::BridgeResult;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Takes ownership of a structure received with NOTHING transfer
pub type AcquireHook = Rc<dyn Fn(&CompoundHandle) -> BridgeResult<()>>;

/// Releases an owned structure
pub type DisposeHook = Rc<dyn Fn(&CompoundHandle)>;

/// Reads an element the descriptor does not know
pub type IndexHook = Rc<dyn Fn(&MarshalingContext, &Rc<CompoundHandle>, &str) -> BridgeResult<Value>>;

/// Writes an element the descriptor does not know
pub type NewIndexHook =
    Rc<dyn Fn(&MarshalingContext, &Rc<CompoundHandle>, &str, Value) -> BridgeResult<()>>;

#[derive(Clone, Default)]
pub struct TypeHooks {
    pub acquire: Option<AcquireHook>,
    pub dispose: Option<DisposeHook>,
    pub index: Option<IndexHook>,
    pub newindex: Option<NewIndexHook>,
}

impl TypeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_acquire(mut self, hook: impl Fn(&CompoundHandle) -> BridgeResult<()> + 'static) -> Self {
        self.acquire = Some(Rc::new(hook));
        self
    }

    pub fn on_dispose(mut self, hook: impl Fn(&CompoundHandle) + 'static) -> Self {
        self.dispose = Some(Rc::new(hook));
        self
    }

    pub fn on_index(
        mut self,
        hook: impl Fn(&MarshalingContext, &Rc<CompoundHandle>, &str) -> BridgeResult<Value> + 'static,
    ) -> Self {
        self.index = Some(Rc::new(hook));
        self
    }

    pub fn on_newindex(
        mut self,
        hook: impl Fn(&MarshalingContext, &Rc<CompoundHandle>, &str, Value) -> BridgeResult<()> + 'static,
    ) -> Self {
        self.newindex = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for TypeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHooks")
            .field("acquire", &self.acquire.is_some())
            .field("dispose", &self.dispose.is_some())
            .field("index", &self.index.is_some())
            .field("newindex", &self.newindex.is_some())
            .finish()
    }
}

/// Hooks keyed by namespace, then type name
#[derive(Debug, Default)]
pub(crate) struct NamespaceTable {
    namespaces: HashMap<String, HashMap<String, TypeHooks>>,
}

impl NamespaceTable {
    pub fn get(&self, namespace: &str, name: &str) -> Option<&TypeHooks> {
        self.namespaces.get(namespace).and_then(|types| types.get(name))
    }

    /// Returns the hooks previously registered for the type
    pub fn insert(&mut self, namespace: &str, name: &str, hooks: TypeHooks) -> Option<TypeHooks> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), hooks)
    }
}
