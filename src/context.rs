//! Marshaling context - owner of all shared bridge state
//!
//! One context per embedding: the metadata repository, the compound
//! registry (identity cache and hooks), the configuration and the libraries
//! opened for symbol resolution. Values created through a context keep the
//! registry alive on their own.

use crate::compound::{Registry, TypeHooks};
use crate::config::BridgeConfig;
use crate::descriptor::{BaseInfo, ConstantValue, InfoKind, MetadataRepository, Transfer};
use crate::error::{BridgeError, BridgeResult};
use crate::interop::{Library, NativeSlot, Scalar, Scratch};
use crate::logging::log_abort;
use crate::objects::ObjectSystem;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Result of `MarshalingContext::find`
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Rc<BaseInfo>),
    Missing(String),
}

impl Lookup {
    /// `[info]` or `[false, message]`
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Found(info) => vec![Value::Info(info)],
            Self::Missing(message) => vec![Value::Bool(false), Value::Str(message)],
        }
    }

    pub fn found(self) -> Option<Rc<BaseInfo>> {
        match self {
            Self::Found(info) => Some(info),
            Self::Missing(_) => None,
        }
    }
}

pub struct MarshalingContext {
    registry: Rc<Registry>,
    repository: Rc<dyn MetadataRepository>,
    config: BridgeConfig,
    libraries: RefCell<HashMap<String, Rc<Library>>>,
}

impl MarshalingContext {
    pub fn new(repository: Rc<dyn MetadataRepository>, objects: Rc<dyn ObjectSystem>) -> Self {
        Self::with_config(repository, objects, BridgeConfig::default())
    }

    pub fn with_config(
        repository: Rc<dyn MetadataRepository>,
        objects: Rc<dyn ObjectSystem>,
        config: BridgeConfig,
    ) -> Self {
        debug!(libraries = config.libraries.len(), "marshaling context created");
        Self {
            registry: Registry::new(objects),
            repository,
            config,
            libraries: RefCell::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    #[inline]
    pub fn objects(&self) -> &dyn ObjectSystem {
        self.registry.objects()
    }

    #[inline]
    pub fn repository(&self) -> &dyn MetadataRepository {
        &*self.repository
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register hooks for `namespace.name`
    pub fn register_hooks(&self, namespace: &str, name: &str, hooks: TypeHooks) {
        debug!(namespace = namespace, name = name, ?hooks, "hooks registered");
        self.registry.register_hooks(namespace, name, hooks);
    }

    /// Resolve a symbol, or a method of `container`, in `namespace`
    pub fn find(&self, namespace: &str, symbol: &str, container: Option<&str>) -> Lookup {
        debug!(namespace = namespace, symbol = symbol, container = ?container, "find");

        let info = self
            .repository
            .find_by_name(namespace, container.unwrap_or(symbol));
        let info = match container {
            Some(_) => info.and_then(|info| match info.kind() {
                InfoKind::Object(_) | InfoKind::Interface(_) | InfoKind::Struct(_) => {
                    info.find_method(symbol).cloned()
                }
                _ => None,
            }),
            None => info,
        };

        match info {
            Some(info) => Lookup::Found(info),
            None => Lookup::Missing(format!(
                "unable to resolve {}.{}{}{}",
                namespace,
                container.unwrap_or(""),
                if container.is_some() { ":" } else { "" },
                symbol
            )),
        }
    }

    /// Instantiate from a descriptor
    ///
    /// Functions bind, structures allocate a zeroed inline instance and
    /// constants yield their value. Other kinds produce nothing.
    ///
    /// # Safety
    /// Function descriptors must match the native symbols they resolve to.
    pub unsafe fn get(&self, info: &Rc<BaseInfo>) -> BridgeResult<Option<Value>> {
        debug!(info = %info.full_name(), "get");
        let result = match info.kind() {
            InfoKind::Function(_) => self.bind(info).map(|callable| Some(Value::Function(callable))),
            InfoKind::Struct(_) => {
                let mut address = core::ptr::null_mut();
                self.registry
                    .store(info, &mut address, Transfer::Container)
                    .map(Some)
            }
            InfoKind::Constant(constant) => {
                let mut slot = NativeSlot::null();
                let scalar = match &constant.value {
                    ConstantValue::Utf8(s) => {
                        slot.v_pointer = s.as_ptr() as *mut _;
                        None
                    }
                    ConstantValue::Int(v) => Some(Scalar::Int(*v)),
                    ConstantValue::UInt(v) => Some(Scalar::UInt(*v)),
                    ConstantValue::Double(v) => Some(Scalar::Float(*v)),
                };
                match (scalar, constant.ty.storage_kind()) {
                    (Some(scalar), Some(kind)) => {
                        kind.write(slot.as_mut_ptr(), &scalar, &mut Scratch::detached())
                            .and_then(|_| self.to_dynamic(&constant.ty, Transfer::Nothing, slot.as_mut_ptr()))
                    }
                    (Some(_), None) => Ok(None),
                    (None, _) => self.to_dynamic(&constant.ty, Transfer::Nothing, slot.as_mut_ptr()),
                }
            }
            _ => Ok(None),
        };
        result.map_err(|err| self.abort("get", err))
    }

    /// `Namespace.Container.Name`
    pub fn qualified_name(&self, info: &BaseInfo) -> String {
        self.repository.qualified_name(info)
    }

    /// String form of a value as the scripting side shows it
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Compound(handle) => handle.to_string(),
            Value::Function(callable) => callable.to_string(),
            other => format!("{other:?}"),
        }
    }

    /// Shared library for a namespace, opened once
    pub(crate) fn library_for(&self, namespace: &str) -> BridgeResult<Rc<Library>> {
        if let Some(library) = self.libraries.borrow().get(namespace) {
            return Ok(Rc::clone(library));
        }

        let path = self
            .config
            .library_for(namespace)
            .map(str::to_string)
            .or_else(|| self.repository.shared_library(namespace))
            .ok_or_else(|| BridgeError::Unresolved(format!("shared library of {namespace}")))?;

        debug!(namespace = namespace, library = %path, "loading library");
        let library = Rc::new(Library::load(&path)?);
        self.libraries
            .borrow_mut()
            .insert(namespace.to_string(), Rc::clone(&library));
        Ok(library)
    }

    /// Log an error at the point an operation aborts
    pub(crate) fn abort(&self, operation: &str, error: BridgeError) -> BridgeError {
        log_abort(operation, &error);
        error
    }
}

impl std::fmt::Debug for MarshalingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarshalingContext")
            .field("registry", &self.registry)
            .field("libraries", &self.libraries.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
