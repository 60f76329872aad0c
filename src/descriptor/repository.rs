//! Metadata repository lookup
//!
//! The repository is an external, read-only catalog. `Catalog` is the
//! in-memory implementation used by embedders that describe their native
//! types directly.

use super::BaseInfo;
use std::collections::HashMap;
use std::rc::Rc;

/// Read-only source of type descriptors
pub trait MetadataRepository {
    /// Look up a top-level entry of a namespace
    fn find_by_name(&self, namespace: &str, name: &str) -> Option<Rc<BaseInfo>>;

    /// Shared library exporting the namespace's symbols
    fn shared_library(&self, _namespace: &str) -> Option<String> {
        None
    }

    /// Entry that contains `info` (the owning type of a method)
    fn container_of(&self, info: &BaseInfo) -> Option<Rc<BaseInfo>> {
        info.container_name()
            .and_then(|container| self.find_by_name(info.namespace(), container))
    }

    /// `Namespace.Container.Name`, following the container chain outward
    fn qualified_name(&self, info: &BaseInfo) -> String {
        let mut parts = vec![info.name().to_string()];
        let mut current = self.container_of(info);
        while let Some(container) = current {
            parts.push(container.name().to_string());
            current = self.container_of(&container);
        }
        parts.push(info.namespace().to_string());
        parts.reverse();
        parts.join(".")
    }
}

#[derive(Debug, Default)]
struct Namespace {
    entries: HashMap<String, Rc<BaseInfo>>,
    library: Option<String>,
}

/// In-memory metadata repository
#[derive(Debug, Default)]
pub struct Catalog {
    namespaces: HashMap<String, Namespace>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry, returning the shared descriptor
    pub fn insert(&mut self, info: BaseInfo) -> Rc<BaseInfo> {
        let info = Rc::new(info);
        self.insert_rc(Rc::clone(&info));
        info
    }

    /// Register an already shared descriptor (replaces an entry of the same name)
    pub fn insert_rc(&mut self, info: Rc<BaseInfo>) {
        self.namespaces
            .entry(info.namespace().to_string())
            .or_default()
            .entries
            .insert(info.name().to_string(), info);
    }

    pub fn set_shared_library(&mut self, namespace: &str, library: impl Into<String>) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .library = Some(library.into());
    }

    pub fn len(&self) -> usize {
        self.namespaces.values().map(|ns| ns.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataRepository for Catalog {
    fn find_by_name(&self, namespace: &str, name: &str) -> Option<Rc<BaseInfo>> {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(name))
            .cloned()
    }

    fn shared_library(&self, namespace: &str) -> Option<String> {
        self.namespaces.get(namespace).and_then(|ns| ns.library.clone())
    }
}
