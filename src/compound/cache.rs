//! Identity cache: native address -> live handle
//!
//! Values are weak, so the cache never keeps a handle alive. Entries whose
//! handle is gone read as absent.

use super::CompoundHandle;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Debug, Default)]
pub(crate) struct IdentityCache {
    entries: HashMap<usize, Weak<CompoundHandle>>,
}

impl IdentityCache {
    pub fn lookup(&self, address: usize) -> Option<Rc<CompoundHandle>> {
        self.entries.get(&address).and_then(Weak::upgrade)
    }

    /// Insert `handle` unless a live handle already owns the address
    ///
    /// Returns the live handle that won, if it was not `handle`.
    pub fn insert(&mut self, address: usize, handle: &Rc<CompoundHandle>) -> Option<Rc<CompoundHandle>> {
        if let Some(existing) = self.lookup(address) {
            if !Rc::ptr_eq(&existing, handle) {
                return Some(existing);
            }
        }
        self.entries.insert(address, Rc::downgrade(handle));
        None
    }

    /// Remove the entry only if it still refers to `dying`
    pub fn evict(&mut self, address: usize, dying: *const CompoundHandle) -> bool {
        match self.entries.get(&address) {
            Some(entry) if Weak::as_ptr(entry) == dying => {
                self.entries.remove(&address);
                true
            }
            _ => false,
        }
    }

    /// Number of entries with a live handle
    pub fn live(&self) -> usize {
        self.entries.values().filter(|entry| entry.strong_count() > 0).count()
    }

    /// Drop entries whose handle is gone
    pub fn purge(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.strong_count() > 0);
        before - self.entries.len()
    }
}
