//! Native breakpoints shared between logical breakpoints.
//!
//! Logical breakpoints resolving to the same `file:line:column` key share one
//! native handle. The handle lives as long as at least one logical breakpoint
//! references it; ids are kept in registration order so hits are dispatched
//! in that order.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::inspector::{NativeBreakpointId, NativeTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeEntry {
    pub(crate) target: NativeTarget,
    pub(crate) native: NativeBreakpointId,
    pub(crate) actual_line: Option<u32>,
    pub(crate) breakpoints: Vec<SmolStr>,
}

#[derive(Debug, Default)]
pub(crate) struct InstalledBreakpoints {
    by_key: IndexMap<String, NativeEntry>,
    by_native: FxHashMap<NativeBreakpointId, String>,
}

impl InstalledBreakpoints {
    pub(crate) fn get(&self, key: &str) -> Option<&NativeEntry> {
        self.by_key.get(key)
    }

    /// Add another logical breakpoint to an existing handle.
    pub(crate) fn attach(&mut self, key: &str, id: SmolStr) -> Option<&NativeEntry> {
        let entry = self.by_key.get_mut(key)?;
        entry.breakpoints.push(id);
        Some(entry)
    }

    pub(crate) fn insert(
        &mut self,
        key: String,
        target: NativeTarget,
        native: NativeBreakpointId,
        actual_line: Option<u32>,
        id: SmolStr,
    ) {
        self.by_native.insert(native.clone(), key.clone());
        self.by_key.insert(
            key,
            NativeEntry {
                target,
                native,
                actual_line,
                breakpoints: vec![id],
            },
        );
    }

    /// Drop `id` from the handle at `key`. Returns the entry once its last
    /// reference is gone; the caller removes the native handle.
    pub(crate) fn detach(&mut self, key: &str, id: &str) -> Option<NativeEntry> {
        let entry = self.by_key.get_mut(key)?;
        entry.breakpoints.retain(|existing| existing != id);
        if !entry.breakpoints.is_empty() {
            return None;
        }
        let entry = self.by_key.shift_remove(key)?;
        self.by_native.remove(&entry.native);
        Some(entry)
    }

    /// Logical breakpoints attached to a native handle, in registration order.
    pub(crate) fn breakpoints_for(&self, native: &NativeBreakpointId) -> &[SmolStr] {
        self.by_native
            .get(native)
            .and_then(|key| self.by_key.get(key))
            .map_or(&[][..], |entry| entry.breakpoints.as_slice())
    }

    /// Point `key` at a new native handle (after a session reset).
    pub(crate) fn rebind(&mut self, key: &str, native: NativeBreakpointId) {
        let Some(entry) = self.by_key.get_mut(key) else {
            return;
        };
        self.by_native.remove(&entry.native);
        self.by_native.insert(native.clone(), key.to_string());
        entry.native = native;
    }

    /// Forget a handle entirely, returning its entry.
    pub(crate) fn remove(&mut self, key: &str) -> Option<NativeEntry> {
        let entry = self.by_key.shift_remove(key)?;
        self.by_native.remove(&entry.native);
        Some(entry)
    }

    pub(crate) fn targets(&self) -> Vec<(String, NativeTarget)> {
        self.by_key
            .iter()
            .map(|(key, entry)| (key.clone(), entry.target.clone()))
            .collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<NativeEntry> {
        self.by_native.clear();
        self.by_key.drain(..).map(|(_, entry)| entry).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::ScriptTarget;

    fn target() -> NativeTarget {
        NativeTarget {
            script: ScriptTarget::Path("/app/a.js".into()),
            line: 3,
            column: 1,
        }
    }

    #[test]
    fn handle_survives_until_last_reference() {
        let mut installed = InstalledBreakpoints::default();
        let native = NativeBreakpointId("n1".into());
        installed.insert("/app/a.js:3:1".into(), target(), native.clone(), None, "b1".into());
        installed.attach("/app/a.js:3:1", "b2".into());
        assert_eq!(installed.breakpoints_for(&native), ["b1", "b2"]);

        assert!(installed.detach("/app/a.js:3:1", "b1").is_none());
        assert_eq!(installed.len(), 1);
        let entry = installed.detach("/app/a.js:3:1", "b2").unwrap();
        assert_eq!(entry.native, native);
        assert_eq!(installed.len(), 0);
        assert!(installed.breakpoints_for(&native).is_empty());
    }

    #[test]
    fn rebind_moves_the_native_lookup() {
        let mut installed = InstalledBreakpoints::default();
        let old = NativeBreakpointId("n1".into());
        let new = NativeBreakpointId("n2".into());
        installed.insert("k".into(), target(), old.clone(), None, "b1".into());
        installed.rebind("k", new.clone());
        assert!(installed.breakpoints_for(&old).is_empty());
        assert_eq!(installed.breakpoints_for(&new), ["b1"]);
    }
}
