//! Two-generation table of in-flight work, keyed by merkle root.
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use pd_core::types::TrackedWork;

struct Tables {
    current: DashMap<String, Mutex<TrackedWork>>,
    previous: DashMap<String, Mutex<TrackedWork>>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            current: DashMap::new(),
            previous: DashMap::new(),
        }
    }
}

/// Tracks every template handed out to a miner so submitted shares can be
/// checked against it. When a new block appears, [`WorkTable::rotate`]
/// demotes the current generation to "previous" rather than discarding
/// it outright, giving in-flight shares for the old block one more round
/// to land before they're rejected as stale.
pub struct WorkTable {
    tables: RwLock<Tables>,
}

impl WorkTable {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn track(&self, merkle_root: String, tracked: TrackedWork) {
        self.tables.read().current.insert(merkle_root, Mutex::new(tracked));
    }

    /// Demotes the current generation to previous and starts a fresh one.
    pub fn rotate(&self) {
        let mut tables = self.tables.write();
        tables.previous = std::mem::take(&mut tables.current);
    }

    /// Looks up tracked work by merkle root, checking the current
    /// generation first and falling back to the previous one. A hit in
    /// the previous generation marks the entry `possibly_stale` (sticky:
    /// future lookups will see it too) before invoking `f`.
    pub fn with_tracked<R>(
        &self,
        merkle_root: &str,
        f: impl FnOnce(&mut TrackedWork) -> R,
    ) -> Option<R> {
        let tables = self.tables.read();

        if let Some(entry) = tables.current.get(merkle_root) {
            let mut guard = entry.lock();
            return Some(f(&mut guard));
        }

        if let Some(entry) = tables.previous.get(merkle_root) {
            let mut guard = entry.lock();
            guard.possibly_stale = true;
            return Some(f(&mut guard));
        }

        None
    }
}

impl Default for WorkTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_in_previous_generation_marks_stale() {
        let table = WorkTable::new();
        table.track("root".into(), TrackedWork::new(&"0".repeat(256), "alice".into()));
        table.rotate();

        let stale = table.with_tracked("root", |w| w.possibly_stale).unwrap();
        assert!(stale);
    }

    #[test]
    fn rotate_twice_drops_the_oldest_generation() {
        let table = WorkTable::new();
        table.track("root".into(), TrackedWork::new(&"0".repeat(256), "alice".into()));
        table.rotate();
        table.rotate();

        assert!(table.with_tracked("root", |_| ()).is_none());
    }
}
