use crate::*;
use std::collections::BTreeMap;

/// A key-value view of the ledger state
pub trait Snapshot {
    /// Get the value stored under a key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store a value under a key, replacing any previous value
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
}

/// A simple snapshot that uses an in-memory BTreeMap
#[derive(Default, Clone, Debug)]
pub struct MemSnapshot {
    inner: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemSnapshot {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.inner.keys()
    }
}

impl Snapshot for MemSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.inner.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.remove(key);
        Ok(())
    }
}

/// A write buffer over a read-only snapshot.
///
/// Reads see the buffered writes first. Nothing reaches the underlying snapshot
/// until the changes are applied.
pub struct Overlay<'a> {
    base: &'a dyn Snapshot,
    changes: Changes,
}

/// Buffered writes, `None` marking a deletion
#[derive(Default, Debug, Clone)]
pub struct Changes(BTreeMap<Vec<u8>, Option<Vec<u8>>>);

impl<'a> Overlay<'a> {
    pub fn new(base: &'a dyn Snapshot) -> Self {
        Overlay {
            base,
            changes: Changes::default(),
        }
    }

    pub fn into_changes(self) -> Changes {
        self.changes
    }
}

impl<'a> Snapshot for Overlay<'a> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.changes.0.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.changes.0.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.changes.0.insert(key.to_vec(), None);
        Ok(())
    }
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write every buffered change to `target`
    pub fn apply(self, target: &mut dyn Snapshot) -> Result<(), StoreError> {
        for (key, value) in self.0 {
            match value {
                Some(value) => target.set(&key, value)?,
                None => target.delete(&key)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_buffers_writes() {
        let mut snapshot = MemSnapshot::default();
        snapshot.set(b"a", b"1".to_vec()).unwrap();
        snapshot.set(b"b", b"2".to_vec()).unwrap();

        let changes = {
            let mut overlay = Overlay::new(&snapshot);
            overlay.set(b"a", b"10".to_vec()).unwrap();
            overlay.delete(b"b").unwrap();
            overlay.set(b"c", b"3".to_vec()).unwrap();

            assert_eq!(overlay.get(b"a").unwrap(), Some(b"10".to_vec()));
            assert_eq!(overlay.get(b"b").unwrap(), None);
            assert_eq!(overlay.get(b"c").unwrap(), Some(b"3".to_vec()));
            overlay.into_changes()
        };

        // Untouched until applied
        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(snapshot.get(b"c").unwrap(), None);

        changes.apply(&mut snapshot).unwrap();
        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"10".to_vec()));
        assert_eq!(snapshot.get(b"b").unwrap(), None);
        assert_eq!(snapshot.get(b"c").unwrap(), Some(b"3".to_vec()));
        assert_eq!(snapshot.len(), 2);
    }
}
