use std::{collections::BTreeMap, sync::Arc};

use starkforge_common::{ClassHash, Felt};

/// Storage of a single deployed contract.
///
/// Committed storage is shared between forks and only cloned when a fork
/// commits on top of it; writes land in the pending tree.
#[derive(Clone, Debug)]
pub struct ContractStorage {
    class_hash: ClassHash,
    committed: Arc<BTreeMap<Felt, Felt>>,
    pending: BTreeMap<Felt, Felt>,
}

impl ContractStorage {
    pub fn new(class_hash: ClassHash) -> Self {
        Self {
            class_hash,
            committed: Arc::default(),
            pending: BTreeMap::new(),
        }
    }

    pub fn class_hash(&self) -> ClassHash {
        self.class_hash
    }

    pub fn read(&self, key: Felt) -> Felt {
        self.pending
            .get(&key)
            .or_else(|| self.committed.get(&key))
            .copied()
            .unwrap_or_default()
    }

    pub fn write(&mut self, key: Felt, value: Felt) {
        self.pending.insert(key, value);
    }

    pub fn apply_updates(&mut self, updates: BTreeMap<Felt, Felt>) {
        self.pending.extend(updates);
    }

    pub fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        Arc::make_mut(&mut self.committed).extend(pending);
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn view(&self) -> StorageView<'_> {
        StorageView {
            storage: self,
            read_modifications: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    fn shares_committed_with(&self, other: &ContractStorage) -> bool {
        Arc::ptr_eq(&self.committed, &other.committed)
    }
}

/// Read-only view over committed storage merged with pending writes,
/// recording every value it reads.
#[derive(Debug)]
pub struct StorageView<'a> {
    storage: &'a ContractStorage,
    read_modifications: BTreeMap<Felt, Felt>,
}

impl StorageView<'_> {
    pub fn read(&mut self, key: Felt) -> Felt {
        let value = self.storage.read(key);
        self.read_modifications.insert(key, value);
        value
    }

    /// Values read through this view, keyed by storage address.
    pub fn into_read_modifications(self) -> BTreeMap<Felt, Felt> {
        self.read_modifications
    }
}
