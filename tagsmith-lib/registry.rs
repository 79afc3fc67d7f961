//! Ordered list of live records plus the records waiting for finalization.
//!
//! Removing a record only unlinks it: the registry hands its own hold unit
//! over to the returned [`RecordHandle`] and parks the record in a pending
//! list. [`RecordRegistry::collect_garbage`] finalizes pending records once
//! nothing holds them anymore.

use std::{
  num::NonZeroUsize,
  ops::Range,
  path::PathBuf,
  sync::{
    Arc,
    atomic::{
      AtomicUsize,
      Ordering,
    },
  },
};

use parking_lot::{
  Mutex,
  RwLock,
};
use tagsmith_core::KeywordRules;

use crate::record::{
  MetadataRecord,
  RecordHandle,
  RecordId,
  RecordKind,
};

#[derive(Debug)]
pub struct RecordRegistry {
  records: RwLock<Vec<Arc<MetadataRecord>>>,
  pending: Mutex<Vec<Arc<MetadataRecord>>>,
  next_id: AtomicUsize,
  rules:   Arc<KeywordRules>,
}

impl RecordRegistry {
  pub fn new(rules: Arc<KeywordRules>) -> Self {
    Self {
      records: RwLock::new(Vec::new()),
      pending: Mutex::new(Vec::new()),
      next_id: AtomicUsize::new(1),
      rules,
    }
  }

  pub fn rules(&self) -> &Arc<KeywordRules> {
    &self.rules
  }

  /// Creates a record with a fresh id. The record is not inserted.
  pub fn new_record(&self, file_path: impl Into<PathBuf>, kind: RecordKind) -> Arc<MetadataRecord> {
    let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
    let id = RecordId::new(NonZeroUsize::new(raw).unwrap_or(NonZeroUsize::MIN));
    Arc::new(MetadataRecord::new(
      id,
      file_path,
      kind,
      Arc::clone(&self.rules),
    ))
  }

  pub fn len(&self) -> usize {
    self.records.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.read().is_empty()
  }

  pub fn get(&self, index: usize) -> Option<Arc<MetadataRecord>> {
    self.records.read().get(index).cloned()
  }

  pub fn records(&self) -> Vec<Arc<MetadataRecord>> {
    self.records.read().clone()
  }

  pub fn find(&self, id: RecordId) -> Option<Arc<MetadataRecord>> {
    let index = self.position(id)?;
    self.get(index)
  }

  pub fn position(&self, id: RecordId) -> Option<usize> {
    self
      .records
      .read()
      .iter()
      .position(|record| record.id() == id)
  }

  /// Current index of `record`, checking its cached index first.
  pub fn index_of(&self, record: &MetadataRecord) -> Option<usize> {
    let records = self.records.read();
    let hint = record.last_known_index();
    if records.get(hint).is_some_and(|at| at.id() == record.id()) {
      return Some(hint);
    }
    records.iter().position(|at| at.id() == record.id())
  }

  /// Rewrites every record's cached index.
  pub fn refresh_indices(&self) {
    for (index, record) in self.records.read().iter().enumerate() {
      record.set_last_known_index(index);
    }
  }

  /// Appends freshly created records. Each keeps the hold unit it was
  /// created with, now owned by the registry.
  pub fn append(&self, new_records: Vec<Arc<MetadataRecord>>) -> Range<usize> {
    let mut records = self.records.write();
    let start = records.len();
    for record in new_records {
      record.set_last_known_index(records.len());
      records.push(record);
    }
    start..records.len()
  }

  /// Unlinks the records at `indices`. Returns `(former index, handle)`
  /// pairs in ascending index order; out of range indices are ignored.
  pub fn remove_at(&self, indices: &[usize]) -> Vec<(usize, RecordHandle)> {
    let mut indices = indices.to_vec();
    indices.sort_unstable();
    indices.dedup();

    let mut removed = Vec::with_capacity(indices.len());
    {
      let mut records = self.records.write();
      for &index in indices.iter().rev() {
        if index >= records.len() {
          continue;
        }
        let record = records.remove(index);
        removed.push((index, self.unlink(record)));
      }
      for (index, record) in records.iter().enumerate() {
        record.set_last_known_index(index);
      }
    }
    removed.reverse();
    removed
  }

  pub fn remove_records(&self, ids: &[RecordId]) -> Vec<(usize, RecordHandle)> {
    let indices: Vec<usize> = {
      let records = self.records.read();
      records
        .iter()
        .enumerate()
        .filter(|(_, record)| ids.contains(&record.id()))
        .map(|(index, _)| index)
        .collect()
    };
    self.remove_at(&indices)
  }

  fn unlink(&self, record: Arc<MetadataRecord>) -> RecordHandle {
    let handle = RecordHandle::new(&record);
    record.release();
    record.set_removed(true);
    tracing::debug!(record = %record.id(), "record unlinked");
    self.pending.lock().push(record);
    handle
  }

  /// Re-links records at their former positions, in ascending index order.
  pub fn insert(&self, entries: Vec<(usize, RecordHandle)>) -> Range<usize> {
    let mut entries = entries;
    entries.sort_by_key(|(index, _)| *index);

    let mut records = self.records.write();
    let mut pending = self.pending.lock();
    let start = entries.first().map_or(records.len(), |(index, _)| (*index).min(records.len()));
    let mut end = start;
    for (index, handle) in entries {
      let record = Arc::clone(handle.record());
      record.acquire();
      record.set_removed(false);
      pending.retain(|other| !Arc::ptr_eq(other, &record));

      let index = index.min(records.len());
      records.insert(index, record);
      end = end.max(index + 1);
    }
    for (index, record) in records.iter().enumerate() {
      record.set_last_known_index(index);
    }
    start..end
  }

  pub fn pending_finalization(&self) -> usize {
    self.pending.lock().len()
  }

  /// Finalizes unlinked records nobody holds anymore.
  pub fn collect_garbage(&self) -> Vec<RecordId> {
    let mut finalized = Vec::new();
    self.pending.lock().retain(|record| {
      if record.hold_count() > 0 {
        return true;
      }
      finalized.push(record.id());
      false
    });
    if !finalized.is_empty() {
      tracing::debug!(count = finalized.len(), "finalized records");
    }
    finalized
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn registry_with(count: usize) -> RecordRegistry {
    let registry = RecordRegistry::new(Arc::new(KeywordRules::DEFAULT));
    let records = (0..count)
      .map(|n| registry.new_record(format!("/media/{n}.jpg"), RecordKind::image()))
      .collect();
    registry.append(records);
    registry
  }

  fn ids(registry: &RecordRegistry) -> Vec<usize> {
    registry
      .records()
      .iter()
      .map(|record| record.id().get().get())
      .collect()
  }

  #[test]
  fn ids_are_unique_and_positions_resolve() {
    let registry = registry_with(3);
    assert_eq!(ids(&registry), vec![1, 2, 3]);
    let third = registry.get(2).unwrap();
    assert_eq!(registry.position(third.id()), Some(2));
    assert_eq!(registry.find(third.id()).unwrap().file_path(), third.file_path());
  }

  #[test]
  fn removal_hands_hold_to_handle() {
    let registry = registry_with(4);
    let removed = registry.remove_at(&[2, 0, 9, 2]);
    assert_eq!(
      removed.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
      vec![0, 2]
    );
    assert_eq!(ids(&registry), vec![2, 4]);
    assert_eq!(registry.pending_finalization(), 2);

    for (_, handle) in &removed {
      assert!(handle.is_removed());
      assert_eq!(handle.hold_count(), 1);
    }
    assert!(registry.collect_garbage().is_empty());

    let second = registry.get(1).unwrap();
    assert_eq!(registry.index_of(&second), Some(1));
    assert_eq!(registry.index_of(&removed[1].1), None);

    drop(removed);
    let mut finalized = registry.collect_garbage();
    finalized.sort();
    assert_eq!(
      finalized
        .iter()
        .map(|id| id.get().get())
        .collect::<Vec<_>>(),
      vec![1, 3]
    );
    assert_eq!(registry.pending_finalization(), 0);
  }

  #[test]
  fn reinsert_restores_positions() {
    let registry = registry_with(4);
    let removed = registry.remove_at(&[1, 3]);
    assert_eq!(ids(&registry), vec![1, 3]);

    let range = registry.insert(removed);
    assert_eq!(range, 1..4);
    assert_eq!(ids(&registry), vec![1, 2, 3, 4]);
    assert_eq!(registry.pending_finalization(), 0);
    for record in registry.records() {
      assert!(!record.is_removed());
      assert_eq!(record.hold_count(), 1);
    }
  }

  #[test]
  fn remove_by_id() {
    let registry = registry_with(3);
    let target = registry.get(1).unwrap().id();
    let removed = registry.remove_records(&[target]);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].0, 1);
    assert_eq!(registry.position(target), None);
  }
}
