use std::collections::VecDeque;

use thiserror::Error;

use crate::{
  command::{
    CommandId,
    EditResult,
  },
  flags::CommandType,
  record::{
    RecordBackup,
    RecordHandle,
    RecordId,
  },
  registry::RecordRegistry,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("nothing to undo")]
  NothingToUndo,
  #[error("nothing to redo")]
  NothingToRedo,
  #[error("record {id} is no longer in the registry")]
  RecordGone { id: RecordId },
}

/// State needed to invert one command.
#[derive(Debug)]
pub enum HistoryChange {
  /// Records edited in place, with their state from before the edit.
  Metadata(Vec<(RecordHandle, RecordBackup)>),
  /// Records appended to the registry.
  Added(Vec<RecordHandle>),
  /// Records unlinked from the registry, with their former indices.
  Removed(Vec<(usize, RecordHandle)>),
}

/// One undoable step. Holds every record it references.
#[derive(Debug)]
pub struct HistoryItem {
  pub command_id:   CommandId,
  pub command_type: CommandType,
  pub change:       HistoryChange,
}

impl HistoryItem {
  pub fn new(command_id: CommandId, command_type: CommandType, change: HistoryChange) -> Self {
    Self {
      command_id,
      command_type,
      change,
    }
  }

  pub fn records(&self) -> Vec<RecordId> {
    match &self.change {
      HistoryChange::Metadata(backups) => backups.iter().map(|(record, _)| record.id()).collect(),
      HistoryChange::Added(records) => records.iter().map(|record| record.id()).collect(),
      HistoryChange::Removed(entries) => entries.iter().map(|(_, record)| record.id()).collect(),
    }
  }

  /// Checks that the item still applies to the registry as it is now.
  fn check(&self, registry: &RecordRegistry) -> Result<()> {
    if let HistoryChange::Added(records) = &self.change {
      if let Some(gone) = records
        .iter()
        .find(|record| registry.index_of(record).is_none())
      {
        return Err(HistoryError::RecordGone { id: gone.id() });
      }
    }
    Ok(())
  }

  /// Reverts the change and returns the item that reverts it back.
  fn revert(self, registry: &RecordRegistry) -> (HistoryItem, EditResult) {
    let Self {
      command_id,
      command_type,
      change,
    } = self;

    let (change, result) = match change {
      HistoryChange::Metadata(backups) => {
        let mut inverse = Vec::with_capacity(backups.len());
        for (record, backup) in backups {
          let current = record.backup();
          record.restore(&backup);
          inverse.push((record, current));
        }
        let records: Vec<RecordHandle> = inverse.iter().map(|(record, _)| record.clone()).collect();
        let result = EditResult::modified(command_id, command_type, &records, registry);
        (HistoryChange::Metadata(inverse), result)
      },
      HistoryChange::Added(records) => {
        let ids: Vec<RecordId> = records.iter().map(|record| record.id()).collect();
        drop(records);
        let removed = registry.remove_records(&ids);
        let result = EditResult {
          affected_indices: removed.iter().map(|(index, _)| *index).collect(),
          records_removed: ids,
          ..EditResult::empty(command_id, command_type)
        };
        (HistoryChange::Removed(removed), result)
      },
      HistoryChange::Removed(entries) => {
        let records: Vec<RecordHandle> = entries.iter().map(|(_, record)| record.clone()).collect();
        registry.insert(entries);
        let mut affected_indices: Vec<usize> = records
          .iter()
          .filter_map(|record| registry.index_of(record))
          .collect();
        affected_indices.sort_unstable();
        let result = EditResult {
          affected_indices,
          records_to_analyze: records.clone(),
          records_added: records.iter().map(|record| record.id()).collect(),
          ..EditResult::empty(command_id, command_type)
        };
        (HistoryChange::Added(records), result)
      },
    };

    (Self::new(command_id, command_type, change), result)
  }
}

/// Linear undo/redo stacks.
///
/// Recording a new item clears the redo stack. The undo stack keeps at most
/// `limit` items; the oldest are dropped first, releasing the records they
/// held.
#[derive(Debug)]
pub struct UndoRedoLedger {
  undo:  VecDeque<HistoryItem>,
  redo:  Vec<HistoryItem>,
  limit: usize,
}

impl Default for UndoRedoLedger {
  fn default() -> Self {
    Self::with_limit(DEFAULT_HISTORY_LIMIT)
  }
}

impl UndoRedoLedger {
  pub fn with_limit(limit: usize) -> Self {
    Self {
      undo:  VecDeque::new(),
      redo:  Vec::new(),
      limit: limit.max(1),
    }
  }

  pub fn record(&mut self, item: HistoryItem) {
    self.redo.clear();
    self.push_undo(item);
  }

  fn push_undo(&mut self, item: HistoryItem) {
    self.undo.push_back(item);
    while self.undo.len() > self.limit {
      if let Some(dropped) = self.undo.pop_front() {
        tracing::debug!(command = %dropped.command_id, "history limit reached, dropping oldest item");
      }
    }
  }

  pub fn undo(&mut self, registry: &RecordRegistry) -> Result<EditResult> {
    self
      .undo
      .back()
      .ok_or(HistoryError::NothingToUndo)?
      .check(registry)?;
    let Some(item) = self.undo.pop_back() else {
      return Err(HistoryError::NothingToUndo);
    };
    tracing::debug!(command = %item.command_id, command_type = ?item.command_type, "undo");

    let (inverse, result) = item.revert(registry);
    self.redo.push(inverse);
    Ok(result)
  }

  pub fn redo(&mut self, registry: &RecordRegistry) -> Result<EditResult> {
    self
      .redo
      .last()
      .ok_or(HistoryError::NothingToRedo)?
      .check(registry)?;
    let Some(item) = self.redo.pop() else {
      return Err(HistoryError::NothingToRedo);
    };
    tracing::debug!(command = %item.command_id, command_type = ?item.command_type, "redo");

    let (inverse, result) = item.revert(registry);
    self.push_undo(inverse);
    Ok(result)
  }

  #[inline]
  pub fn can_undo(&self) -> bool {
    !self.undo.is_empty()
  }

  #[inline]
  pub fn can_redo(&self) -> bool {
    !self.redo.is_empty()
  }

  /// Number of undoable items.
  pub fn len(&self) -> usize {
    self.undo.len()
  }

  pub fn is_empty(&self) -> bool {
    self.undo.is_empty()
  }

  pub fn redo_len(&self) -> usize {
    self.redo.len()
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn peek_undo(&self) -> Option<CommandType> {
    self.undo.back().map(|item| item.command_type)
  }

  pub fn last_command_id(&self) -> Option<CommandId> {
    self.undo.back().map(|item| item.command_id)
  }

  pub fn clear(&mut self) {
    self.undo.clear();
    self.redo.clear();
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use tagsmith_core::KeywordRules;

  use super::*;
  use crate::{
    command::{
      EditCommand,
      Snapshot,
    },
    flags::CombinedEditFlags,
    record::RecordKind,
  };

  fn registry_with(count: usize) -> RecordRegistry {
    let registry = RecordRegistry::new(Arc::new(KeywordRules::DEFAULT));
    let records = (0..count)
      .map(|n| {
        let record = registry.new_record(format!("/media/{n}.jpg"), RecordKind::image());
        record.init_as_empty();
        record
      })
      .collect();
    registry.append(records);
    registry
  }

  fn run(ledger: &mut UndoRedoLedger, registry: &RecordRegistry, id: u64, command: EditCommand) {
    let outcome = command.execute(CommandId::new(id), registry).unwrap();
    if let Some(item) = outcome.history {
      ledger.record(item);
    }
  }

  fn set_title(registry: &RecordRegistry, title: &str) -> EditCommand {
    EditCommand::CombinedEdit {
      snapshot:    Snapshot::selected(&registry.records()),
      flags:       CombinedEditFlags::EDIT_TITLE,
      title:       title.into(),
      description: String::new(),
      keywords:    Vec::new(),
    }
  }

  fn titles(registry: &RecordRegistry) -> Vec<String> {
    registry.records().iter().map(|record| record.title()).collect()
  }

  #[test]
  fn undo_restores_exact_state() {
    let registry = registry_with(2);
    let first = registry.get(0).unwrap();
    first.set_keywords(["b", "a"]);
    first.reset_modified();
    let before = first.backup();

    let mut ledger = UndoRedoLedger::default();
    run(&mut ledger, &registry, 1, set_title(&registry, "new"));
    run(
      &mut ledger,
      &registry,
      2,
      EditCommand::PasteKeywords {
        snapshot: Snapshot::selected(&registry.records()),
        keywords: vec!["c".into()],
      },
    );
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.peek_undo(), Some(CommandType::PasteKeywords));
    assert_eq!(ledger.last_command_id(), Some(CommandId::new(2)));

    ledger.undo(&registry).unwrap();
    let result = ledger.undo(&registry).unwrap();
    assert_eq!(result.affected_indices, vec![0, 1]);
    assert_eq!(first.backup(), before);
    assert!(matches!(ledger.undo(&registry), Err(HistoryError::NothingToUndo)));

    ledger.redo(&registry).unwrap();
    assert_eq!(titles(&registry), vec!["new", "new"]);
    assert!(first.is_modified());
    ledger.redo(&registry).unwrap();
    assert_eq!(first.keywords_string(), "b, a, c");
    assert!(matches!(ledger.redo(&registry), Err(HistoryError::NothingToRedo)));
  }

  #[test]
  fn new_item_clears_redo() {
    let registry = registry_with(1);
    let mut ledger = UndoRedoLedger::default();
    run(&mut ledger, &registry, 1, set_title(&registry, "one"));
    ledger.undo(&registry).unwrap();
    assert!(ledger.can_redo());

    run(&mut ledger, &registry, 2, set_title(&registry, "two"));
    assert!(!ledger.can_redo());
    assert_eq!(ledger.redo_len(), 0);
  }

  #[test]
  fn limit_drops_oldest_and_releases_records() {
    let registry = registry_with(1);
    let record = registry.get(0).unwrap();
    let mut ledger = UndoRedoLedger::with_limit(2);
    for (id, title) in ["a", "b", "c"].into_iter().enumerate() {
      run(&mut ledger, &registry, id as u64, set_title(&registry, title));
    }
    assert_eq!(ledger.len(), 2);
    // registry plus two history items
    assert_eq!(record.hold_count(), 3);

    ledger.undo(&registry).unwrap();
    ledger.undo(&registry).unwrap();
    assert_eq!(record.title(), "a");
    assert!(!ledger.can_undo());

    ledger.clear();
    assert_eq!(record.hold_count(), 1);
  }

  #[test]
  fn add_and_remove_records_round_trip() {
    let registry = registry_with(3);
    let mut ledger = UndoRedoLedger::default();

    run(&mut ledger, &registry, 1, EditCommand::RemoveRecords { indices: vec![0, 2] });
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.pending_finalization(), 2);

    let result = ledger.undo(&registry).unwrap();
    assert_eq!(result.affected_indices, vec![0, 2]);
    assert_eq!(result.records_added.len(), 2);
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.pending_finalization(), 0);

    let result = ledger.redo(&registry).unwrap();
    assert_eq!(result.records_removed.len(), 2);
    assert_eq!(registry.len(), 1);

    let added = registry.new_record("/media/new.jpg", RecordKind::image());
    run(&mut ledger, &registry, 2, EditCommand::AddRecords { records: vec![added] });
    assert_eq!(registry.len(), 2);
    ledger.undo(&registry).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.pending_finalization(), 3);
  }

  #[test]
  fn reverting_add_of_gone_record_fails() {
    let registry = registry_with(0);
    let mut ledger = UndoRedoLedger::default();
    let added = registry.new_record("/media/new.jpg", RecordKind::image());
    let id = added.id();
    run(&mut ledger, &registry, 1, EditCommand::AddRecords { records: vec![added] });

    let unlinked = registry.remove_records(&[id]);
    assert!(matches!(
      ledger.undo(&registry),
      Err(HistoryError::RecordGone { id: gone }) if gone == id
    ));
    assert!(ledger.can_undo());

    registry.insert(unlinked);
    ledger.undo(&registry).unwrap();
    assert!(registry.is_empty());
  }
}
