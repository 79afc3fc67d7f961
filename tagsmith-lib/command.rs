//! Edit commands.
//!
//! A command runs synchronously against the records it names. Records are
//! processed one after another and each record's field locks are only held
//! for that record's own mutation. A record that cannot be edited is skipped
//! and left out of the result; the batch itself never fails halfway.
//!
//! Before touching a record the command takes a [`RecordBackup`]. Backups of
//! records that turn out unchanged are dropped, the rest become the
//! [`HistoryItem`] that undoes the command.

use std::{
  fmt,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  flags::{
    CombinedEditFlags,
    CommandType,
    SearchFlags,
  },
  history::{
    HistoryChange,
    HistoryItem,
  },
  keywords::KeywordFilter,
  record::{
    MetadataRecord,
    RecordBackup,
    RecordHandle,
    RecordId,
  },
  registry::RecordRegistry,
};

pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
  #[error("record {id} is no longer in the registry")]
  RecordRemoved { id: RecordId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for CommandId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone)]
pub struct SnapshotItem {
  pub record:   RecordHandle,
  pub selected: bool,
}

/// Records a command operates on, held for as long as the command lives.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
  items: Vec<SnapshotItem>,
}

impl Snapshot {
  /// Captures the records with their current selection state.
  pub fn new<'a>(records: impl IntoIterator<Item = &'a Arc<MetadataRecord>>) -> Self {
    let items = records
      .into_iter()
      .map(|record| {
        SnapshotItem {
          record:   RecordHandle::new(record),
          selected: record.is_selected(),
        }
      })
      .collect();
    Self { items }
  }

  /// Captures the records, all marked selected.
  pub fn selected<'a>(records: impl IntoIterator<Item = &'a Arc<MetadataRecord>>) -> Self {
    let items = records
      .into_iter()
      .map(|record| {
        SnapshotItem {
          record:   RecordHandle::new(record),
          selected: true,
        }
      })
      .collect();
    Self { items }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, SnapshotItem> {
    self.items.iter()
  }
}

#[derive(Debug, Clone)]
pub enum EditCommand {
  CombinedEdit {
    snapshot:    Snapshot,
    flags:       CombinedEditFlags,
    title:       String,
    description: String,
    keywords:    Vec<String>,
  },
  FindAndReplace {
    snapshot: Snapshot,
    from:     String,
    to:       String,
    flags:    SearchFlags,
  },
  DeleteKeywords {
    snapshot:       Snapshot,
    keywords:       Vec<String>,
    case_sensitive: bool,
  },
  PasteKeywords {
    snapshot: Snapshot,
    keywords: Vec<String>,
  },
  ExpandPreset {
    record:        RecordHandle,
    keyword_index: Option<usize>,
    preset:        Vec<String>,
  },
  AddRecords {
    records: Vec<Arc<MetadataRecord>>,
  },
  RemoveRecords {
    indices: Vec<usize>,
  },
}

/// What a command (or an undo/redo) did, for the caller to act on once every
/// lock is released.
#[derive(Debug, Clone)]
pub struct EditResult {
  pub command_id:         CommandId,
  pub command_type:       CommandType,
  /// Current registry indices of the changed records.
  pub affected_indices:   Vec<usize>,
  pub records_to_persist: Vec<RecordHandle>,
  pub records_to_analyze: Vec<RecordHandle>,
  pub records_added:      Vec<RecordId>,
  pub records_removed:    Vec<RecordId>,
}

impl EditResult {
  pub fn empty(command_id: CommandId, command_type: CommandType) -> Self {
    Self {
      command_id,
      command_type,
      affected_indices: Vec::new(),
      records_to_persist: Vec::new(),
      records_to_analyze: Vec::new(),
      records_added: Vec::new(),
      records_removed: Vec::new(),
    }
  }

  /// Result for records whose metadata changed in place.
  pub(crate) fn modified(
    command_id: CommandId,
    command_type: CommandType,
    records: &[RecordHandle],
    registry: &RecordRegistry,
  ) -> Self {
    let mut affected_indices: Vec<usize> = records
      .iter()
      .filter_map(|record| registry.index_of(record))
      .collect();
    affected_indices.sort_unstable();
    Self {
      affected_indices,
      records_to_persist: records.to_vec(),
      records_to_analyze: records.to_vec(),
      ..Self::empty(command_id, command_type)
    }
  }

  pub fn is_empty(&self) -> bool {
    self.affected_indices.is_empty()
      && self.records_added.is_empty()
      && self.records_removed.is_empty()
  }
}

#[derive(Debug)]
pub struct CommandOutcome {
  pub result:  EditResult,
  /// `None` when nothing changed.
  pub history: Option<HistoryItem>,
}

impl EditCommand {
  pub fn command_type(&self) -> CommandType {
    match self {
      Self::CombinedEdit { .. } => CommandType::CombinedEdit,
      Self::FindAndReplace { .. } => CommandType::FindAndReplace,
      Self::DeleteKeywords { .. } => CommandType::DeleteKeywords,
      Self::PasteKeywords { .. } => CommandType::PasteKeywords,
      Self::ExpandPreset { .. } => CommandType::ExpandPreset,
      Self::AddRecords { .. } => CommandType::AddRecords,
      Self::RemoveRecords { .. } => CommandType::RemoveRecords,
    }
  }

  pub fn execute(self, id: CommandId, registry: &RecordRegistry) -> Result<CommandOutcome> {
    let command_type = self.command_type();
    tracing::debug!(command = %id, ?command_type, "executing command");

    match self {
      Self::CombinedEdit {
        snapshot,
        flags,
        title,
        description,
        keywords,
      } => {
        let backups = modify_each(snapshot.iter().map(|item| &item.record), |record| {
          combined_edit(record, flags, &title, &description, &keywords)
        });
        Ok(modified_outcome(id, command_type, backups, registry))
      },
      Self::FindAndReplace {
        snapshot,
        from,
        to,
        flags,
      } => {
        let selected = snapshot
          .iter()
          .filter(|item| item.selected)
          .map(|item| &item.record);
        let backups = modify_each(selected, |record| {
          let changed = record.replace(&from, &to, flags);
          if !changed {
            tracing::debug!(record = %record.id(), %from, %to, "replace left record unchanged");
          }
          changed
        });
        Ok(modified_outcome(id, command_type, backups, registry))
      },
      Self::DeleteKeywords {
        snapshot,
        keywords,
        case_sensitive,
      } => {
        let filter = KeywordFilter::new(&keywords, case_sensitive);
        let backups = modify_each(snapshot.iter().map(|item| &item.record), |record| {
          record.remove_keywords(&filter)
        });
        Ok(modified_outcome(id, command_type, backups, registry))
      },
      Self::PasteKeywords { snapshot, keywords } => {
        let backups = modify_each(snapshot.iter().map(|item| &item.record), |record| {
          record.append_keywords(&keywords) > 0
        });
        Ok(modified_outcome(id, command_type, backups, registry))
      },
      Self::ExpandPreset {
        record,
        keyword_index,
        preset,
      } => {
        if record.is_removed() {
          return Err(CommandError::RecordRemoved { id: record.id() });
        }
        let backups = modify_each(std::iter::once(&record), |record| {
          record.expand_preset(keyword_index, &preset)
        });
        Ok(modified_outcome(id, command_type, backups, registry))
      },
      Self::AddRecords { records } => {
        let handles: Vec<RecordHandle> = records.iter().map(RecordHandle::new).collect();
        let range = registry.append(records);
        if range.is_empty() {
          return Ok(CommandOutcome {
            result:  EditResult::empty(id, command_type),
            history: None,
          });
        }

        let result = EditResult {
          affected_indices: range.collect(),
          records_to_analyze: handles.clone(),
          records_added: handles.iter().map(|record| record.id()).collect(),
          ..EditResult::empty(id, command_type)
        };
        Ok(CommandOutcome {
          result,
          history: Some(HistoryItem::new(id, command_type, HistoryChange::Added(handles))),
        })
      },
      Self::RemoveRecords { indices } => {
        let removed = registry.remove_at(&indices);
        if removed.is_empty() {
          tracing::debug!(?indices, "no records to remove");
          return Ok(CommandOutcome {
            result:  EditResult::empty(id, command_type),
            history: None,
          });
        }

        let result = EditResult {
          affected_indices: removed.iter().map(|(index, _)| *index).collect(),
          records_removed: removed.iter().map(|(_, record)| record.id()).collect(),
          ..EditResult::empty(id, command_type)
        };
        Ok(CommandOutcome {
          result,
          history: Some(HistoryItem::new(id, command_type, HistoryChange::Removed(removed))),
        })
      },
    }
  }
}

fn combined_edit(
  record: &MetadataRecord,
  flags: CombinedEditFlags,
  title: &str,
  description: &str,
  keywords: &[String],
) -> bool {
  if flags.contains(CombinedEditFlags::CLEAR) {
    return record.clear();
  }

  let mut changed = false;
  if flags.contains(CombinedEditFlags::EDIT_TITLE) {
    changed |= record.set_title(title);
  }
  if flags.contains(CombinedEditFlags::EDIT_DESCRIPTION) {
    changed |= record.set_description(description);
  }
  if flags.contains(CombinedEditFlags::APPEND_KEYWORDS) {
    changed |= record.append_keywords(keywords) > 0;
  } else if flags.contains(CombinedEditFlags::EDIT_KEYWORDS) {
    changed |= record.set_keywords(keywords);
  }
  changed
}

/// Backs up each record, runs `edit` and keeps the backups of the records
/// that changed. Unlinked records are skipped.
fn modify_each<'a>(
  records: impl Iterator<Item = &'a RecordHandle>,
  mut edit: impl FnMut(&MetadataRecord) -> bool,
) -> Vec<(RecordHandle, RecordBackup)> {
  let mut backups = Vec::new();
  for record in records {
    if record.is_removed() {
      tracing::warn!(record = %record.id(), "skipping unlinked record");
      continue;
    }
    let backup = record.backup();
    if edit(record) {
      backups.push((record.clone(), backup));
    }
  }
  backups
}

fn modified_outcome(
  id: CommandId,
  command_type: CommandType,
  backups: Vec<(RecordHandle, RecordBackup)>,
  registry: &RecordRegistry,
) -> CommandOutcome {
  if backups.is_empty() {
    return CommandOutcome {
      result:  EditResult::empty(id, command_type),
      history: None,
    };
  }
  let records: Vec<RecordHandle> = backups.iter().map(|(record, _)| record.clone()).collect();
  CommandOutcome {
    result:  EditResult::modified(id, command_type, &records, registry),
    history: Some(HistoryItem::new(id, command_type, HistoryChange::Metadata(backups))),
  }
}

#[cfg(test)]
mod test {
  use tagsmith_core::KeywordRules;

  use super::*;
  use crate::{
    annotations::{
      AnalysisTarget,
      WordResult,
    },
    flags::WordAnalysisFlags,
    record::RecordKind,
  };

  fn registry_with(titles: &[&str]) -> RecordRegistry {
    let registry = RecordRegistry::new(Arc::new(KeywordRules::DEFAULT));
    let records = titles
      .iter()
      .enumerate()
      .map(|(n, title)| {
        let record = registry.new_record(format!("/media/{n}.jpg"), RecordKind::image());
        record.init_as_empty();
        record.set_title(title);
        record.reset_modified();
        record
      })
      .collect();
    registry.append(records);
    registry
  }

  fn all(registry: &RecordRegistry) -> Snapshot {
    Snapshot::selected(&registry.records())
  }

  #[test]
  fn combined_edit_sets_selected_fields() {
    let registry = registry_with(&["one", "two"]);
    let command = EditCommand::CombinedEdit {
      snapshot:    all(&registry),
      flags:       CombinedEditFlags::EDIT_TITLE | CombinedEditFlags::EDIT_KEYWORDS,
      title:       "two".into(),
      description: "ignored".into(),
      keywords:    vec!["a".into(), "b".into()],
    };
    let outcome = command.execute(CommandId::new(1), &registry).unwrap();
    assert_eq!(outcome.result.affected_indices, vec![0, 1]);
    assert_eq!(outcome.result.records_to_persist.len(), 2);

    let records = registry.records();
    assert_eq!(records[0].title(), "two");
    assert_eq!(records[0].description(), "");
    assert_eq!(records[1].keywords_string(), "a, b");
    assert!(records[0].is_modified());

    match outcome.history.unwrap().change {
      HistoryChange::Metadata(backups) => {
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].1.title, "one");
        assert!(!backups[0].1.was_modified);
      },
      other => panic!("unexpected change {other:?}"),
    }
  }

  #[test]
  fn combined_clear_ignores_other_flags() {
    let registry = registry_with(&["one"]);
    registry.get(0).unwrap().append_keywords(["k"]);
    let command = EditCommand::CombinedEdit {
      snapshot:    all(&registry),
      flags:       CombinedEditFlags::CLEAR | CombinedEditFlags::EDIT_TITLE,
      title:       "new".into(),
      description: String::new(),
      keywords:    Vec::new(),
    };
    command.execute(CommandId::new(1), &registry).unwrap();
    assert!(registry.get(0).unwrap().is_empty());
  }

  #[test]
  fn unchanged_records_are_left_out() {
    let registry = registry_with(&["same", "other"]);
    let command = EditCommand::CombinedEdit {
      snapshot:    all(&registry),
      flags:       CombinedEditFlags::EDIT_TITLE,
      title:       "same".into(),
      description: String::new(),
      keywords:    Vec::new(),
    };
    let outcome = command.execute(CommandId::new(1), &registry).unwrap();
    assert_eq!(outcome.result.affected_indices, vec![1]);

    let command = EditCommand::CombinedEdit {
      snapshot:    all(&registry),
      flags:       CombinedEditFlags::EDIT_TITLE,
      title:       "same".into(),
      description: String::new(),
      keywords:    Vec::new(),
    };
    let outcome = command.execute(CommandId::new(2), &registry).unwrap();
    assert!(outcome.result.is_empty());
    assert!(outcome.history.is_none());
  }

  #[test]
  fn identical_keywords_keep_spell_errors() {
    let registry = registry_with(&["a"]);
    let record = registry.get(0).unwrap();
    record.append_keywords(["helo", "world"]);
    let misspelled = WordResult {
      target:       AnalysisTarget::Keyword(0),
      word:         "helo".into(),
      is_correct:   false,
      stem:         None,
      is_duplicate: false,
    };
    record.apply_analysis(&[misspelled], WordAnalysisFlags::SPELLING);
    assert!(record.has_spell_errors());

    let command = EditCommand::CombinedEdit {
      snapshot:    all(&registry),
      flags:       CombinedEditFlags::EDIT_KEYWORDS,
      title:       String::new(),
      description: String::new(),
      keywords:    vec!["helo".into(), "world".into()],
    };
    let outcome = command.execute(CommandId::new(1), &registry).unwrap();
    assert!(outcome.result.is_empty());
    assert!(outcome.result.records_to_analyze.is_empty());
    assert!(record.has_spell_errors());
    assert_eq!(record.keywords().misspelled_words(), vec!["helo"]);
  }

  #[test]
  fn find_and_replace_only_touches_selected() {
    let registry = registry_with(&["red cat", "red dog"]);
    registry.get(0).unwrap().set_selected(true);
    let command = EditCommand::FindAndReplace {
      snapshot: Snapshot::new(&registry.records()),
      from:     "red".into(),
      to:       "blue".into(),
      flags:    SearchFlags::TITLE | SearchFlags::WHOLE_WORDS,
    };
    let outcome = command.execute(CommandId::new(3), &registry).unwrap();
    assert_eq!(outcome.result.affected_indices, vec![0]);
    assert_eq!(registry.get(0).unwrap().title(), "blue cat");
    assert_eq!(registry.get(1).unwrap().title(), "red dog");
  }

  #[test]
  fn uninitialized_record_does_not_abort_batch() {
    let registry = registry_with(&["a"]);
    let fresh = registry.new_record("/media/fresh.jpg", RecordKind::video());
    registry.append(vec![fresh]);

    let command = EditCommand::PasteKeywords {
      snapshot: all(&registry),
      keywords: vec!["sky".into(), "SKY".into()],
    };
    let outcome = command.execute(CommandId::new(4), &registry).unwrap();
    assert_eq!(outcome.result.affected_indices, vec![0]);
    assert_eq!(registry.get(0).unwrap().keywords_count(), 1);
  }

  #[test]
  fn delete_keywords_with_case() {
    let registry = registry_with(&["a", "b"]);
    registry.get(0).unwrap().append_keywords(["Sky", "sea"]);
    registry.get(1).unwrap().append_keywords(["sky"]);

    let command = EditCommand::DeleteKeywords {
      snapshot:       all(&registry),
      keywords:       vec!["sky".into()],
      case_sensitive: true,
    };
    let outcome = command.execute(CommandId::new(5), &registry).unwrap();
    assert_eq!(outcome.result.affected_indices, vec![1]);
    assert_eq!(registry.get(0).unwrap().keywords_string(), "Sky, sea");
  }

  #[test]
  fn expand_preset_on_removed_record_fails() {
    let registry = registry_with(&["a"]);
    let record = RecordHandle::new(&registry.get(0).unwrap());
    registry.remove_at(&[0]);
    let command = EditCommand::ExpandPreset {
      record,
      keyword_index: None,
      preset: vec!["x".into()],
    };
    assert!(matches!(
      command.execute(CommandId::new(6), &registry),
      Err(CommandError::RecordRemoved { .. })
    ));
  }

  #[test]
  fn add_and_remove_records() {
    let registry = registry_with(&["a"]);
    let new = vec![
      registry.new_record("/media/x.jpg", RecordKind::image()),
      registry.new_record("/media/y.mov", RecordKind::video()),
    ];
    let outcome = EditCommand::AddRecords { records: new }
      .execute(CommandId::new(7), &registry)
      .unwrap();
    assert_eq!(outcome.result.affected_indices, vec![1, 2]);
    assert_eq!(outcome.result.records_added.len(), 2);
    assert_eq!(registry.len(), 3);

    let outcome = EditCommand::RemoveRecords {
      indices: vec![2, 0, 42],
    }
    .execute(CommandId::new(8), &registry)
    .unwrap();
    assert_eq!(outcome.result.affected_indices, vec![0, 2]);
    assert_eq!(registry.len(), 1);
    assert!(matches!(
      outcome.history.as_ref().map(|item| &item.change),
      Some(HistoryChange::Removed(removed)) if removed.len() == 2
    ));

    let outcome = EditCommand::RemoveRecords { indices: vec![5] }
      .execute(CommandId::new(9), &registry)
      .unwrap();
    assert!(outcome.history.is_none());
  }
}
