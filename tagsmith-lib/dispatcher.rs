//! Entry point for callers: runs commands, drives undo/redo and reports what
//! happened.
//!
//! Commands execute one at a time under the ledger lock. Everything that
//! reaches outside the engine (event log entries, backup requests, analysis
//! submissions, finalization of unlinked records) happens after the ledger
//! lock is released and while no record lock is held.

use std::{
  path::PathBuf,
  sync::{
    Arc,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
  annotations::AnalysisSink,
  command::{
    CommandError,
    CommandId,
    CommandOutcome,
    EditCommand,
    EditResult,
    Snapshot,
  },
  config::EngineConfig,
  events::{
    EngineEvent,
    EngineEventKind,
    EventLog,
  },
  history::{
    HistoryError,
    UndoRedoLedger,
  },
  record::{
    MetadataRecord,
    RecordId,
    RecordKind,
  },
  registry::RecordRegistry,
};

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error(transparent)]
  Command(#[from] CommandError),
  #[error(transparent)]
  History(#[from] HistoryError),
}

/// External writer that durably snapshots changed records.
pub trait BackupSink: Send + Sync {
  /// Fire and forget; called without any engine lock held.
  fn request_backup(&self, record: &Arc<MetadataRecord>);
}

pub struct Dispatcher {
  config:          EngineConfig,
  registry:        RecordRegistry,
  ledger:          Mutex<UndoRedoLedger>,
  events:          Mutex<EventLog>,
  next_command_id: AtomicU64,
  backup_sink:     Option<Box<dyn BackupSink>>,
  annotator:       Option<Arc<dyn AnalysisSink>>,
}

impl Default for Dispatcher {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

impl Dispatcher {
  pub fn new(config: EngineConfig) -> Self {
    let registry = RecordRegistry::new(Arc::new(config.keyword_rules()));
    Self {
      registry,
      ledger: Mutex::new(UndoRedoLedger::with_limit(config.history_limit)),
      events: Mutex::new(EventLog::with_limit(config.event_limit)),
      next_command_id: AtomicU64::new(1),
      backup_sink: None,
      annotator: None,
      config,
    }
  }

  pub fn with_backup_sink(mut self, sink: Box<dyn BackupSink>) -> Self {
    self.backup_sink = Some(sink);
    self
  }

  /// Sends changed records to `annotator` after every command, unless spell
  /// checking is disabled in the config.
  pub fn with_annotator(mut self, annotator: Arc<dyn AnalysisSink>) -> Self {
    self.annotator = Some(annotator);
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn registry(&self) -> &RecordRegistry {
    &self.registry
  }

  /// Creates a record with a fresh id. Add it with
  /// [`EditCommand::AddRecords`].
  pub fn new_record(&self, file_path: impl Into<PathBuf>, kind: RecordKind) -> Arc<MetadataRecord> {
    self.registry.new_record(file_path, kind)
  }

  pub fn submit(&self, command: EditCommand) -> Result<EditResult> {
    let id = CommandId::new(self.next_command_id.fetch_add(1, Ordering::Relaxed));

    let (result, history) = {
      let mut ledger = self.ledger.lock();
      let CommandOutcome { result, history } = command.execute(id, &self.registry)?;
      let history = history.map(|item| {
        ledger.record(item);
        (ledger.can_undo(), ledger.can_redo())
      });
      (result, history)
    };

    if result.is_empty() {
      tracing::debug!(command = %id, command_type = ?result.command_type, "command changed nothing");
    }
    self.notify(&result, history);
    Ok(result)
  }

  pub fn undo(&self) -> Result<EditResult> {
    let (result, history) = {
      let mut ledger = self.ledger.lock();
      let result = ledger.undo(&self.registry)?;
      (result, (ledger.can_undo(), ledger.can_redo()))
    };
    self.notify(&result, Some(history));
    Ok(result)
  }

  pub fn redo(&self) -> Result<EditResult> {
    let (result, history) = {
      let mut ledger = self.ledger.lock();
      let result = ledger.redo(&self.registry)?;
      (result, (ledger.can_undo(), ledger.can_redo()))
    };
    self.notify(&result, Some(history));
    Ok(result)
  }

  pub fn can_undo(&self) -> bool {
    self.ledger.lock().can_undo()
  }

  pub fn can_redo(&self) -> bool {
    self.ledger.lock().can_redo()
  }

  /// Drops all history, releasing the records it held.
  pub fn clear_history(&self) {
    self.ledger.lock().clear();
    let finalized = self.registry.collect_garbage();
    let mut events = self.events.lock();
    events.push(EngineEventKind::HistoryChanged {
      can_undo: false,
      can_redo: false,
    });
    if !finalized.is_empty() {
      events.push(EngineEventKind::RecordsFinalized { ids: finalized });
    }
  }

  fn notify(&self, result: &EditResult, history: Option<(bool, bool)>) {
    let mut pending = Vec::new();

    if !result.records_to_persist.is_empty() {
      pending.push(EngineEventKind::RecordsChanged {
        command_id:   result.command_id,
        command_type: result.command_type,
        ids:          result
          .records_to_persist
          .iter()
          .map(|record| record.id())
          .collect(),
        indices:      result.affected_indices.clone(),
      });
    }
    if !result.records_added.is_empty() {
      pending.push(EngineEventKind::RecordsAdded {
        ids: result.records_added.clone(),
      });
    }
    if !result.records_removed.is_empty() {
      pending.push(EngineEventKind::RecordsRemoved {
        ids: result.records_removed.clone(),
      });
    }

    if let Some(sink) = &self.backup_sink {
      for record in &result.records_to_persist {
        sink.request_backup(record.record());
        pending.push(EngineEventKind::BackupRequested { id: record.id() });
      }
    }

    if let Some(annotator) = &self.annotator {
      if self.config.spell_check.enabled && !result.records_to_analyze.is_empty() {
        annotator.submit(&result.records_to_analyze);
        pending.push(EngineEventKind::AnalysisSubmitted {
          ids: result
            .records_to_analyze
            .iter()
            .map(|record| record.id())
            .collect(),
        });
      }
    }

    if let Some((can_undo, can_redo)) = history {
      pending.push(EngineEventKind::HistoryChanged { can_undo, can_redo });
    }

    let finalized = self.registry.collect_garbage();
    if !finalized.is_empty() {
      pending.push(EngineEventKind::RecordsFinalized { ids: finalized });
    }

    let mut events = self.events.lock();
    for kind in pending {
      events.push(kind);
    }
  }

  /// Finalizes unlinked records that nothing holds any more and logs them.
  /// Every command, undo, redo and history clear already does this. Holds
  /// released elsewhere (an annotator merging its last batch) are only
  /// picked up by the next such call, or by calling this directly.
  pub fn collect_garbage(&self) -> Vec<RecordId> {
    let finalized = self.registry.collect_garbage();
    if !finalized.is_empty() {
      self.events.lock().push(EngineEventKind::RecordsFinalized {
        ids: finalized.clone(),
      });
    }
    finalized
  }

  /// Drops queued analysis work.
  pub fn cancel_analysis(&self) {
    if let Some(annotator) = &self.annotator {
      annotator.cancel();
    }
  }

  pub fn events_since(&self, seq: u64) -> Vec<EngineEvent> {
    self.events.lock().events_since(seq)
  }

  pub fn latest_seq(&self) -> u64 {
    self.events.lock().latest_seq()
  }

  // Reads.

  pub fn len(&self) -> usize {
    self.registry.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registry.is_empty()
  }

  pub fn record(&self, id: RecordId) -> Option<Arc<MetadataRecord>> {
    self.registry.find(id)
  }

  pub fn record_at(&self, index: usize) -> Option<Arc<MetadataRecord>> {
    self.registry.get(index)
  }

  pub fn title(&self, id: RecordId) -> Option<String> {
    self.record(id).map(|record| record.title())
  }

  pub fn description(&self, id: RecordId) -> Option<String> {
    self.record(id).map(|record| record.description())
  }

  pub fn keywords_string(&self, id: RecordId) -> Option<String> {
    self.record(id).map(|record| record.keywords_string())
  }

  pub fn keywords_count(&self, id: RecordId) -> Option<usize> {
    self.record(id).map(|record| record.keywords_count())
  }

  /// Snapshot of every live record with its current selection state.
  pub fn snapshot(&self) -> Snapshot {
    Snapshot::new(&self.registry.records())
  }

  /// Snapshot of the records at `indices`, all treated as selected.
  pub fn snapshot_of(&self, indices: &[usize]) -> Snapshot {
    let records: Vec<Arc<MetadataRecord>> = indices
      .iter()
      .filter_map(|&index| self.registry.get(index))
      .collect();
    Snapshot::selected(&records)
  }
}
