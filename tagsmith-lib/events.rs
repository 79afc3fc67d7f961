use std::collections::VecDeque;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  command::CommandId,
  flags::CommandType,
  record::RecordId,
};

pub const DEFAULT_EVENT_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEventKind {
  RecordsChanged {
    command_id:   CommandId,
    command_type: CommandType,
    ids:          Vec<RecordId>,
    indices:      Vec<usize>,
  },
  RecordsAdded {
    ids: Vec<RecordId>,
  },
  RecordsRemoved {
    ids: Vec<RecordId>,
  },
  RecordsFinalized {
    ids: Vec<RecordId>,
  },
  BackupRequested {
    id: RecordId,
  },
  AnalysisSubmitted {
    ids: Vec<RecordId>,
  },
  HistoryChanged {
    can_undo: bool,
    can_redo: bool,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
  pub seq:  u64,
  #[serde(flatten)]
  pub kind: EngineEventKind,
}

/// Bounded log of engine events, polled by observers with the last sequence
/// number they have seen.
#[derive(Debug, Clone)]
pub struct EventLog {
  events:         VecDeque<EngineEvent>,
  next_event_seq: u64,
  event_limit:    usize,
}

impl Default for EventLog {
  fn default() -> Self {
    Self::with_limit(DEFAULT_EVENT_LIMIT)
  }
}

impl EventLog {
  pub fn with_limit(event_limit: usize) -> Self {
    Self {
      events:         VecDeque::new(),
      next_event_seq: 1,
      event_limit:    event_limit.max(1),
    }
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn latest_seq(&self) -> u64 {
    self.next_event_seq.saturating_sub(1)
  }

  pub fn oldest_seq(&self) -> u64 {
    self
      .events
      .front()
      .map(|event| event.seq)
      .unwrap_or(self.next_event_seq)
  }

  pub fn events_since(&self, seq: u64) -> Vec<EngineEvent> {
    self
      .events
      .iter()
      .filter(|event| event.seq > seq)
      .cloned()
      .collect()
  }

  pub fn push(&mut self, kind: EngineEventKind) -> u64 {
    let seq = self.next_event_seq;
    self.next_event_seq = self.next_event_seq.saturating_add(1);
    self.events.push_back(EngineEvent { seq, kind });
    while self.events.len() > self.event_limit {
      self.events.pop_front();
    }
    seq
  }

  /// Drops buffered events. Sequence numbers keep counting.
  pub fn clear(&mut self) {
    self.events.clear();
  }
}
