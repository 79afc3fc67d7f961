use std::{
  mem,
  sync::{
    Arc,
    atomic::{
      AtomicU64,
      Ordering,
    },
  },
  time::Duration,
};

use tagsmith_event::{
  AsyncHook,
  send_blocking,
};
use tagsmith_lib::{
  annotations::{
    AnalysisRequest,
    AnalysisResponse,
    AnalysisSink,
    WordResult,
  },
  config::SpellCheckConfig,
  flags::{
    SpellCheckFlags,
    WordAnalysisFlags,
  },
  record::RecordHandle,
};
use thiserror::Error;
use tokio::{
  sync::{
    Notify,
    mpsc::Sender,
  },
  time::Instant,
};

use crate::Analyzer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnotatorError {
  #[error("annotator is not running")]
  Closed,
  #[error("annotator queue is full")]
  Full,
}

/// Counters shared between the handle and the worker task.
#[derive(Debug, Default)]
struct Shared {
  /// Bumped by every cancel. Work queued under an older generation is
  /// dropped.
  generation: AtomicU64,
  submitted:  AtomicU64,
  finished:   AtomicU64,
  merged:     AtomicU64,
  idle:       Notify,
}

impl Shared {
  fn is_idle(&self) -> bool {
    self.finished.load(Ordering::Acquire) >= self.submitted.load(Ordering::Acquire)
  }

  fn finish_one(&self) {
    self.finished.fetch_add(1, Ordering::AcqRel);
    if self.is_idle() {
      self.idle.notify_waiters();
    }
  }
}

struct Queued {
  generation: u64,
  request:    AnalysisRequest,
}

struct SpellCheckHook {
  analyzer: Box<dyn Analyzer>,
  queue:    Vec<Queued>,
  debounce: Duration,
  capacity: usize,
  shared:   Arc<Shared>,
}

impl SpellCheckHook {
  fn analyze(&mut self, request: AnalysisRequest) -> AnalysisResponse {
    let AnalysisRequest {
      record,
      words,
      flags,
    } = request;
    let results = words
      .into_iter()
      .map(|word| {
        let analysis = self.analyzer.analyze(&word.text, flags);
        WordResult::new(word, analysis)
      })
      .collect();
    AnalysisResponse {
      record,
      results,
      flags,
    }
  }

  fn flush(&mut self) {
    for Queued {
      generation,
      request,
    } in mem::take(&mut self.queue)
    {
      if generation == self.shared.generation.load(Ordering::Acquire) {
        let response = self.analyze(request);
        // a cancel may have landed while the analyzer was running
        if generation == self.shared.generation.load(Ordering::Acquire) {
          response.apply();
          self.shared.merged.fetch_add(1, Ordering::AcqRel);
        } else {
          log::debug!("analysis of record {} cancelled", response.record.id());
        }
      }
      self.shared.finish_one();
    }
  }
}

impl AsyncHook for SpellCheckHook {
  type Event = Queued;

  fn handle_event(&mut self, event: Queued, timeout: Option<Instant>) -> Option<Instant> {
    self.queue.push(event);
    if self.debounce.is_zero() {
      self.flush();
      return None;
    }
    Some(timeout.unwrap_or_else(|| Instant::now() + self.debounce))
  }

  fn finish_debounce(&mut self) {
    self.flush();
  }

  fn capacity(&self) -> usize {
    self.capacity
  }
}

/// Handle to a running annotator. Cheap to clone.
#[derive(Clone)]
pub struct AnnotatorHandle {
  tx:     Sender<Queued>,
  shared: Arc<Shared>,
  fields: SpellCheckFlags,
  flags:  WordAnalysisFlags,
}

impl AnnotatorHandle {
  /// Starts the annotator on the current tokio runtime. Outside a runtime
  /// the handle is closed and every submission fails.
  pub fn spawn(analyzer: impl Analyzer, config: &SpellCheckConfig) -> Self {
    let shared = Arc::new(Shared::default());
    let hook = SpellCheckHook {
      analyzer: Box::new(analyzer),
      queue:    Vec::new(),
      debounce: config.debounce(),
      capacity: config.queue_capacity,
      shared:   Arc::clone(&shared),
    };
    Self {
      tx: hook.spawn(),
      shared,
      fields: SpellCheckFlags::ALL,
      flags: config.analysis_flags(),
    }
  }

  /// Restricts which record fields [`submit_record`](Self::submit_record)
  /// sends for analysis.
  pub fn with_fields(mut self, fields: SpellCheckFlags) -> Self {
    self.fields = fields;
    self
  }

  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }

  pub fn submit_request(&self, request: AnalysisRequest) -> Result<(), AnnotatorError> {
    if request.is_empty() {
      return Ok(());
    }

    let generation = self.shared.generation.load(Ordering::Acquire);
    self.shared.submitted.fetch_add(1, Ordering::AcqRel);
    if send_blocking(&self.tx, Queued {
      generation,
      request,
    }) {
      return Ok(());
    }

    self.shared.finish_one();
    if self.tx.is_closed() {
      Err(AnnotatorError::Closed)
    } else {
      Err(AnnotatorError::Full)
    }
  }

  pub fn submit_record(&self, record: RecordHandle) -> Result<(), AnnotatorError> {
    self.submit_request(AnalysisRequest::for_record(record, self.fields, self.flags))
  }

  /// Drops queued requests and keeps in-flight results from being merged.
  /// Results merged before the call stay.
  pub fn cancel(&self) {
    let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
    log::debug!("annotator cancelled, generation {generation}");
  }

  /// Number of responses merged into records so far.
  pub fn processed(&self) -> u64 {
    self.shared.merged.load(Ordering::Acquire)
  }

  /// Requests submitted but not yet merged or dropped.
  pub fn pending(&self) -> u64 {
    let submitted = self.shared.submitted.load(Ordering::Acquire);
    submitted.saturating_sub(self.shared.finished.load(Ordering::Acquire))
  }

  /// Resolves once every submitted request has been merged or dropped.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.shared.idle.notified();
      if self.shared.is_idle() {
        return;
      }
      notified.await;
    }
  }
}

impl AnalysisSink for AnnotatorHandle {
  fn submit(&self, records: &[RecordHandle]) {
    for record in records {
      if let Err(err) = self.submit_record(record.clone()) {
        log::warn!("failed to queue analysis of record {}: {err}", record.id());
      }
    }
  }

  fn cancel(&self) {
    AnnotatorHandle::cancel(self);
  }
}
