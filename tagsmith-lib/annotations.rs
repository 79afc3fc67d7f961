//! Request/response contract with the background word analyzer.
//!
//! A request is built from the current contents of a record and carries a
//! [`RecordHandle`], so the record stays alive while the batch is
//! outstanding. Responses come back in request order and are merged by
//! [`MetadataRecord::apply_analysis`](crate::record::MetadataRecord::apply_analysis),
//! which tolerates keyword indices that went stale in the meantime.

use tagsmith_core::matcher::split_words;

use crate::{
  flags::{
    SpellCheckFlags,
    WordAnalysisFlags,
  },
  record::RecordHandle,
};

/// Where an analysed word came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisTarget {
  Keyword(usize),
  Title,
  Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestWord {
  pub target: AnalysisTarget,
  pub text:   String,
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
  pub record: RecordHandle,
  pub words:  Vec<RequestWord>,
  pub flags:  WordAnalysisFlags,
}

impl AnalysisRequest {
  /// Snapshots the words of the selected fields. Each field is read under
  /// its own lock, one at a time.
  pub fn for_record(record: RecordHandle, fields: SpellCheckFlags, flags: WordAnalysisFlags) -> Self {
    let mut words = Vec::new();

    if fields.contains(SpellCheckFlags::KEYWORDS) {
      let keywords = record.keywords();
      for (index, keyword) in keywords.iter().enumerate() {
        words.extend(split_words(keyword.as_str()).map(|word| RequestWord {
          target: AnalysisTarget::Keyword(index),
          text:   word.to_string(),
        }));
      }
    }

    if fields.contains(SpellCheckFlags::TITLE) {
      words.extend(record.title_words().into_iter().map(|text| RequestWord {
        target: AnalysisTarget::Title,
        text,
      }));
    }

    if fields.contains(SpellCheckFlags::DESCRIPTION) {
      words.extend(
        record
          .description_words()
          .into_iter()
          .map(|text| RequestWord {
            target: AnalysisTarget::Description,
            text,
          }),
      );
    }

    Self {
      record,
      words,
      flags,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }
}

/// What the analyzer reports for a single word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordAnalysis {
  pub is_correct:   bool,
  pub stem:         Option<String>,
  pub is_duplicate: bool,
}

impl Default for WordAnalysis {
  fn default() -> Self {
    Self {
      is_correct:   true,
      stem:         None,
      is_duplicate: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordResult {
  pub target:       AnalysisTarget,
  pub word:         String,
  pub is_correct:   bool,
  pub stem:         Option<String>,
  pub is_duplicate: bool,
}

impl WordResult {
  pub fn new(word: RequestWord, analysis: WordAnalysis) -> Self {
    Self {
      target:       word.target,
      word:         word.text,
      is_correct:   analysis.is_correct,
      stem:         analysis.stem,
      is_duplicate: analysis.is_duplicate,
    }
  }
}

#[derive(Debug, Clone)]
pub struct AnalysisResponse {
  pub record:  RecordHandle,
  pub results: Vec<WordResult>,
  pub flags:   WordAnalysisFlags,
}

impl AnalysisResponse {
  /// Merges the results into the record. Takes each field's write lock in
  /// turn and never holds two at once.
  pub fn apply(&self) {
    self.record.apply_analysis(&self.results, self.flags);
  }
}

/// Receiver of records that changed and need (re)analysis.
pub trait AnalysisSink: Send + Sync {
  fn submit(&self, records: &[RecordHandle]);

  /// Drops queued work. Results already merged stay merged.
  fn cancel(&self);
}
