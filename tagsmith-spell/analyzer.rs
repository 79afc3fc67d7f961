use tagsmith_lib::{
  annotations::WordAnalysis,
  flags::WordAnalysisFlags,
};

/// Spelling and stemming backend.
///
/// Called from the annotator task for one word at a time. Only the parts
/// requested in `flags` need to be filled in; the rest may keep their
/// defaults.
pub trait Analyzer: Send + Sync + 'static {
  fn analyze(&mut self, word: &str, flags: WordAnalysisFlags) -> WordAnalysis;
}

impl<F> Analyzer for F
where
  F: FnMut(&str, WordAnalysisFlags) -> WordAnalysis + Send + Sync + 'static,
{
  fn analyze(&mut self, word: &str, flags: WordAnalysisFlags) -> WordAnalysis {
    self(word, flags)
  }
}
