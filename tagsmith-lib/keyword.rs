use smallvec::SmallVec;

use crate::Tendril;

/// A single stored keyword and its analysis annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
  pub value:          Tendril,
  pub is_correct:     bool,
  pub has_duplicates: bool,
  /// `(lowercase word, stem)` for each analysed word of the keyword.
  stems:              SmallVec<[(Tendril, Tendril); 1]>,
}

impl Keyword {
  pub fn new(value: impl Into<Tendril>) -> Self {
    Self {
      value:          value.into(),
      is_correct:     true,
      has_duplicates: false,
      stems:          SmallVec::new(),
    }
  }

  #[inline]
  pub fn as_str(&self) -> &str {
    &self.value
  }

  /// Key used for case-insensitive uniqueness.
  #[inline]
  pub fn key(&self) -> String {
    self.value.to_lowercase()
  }

  #[inline]
  pub fn is_phrase(&self) -> bool {
    self.value.contains(' ')
  }

  /// Stem of the first analysed word, if any.
  pub fn stem(&self) -> Option<&str> {
    self.stems.first().map(|(_, stem)| stem.as_str())
  }

  pub fn stems(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .stems
      .iter()
      .map(|(word, stem)| (word.as_str(), stem.as_str()))
  }

  pub(crate) fn push_stem(&mut self, word: &str, stem: &str) {
    let word = Tendril::from(word.to_lowercase());
    if let Some(slot) = self.stems.iter_mut().find(|(w, _)| *w == word) {
      slot.1 = Tendril::from(stem);
    } else {
      self.stems.push((word, Tendril::from(stem)));
    }
  }

  pub fn reset_annotations(&mut self) {
    self.is_correct = true;
    self.has_duplicates = false;
    self.stems.clear();
  }

  /// Replaces the value. Annotations are reset unless `keep_spelling` is set,
  /// in which case only the stems (tied to the old words) are dropped.
  pub(crate) fn set_value(&mut self, value: impl Into<Tendril>, keep_spelling: bool) {
    self.value = value.into();
    self.stems.clear();
    if !keep_spelling {
      self.is_correct = true;
      self.has_duplicates = false;
    }
  }
}

impl std::fmt::Display for Keyword {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.value)
  }
}
