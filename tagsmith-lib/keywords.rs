//! Ordered, case-insensitively unique keyword collection.
//!
//! # Invariants
//!
//! - No two stored keywords share the same lowercase form.
//! - `index` holds exactly the lowercase forms of the stored keywords.
//! - Every stored value is the output of [`KeywordRules::sanitize`] and passes
//!   [`KeywordRules::is_valid`].
//!
//! The collection itself is not synchronized. A
//! [`MetadataRecord`](crate::record::MetadataRecord) wraps it in its own
//! `RwLock`, and every method here assumes the caller already holds the right
//! side of that lock.
//!
//! # Failure reporting
//!
//! Nothing here panics or returns an error type. Rejected input (invalid after
//! sanitizing, would collide with another keyword, stale index) shows up as
//! `false`, `None`, an empty range or [`KeywordReplaceResult`].

use std::{
  collections::BTreeMap,
  ops::Range,
  sync::Arc,
};

use hashbrown::{
  HashMap,
  HashSet,
};
use tagsmith_core::{
  KeywordRules,
  matcher::{
    contains_literal,
    contains_whole_word,
    replace_literal,
    replace_whole_words,
    split_words,
  },
};

use crate::{
  annotations::{
    AnalysisTarget,
    WordResult,
  },
  flags::SearchFlags,
  keyword::Keyword,
};

/// Outcome of a spelling fix on a single keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordReplaceResult {
  Succeeded,
  FailedIndex,
  FailedDuplicate,
  Unknown,
}

/// A fixed set of keywords to match against, prepared once for a batch.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
  words:          HashSet<String>,
  case_sensitive: bool,
}

impl KeywordFilter {
  pub fn new<I, S>(words: I, case_sensitive: bool) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let words = words
      .into_iter()
      .map(|word| {
        let word = word.as_ref();
        if case_sensitive {
          word.to_string()
        } else {
          word.to_lowercase()
        }
      })
      .collect();
    Self {
      words,
      case_sensitive,
    }
  }

  pub fn matches(&self, value: &str) -> bool {
    if self.case_sensitive {
      self.words.contains(value)
    } else {
      self.words.contains(&value.to_lowercase())
    }
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }
}

/// Indices touched by [`KeywordCollection::replace_all`], both relative to
/// the collection as it was before the call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
  pub removed: Vec<usize>,
  pub updated: Vec<usize>,
}

impl ReplaceOutcome {
  pub fn is_changed(&self) -> bool {
    !self.removed.is_empty() || !self.updated.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct KeywordCollection {
  keywords: Vec<Keyword>,
  index:    HashSet<String>,
  rules:    Arc<KeywordRules>,
}

impl Default for KeywordCollection {
  fn default() -> Self {
    Self::new()
  }
}

impl KeywordCollection {
  pub fn new() -> Self {
    Self::with_rules(Arc::new(KeywordRules::DEFAULT))
  }

  pub fn with_rules(rules: Arc<KeywordRules>) -> Self {
    Self {
      keywords: Vec::new(),
      index: HashSet::new(),
      rules,
    }
  }

  pub fn rules(&self) -> &KeywordRules {
    &self.rules
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.keywords.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.keywords.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Keyword> {
    self.keywords.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Keyword> {
    self.keywords.iter()
  }

  pub fn values(&self) -> impl Iterator<Item = &str> {
    self.keywords.iter().map(Keyword::as_str)
  }

  pub fn snapshot(&self) -> Vec<String> {
    self.values().map(str::to_string).collect()
  }

  pub fn keywords_string(&self) -> String {
    self.values().collect::<Vec<_>>().join(", ")
  }

  /// Case-insensitive membership of an already sanitized value.
  pub fn contains(&self, value: &str) -> bool {
    self.index.contains(&value.to_lowercase())
  }

  /// Appends `word` after sanitizing it. Returns the new index, or `None` if
  /// the word is invalid or already present.
  pub fn append(&mut self, word: &str) -> Option<usize> {
    let sanitized = self.accept(word)?;
    self.keywords.push(Keyword::new(sanitized));
    Some(self.keywords.len() - 1)
  }

  /// Appends every acceptable word in order. Duplicates inside the batch are
  /// dropped (the first one wins). Returns the range of new indices; its
  /// length is the number of keywords added.
  pub fn append_many<I, S>(&mut self, words: I) -> Range<usize>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let start = self.keywords.len();
    for word in words {
      self.append(word.as_ref());
    }
    start..self.keywords.len()
  }

  /// Inserts acceptable words starting at `index` (clamped to the length),
  /// keeping their relative order.
  pub fn insert_many_at<I, S>(&mut self, index: usize, words: I) -> Range<usize>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let start = index.min(self.keywords.len());
    let mut pos = start;
    for word in words {
      if let Some(sanitized) = self.accept(word.as_ref()) {
        self.keywords.insert(pos, Keyword::new(sanitized));
        pos += 1;
      }
    }
    start..pos
  }

  /// Sanitizes and registers `word` in the index, returning the stored form.
  fn accept(&mut self, word: &str) -> Option<String> {
    let sanitized = self.rules.sanitize(word);
    if !self.rules.is_valid(&sanitized) {
      return None;
    }
    if !self.index.insert(sanitized.to_lowercase()) {
      return None;
    }
    Some(sanitized)
  }

  pub fn remove_at(&mut self, index: usize) -> Option<Keyword> {
    if index >= self.keywords.len() {
      return None;
    }
    let keyword = self.keywords.remove(index);
    self.index.remove(&keyword.key());
    Some(keyword)
  }

  pub fn remove_last(&mut self) -> Option<Keyword> {
    let last = self.keywords.len().checked_sub(1)?;
    self.remove_at(last)
  }

  /// Removes the given indices (duplicates and out of range entries are
  /// ignored) and returns the removed keywords in ascending index order.
  pub fn remove_indices(&mut self, mut indices: Vec<usize>) -> Vec<Keyword> {
    indices.sort_unstable();
    indices.dedup();
    let mut removed: Vec<Keyword> = indices
      .into_iter()
      .rev()
      .filter_map(|index| self.remove_at(index))
      .collect();
    removed.reverse();
    removed
  }

  /// Removes every keyword matched by `filter`, returning the indices they
  /// had before removal.
  pub fn remove_where(&mut self, filter: &KeywordFilter) -> Vec<usize> {
    let indices: Vec<usize> = self
      .keywords
      .iter()
      .enumerate()
      .filter(|(_, keyword)| filter.matches(keyword.as_str()))
      .map(|(index, _)| index)
      .collect();
    self.remove_indices(indices.clone());
    indices
  }

  pub fn clear(&mut self) -> bool {
    let changed = !self.keywords.is_empty();
    self.keywords.clear();
    self.index.clear();
    changed
  }

  /// Replaces the whole list. Returns whether the resulting values differ
  /// from the previous ones. An identical list leaves the collection, and
  /// the annotations on its keywords, untouched.
  pub fn set_keywords<I, S>(&mut self, words: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut seen = HashSet::new();
    let candidates: Vec<String> = words
      .into_iter()
      .map(|word| self.rules.sanitize(word.as_ref()))
      .filter(|word| self.rules.is_valid(word) && seen.insert(word.to_lowercase()))
      .collect();
    if self.values().eq(candidates.iter().map(String::as_str)) {
      return false;
    }

    self.keywords = candidates.into_iter().map(Keyword::new).collect();
    self.index = seen;
    true
  }

  /// Restores values captured by [`snapshot`](Self::snapshot) without
  /// sanitizing them again.
  pub(crate) fn restore_values(&mut self, values: &[String]) {
    self.keywords.clear();
    self.index.clear();
    for value in values {
      if self.index.insert(value.to_lowercase()) {
        self.keywords.push(Keyword::new(value.as_str()));
      }
    }
  }

  fn accepts_rename(&self, existing: &str, sanitized: &str) -> bool {
    if existing == sanitized || !self.rules.is_valid(sanitized) {
      return false;
    }
    let new_key = sanitized.to_lowercase();
    if !self.index.contains(&new_key) || new_key == existing.to_lowercase() {
      return true;
    }
    tracing::debug!(
      existing,
      replacement = sanitized,
      "rename would duplicate an existing keyword"
    );
    false
  }

  pub fn can_edit(&self, index: usize, replacement: &str) -> bool {
    self.keywords.get(index).is_some_and(|keyword| {
      self.accepts_rename(keyword.as_str(), &self.rules.sanitize(replacement))
    })
  }

  /// Renames the keyword at `index`. A change of case only is always
  /// allowed; a rename onto another existing keyword is not. A successful
  /// edit resets the keyword's annotations.
  pub fn edit(&mut self, index: usize, replacement: &str) -> bool {
    self.edit_impl(index, replacement, false)
  }

  fn edit_impl(&mut self, index: usize, replacement: &str, keep_spelling: bool) -> bool {
    let sanitized = self.rules.sanitize(replacement);
    let Some(existing) = self.keywords.get(index) else {
      return false;
    };
    if !self.accepts_rename(existing.as_str(), &sanitized) {
      return false;
    }

    let old_key = existing.key();
    self.index.remove(&old_key);
    self.index.insert(sanitized.to_lowercase());
    self.keywords[index].set_value(sanitized, keep_spelling);
    true
  }

  /// Replaces `existing` inside the keyword at `index`.
  ///
  /// An exact match is a plain [`edit`](Self::edit). When the keyword is a
  /// phrase that contains `existing`, the substring is substituted and the
  /// resulting phrase is edited in; the keyword keeps its spelling flag in
  /// that case since the other words of the phrase were not touched.
  pub fn replace_substring(&mut self, index: usize, existing: &str, replacement: &str) -> bool {
    let Some(keyword) = self.keywords.get(index) else {
      return false;
    };

    if keyword.as_str() == existing {
      return self.edit_impl(index, replacement, false);
    }

    if keyword.is_phrase() && contains_literal(keyword.as_str(), existing, true) {
      let phrase = replace_literal(keyword.as_str(), existing, replacement, true);
      return self.edit_impl(index, &phrase, true);
    }

    false
  }

  pub fn fix_spelling(
    &mut self,
    index: usize,
    existing: &str,
    replacement: &str,
  ) -> KeywordReplaceResult {
    if index >= self.keywords.len() {
      return KeywordReplaceResult::FailedIndex;
    }

    if self.replace_substring(index, existing, replacement) {
      self.keywords[index].is_correct = true;
      KeywordReplaceResult::Succeeded
    } else {
      KeywordReplaceResult::FailedDuplicate
    }
  }

  /// Find and replace across all keywords.
  ///
  /// Each matching keyword is rewritten and sanitized. A result that is empty
  /// or collides with another keyword removes the keyword instead; a result
  /// that is otherwise invalid leaves it untouched.
  pub fn replace_all(&mut self, from: &str, to: &str, flags: SearchFlags) -> ReplaceOutcome {
    let case_sensitive = flags.case_sensitive();
    let whole_words = flags.whole_words();
    let mut outcome = ReplaceOutcome::default();

    for index in 0..self.keywords.len() {
      let value = self.keywords[index].as_str();
      let has_match = if whole_words {
        contains_whole_word(value, from, case_sensitive)
      } else {
        contains_literal(value, from, case_sensitive)
      };
      if !has_match {
        continue;
      }

      let replaced = if whole_words {
        replace_whole_words(value, from, to, case_sensitive)
      } else {
        replace_literal(value, from, to, case_sensitive)
      };
      let sanitized = self.rules.sanitize(&replaced);
      if sanitized == value {
        continue;
      }

      if self.edit_impl(index, &sanitized, false) {
        outcome.updated.push(index);
      } else if sanitized.is_empty() || self.contains(&sanitized) {
        tracing::debug!(from, to, index, "replacement empties or duplicates a keyword");
        outcome.removed.push(index);
      }
    }

    self.remove_indices(outcome.removed.clone());
    outcome
  }

  /// With `WHOLE_WORDS` the keyword must equal `term`; otherwise containing
  /// it is enough. Case follows `CASE_SENSITIVE`.
  pub fn contains_keyword(&self, term: &str, flags: SearchFlags) -> bool {
    let case_sensitive = flags.case_sensitive();
    if flags.whole_words() {
      if case_sensitive {
        self.values().any(|value| value == term)
      } else {
        self.contains(term)
      }
    } else {
      self
        .values()
        .any(|value| contains_literal(value, term, case_sensitive))
    }
  }

  pub fn contains_all<I, S>(&self, terms: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    terms
      .into_iter()
      .all(|term| self.contains(&self.rules.sanitize(term.as_ref())))
  }

  pub fn has_spell_errors(&self) -> bool {
    self.keywords.iter().any(|keyword| !keyword.is_correct)
  }

  pub fn has_duplicates(&self) -> bool {
    self.keywords.iter().any(|keyword| keyword.has_duplicates)
  }

  /// Misspelled single-word keywords, plus every word of misspelled phrases.
  pub fn misspelled_words(&self) -> Vec<String> {
    let mut words = Vec::new();
    for keyword in self.keywords.iter().filter(|keyword| !keyword.is_correct) {
      if keyword.is_phrase() {
        words.extend(split_words(keyword.as_str()).map(str::to_string));
      } else {
        words.push(keyword.value.to_string());
      }
    }
    words
  }

  pub fn duplicated_keywords(&self) -> Vec<String> {
    self
      .keywords
      .iter()
      .filter(|keyword| keyword.has_duplicates)
      .map(|keyword| keyword.value.to_string())
      .collect()
  }

  pub fn reset_annotations(&mut self, index: usize) -> bool {
    match self.keywords.get_mut(index) {
      Some(keyword) => {
        keyword.reset_annotations();
        true
      },
      None => false,
    }
  }

  /// Merges analysis results for keyword targets.
  ///
  /// Results must be in the order they were requested. Indices may be stale:
  /// the first index that no longer exists ends the merge, and everything
  /// after it in the batch is dropped.
  pub fn apply_analysis(&mut self, results: &[WordResult], with_stems: bool) -> usize {
    let keyword_results = || {
      results.iter().filter_map(|result| {
        match result.target {
          AnalysisTarget::Keyword(index) => Some((index, result)),
          AnalysisTarget::Title | AnalysisTarget::Description => None,
        }
      })
    };

    for (index, _) in keyword_results() {
      if !self.reset_annotations(index) {
        break;
      }
    }

    let mut applied = 0;
    for (index, result) in keyword_results() {
      let Some(keyword) = self.keywords.get_mut(index) else {
        tracing::debug!(index, len = self.keywords.len(), "dropping stale analysis results");
        break;
      };
      if !contains_literal(keyword.as_str(), &result.word, true) {
        continue;
      }
      keyword.is_correct &= result.is_correct;
      keyword.has_duplicates |= result.is_duplicate;
      if with_stems {
        if let Some(stem) = &result.stem {
          keyword.push_stem(&result.word, stem);
        }
      }
      applied += 1;
    }

    if with_stems {
      self.mark_stem_duplicates();
    }
    applied
  }

  fn stem_groups(&self) -> HashMap<String, Vec<String>> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for keyword in &self.keywords {
      for (word, stem) in keyword.stems() {
        let group = groups.entry(stem.to_string()).or_default();
        if !group.iter().any(|other| other == word) {
          group.push(word.to_string());
        }
      }
    }
    groups
  }

  /// Flags keywords whose words share a stem with a different, similar
  /// word elsewhere in the collection.
  fn mark_stem_duplicates(&mut self) {
    let groups = self.stem_groups();
    let rules = Arc::clone(&self.rules);
    for keyword in &mut self.keywords {
      let duplicated = keyword.stems().any(|(word, stem)| {
        groups.get(stem).is_some_and(|group| {
          group
            .iter()
            .any(|other| other != word && rules.are_semantic_duplicates(word, other))
        })
      });
      if duplicated {
        keyword.has_duplicates = true;
      }
    }
  }

  /// Stem to keywords sharing it, for stems shared by more than one keyword.
  pub fn duplicates_by_stem(&self) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for keyword in &self.keywords {
      for (_, stem) in keyword.stems() {
        let group = groups.entry(stem.to_string()).or_default();
        if !group.iter().any(|value| value == keyword.as_str()) {
          group.push(keyword.value.to_string());
        }
      }
    }
    groups.retain(|_, group| group.len() > 1);
    groups
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn collection(words: &[&str]) -> KeywordCollection {
    let mut keywords = KeywordCollection::new();
    keywords.append_many(words);
    keywords
  }

  fn values(keywords: &KeywordCollection) -> Vec<&str> {
    keywords.values().collect()
  }

  fn is_consistent(keywords: &KeywordCollection) -> bool {
    let mut seen = HashSet::new();
    keywords.iter().all(|keyword| seen.insert(keyword.key())) && seen == keywords.index
  }

  fn result(index: usize, word: &str, is_correct: bool, stem: Option<&str>) -> WordResult {
    WordResult {
      target: AnalysisTarget::Keyword(index),
      word: word.to_string(),
      is_correct,
      stem: stem.map(str::to_string),
      is_duplicate: false,
    }
  }

  #[test]
  fn append_rejects_invalid_and_duplicates() {
    let mut keywords = KeywordCollection::new();
    assert_eq!(keywords.append("  sunset "), Some(0));
    assert_eq!(keywords.append("SUNSET"), None);
    assert_eq!(keywords.append("--"), None);
    assert_eq!(keywords.append("beach"), Some(1));
    assert_eq!(values(&keywords), vec!["sunset", "beach"]);
  }

  #[test]
  fn append_many_drops_batch_duplicates() {
    let mut keywords = KeywordCollection::new();
    let added = keywords.append_many(["a", "A", "b"]);
    assert_eq!(added, 0..2);
    assert_eq!(added.len(), 2);
    assert_eq!(values(&keywords), vec!["a", "b"]);

    let added = keywords.append_many(["b", "c"]);
    assert_eq!(added, 2..3);
    assert_eq!(values(&keywords), vec!["a", "b", "c"]);
  }

  #[test]
  fn remove_out_of_range_is_noop() {
    let mut keywords = collection(&["one", "two"]);
    assert!(keywords.remove_at(5).is_none());
    let removed = keywords.remove_last().unwrap();
    assert_eq!(removed.as_str(), "two");
    assert!(removed.is_correct);
    assert_eq!(values(&keywords), vec!["one"]);
    assert!(keywords.remove_last().is_some());
    assert!(keywords.remove_last().is_none());
    assert!(is_consistent(&keywords));
  }

  #[test]
  fn case_only_edit_is_allowed() {
    let mut keywords = collection(&["Apple"]);
    assert!(keywords.edit(0, "apple"));
    assert_eq!(values(&keywords), vec!["apple"]);
    assert!(is_consistent(&keywords));
  }

  #[test]
  fn edit_onto_existing_keyword_fails() {
    let mut keywords = collection(&["Apple", "Banana"]);
    assert!(!keywords.can_edit(1, "apple"));
    assert!(!keywords.edit(1, "apple"));
    assert_eq!(
      keywords.fix_spelling(1, "Banana", "apple"),
      KeywordReplaceResult::FailedDuplicate
    );
    assert_eq!(values(&keywords), vec!["Apple", "Banana"]);
  }

  #[test]
  fn edit_to_same_or_invalid_value_fails() {
    let mut keywords = collection(&["Apple"]);
    assert!(!keywords.edit(0, "Apple"));
    assert!(!keywords.edit(0, " Apple,"));
    assert!(!keywords.edit(0, "..."));
    assert!(!keywords.edit(3, "pear"));
  }

  #[test]
  fn edit_resets_spelling() {
    let mut keywords = collection(&["aple"]);
    keywords.keywords[0].is_correct = false;
    assert!(keywords.edit(0, "apple"));
    assert!(keywords.get(0).unwrap().is_correct);
  }

  #[test]
  fn phrase_replace_keeps_spelling_flag() {
    let mut keywords = collection(&["red aple tree"]);
    keywords.keywords[0].is_correct = false;

    assert!(keywords.replace_substring(0, "aple", "apple"));
    assert_eq!(values(&keywords), vec!["red apple tree"]);
    assert!(!keywords.get(0).unwrap().is_correct);

    assert_eq!(
      keywords.fix_spelling(0, "tree", "trees"),
      KeywordReplaceResult::Succeeded
    );
    assert_eq!(values(&keywords), vec!["red apple trees"]);
    assert!(keywords.get(0).unwrap().is_correct);
  }

  #[test]
  fn replace_substring_ignores_single_words() {
    let mut keywords = collection(&["pineapple"]);
    assert!(!keywords.replace_substring(0, "apple", "pear"));
    assert_eq!(values(&keywords), vec!["pineapple"]);
  }

  #[test]
  fn fix_spelling_out_of_range() {
    let mut keywords = collection(&["one"]);
    assert_eq!(
      keywords.fix_spelling(1, "one", "two"),
      KeywordReplaceResult::FailedIndex
    );
  }

  #[test]
  fn remove_where_respects_case() {
    let mut keywords = collection(&["Sky", "sea", "sand"]);
    let filter = KeywordFilter::new(["sky", "SAND"], true);
    assert!(keywords.remove_where(&filter).is_empty());

    let filter = KeywordFilter::new(["sky", "SAND"], false);
    assert_eq!(keywords.remove_where(&filter), vec![0, 2]);
    assert_eq!(values(&keywords), vec!["sea"]);
    assert!(is_consistent(&keywords));
  }

  #[test]
  fn replace_all_updates_and_removes() {
    let mut keywords = collection(&["cat", "black cat", "dog"]);
    let outcome = keywords.replace_all("cat", "dog", SearchFlags::KEYWORDS);
    assert_eq!(outcome.removed, vec![0]);
    assert_eq!(outcome.updated, vec![1]);
    assert_eq!(values(&keywords), vec!["black dog", "dog"]);
    assert!(is_consistent(&keywords));
  }

  #[test]
  fn replace_all_whole_words() {
    let mut keywords = collection(&["catalog", "Cat", "cat food"]);
    let outcome = keywords.replace_all("cat", "dog", SearchFlags::EXACT_KEYWORDS);
    assert_eq!(outcome.updated, vec![1, 2]);
    assert_eq!(values(&keywords), vec!["catalog", "dog", "dog food"]);

    let mut keywords = collection(&["catalog", "Cat"]);
    let flags = SearchFlags::EXACT_KEYWORDS | SearchFlags::CASE_SENSITIVE;
    let outcome = keywords.replace_all("cat", "dog", flags);
    assert!(!outcome.is_changed());
  }

  #[test]
  fn replace_all_to_empty_removes() {
    let mut keywords = collection(&["cat", "cow"]);
    let outcome = keywords.replace_all("cat", "", SearchFlags::KEYWORDS);
    assert_eq!(outcome.removed, vec![0]);
    assert_eq!(values(&keywords), vec!["cow"]);
  }

  #[test]
  fn replace_all_identity_is_noop() {
    let mut keywords = collection(&["cat"]);
    let outcome = keywords.replace_all("cat", "cat", SearchFlags::KEYWORDS);
    assert!(!outcome.is_changed());
    assert_eq!(values(&keywords), vec!["cat"]);
  }

  #[test]
  fn set_keywords_reports_real_changes() {
    let mut keywords = collection(&["a", "b"]);
    assert!(!keywords.set_keywords(["a", "b"]));
    assert!(keywords.set_keywords(["b", "a"]));
    assert!(keywords.clear());
    assert!(!keywords.clear());
  }

  #[test]
  fn identical_set_keywords_keeps_annotations() {
    let mut keywords = collection(&["helo", "world"]);
    let results = vec![result(0, "helo", false, None), result(1, "world", true, None)];
    keywords.apply_analysis(&results, false);
    assert!(keywords.has_spell_errors());

    assert!(!keywords.set_keywords([" helo ", "world", "HELO"]));
    assert!(keywords.has_spell_errors());
    assert_eq!(keywords.misspelled_words(), vec!["helo"]);

    assert!(keywords.set_keywords(["hello", "world"]));
    assert!(!keywords.has_spell_errors());
    assert!(is_consistent(&keywords));
  }

  #[test]
  fn insert_many_at_position() {
    let mut keywords = collection(&["one", "four"]);
    let inserted = keywords.insert_many_at(1, ["two", "ONE", "three"]);
    assert_eq!(inserted, 1..3);
    assert_eq!(values(&keywords), vec!["one", "two", "three", "four"]);
    let inserted = keywords.insert_many_at(99, ["five"]);
    assert_eq!(inserted, 4..5);
  }

  #[test]
  fn contains_keyword_modes() {
    let keywords = collection(&["Blue Sky", "ocean"]);
    assert!(keywords.contains_keyword("sky", SearchFlags::KEYWORDS));
    assert!(!keywords.contains_keyword("sky", SearchFlags::EXACT_KEYWORDS));
    assert!(keywords.contains_keyword("blue sky", SearchFlags::EXACT_KEYWORDS));
    assert!(!keywords.contains_keyword(
      "blue sky",
      SearchFlags::EXACT_KEYWORDS | SearchFlags::CASE_SENSITIVE
    ));
    assert!(keywords.contains_all(["OCEAN", " blue sky "]));
    assert!(!keywords.contains_all(["ocean", "sand"]));
  }

  #[test]
  fn keywords_string_joins_in_order() {
    let keywords = collection(&["b", "a", "c"]);
    assert_eq!(keywords.keywords_string(), "b, a, c");
    assert_eq!(KeywordCollection::new().keywords_string(), "");
  }

  #[test]
  fn analysis_marks_misspellings() {
    let mut keywords = collection(&["helo", "red aple", "world"]);
    let results = vec![
      result(0, "helo", false, None),
      result(1, "red", true, None),
      result(1, "aple", false, None),
      result(2, "world", true, None),
    ];
    assert_eq!(keywords.apply_analysis(&results, false), 4);
    assert!(keywords.has_spell_errors());
    assert_eq!(keywords.misspelled_words(), vec!["helo", "red", "aple"]);

    let results = vec![result(0, "helo", true, None)];
    keywords.apply_analysis(&results, false);
    assert_eq!(keywords.misspelled_words(), vec!["red", "aple"]);
  }

  #[test]
  fn analysis_skips_words_no_longer_in_keyword() {
    let mut keywords = collection(&["hello"]);
    let results = vec![result(0, "helo", false, None)];
    assert_eq!(keywords.apply_analysis(&results, false), 0);
    assert!(!keywords.has_spell_errors());
  }

  #[test]
  fn stale_analysis_is_dropped() {
    let mut keywords = collection(&["one", "two", "three", "four", "five"]);
    let results = vec![result(4, "five", false, None)];
    for _ in 0..5 {
      keywords.remove_at(0);
    }
    assert_eq!(keywords.apply_analysis(&results, true), 0);
    assert!(keywords.is_empty());
  }

  #[test]
  fn stale_index_ends_the_batch() {
    let mut keywords = collection(&["one", "two", "three"]);
    let results = vec![
      result(0, "one", false, None),
      result(7, "gone", false, None),
      result(1, "two", false, None),
    ];
    assert_eq!(keywords.apply_analysis(&results, false), 1);
    assert!(!keywords.get(0).unwrap().is_correct);
    assert!(keywords.get(1).unwrap().is_correct);
  }

  #[test]
  fn stems_detect_duplicates() {
    let mut keywords = collection(&["cat", "cats", "dog", "category"]);
    let results = vec![
      result(0, "cat", true, Some("cat")),
      result(1, "cats", true, Some("cat")),
      result(2, "dog", true, Some("dog")),
      result(3, "category", true, Some("cat")),
    ];
    keywords.apply_analysis(&results, true);
    assert_eq!(keywords.duplicated_keywords(), vec!["cat", "cats"]);
    assert!(keywords.has_duplicates());

    let groups = keywords.duplicates_by_stem();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups["cat"], vec!["cat", "cats", "category"]);
  }

  quickcheck::quickcheck! {
    fn uniqueness_invariant_holds(ops: Vec<(u8, String, usize)>) -> bool {
      let mut keywords = KeywordCollection::new();
      for (op, word, index) in ops {
        match op % 4 {
          0 => {
            keywords.append(&word);
          },
          1 => {
            keywords.append_many([word.clone(), word.to_uppercase(), word.to_lowercase()]);
          },
          2 => {
            if !keywords.is_empty() {
              keywords.edit(index % keywords.len(), &word);
            }
          },
          _ => {
            let from: String = word.chars().take(2).collect();
            keywords.replace_all(&from, &word, SearchFlags::KEYWORDS);
          },
        }
        if !is_consistent(&keywords) {
          return false;
        }
      }
      true
    }
  }
}
