//! Metadata record aggregate.
//!
//! A [`MetadataRecord`] owns the title, description and keyword list of one
//! media file together with their analysis annotations.
//!
//! # Locking
//!
//! Title, description and keywords each sit behind their own
//! [`parking_lot::RwLock`]. Methods take exactly one of them at a time and
//! release it before returning, so editing one field never blocks readers of
//! another, and no method holds a lock while calling back into caller code.
//!
//! # Lifetime
//!
//! Records are shared as `Arc<MetadataRecord>`. On top of that, a [`Hold`]
//! counts the parties that still need the record: the registry owns one unit
//! from construction, and every [`RecordHandle`] (commands, analysis batches,
//! history items) owns one more. A record unlinked from the registry is only
//! finalized once its hold count drops to zero.

use std::{
  fmt,
  num::NonZeroUsize,
  ops::Deref,
  path::{
    Path,
    PathBuf,
  },
  sync::{
    Arc,
    atomic::{
      AtomicBool,
      AtomicU64,
      AtomicUsize,
      Ordering,
    },
  },
};

use hashbrown::{
  HashMap,
  HashSet,
};
use parking_lot::{
  RwLock,
  RwLockReadGuard,
};
use serde::{
  Deserialize,
  Serialize,
};
use tagsmith_core::{
  KeywordRules,
  matcher::{
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
  flags::{
    SearchFlags,
    WordAnalysisFlags,
  },
  keyword::Keyword,
  keywords::{
    KeywordCollection,
    KeywordFilter,
    KeywordReplaceResult,
  },
};

/// Marker for an unknown position in the registry.
pub const INVALID_INDEX: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(NonZeroUsize);

impl RecordId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for RecordId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Kind of media a record describes.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
  Image {
    /// Vector source attached to a raster image, if any.
    vector_path: Option<PathBuf>,
  },
  Video {
    duration_secs: Option<f64>,
    codec:         Option<String>,
  },
}

impl RecordKind {
  pub fn image() -> Self {
    Self::Image { vector_path: None }
  }

  pub fn video() -> Self {
    Self::Video {
      duration_secs: None,
      codec:         None,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Self::Image { .. } => "image",
      Self::Video { .. } => "video",
    }
  }

  pub fn attached_vector(&self) -> Option<&Path> {
    match self {
      Self::Image { vector_path } => vector_path.as_deref(),
      Self::Video { .. } => None,
    }
  }
}

/// Atomic reference count gating finalization.
#[derive(Debug)]
pub struct Hold {
  count: AtomicUsize,
}

impl Default for Hold {
  fn default() -> Self {
    Self::new()
  }
}

impl Hold {
  /// Starts owned by one party.
  pub fn new() -> Self {
    Self {
      count: AtomicUsize::new(1),
    }
  }

  pub fn acquire(&self) {
    self.count.fetch_add(1, Ordering::AcqRel);
  }

  /// Returns `true` when this call released the last unit.
  pub fn release(&self) -> bool {
    let prev = self.count.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(prev > 0, "hold released more times than acquired");
    prev == 1
  }

  pub fn count(&self) -> usize {
    self.count.load(Ordering::Acquire)
  }

  pub fn is_free(&self) -> bool {
    self.count() == 0
  }
}

/// Shared reference that holds the record for as long as it lives.
pub struct RecordHandle(Arc<MetadataRecord>);

impl RecordHandle {
  pub fn new(record: &Arc<MetadataRecord>) -> Self {
    record.acquire();
    Self(Arc::clone(record))
  }

  pub fn record(&self) -> &Arc<MetadataRecord> {
    &self.0
  }
}

impl Clone for RecordHandle {
  fn clone(&self) -> Self {
    Self::new(&self.0)
  }
}

/// Releasing the last hold on an unlinked record does not finalize it. The
/// registry picks it up on its next
/// [`collect_garbage`](crate::registry::RecordRegistry::collect_garbage).
impl Drop for RecordHandle {
  fn drop(&mut self) {
    if self.0.release() {
      tracing::debug!(record = %self.0.id(), "last hold released");
    }
  }
}

impl Deref for RecordHandle {
  type Target = MetadataRecord;

  fn deref(&self) -> &MetadataRecord {
    &self.0
  }
}

impl fmt::Debug for RecordHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("RecordHandle").field(&self.0.id()).finish()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Title,
  Description,
}

/// Free text field with its annotation sets (lowercase words).
#[derive(Debug, Default, Clone)]
pub struct TextField {
  pub text:       String,
  pub errors:     HashSet<String>,
  pub duplicates: HashSet<String>,
}

impl TextField {
  fn set(&mut self, value: &str) -> bool {
    if self.text == value {
      return false;
    }
    self.text = value.to_string();
    true
  }

  fn replace(&mut self, from: &str, to: &str, case_sensitive: bool, whole_words: bool) -> bool {
    let replaced = if whole_words {
      replace_whole_words(&self.text, from, to, case_sensitive)
    } else {
      replace_literal(&self.text, from, to, case_sensitive)
    };
    if replaced == self.text {
      return false;
    }
    self.text = replaced;
    true
  }

  fn words(&self) -> Vec<String> {
    split_words(&self.text).map(str::to_string).collect()
  }

  /// Rebuilds the annotation sets from scratch for the current words.
  /// Words without a result count as correct.
  fn apply_analysis<'a>(&mut self, results: impl Iterator<Item = &'a WordResult>, with_stems: bool) {
    let by_word: HashMap<&str, &WordResult> = results
      .map(|result| (result.word.as_str(), result))
      .collect();

    let mut errors = HashSet::new();
    let mut duplicates = HashSet::new();
    for word in split_words(&self.text) {
      let Some(result) = by_word.get(word) else {
        continue;
      };
      if !result.is_correct {
        errors.insert(word.to_lowercase());
      }
      if with_stems && result.is_duplicate {
        duplicates.insert(word.to_lowercase());
      }
    }

    self.errors = errors;
    if with_stems {
      self.duplicates = duplicates;
    }
  }
}

/// Metadata as read from the file itself.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OriginMetadata {
  pub title:       String,
  pub description: String,
  pub keywords:    Vec<String>,
  pub file_size:   u64,
}

/// Metadata restored from a local cache of earlier edits.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CachedMetadata {
  pub title:       String,
  pub description: String,
  pub keywords:    Vec<String>,
}

/// Verbatim copy of the editable state of a record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordBackup {
  pub title:        String,
  pub description:  String,
  pub keywords:     Vec<String>,
  pub was_modified: bool,
}

#[derive(Debug, Default)]
struct RecordFlags {
  initialized:        AtomicBool,
  almost_initialized: AtomicBool,
  modified:           AtomicBool,
  selected:           AtomicBool,
  removed:            AtomicBool,
}

#[derive(Debug)]
pub struct MetadataRecord {
  id:               RecordId,
  kind:             RecordKind,
  file_path:        PathBuf,
  file_size:        AtomicU64,
  title:            RwLock<TextField>,
  description:      RwLock<TextField>,
  keywords:         RwLock<KeywordCollection>,
  flags:            RecordFlags,
  last_known_index: AtomicUsize,
  hold:             Hold,
}

impl MetadataRecord {
  pub fn new(
    id: RecordId,
    file_path: impl Into<PathBuf>,
    kind: RecordKind,
    rules: Arc<KeywordRules>,
  ) -> Self {
    Self {
      id,
      kind,
      file_path: file_path.into(),
      file_size: AtomicU64::new(0),
      title: RwLock::new(TextField::default()),
      description: RwLock::new(TextField::default()),
      keywords: RwLock::new(KeywordCollection::with_rules(rules)),
      flags: RecordFlags::default(),
      last_known_index: AtomicUsize::new(INVALID_INDEX),
      hold: Hold::new(),
    }
  }

  pub fn id(&self) -> RecordId {
    self.id
  }

  pub fn kind(&self) -> &RecordKind {
    &self.kind
  }

  pub fn file_path(&self) -> &Path {
    &self.file_path
  }

  pub fn file_size(&self) -> u64 {
    self.file_size.load(Ordering::Relaxed)
  }

  pub fn acquire(&self) {
    self.hold.acquire();
  }

  pub fn release(&self) -> bool {
    self.hold.release()
  }

  pub fn hold_count(&self) -> usize {
    self.hold.count()
  }

  /// Position hint in the registry. May be stale; [`INVALID_INDEX`] when
  /// unknown.
  pub fn last_known_index(&self) -> usize {
    self.last_known_index.load(Ordering::Relaxed)
  }

  pub fn set_last_known_index(&self, index: usize) {
    self.last_known_index.store(index, Ordering::Relaxed);
  }

  pub fn is_initialized(&self) -> bool {
    self.flags.initialized.load(Ordering::Acquire)
  }

  pub fn is_almost_initialized(&self) -> bool {
    self.flags.almost_initialized.load(Ordering::Acquire)
  }

  pub fn is_modified(&self) -> bool {
    self.flags.modified.load(Ordering::Acquire)
  }

  /// Returns `true` if the flag flipped.
  pub fn mark_modified(&self) -> bool {
    self
      .flags
      .modified
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  pub fn reset_modified(&self) {
    self.flags.modified.store(false, Ordering::Release);
  }

  pub fn is_selected(&self) -> bool {
    self.flags.selected.load(Ordering::Relaxed)
  }

  pub fn set_selected(&self, selected: bool) {
    self.flags.selected.store(selected, Ordering::Relaxed);
  }

  /// Whether the record has been unlinked from the registry.
  pub fn is_removed(&self) -> bool {
    self.flags.removed.load(Ordering::Acquire)
  }

  pub(crate) fn set_removed(&self, removed: bool) {
    self.flags.removed.store(removed, Ordering::Release);
  }

  fn ensure_initialized(&self, operation: &'static str) -> bool {
    if self.is_initialized() {
      return true;
    }
    tracing::debug!(record = %self.id, operation, "rejecting edit of uninitialized record");
    false
  }

  fn changed(&self, changed: bool) -> bool {
    if changed {
      self.mark_modified();
    }
    changed
  }

  fn field(&self, field: Field) -> &RwLock<TextField> {
    match field {
      Field::Title => &self.title,
      Field::Description => &self.description,
    }
  }

  // Reads.

  pub fn title(&self) -> String {
    self.title.read().text.clone()
  }

  pub fn description(&self) -> String {
    self.description.read().text.clone()
  }

  pub fn keywords(&self) -> RwLockReadGuard<'_, KeywordCollection> {
    self.keywords.read()
  }

  pub fn keywords_string(&self) -> String {
    self.keywords.read().keywords_string()
  }

  pub fn keywords_count(&self) -> usize {
    self.keywords.read().len()
  }

  pub fn keywords_snapshot(&self) -> Vec<String> {
    self.keywords.read().snapshot()
  }

  pub fn title_words(&self) -> Vec<String> {
    self.title.read().words()
  }

  pub fn description_words(&self) -> Vec<String> {
    self.description.read().words()
  }

  pub fn is_title_empty(&self) -> bool {
    self.title.read().text.trim().is_empty()
  }

  pub fn is_description_empty(&self) -> bool {
    self.description.read().text.trim().is_empty()
  }

  pub fn is_empty(&self) -> bool {
    let title = self.is_title_empty();
    let description = self.is_description_empty();
    let keywords = self.keywords.read().is_empty();
    title && description && keywords
  }

  pub fn has_word_error(&self, field: Field, word: &str) -> bool {
    self.field(field).read().errors.contains(&word.to_lowercase())
  }

  pub fn has_word_duplicate(&self, field: Field, word: &str) -> bool {
    self
      .field(field)
      .read()
      .duplicates
      .contains(&word.to_lowercase())
  }

  pub fn has_spell_errors(&self) -> bool {
    let title = !self.title.read().errors.is_empty();
    let description = !self.description.read().errors.is_empty();
    let keywords = self.keywords.read().has_spell_errors();
    title || description || keywords
  }

  // Field edits. Every edit is rejected on an uninitialized record and marks
  // the record modified when something changed.

  pub fn set_title(&self, value: &str) -> bool {
    self.ensure_initialized("set_title") && self.changed(self.title.write().set(value))
  }

  pub fn set_description(&self, value: &str) -> bool {
    self.ensure_initialized("set_description") && self.changed(self.description.write().set(value))
  }

  pub fn set_keywords<I, S>(&self, words: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.ensure_initialized("set_keywords")
      && self.changed(self.keywords.write().set_keywords(words))
  }

  pub fn append_keyword(&self, word: &str) -> bool {
    self.ensure_initialized("append_keyword")
      && self.changed(self.keywords.write().append(word).is_some())
  }

  /// Returns the number of keywords added.
  pub fn append_keywords<I, S>(&self, words: I) -> usize
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    if !self.ensure_initialized("append_keywords") {
      return 0;
    }
    let added = self.keywords.write().append_many(words).len();
    self.changed(added > 0);
    added
  }

  pub fn remove_keyword_at(&self, index: usize) -> Option<Keyword> {
    if !self.ensure_initialized("remove_keyword_at") {
      return None;
    }
    let removed = self.keywords.write().remove_at(index);
    self.changed(removed.is_some());
    removed
  }

  pub fn remove_last_keyword(&self) -> Option<Keyword> {
    if !self.ensure_initialized("remove_last_keyword") {
      return None;
    }
    let removed = self.keywords.write().remove_last();
    self.changed(removed.is_some());
    removed
  }

  pub fn edit_keyword(&self, index: usize, replacement: &str) -> bool {
    self.ensure_initialized("edit_keyword")
      && self.changed(self.keywords.write().edit(index, replacement))
  }

  pub fn clear_keywords(&self) -> bool {
    self.ensure_initialized("clear_keywords") && self.changed(self.keywords.write().clear())
  }

  pub fn remove_keywords(&self, filter: &KeywordFilter) -> bool {
    self.ensure_initialized("remove_keywords")
      && self.changed(!self.keywords.write().remove_where(filter).is_empty())
  }

  /// Clears title, description and keywords.
  pub fn clear(&self) -> bool {
    if !self.ensure_initialized("clear") {
      return false;
    }
    let title = self.title.write().set("");
    let description = self.description.write().set("");
    let keywords = self.keywords.write().clear();
    self.changed(title || description || keywords)
  }

  /// Replaces the keyword at `index` with the preset, in place. Without an
  /// index the preset is appended.
  pub fn expand_preset<I, S>(&self, index: Option<usize>, preset: I) -> bool
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    if !self.ensure_initialized("expand_preset") {
      return false;
    }
    let mut keywords = self.keywords.write();
    let changed = match index {
      Some(index) => {
        if keywords.remove_at(index).is_none() {
          return false;
        }
        keywords.insert_many_at(index, preset);
        true
      },
      None => !keywords.append_many(preset).is_empty(),
    };
    drop(keywords);
    self.changed(changed)
  }

  pub fn replace_in_title(&self, from: &str, to: &str, flags: SearchFlags) -> bool {
    self.replace_in_field(Field::Title, from, to, flags)
  }

  pub fn replace_in_description(&self, from: &str, to: &str, flags: SearchFlags) -> bool {
    self.replace_in_field(Field::Description, from, to, flags)
  }

  fn replace_in_field(&self, field: Field, from: &str, to: &str, flags: SearchFlags) -> bool {
    if !self.ensure_initialized("replace") {
      return false;
    }
    let changed = self.field(field).write().replace(
      from,
      to,
      flags.case_sensitive(),
      flags.whole_words(),
    );
    self.changed(changed)
  }

  /// Find and replace over the fields selected in `flags`.
  pub fn replace(&self, from: &str, to: &str, flags: SearchFlags) -> bool {
    let mut any = false;
    if flags.contains(SearchFlags::TITLE) {
      any |= self.replace_in_title(from, to, flags);
    }
    if flags.contains(SearchFlags::DESCRIPTION) {
      any |= self.replace_in_description(from, to, flags);
    }
    if flags.contains(SearchFlags::KEYWORDS) && self.ensure_initialized("replace") {
      let outcome = self.keywords.write().replace_all(from, to, flags);
      any |= self.changed(outcome.is_changed());
    }
    any
  }

  pub fn fix_title_spelling(&self, word: &str, replacement: &str) -> bool {
    let flags = SearchFlags::CASE_SENSITIVE | SearchFlags::WHOLE_WORDS;
    self.replace_in_field(Field::Title, word, replacement, flags)
  }

  pub fn fix_description_spelling(&self, word: &str, replacement: &str) -> bool {
    let flags = SearchFlags::CASE_SENSITIVE | SearchFlags::WHOLE_WORDS;
    self.replace_in_field(Field::Description, word, replacement, flags)
  }

  pub fn fix_keyword_spelling(
    &self,
    index: usize,
    existing: &str,
    replacement: &str,
  ) -> KeywordReplaceResult {
    if !self.ensure_initialized("fix_keyword_spelling") {
      return KeywordReplaceResult::Unknown;
    }
    let result = self
      .keywords
      .write()
      .fix_spelling(index, existing, replacement);
    self.changed(result == KeywordReplaceResult::Succeeded);
    result
  }

  // Initialization from external sources.

  pub fn init_as_empty(&self) {
    self.flags.initialized.store(true, Ordering::Release);
  }

  /// Seeds the record from the file's own metadata.
  ///
  /// A record that was not pre-filled from the cache (or `overwrite`) takes
  /// the origin values as is and stays unmodified. Otherwise the cached edits
  /// are merged: non-empty origin text wins, empty origin text keeps the
  /// cached value, and the keyword list falls back to the origin's unless it
  /// already covers it. Returns whether the merge left the record modified.
  pub fn init_from_origin(&self, origin: &OriginMetadata, overwrite: bool) -> bool {
    let mut modified = false;

    if !self.is_almost_initialized() || overwrite {
      self.title.write().set(&origin.title);
      self.description.write().set(&origin.description);
      self.keywords.write().set_keywords(&origin.keywords);
    } else {
      for (field, value) in [
        (Field::Title, &origin.title),
        (Field::Description, &origin.description),
      ] {
        let mut field = self.field(field).write();
        if !value.is_empty() {
          field.set(value);
        } else if !field.text.trim().is_empty() {
          modified = true;
        }
      }

      let mut keywords = self.keywords.write();
      if !keywords.contains_all(&origin.keywords) {
        keywords.set_keywords(&origin.keywords);
      } else if keywords.len() > origin.keywords.len() {
        modified = true;
      }
    }

    if modified {
      self.mark_modified();
    }
    self.file_size.store(origin.file_size, Ordering::Relaxed);
    self.flags.initialized.store(true, Ordering::Release);
    modified
  }

  /// Seeds the record from cached edits. Before initialization this sets
  /// every field; afterwards it only fills empty text fields and appends
  /// missing keywords.
  pub fn init_from_storage(&self, cached: &CachedMetadata) {
    if !self.is_initialized() {
      self.title.write().set(&cached.title);
      self.description.write().set(&cached.description);
      self.keywords.write().set_keywords(&cached.keywords);
    } else {
      for (field, value) in [
        (Field::Title, &cached.title),
        (Field::Description, &cached.description),
      ] {
        let mut field = self.field(field).write();
        if field.text.trim().is_empty() {
          field.set(value);
        }
      }
      self.keywords.write().append_many(&cached.keywords);
    }
    self
      .flags
      .almost_initialized
      .store(true, Ordering::Release);
  }

  // Backup and restore.

  pub fn backup(&self) -> RecordBackup {
    RecordBackup {
      title:        self.title(),
      description:  self.description(),
      keywords:     self.keywords_snapshot(),
      was_modified: self.is_modified(),
    }
  }

  /// Restores a backup verbatim, including the modified flag.
  pub fn restore(&self, backup: &RecordBackup) {
    self.title.write().set(&backup.title);
    self.description.write().set(&backup.description);
    self.keywords.write().restore_values(&backup.keywords);
    self
      .flags
      .modified
      .store(backup.was_modified, Ordering::Release);
  }

  // Analysis.

  /// Merges analysis results into keywords, title and description, one
  /// field lock at a time. Stale keyword indices are dropped.
  pub fn apply_analysis(&self, results: &[WordResult], flags: WordAnalysisFlags) {
    let with_stems = flags.contains(WordAnalysisFlags::STEMMING);

    self.keywords.write().apply_analysis(results, with_stems);

    for (field, target) in [
      (Field::Title, AnalysisTarget::Title),
      (Field::Description, AnalysisTarget::Description),
    ] {
      let mut matching = results.iter().filter(|result| result.target == target).peekable();
      if matching.peek().is_none() {
        continue;
      }
      self.field(field).write().apply_analysis(matching, with_stems);
    }
  }
}
