use bitflags::bitflags;
use serde::{
  Deserialize,
  Serialize,
};

bitflags! {
  /// Which fields a search or replace touches and how it matches.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct SearchFlags: u32 {
    const CASE_SENSITIVE = 1 << 0;
    const DESCRIPTION    = 1 << 1;
    const TITLE          = 1 << 2;
    const KEYWORDS       = 1 << 3;
    const WHOLE_WORDS    = 1 << 4;

    const METADATA       = Self::DESCRIPTION.bits() | Self::TITLE.bits() | Self::KEYWORDS.bits();
    const EXACT_KEYWORDS = Self::WHOLE_WORDS.bits() | Self::KEYWORDS.bits();
  }
}

impl SearchFlags {
  #[inline]
  pub fn case_sensitive(self) -> bool {
    self.contains(Self::CASE_SENSITIVE)
  }

  #[inline]
  pub fn whole_words(self) -> bool {
    self.contains(Self::WHOLE_WORDS)
  }
}

bitflags! {
  /// Sub-operations of a combined (multi-record) edit.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct CombinedEditFlags: u32 {
    const EDIT_TITLE       = 1 << 0;
    const EDIT_DESCRIPTION = 1 << 1;
    const EDIT_KEYWORDS    = 1 << 2;
    const APPEND_KEYWORDS  = 1 << 3;
    const CLEAR            = 1 << 4;

    const EDIT_EVERYTHING  = Self::EDIT_TITLE.bits()
      | Self::EDIT_DESCRIPTION.bits()
      | Self::EDIT_KEYWORDS.bits();
  }
}

bitflags! {
  /// Record fields submitted for analysis.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct SpellCheckFlags: u32 {
    const TITLE       = 1 << 0;
    const DESCRIPTION = 1 << 1;
    const KEYWORDS    = 1 << 2;

    const ALL         = Self::TITLE.bits() | Self::DESCRIPTION.bits() | Self::KEYWORDS.bits();
  }
}

bitflags! {
  /// What the analyzer should compute for each word.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct WordAnalysisFlags: u32 {
    const SPELLING = 1 << 0;
    const STEMMING = 1 << 1;

    const ALL      = Self::SPELLING.bits() | Self::STEMMING.bits();
  }
}

/// Tag of an [`EditCommand`](crate::command::EditCommand) variant, kept in
/// history items and events after the command itself is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
  CombinedEdit,
  FindAndReplace,
  DeleteKeywords,
  PasteKeywords,
  ExpandPreset,
  AddRecords,
  RemoveRecords,
}
