//! Keyword sanitization and word-aware text matching.
//!
//! # Overview
//!
//! Everything in this module is a pure function over `&str`. Nothing holds
//! state and nothing allocates unless it has to return an owned string.
//!
//! - [`KeywordRules`] decides what a valid keyword looks like and how keywords
//!   are cleaned up before they are stored.
//! - [`find_occurrences`] walks literal, non-overlapping occurrences of a
//!   needle, optionally ignoring case. Whole-word search and replace are built
//!   on top of it.
//! - [`split_words`] tokenizes text on whitespace and punctuation (`/` is not
//!   a boundary).
//! - [`levenshtein_distance`] and [`KeywordRules::are_semantic_duplicates`]
//!   back duplicate detection.
//!
//! # Case folding
//!
//! Case-insensitive comparison is done per character using the Unicode
//! lowercase mapping. Byte offsets reported by [`Occurrences`] always refer to
//! the haystack, so a match may be longer or shorter in bytes than the needle.

use std::{
  borrow::Cow,
  iter::FusedIterator,
};

use crate::chars::{
  char_is_currency_symbol,
  char_is_separator,
  char_is_word,
};

pub const DEFAULT_ALLOWED_SYMBOLS: &str = "@#%&!?";
pub const DEFAULT_MAX_KEYWORD_LENGTH: usize = 30;
pub const DEFAULT_SEMANTIC_DISTANCE: usize = 3;

/// Validation and sanitization rules for keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRules {
  /// Non-alphanumeric characters that may start or end a keyword.
  pub allowed_symbols:   Cow<'static, str>,
  /// Exclusive upper bound on keyword length, in characters.
  pub max_length:        usize,
  /// Maximum edit distance between two semantic duplicates.
  pub semantic_distance: usize,
}

impl Default for KeywordRules {
  fn default() -> Self {
    Self::DEFAULT
  }
}

impl KeywordRules {
  pub const DEFAULT: KeywordRules = KeywordRules {
    allowed_symbols:   Cow::Borrowed(DEFAULT_ALLOWED_SYMBOLS),
    max_length:        DEFAULT_MAX_KEYWORD_LENGTH,
    semantic_distance: DEFAULT_SEMANTIC_DISTANCE,
  };

  #[inline]
  fn is_keyword_char(&self, ch: char) -> bool {
    char_is_word(ch) || self.allowed_symbols.contains(ch) || char_is_currency_symbol(ch)
  }

  /// Trims characters that cannot bound a keyword from both ends and
  /// collapses internal whitespace runs into single spaces.
  ///
  /// Returns an empty string when nothing survives. Applying it twice is the
  /// same as applying it once.
  pub fn sanitize(&self, word: &str) -> String {
    let trimmed = word.trim_matches(|ch: char| !self.is_keyword_char(ch));
    simplify_whitespace(trimmed)
  }

  pub fn is_valid(&self, word: &str) -> bool {
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
      (None, _) => false,
      (Some(ch), None) => self.is_keyword_char(ch),
      _ => word.chars().count() < self.max_length,
    }
  }

  /// Whether two keywords are close enough to count as the same concept.
  ///
  /// Case-insensitive equality always qualifies. Otherwise the length
  /// difference and the edit distance of the lowercase forms must both stay
  /// within `semantic_distance`, and the distance must be smaller than the
  /// shorter word (a full rewrite of a short word is not a near match).
  ///
  /// That last bound is stricter than the plain length and distance check:
  /// without it `("cat", "dog")` would count as duplicates, since both
  /// differences are within 3.
  pub fn are_semantic_duplicates(&self, a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
      return true;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a.abs_diff(len_b) > self.semantic_distance {
      return false;
    }

    let distance = levenshtein_distance(&a, &b);
    distance <= self.semantic_distance && distance < len_a.min(len_b)
  }
}

pub fn sanitize(word: &str) -> String {
  KeywordRules::DEFAULT.sanitize(word)
}

pub fn is_valid_keyword(word: &str) -> bool {
  KeywordRules::DEFAULT.is_valid(word)
}

pub fn are_semantic_duplicates(a: &str, b: &str) -> bool {
  KeywordRules::DEFAULT.are_semantic_duplicates(a, b)
}

fn simplify_whitespace(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for (i, part) in text.split_whitespace().enumerate() {
    if i > 0 {
      out.push(' ');
    }
    out.push_str(part);
  }
  out
}

/// Classic edit distance over characters. Callers lowercase first when they
/// want a case-insensitive distance.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
  let b: Vec<char> = b.chars().collect();
  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut costs = vec![0; b.len() + 1];

  for (i, ca) in a.chars().enumerate() {
    costs[0] = i + 1;
    for (j, cb) in b.iter().enumerate() {
      let substitution = prev[j] + usize::from(ca != *cb);
      costs[j + 1] = (prev[j + 1] + 1).min(costs[j] + 1).min(substitution);
    }
    std::mem::swap(&mut costs, &mut prev);
  }

  prev[b.len()]
}

#[inline]
fn chars_eq(a: char, b: char, case_sensitive: bool) -> bool {
  a == b || (!case_sensitive && a.to_lowercase().eq(b.to_lowercase()))
}

/// Byte length of the haystack prefix matching `needle`, if any.
fn match_prefix(haystack: &str, needle: &str, case_sensitive: bool) -> Option<usize> {
  let mut hay = haystack.char_indices();
  for expected in needle.chars() {
    let (_, ch) = hay.next()?;
    if !chars_eq(ch, expected, case_sensitive) {
      return None;
    }
  }
  Some(hay.next().map_or(haystack.len(), |(idx, _)| idx))
}

/// Iterator over non-overlapping literal occurrences of a needle, yielding
/// `(start, end)` byte ranges into the haystack from left to right.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
  haystack:       &'a str,
  needle:         &'a str,
  case_sensitive: bool,
  pos:            usize,
}

impl Iterator for Occurrences<'_> {
  type Item = (usize, usize);

  fn next(&mut self) -> Option<Self::Item> {
    if self.needle.is_empty() || self.pos >= self.haystack.len() {
      return None;
    }

    let rest = &self.haystack[self.pos..];
    if self.case_sensitive {
      let start = self.pos + rest.find(self.needle)?;
      let end = start + self.needle.len();
      self.pos = end;
      return Some((start, end));
    }

    for (offset, _) in rest.char_indices() {
      let start = self.pos + offset;
      if let Some(len) = match_prefix(&self.haystack[start..], self.needle, false) {
        self.pos = start + len;
        return Some((start, start + len));
      }
    }

    self.pos = self.haystack.len();
    None
  }
}

impl FusedIterator for Occurrences<'_> {}

pub fn find_occurrences<'a>(
  haystack: &'a str,
  needle: &'a str,
  case_sensitive: bool,
) -> Occurrences<'a> {
  Occurrences {
    haystack,
    needle,
    case_sensitive,
    pos: 0,
  }
}

/// Whether `haystack[start..end]` is bounded by separators or string edges
/// on both sides.
pub fn is_whole_word_at(haystack: &str, start: usize, end: usize) -> bool {
  let left = haystack[..start]
    .chars()
    .next_back()
    .is_none_or(char_is_separator);
  let right = haystack[end..].chars().next().is_none_or(char_is_separator);
  left && right
}

pub fn contains_literal(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
  find_occurrences(haystack, needle, case_sensitive)
    .next()
    .is_some()
}

pub fn contains_whole_word(haystack: &str, needle: &str, case_sensitive: bool) -> bool {
  find_occurrences(haystack, needle, case_sensitive)
    .any(|(start, end)| is_whole_word_at(haystack, start, end))
}

pub fn replace_literal(
  haystack: &str,
  needle: &str,
  replacement: &str,
  case_sensitive: bool,
) -> String {
  replace_where(haystack, needle, replacement, case_sensitive, |_, _| true)
}

/// Replaces only occurrences that form whole words. Occurrences embedded in
/// longer words are left untouched.
pub fn replace_whole_words(
  haystack: &str,
  needle: &str,
  replacement: &str,
  case_sensitive: bool,
) -> String {
  replace_where(haystack, needle, replacement, case_sensitive, |start, end| {
    is_whole_word_at(haystack, start, end)
  })
}

fn replace_where(
  haystack: &str,
  needle: &str,
  replacement: &str,
  case_sensitive: bool,
  mut accept: impl FnMut(usize, usize) -> bool,
) -> String {
  let mut out = String::with_capacity(haystack.len());
  let mut last = 0;
  for (start, end) in find_occurrences(haystack, needle, case_sensitive) {
    if !accept(start, end) {
      continue;
    }
    out.push_str(&haystack[last..start]);
    out.push_str(replacement);
    last = end;
  }
  out.push_str(&haystack[last..]);
  out
}

/// Lazy tokenizer over whitespace/punctuation delimited words. Cloning the
/// iterator restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Words<'a> {
  rest: &'a str,
}

impl<'a> Iterator for Words<'a> {
  type Item = &'a str;

  fn next(&mut self) -> Option<&'a str> {
    let Some(start) = self.rest.find(|ch: char| !char_is_separator(ch)) else {
      self.rest = "";
      return None;
    };
    let rest = &self.rest[start..];
    let end = rest.find(char_is_separator).unwrap_or(rest.len());
    let (word, tail) = rest.split_at(end);
    self.rest = tail;
    Some(word)
  }
}

impl FusedIterator for Words<'_> {}

pub fn split_words(text: &str) -> Words<'_> {
  Words { rest: text }
}
