use unicode_general_category::{
  GeneralCategory,
  get_general_category,
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CharCategory {
  Whitespace,
  Word,
  Punctuation,
  Symbol,
  Unknown,
}

pub fn categorize_char(ch: char) -> CharCategory {
  match ch {
    c if char_is_whitespace(c) => CharCategory::Whitespace,
    c if char_is_word(c) => CharCategory::Word,
    c if char_is_punctuation(c) => CharCategory::Punctuation,
    c if char_is_symbol(c) => CharCategory::Symbol,
    _ => CharCategory::Unknown,
  }
}

#[inline]
pub fn char_is_whitespace(ch: char) -> bool {
  ch.is_whitespace()
}

#[inline]
pub fn char_is_word(ch: char) -> bool {
  ch.is_alphanumeric()
}

/// Unicode punctuation classes only. Symbols such as `$` or `+` are not
/// punctuation here.
#[inline]
pub fn char_is_punctuation(ch: char) -> bool {
  matches!(
    get_general_category(ch),
    GeneralCategory::OtherPunctuation
      | GeneralCategory::OpenPunctuation
      | GeneralCategory::ClosePunctuation
      | GeneralCategory::InitialPunctuation
      | GeneralCategory::FinalPunctuation
      | GeneralCategory::ConnectorPunctuation
      | GeneralCategory::DashPunctuation
  )
}

#[inline]
pub fn char_is_symbol(ch: char) -> bool {
  matches!(
    get_general_category(ch),
    GeneralCategory::MathSymbol
      | GeneralCategory::CurrencySymbol
      | GeneralCategory::ModifierSymbol
      | GeneralCategory::OtherSymbol
  )
}

#[inline]
pub fn char_is_currency_symbol(ch: char) -> bool {
  get_general_category(ch) == GeneralCategory::CurrencySymbol
}

/// Word boundary used by whole-word search and tokenization.
///
/// `/` is kept inside words so that paths and fractions like `24/7` stay
/// a single token.
#[inline]
pub fn char_is_separator(ch: char) -> bool {
  char_is_whitespace(ch) || (ch != '/' && char_is_punctuation(ch))
}
