use std::{
  borrow::Cow,
  fs,
  io::Error as IOError,
  path::Path,
  time::Duration,
};

use serde::{
  Deserialize,
  Serialize,
};
use tagsmith_core::{
  KeywordRules,
  matcher::{
    DEFAULT_ALLOWED_SYMBOLS,
    DEFAULT_MAX_KEYWORD_LENGTH,
    DEFAULT_SEMANTIC_DISTANCE,
  },
};
use thiserror::Error;
use toml::{
  Table,
  Value,
  de::Error as TomlError,
};

use crate::{
  events::DEFAULT_EVENT_LIMIT,
  flags::WordAnalysisFlags,
  history::DEFAULT_HISTORY_LIMIT,
};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error("invalid config: {0}")]
  BadConfig(#[from] TomlError),
  #[error("failed to read config: {0}")]
  Io(#[from] IOError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EngineConfig {
  /// Maximum number of undoable commands.
  pub history_limit:      usize,
  /// Number of events kept for polling observers.
  pub event_limit:        usize,
  /// Symbols allowed at the edges of a keyword besides letters, digits and
  /// currency signs.
  pub allowed_symbols:    String,
  /// Exclusive upper bound on keyword length.
  pub max_keyword_length: usize,
  pub semantic_distance:  usize,
  pub spell_check:        SpellCheckConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      history_limit:      DEFAULT_HISTORY_LIMIT,
      event_limit:        DEFAULT_EVENT_LIMIT,
      allowed_symbols:    DEFAULT_ALLOWED_SYMBOLS.to_string(),
      max_keyword_length: DEFAULT_MAX_KEYWORD_LENGTH,
      semantic_distance:  DEFAULT_SEMANTIC_DISTANCE,
      spell_check:        SpellCheckConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SpellCheckConfig {
  pub enabled:        bool,
  pub stemming:       bool,
  /// Quiet period before queued requests are analysed, in milliseconds.
  pub debounce_ms:    u64,
  pub queue_capacity: usize,
}

impl Default for SpellCheckConfig {
  fn default() -> Self {
    Self {
      enabled:        true,
      stemming:       true,
      debounce_ms:    0,
      queue_capacity: 256,
    }
  }
}

impl SpellCheckConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn analysis_flags(&self) -> WordAnalysisFlags {
    if self.stemming {
      WordAnalysisFlags::ALL
    } else {
      WordAnalysisFlags::SPELLING
    }
  }
}

impl EngineConfig {
  pub fn keyword_rules(&self) -> KeywordRules {
    KeywordRules {
      allowed_symbols:   Cow::Owned(self.allowed_symbols.clone()),
      max_length:        self.max_keyword_length,
      semantic_distance: self.semantic_distance,
    }
  }

  pub fn from_toml(source: &str) -> Result<Self, ConfigLoadError> {
    Ok(toml::from_str(source)?)
  }

  /// Builds the config from a global and a local source, the local one
  /// taking precedence. A parse error in either source is returned; a source
  /// that could not be read is skipped.
  pub fn load(
    global: Result<String, ConfigLoadError>,
    local: Result<String, ConfigLoadError>,
  ) -> Result<Self, ConfigLoadError> {
    let parse = |source: String| toml::from_str::<Table>(&source).map_err(ConfigLoadError::from);
    let global = global.and_then(parse);
    let local = local.and_then(parse);

    let merged = match (global, local) {
      (_, Err(ConfigLoadError::BadConfig(err))) | (Err(ConfigLoadError::BadConfig(err)), _) => {
        return Err(ConfigLoadError::BadConfig(err));
      },
      (Ok(global), Ok(local)) => merge_toml_values(Value::Table(global), Value::Table(local), 3),
      (Ok(config), Err(_)) | (Err(_), Ok(config)) => Value::Table(config),
      (Err(global), Err(_)) => {
        tracing::debug!(%global, "no config source readable, using defaults");
        return Ok(Self::default());
      },
    };

    Ok(merged.try_into()?)
  }

  pub fn load_files(global: &Path, local: &Path) -> Result<Self, ConfigLoadError> {
    let global = fs::read_to_string(global).map_err(ConfigLoadError::Io);
    let local = fs::read_to_string(local).map_err(ConfigLoadError::Io);
    Self::load(global, local)
  }
}

/// Merges `right` into `left`, recursing into tables up to `merge_depth`
/// levels. Below that depth, and for every non-table value, `right` wins.
pub fn merge_toml_values(left: Value, right: Value, merge_depth: usize) -> Value {
  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) if merge_depth > 0 => {
      for (name, rvalue) in right_map {
        let merged = match left_map.remove(&name) {
          Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
          None => rvalue,
        };
        left_map.insert(name, merged);
      }
      Value::Table(left_map)
    },
    (_, value) => value,
  }
}
