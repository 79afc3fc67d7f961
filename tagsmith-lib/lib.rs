use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod annotations;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod flags;
pub mod history;
pub mod keyword;
pub mod keywords;
pub mod record;
pub mod registry;

pub type Tendril = SmartString<LazyCompact>;
