pub mod chars;
pub mod matcher;

pub use matcher::KeywordRules;
