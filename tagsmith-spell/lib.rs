//! Background spelling and stemming annotator.
//!
//! Records are queued as [`AnalysisRequest`](tagsmith_lib::annotations::AnalysisRequest)s,
//! analysed word by word on a tokio task by an external [`Analyzer`], and the
//! results are merged back into the records they came from.

mod analyzer;
mod worker;

pub use analyzer::Analyzer;
pub use worker::{
  AnnotatorError,
  AnnotatorHandle,
};
