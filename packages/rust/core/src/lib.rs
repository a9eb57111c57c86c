//! Build pipeline orchestration for buildpipe.
//!
//! This crate ties together source discovery, binary resolution and the
//! individual stages (type check, transform, style, assets) into a single
//! [`Pipeline`] run.

pub mod discovery;
pub mod pipeline;
pub mod stages;
pub mod transformer;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::{BuildReport, Pipeline, ProgressReporter, STAGE_ORDER, SilentProgress};
pub use transformer::{EsbuildTransformer, Syntax, TransformOptions, Transformer};
