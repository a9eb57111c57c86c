//! The build stages, in pipeline order.
//!
//! Each stage takes a [`StageContext`] and returns exactly one
//! [`StageResult`](buildpipe_shared::StageResult). Stages never return errors:
//! anything that goes wrong is folded into a failed result.

pub mod assets;
pub mod style;
pub mod transform;
pub mod typecheck;

use std::path::Path;

use buildpipe_resolver::BinaryResolver;
use buildpipe_runner::ProcessRunner;
use buildpipe_shared::BuildConfig;

use crate::pipeline::ProgressReporter;
use crate::transformer::Transformer;

/// Everything a stage may read or call. Borrowed for the length of one run.
pub struct StageContext<'a> {
    pub config: &'a BuildConfig,
    pub resolver: &'a BinaryResolver,
    pub runner: &'a dyn ProcessRunner,
    pub transformer: &'a dyn Transformer,
    /// Explicit type-checker config, overriding `tools.typescript.config`.
    pub typecheck_config: Option<&'a Path>,
    pub progress: &'a dyn ProgressReporter,
}
