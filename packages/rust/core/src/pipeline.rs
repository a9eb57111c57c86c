//! End-to-end build pipeline: typecheck → transform → style → assets.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, instrument};

use buildpipe_resolver::BinaryResolver;
use buildpipe_runner::ProcessRunner;
use buildpipe_shared::{BuildConfig, BuildError, Result, StageKind, StageResult};

use crate::stages::{self, StageContext};
use crate::transformer::{EsbuildTransformer, Transformer};

/// Stages in execution order.
pub const STAGE_ORDER: [StageKind; 4] = [
    StageKind::TypeCheck,
    StageKind::Transform,
    StageKind::Style,
    StageKind::AssetCopy,
];

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Results of the stages that ran, in order. Stages after a failure are absent.
    pub stages: Vec<StageResult>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl BuildReport {
    /// True when every stage succeeded.
    pub fn succeeded(&self) -> bool {
        self.stages.iter().all(|s| s.succeeded)
    }

    /// The stage that stopped the run, if any.
    pub fn failure(&self) -> Option<&StageResult> {
        self.stages.iter().find(|s| !s.succeeded)
    }

    /// Process exit code: `0` on full success, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }

    /// Result for a given stage, if it ran.
    pub fn stage(&self, kind: StageKind) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == kind)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn stage_started(&self, stage: StageKind);
    /// Called after each file a stage compiles or copies.
    fn file_processed(&self, stage: StageKind, path: &Path, current: usize, total: usize);
    /// Called when a stage finishes, successfully or not.
    fn stage_finished(&self, result: &StageResult);
    /// Called when the pipeline completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageKind) {}
    fn file_processed(&self, _stage: StageKind, _path: &Path, _current: usize, _total: usize) {}
    fn stage_finished(&self, _result: &StageResult) {}
    fn done(&self, _report: &BuildReport) {}
}

/// One build invocation over a resolved [`BuildConfig`].
pub struct Pipeline {
    config: BuildConfig,
    resolver: BinaryResolver,
    runner: Arc<dyn ProcessRunner>,
    transformer: Arc<dyn Transformer>,
    typecheck_config: Option<PathBuf>,
}

impl Pipeline {
    /// Create a pipeline using the `esbuild`-backed transformer.
    pub fn new(config: BuildConfig, resolver: BinaryResolver, runner: Arc<dyn ProcessRunner>) -> Self {
        let transformer: Arc<dyn Transformer> = Arc::new(EsbuildTransformer::new(
            resolver.clone(),
            runner.clone(),
            &config,
        ));
        Self {
            config,
            resolver,
            runner,
            transformer,
            typecheck_config: None,
        }
    }

    /// Replace the per-file transformer.
    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Use an explicit type-checker config file.
    pub fn with_typecheck_config(mut self, path: Option<PathBuf>) -> Self {
        self.typecheck_config = path;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// Stage failures are reported in the returned [`BuildReport`]; `Err` is
    /// reserved for problems before the first stage (cleaning the output dir).
    #[instrument(skip_all, fields(
        source = %self.config.source_dir.display(),
        output = %self.config.output_dir.display(),
    ))]
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<BuildReport> {
        let start = Instant::now();
        info!("starting build");

        if self.config.clean {
            clean_output(&self.config.output_dir)?;
        }

        let ctx = StageContext {
            config: &self.config,
            resolver: &self.resolver,
            runner: self.runner.as_ref(),
            transformer: self.transformer.as_ref(),
            typecheck_config: self.typecheck_config.as_deref(),
            progress,
        };

        let mut results = Vec::with_capacity(STAGE_ORDER.len());
        for kind in STAGE_ORDER {
            progress.stage_started(kind);
            let result = run_stage(kind, &ctx).await;
            progress.stage_finished(&result);

            if !result.succeeded {
                error!(stage = %kind, message = %result.message, "stage failed");
                results.push(result);
                break;
            }
            results.push(result);
        }

        let report = BuildReport {
            stages: results,
            elapsed: start.elapsed(),
        };

        progress.done(&report);

        info!(
            succeeded = report.succeeded(),
            stages = report.stages.len(),
            elapsed_ms = report.elapsed.as_millis(),
            "build finished"
        );

        Ok(report)
    }
}

async fn run_stage(kind: StageKind, ctx: &StageContext<'_>) -> StageResult {
    match kind {
        StageKind::TypeCheck => stages::typecheck::run(ctx).await,
        StageKind::Transform => stages::transform::run(ctx).await,
        StageKind::Style => stages::style::run(ctx).await,
        StageKind::AssetCopy => stages::assets::run(ctx).await,
    }
}

/// Remove the output directory. A missing directory is not an error.
fn clean_output(output_dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(output_dir) {
        Ok(()) => {
            info!(path = %output_dir.display(), "cleaned output directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(output_dir, e)),
    }
}
