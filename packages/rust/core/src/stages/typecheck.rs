//! Type-check stage: runs `tsc` in declaration-only mode over the project.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};

use buildpipe_runner::ProcessRequest;
use buildpipe_shared::{BuildConfig, BuildError, StageKind, StageResult};

use super::StageContext;

/// Type-checker binary name.
pub const TSC: &str = "tsc";

/// Package that ships [`TSC`].
pub const TSC_PACKAGE: &str = "typescript";

/// Key of the type checker's `[tools.*]` block.
pub const TOOL_KEY: &str = "typescript";

/// Arguments for a `tsc` run.
///
/// With a config file the project file drives everything; otherwise emit
/// declarations only, into the output directory.
pub fn arguments(config: &BuildConfig, project_file: Option<PathBuf>) -> Vec<String> {
    let mut args = match project_file {
        Some(path) => vec!["--project".to_string(), path.display().to_string()],
        None => vec![
            "--emitDeclarationOnly".to_string(),
            "--declaration".to_string(),
            "--declarationDir".to_string(),
            config.output_dir.display().to_string(),
            "--rootDir".to_string(),
            config.source_dir.display().to_string(),
            "--skipLibCheck".to_string(),
            "--incremental".to_string(),
            "false".to_string(),
        ],
    };
    args.extend(config.tool_args(TOOL_KEY).iter().cloned());
    args
}

#[instrument(skip_all, fields(enabled = ctx.config.use_typecheck))]
pub async fn run(ctx: &StageContext<'_>) -> StageResult {
    let start = Instant::now();
    let stage = StageKind::TypeCheck;
    let config = ctx.config;

    if !config.use_typecheck {
        return StageResult::success(stage, "type checking disabled");
    }

    let binary = match ctx.resolver.resolve(TSC, Some(TSC_PACKAGE)).require(TSC) {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "type checker unavailable");
            return StageResult::failure(stage, e.to_string());
        }
    };

    let project_file = ctx
        .typecheck_config
        .map(|p| p.to_path_buf())
        .or_else(|| config.tool_config_path(TOOL_KEY));

    let request = ProcessRequest::new(binary, &config.project_root)
        .args(arguments(config, project_file));

    info!(command = %request.command_line(), "running type checker");

    let result = match ctx.runner.run(&request).await {
        Ok(output) if output.success() => StageResult::success(stage, "types verified"),
        Ok(output) => {
            let err = BuildError::ToolExecutionFailed {
                tool: TSC.to_string(),
                code: output.exit_code,
                output: output.diagnostics().to_string(),
            };
            StageResult::failure(stage, err.to_string())
        }
        Err(e) => StageResult::failure(stage, e.to_string()),
    };

    result.with_elapsed(start.elapsed())
}
