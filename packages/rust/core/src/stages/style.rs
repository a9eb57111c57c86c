//! Style stage: one `postcss` run over every stylesheet in the source tree.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use buildpipe_runner::ProcessRequest;
use buildpipe_shared::{BuildConfig, BuildError, STYLESHEET_EXTENSION, StageKind, StageResult};

use super::StageContext;
use crate::discovery;

/// Stylesheet-processor binary name.
pub const POSTCSS: &str = "postcss";

/// Package that ships [`POSTCSS`].
pub const POSTCSS_PACKAGE: &str = "postcss-cli";

/// Directory under the tool root holding the bundled processor config.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Arguments for a `postcss` run. `config_dir` is the directory searched for
/// `postcss.config.js`.
pub fn arguments(config: &BuildConfig, config_dir: PathBuf) -> Vec<String> {
    let source = config.source_dir.display().to_string();
    let mut args = vec![
        format!(
            "{}/{}",
            source.trim_end_matches('/'),
            discovery::extension_pattern(STYLESHEET_EXTENSION)
        ),
        "--base".to_string(),
        source,
        "--dir".to_string(),
        config.output_dir.display().to_string(),
        "--config".to_string(),
        config_dir.display().to_string(),
    ];
    args.extend(config.tool_args(POSTCSS).iter().cloned());
    args
}

#[instrument(skip_all)]
pub async fn run(ctx: &StageContext<'_>) -> StageResult {
    let start = Instant::now();
    let stage = StageKind::Style;
    let config = ctx.config;

    let pattern = discovery::extension_pattern(STYLESHEET_EXTENSION);
    match discovery::any_file(&config.source_dir, &pattern) {
        Ok(false) => {
            debug!("no stylesheets found");
            return StageResult::success(stage, "no stylesheets");
        }
        Ok(true) => {}
        Err(e) => return StageResult::failure(stage, e.to_string()),
    }

    // Stylesheets exist, so the processor is mandatory from here on.
    let binary = match ctx.resolver.resolve(POSTCSS, Some(POSTCSS_PACKAGE)).require(POSTCSS) {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "stylesheet processor unavailable");
            return StageResult::failure(stage, e.to_string());
        }
    };

    let config_dir = config
        .tool_config_path(POSTCSS)
        .unwrap_or_else(|| ctx.resolver.tool_root().join(DEFAULT_CONFIG_DIR));

    let request =
        ProcessRequest::new(binary, &config.project_root).args(arguments(config, config_dir));

    info!(command = %request.command_line(), "processing stylesheets");

    let result = match ctx.runner.run(&request).await {
        Ok(output) if output.success() => StageResult::success(stage, "stylesheets processed"),
        Ok(output) => {
            let err = BuildError::ToolExecutionFailed {
                tool: POSTCSS.to_string(),
                code: output.exit_code,
                output: output.diagnostics().to_string(),
            };
            StageResult::failure(stage, err.to_string())
        }
        Err(e) => StageResult::failure(stage, e.to_string()),
    };

    result.with_elapsed(start.elapsed())
}
