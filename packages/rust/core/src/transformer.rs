//! Per-file code transformation.
//!
//! The transform stage hands each source file's text to a [`Transformer`]
//! together with typed [`TransformOptions`]. The default implementation pipes
//! the text through the resolved `esbuild` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use buildpipe_resolver::BinaryResolver;
use buildpipe_runner::{ProcessRequest, ProcessRunner};
use buildpipe_shared::{BuildConfig, BuildError, ModuleFormat, Result, SourceFile};

/// Tool name of the default transformer.
pub const ESBUILD: &str = "esbuild";

/// Input syntax of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Ts,
    Tsx,
    Js,
    Jsx,
}

impl Syntax {
    /// Syntax for a path, by extension. Unknown extensions are treated as JS.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts") => Self::Ts,
            Some("tsx") => Self::Tsx,
            Some("jsx") => Self::Jsx,
            _ => Self::Js,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Tsx => "tsx",
            Self::Js => "js",
            Self::Jsx => "jsx",
        }
    }
}

/// Options for transforming one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Source path, used for diagnostics and source maps.
    pub filename: PathBuf,
    /// Input syntax.
    pub syntax: Syntax,
    /// Emitted module format.
    pub module_format: ModuleFormat,
    /// Target syntax version (e.g. `es2020`).
    pub target: String,
    /// Allow decorator syntax.
    pub decorators: bool,
    /// Allow dynamic `import()`.
    pub dynamic_import: bool,
}

impl TransformOptions {
    /// Derive per-file options from the build config.
    pub fn for_file(config: &BuildConfig, file: &SourceFile) -> Self {
        Self {
            filename: config.source_dir.join(&file.relative),
            syntax: Syntax::from_path(&file.relative),
            module_format: config.module_format,
            target: config.transform.target.clone(),
            decorators: config.transform.decorators,
            dynamic_import: config.transform.dynamic_import,
        }
    }

    /// True only for the typed UI-templating syntax.
    pub fn is_tsx(&self) -> bool {
        self.syntax == Syntax::Tsx
    }
}

/// Turns one file's source text into output code.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform `source`. Failures are reported as
    /// [`BuildError::TransformFailed`], with the file path when known.
    async fn transform(&self, source: &str, options: &TransformOptions) -> Result<String>;
}

/// [`Transformer`] that runs `esbuild` with the file text on stdin.
///
/// The binary is resolved on every call, so a missing install surfaces as
/// [`BuildError::ToolNotFound`] only once a file actually needs compiling.
pub struct EsbuildTransformer {
    resolver: BinaryResolver,
    runner: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
    extra_args: Vec<String>,
}

impl EsbuildTransformer {
    pub fn new(resolver: BinaryResolver, runner: Arc<dyn ProcessRunner>, config: &BuildConfig) -> Self {
        Self {
            resolver,
            runner,
            cwd: config.project_root.clone(),
            extra_args: config.tool_args(ESBUILD).to_vec(),
        }
    }

    /// Arguments for one invocation.
    pub fn arguments(&self, options: &TransformOptions) -> Vec<String> {
        let mut args = vec![
            format!("--loader={}", options.syntax.as_str()),
            format!("--format={}", options.module_format.as_str()),
            format!("--target={}", options.target),
            format!("--sourcefile={}", options.filename.display()),
            format!("--supported:decorators={}", options.decorators),
            format!("--supported:dynamic-import={}", options.dynamic_import),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl Transformer for EsbuildTransformer {
    async fn transform(&self, source: &str, options: &TransformOptions) -> Result<String> {
        let binary = self.resolver.resolve(ESBUILD, Some(ESBUILD)).require(ESBUILD)?;

        let request = ProcessRequest::new(binary, &self.cwd)
            .args(self.arguments(options))
            .stdin(source);
        trace!(command = %request.command_line(), "transforming");

        let output = self.runner.run(&request).await?;
        if !output.success() {
            return Err(BuildError::transform(
                Some(options.filename.clone()),
                output.diagnostics(),
            ));
        }

        Ok(output.stdout)
    }
}
