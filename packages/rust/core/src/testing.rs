//! Fakes and fixtures shared by this crate's unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use buildpipe_resolver::BinaryResolver;
use buildpipe_runner::{ProcessOutput, ProcessRequest, ProcessRunner};
use buildpipe_shared::{
    BuildConfig, BuildError, ConfigOverrides, ProjectConfig, Result, StageKind, StageResult,
};

use crate::pipeline::{BuildReport, ProgressReporter, SilentProgress};
use crate::stages::StageContext;
use crate::transformer::{TransformOptions, Transformer};

/// Runner that records requests and answers with a fixed exit code.
pub struct RecordingRunner {
    pub exit_code: i32,
    pub stderr: String,
    pub calls: Mutex<Vec<ProcessRequest>>,
}

impl RecordingRunner {
    pub fn exiting(exit_code: i32) -> Self {
        Self {
            exit_code,
            stderr: if exit_code == 0 {
                String::new()
            } else {
                "error: tool failed".into()
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ProcessRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(request.clone());
        Ok(ProcessOutput {
            exit_code: self.exit_code,
            stdout: String::new(),
            stderr: self.stderr.clone(),
        })
    }
}

/// Runner whose processes can never be started.
pub struct UnspawnableRunner;

#[async_trait]
impl ProcessRunner for UnspawnableRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        Err(BuildError::Spawn {
            program: request.program.clone(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    }
}

/// Runner that stands in for the real toolchain: `esbuild` echoes its stdin
/// and every other program exits with its configured code (default `0`).
#[derive(Default)]
pub struct ToolchainRunner {
    pub exit_codes: Vec<(&'static str, i32)>,
    pub calls: Mutex<Vec<ProcessRequest>>,
}

impl ToolchainRunner {
    pub fn failing(tool: &'static str, code: i32) -> Self {
        Self {
            exit_codes: vec![(tool, code)],
            ..Self::default()
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.program.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for ToolchainRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(request.clone());
        let name = request
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let exit_code = self
            .exit_codes
            .iter()
            .find(|(tool, _)| *tool == name)
            .map(|(_, code)| *code)
            .unwrap_or(0);
        let stdout = if name == "esbuild" && exit_code == 0 {
            request.stdin.clone().unwrap_or_default()
        } else {
            String::new()
        };
        let stderr = if exit_code == 0 {
            String::new()
        } else {
            format!("{name}: error TS2322")
        };
        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Transformer that returns its input unchanged and records file names.
#[derive(Default)]
pub struct IdentityTransformer {
    pub seen: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Transformer for IdentityTransformer {
    async fn transform(&self, source: &str, options: &TransformOptions) -> Result<String> {
        self.seen.lock().unwrap().push(options.filename.clone());
        Ok(source.to_string())
    }
}

/// Transformer that fails on files whose name contains `needle`.
pub struct FailingTransformer {
    pub needle: &'static str,
    pub attach_path: bool,
}

#[async_trait]
impl Transformer for FailingTransformer {
    async fn transform(&self, source: &str, options: &TransformOptions) -> Result<String> {
        if options.filename.to_string_lossy().contains(self.needle) {
            let path = self.attach_path.then(|| options.filename.clone());
            return Err(BuildError::transform(path, "unexpected token"));
        }
        Ok(source.to_string())
    }
}

/// Progress reporter that records events as strings.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingProgress {
    fn stage_started(&self, stage: StageKind) {
        self.events.lock().unwrap().push(format!("start {stage}"));
    }
    fn file_processed(&self, stage: StageKind, path: &Path, current: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{stage} [{current}/{total}] {}", path.display()));
    }
    fn stage_finished(&self, result: &StageResult) {
        let status = if result.succeeded { "ok" } else { "failed" };
        self.events
            .lock()
            .unwrap()
            .push(format!("{status} {}", result.stage));
    }
    fn done(&self, report: &BuildReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {}", report.exit_code()));
    }
}

/// A throwaway project directory with `src/` and a separate tool root.
pub struct Project {
    pub root: PathBuf,
    pub tool_root: PathBuf,
    pub config: BuildConfig,
}

impl Project {
    pub fn new() -> Self {
        let base = std::env::temp_dir().join(format!("bp-core-test-{}", uuid::Uuid::now_v7()));
        let root = base.join("project");
        let tool_root = base.join("tool");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(&tool_root).unwrap();
        let config = ProjectConfig::default()
            .resolve(&root, &ConfigOverrides::default())
            .unwrap();
        Self {
            root,
            tool_root,
            config,
        }
    }

    /// Write a file under `src/`.
    pub fn source(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.config.source_dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Install a fake binary into the tool root's `node_modules/.bin`.
    pub fn install(&self, tool: &str) -> PathBuf {
        let path = self.tool_root.join("node_modules/.bin").join(tool);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        path
    }

    pub fn resolver(&self) -> BinaryResolver {
        BinaryResolver::new(&self.tool_root, &self.root)
    }

    pub fn output(&self, rel: &str) -> PathBuf {
        self.config.output_dir.join(rel)
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if let Some(base) = self.root.parent() {
            let _ = std::fs::remove_dir_all(base);
        }
    }
}

/// Build a [`StageContext`] over borrowed fakes.
pub fn context<'a>(
    config: &'a BuildConfig,
    resolver: &'a BinaryResolver,
    runner: &'a dyn ProcessRunner,
    transformer: &'a dyn Transformer,
) -> StageContext<'a> {
    StageContext {
        config,
        resolver,
        runner,
        transformer,
        typecheck_config: None,
        progress: &SilentProgress,
    }
}
