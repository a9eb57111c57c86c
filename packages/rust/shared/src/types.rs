//! Core domain types for buildpipe runs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Extensions compiled by the transform stage.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

/// Extensions copied by the image sub-pass.
pub const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "png", "svg"];

/// Extensions copied by the font sub-pass.
pub const FONT_EXTENSIONS: &[&str] = &["eot", "ttf", "woff", "woff2"];

/// Extensions copied by the document sub-pass.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md"];

/// Extension handled by the style stage.
pub const STYLESHEET_EXTENSION: &str = "css";

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// File-type class of a source file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    TypedSource,
    PlainSource,
    Stylesheet,
    Image,
    Font,
    Document,
    Other,
}

impl SourceKind {
    /// Classify a path by its extension. Matching is exact, like discovery's
    /// case-sensitive globs: `App.TSX` is not a typed source.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "tsx") => Self::TypedSource,
            Some("js" | "jsx") => Self::PlainSource,
            Some(STYLESHEET_EXTENSION) => Self::Stylesheet,
            Some(e) if IMAGE_EXTENSIONS.contains(&e) => Self::Image,
            Some(e) if FONT_EXTENSIONS.contains(&e) => Self::Font,
            Some(e) if DOCUMENT_EXTENSIONS.contains(&e) => Self::Document,
            _ => Self::Other,
        }
    }

    /// Whether the transform stage compiles files of this kind.
    pub fn is_script(self) -> bool {
        matches!(self, Self::TypedSource | Self::PlainSource)
    }
}

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// A file under the source directory, addressed relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the source directory.
    pub relative: PathBuf,
    /// Extension-derived class.
    pub kind: SourceKind,
    /// True for `*.test.*`, `*.spec.*` and `*.integration.*` files.
    pub is_test: bool,
}

impl SourceFile {
    /// Classify a source-relative path.
    pub fn new(relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        let kind = SourceKind::from_path(&relative);
        let is_test = is_test_file(&relative);
        Self {
            relative,
            kind,
            is_test,
        }
    }

    /// Whether the transform stage should compile this file.
    pub fn is_transformable(&self) -> bool {
        self.kind.is_script() && !self.is_test
    }

    /// Whether the file uses the typed UI-templating syntax (`.tsx`).
    pub fn is_tsx(&self) -> bool {
        has_extension(&self.relative, "tsx")
    }

    /// Mirror this file under `output_dir`, keeping its extension.
    pub fn mirrored(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.relative)
    }

    /// Mirror this file under `output_dir`, rewriting typed extensions to `.js`.
    pub fn compiled_destination(&self, output_dir: &Path) -> PathBuf {
        let dest = self.mirrored(output_dir);
        match self.kind {
            SourceKind::TypedSource => dest.with_extension("js"),
            _ => dest,
        }
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == wanted)
}

/// Check whether a file name follows a test naming convention.
pub fn is_test_file(path: &Path) -> bool {
    static TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\.(test|spec|integration)\.[^.]+$").expect("valid regex")
    });

    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| TEST_RE.is_match(name))
}

// ---------------------------------------------------------------------------
// Stage results
// ---------------------------------------------------------------------------

/// The discrete phases of a build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    TypeCheck,
    Transform,
    Style,
    AssetCopy,
}

impl StageKind {
    /// Human-readable label used in progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TypeCheck => "Type checking",
            Self::Transform => "Compiling sources",
            Self::Style => "Processing stylesheets",
            Self::AssetCopy => "Copying assets",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TypeCheck => "typecheck",
            Self::Transform => "transform",
            Self::Style => "style",
            Self::AssetCopy => "assets",
        };
        f.write_str(name)
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced this result.
    pub stage: StageKind,
    /// Whether the stage succeeded (a skipped stage counts as success).
    pub succeeded: bool,
    /// One-line status or failure description.
    pub message: String,
    /// Number of files the stage produced or copied.
    pub files: usize,
    /// Wall time spent in the stage.
    pub elapsed: Duration,
}

impl StageResult {
    /// Create a successful result.
    pub fn success(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            succeeded: true,
            message: message.into(),
            files: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a failed result.
    pub fn failure(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            succeeded: false,
            message: message.into(),
            files: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Record how many files the stage handled.
    pub fn with_files(mut self, files: usize) -> Self {
        self.files = files;
        self
    }

    /// Record the stage duration.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}
