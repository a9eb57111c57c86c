//! Tool binary resolution across installation layouts.
//!
//! buildpipe may be installed globally, as a project dependency, or hoisted
//! to the root of a multi-package workspace. The tools it drives (`tsc`,
//! `esbuild`, `postcss`) live wherever the package manager put them, so a
//! lookup walks a fixed list of locations:
//!
//! 1. `<tool_root>/node_modules/.bin/<tool>`
//! 2. `<tool_root>/node_modules/<owner>/bin/<tool>[.js|.cjs]`
//! 3. `node_modules/.bin/<tool>` in the working directory and up to four parents
//! 4. the same upward walk starting from `<tool_root>`
//!
//! There is no `PATH` fallback. Results are never cached.

use std::path::{Path, PathBuf};

use buildpipe_shared::{BuildError, Result};
use tracing::{debug, trace};

/// Name of the package-manager dependency folder.
const DEPENDENCY_DIR: &str = "node_modules";

/// Binary link folder inside [`DEPENDENCY_DIR`].
const BIN_DIR: &str = ".bin";

/// Maximum number of directories checked by an upward walk (start included).
pub const MAX_WALK_LEVELS: usize = 5;

/// Extensions tried for an owner package's own `bin/` entry, in order.
const OWNER_BIN_EXTENSIONS: &[&str] = &["", "js", "cjs"];

/// Where a binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLocation {
    /// The orchestrator's own bundled `node_modules/.bin`.
    ToolBundle,
    /// The owner package's `bin/` folder inside the orchestrator's dependencies.
    OwnerPackage,
    /// A `node_modules/.bin` at or above the working directory.
    WorkingTree,
    /// A `node_modules/.bin` at or above the orchestrator's install directory.
    InstallTree,
}

impl std::fmt::Display for SearchLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ToolBundle => "tool bundle",
            Self::OwnerPackage => "owner package",
            Self::WorkingTree => "working tree",
            Self::InstallTree => "install tree",
        };
        f.write_str(name)
    }
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBinary {
    Found {
        path: PathBuf,
        location: SearchLocation,
    },
    NotFound,
}

impl ResolvedBinary {
    /// Path of the binary, if found.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found { path, .. } => Some(path),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// Convert "not found" into [`BuildError::ToolNotFound`] for `tool`.
    pub fn require(self, tool: &str) -> Result<PathBuf> {
        match self {
            Self::Found { path, .. } => Ok(path),
            Self::NotFound => Err(BuildError::tool_not_found(tool)),
        }
    }
}

/// Locates tool binaries relative to the orchestrator install and the
/// working directory. Holds no state besides those two roots.
#[derive(Debug, Clone)]
pub struct BinaryResolver {
    tool_root: PathBuf,
    cwd: PathBuf,
}

impl BinaryResolver {
    /// Create a resolver for an orchestrator installed at `tool_root`,
    /// invoked from `cwd`.
    pub fn new(tool_root: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            tool_root: tool_root.into(),
            cwd: cwd.into(),
        }
    }

    /// The orchestrator's installation root.
    pub fn tool_root(&self) -> &Path {
        &self.tool_root
    }

    /// The directory the upward walk in step 3 starts from.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve `tool`, optionally checking `owner_package`'s own `bin/` folder.
    pub fn resolve(&self, tool: &str, owner_package: Option<&str>) -> ResolvedBinary {
        let found = |path: PathBuf, location: SearchLocation| {
            debug!(tool, path = %path.display(), %location, "resolved binary");
            ResolvedBinary::Found { path, location }
        };

        let bundled = bin_path(&self.tool_root, tool);
        if is_file(&bundled) {
            return found(bundled, SearchLocation::ToolBundle);
        }

        if let Some(owner) = owner_package {
            let owner_bin = self
                .tool_root
                .join(DEPENDENCY_DIR)
                .join(owner)
                .join("bin")
                .join(tool);
            for ext in OWNER_BIN_EXTENSIONS {
                let candidate = if ext.is_empty() {
                    owner_bin.clone()
                } else {
                    owner_bin.with_extension(ext)
                };
                if is_file(&candidate) {
                    return found(candidate, SearchLocation::OwnerPackage);
                }
            }
        }

        if let Some(path) = walk_up(&self.cwd, tool) {
            return found(path, SearchLocation::WorkingTree);
        }

        if let Some(path) = walk_up(&self.tool_root, tool) {
            return found(path, SearchLocation::InstallTree);
        }

        debug!(tool, tool_root = %self.tool_root.display(), cwd = %self.cwd.display(), "binary not found");
        ResolvedBinary::NotFound
    }
}

/// Default install root: two levels above the running executable, so an
/// install at `<root>/bin/buildpipe` resolves to `<root>`.
pub fn default_tool_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()?.parent().map(Path::to_path_buf)
}

fn bin_path(dir: &Path, tool: &str) -> PathBuf {
    dir.join(DEPENDENCY_DIR).join(BIN_DIR).join(tool)
}

fn is_file(path: &Path) -> bool {
    trace!(candidate = %path.display(), "checking");
    path.is_file()
}

/// Check `node_modules/.bin/<tool>` in `start` and its ancestors.
fn walk_up(start: &Path, tool: &str) -> Option<PathBuf> {
    let mut dir = start;
    for _ in 0..MAX_WALK_LEVELS {
        let candidate = bin_path(dir, tool);
        if is_file(&candidate) {
            return Some(candidate);
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    None
}
