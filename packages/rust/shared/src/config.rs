//! Project configuration for buildpipe.
//!
//! Project config lives at `<project_root>/buildpipe.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "buildpipe.toml";

// ---------------------------------------------------------------------------
// Config structs (matching buildpipe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Source directory, relative to the project root.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Output directory, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Run the type checker before compiling.
    #[serde(default = "default_true")]
    pub use_typecheck: bool,

    /// Module format emitted by the transformer.
    #[serde(default)]
    pub module_format: ModuleFormat,

    /// Additional glob patterns (relative to the source dir) copied verbatim.
    #[serde(default)]
    pub copy_files: Vec<String>,

    /// Remove the output directory before building.
    #[serde(default)]
    pub clean: bool,

    /// Transformer settings.
    #[serde(default)]
    pub transform: TransformSettings,

    /// Per-tool option blocks, keyed by tool name (`typescript`, `postcss`, ...).
    #[serde(default)]
    pub tools: BTreeMap<String, ToolOptions>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            use_typecheck: true,
            module_format: ModuleFormat::default(),
            copy_files: Vec::new(),
            clean: false,
            transform: TransformSettings::default(),
            tools: BTreeMap::new(),
        }
    }
}

fn default_source_dir() -> String {
    "src".into()
}
fn default_output_dir() -> String {
    "lib".into()
}
fn default_true() -> bool {
    true
}

/// Output module format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// ECMAScript modules (`import`/`export`).
    #[default]
    #[serde(alias = "es", alias = "module")]
    Esm,
    /// CommonJS (`require`/`module.exports`).
    #[serde(alias = "commonjs")]
    Cjs,
}

impl ModuleFormat {
    /// Name understood by the transformer's `--format` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
        }
    }
}

impl std::str::FromStr for ModuleFormat {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "esm" | "es" | "module" => Ok(Self::Esm),
            "cjs" | "commonjs" => Ok(Self::Cjs),
            other => Err(BuildError::config(format!(
                "unknown module format '{other}': expected 'esm' or 'cjs'"
            ))),
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Target syntax version (e.g. `es2020`).
    #[serde(default = "default_target")]
    pub target: String,

    /// Allow decorator syntax.
    #[serde(default)]
    pub decorators: bool,

    /// Allow dynamic `import()` expressions.
    #[serde(default = "default_true")]
    pub dynamic_import: bool,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            target: default_target(),
            decorators: false,
            dynamic_import: true,
        }
    }
}

fn default_target() -> String {
    "es2020".into()
}

/// `[tools.<name>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOptions {
    /// Path to the tool's own configuration file, relative to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,

    /// Extra arguments appended to the tool invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// ---------------------------------------------------------------------------
// Resolved build config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// CLI-level overrides applied on top of the project file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub use_typecheck: Option<bool>,
    pub module_format: Option<ModuleFormat>,
    pub clean: Option<bool>,
}

/// Fully resolved configuration for one pipeline run.
///
/// All directories are absolute. The value is built once per run and never
/// mutated while stages execute.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfig {
    /// Project root; working directory for spawned tools.
    pub project_root: PathBuf,
    /// Absolute source directory.
    pub source_dir: PathBuf,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    /// Whether the type-check stage runs.
    pub use_typecheck: bool,
    /// Output module format.
    pub module_format: ModuleFormat,
    /// Extra copy globs, relative to `source_dir`.
    pub copy_files: Vec<String>,
    /// Remove `output_dir` before the first stage.
    pub clean: bool,
    /// Transformer settings.
    pub transform: TransformSettings,
    /// Per-tool option blocks.
    pub tools: BTreeMap<String, ToolOptions>,
}

impl BuildConfig {
    /// Option block for a tool, if configured.
    pub fn tool(&self, name: &str) -> Option<&ToolOptions> {
        self.tools.get(name)
    }

    /// Absolute path to a tool's configured config file, if any.
    pub fn tool_config_path(&self, name: &str) -> Option<PathBuf> {
        self.tool(name)
            .and_then(|t| t.config.as_deref())
            .map(|p| absolutize(&self.project_root, Path::new(p)))
    }

    /// Extra arguments configured for a tool.
    pub fn tool_args(&self, name: &str) -> &[String] {
        self.tool(name).map(|t| t.args.as_slice()).unwrap_or(&[])
    }
}

impl ProjectConfig {
    /// Resolve against a project root and CLI overrides into a [`BuildConfig`].
    pub fn resolve(&self, project_root: &Path, overrides: &ConfigOverrides) -> Result<BuildConfig> {
        if !project_root.is_absolute() {
            return Err(BuildError::config(format!(
                "project root must be absolute: {}",
                project_root.display()
            )));
        }
        let project_root = absolutize(project_root, Path::new("."));

        let source_dir = match &overrides.source_dir {
            Some(p) => absolutize(&project_root, p),
            None => absolutize(&project_root, Path::new(&self.source_dir)),
        };
        let output_dir = match &overrides.output_dir {
            Some(p) => absolutize(&project_root, p),
            None => absolutize(&project_root, Path::new(&self.output_dir)),
        };

        if source_dir == output_dir {
            return Err(BuildError::config(
                "source_dir and output_dir must be different directories",
            ));
        }
        if output_dir == project_root || source_dir.starts_with(&output_dir) {
            return Err(BuildError::config(format!(
                "output_dir {} would contain the sources",
                output_dir.display()
            )));
        }
        if output_dir.starts_with(&source_dir) {
            return Err(BuildError::config(format!(
                "output_dir {} is inside source_dir {}",
                output_dir.display(),
                source_dir.display()
            )));
        }

        Ok(BuildConfig {
            project_root,
            source_dir,
            output_dir,
            use_typecheck: overrides.use_typecheck.unwrap_or(self.use_typecheck),
            module_format: overrides.module_format.unwrap_or(self.module_format),
            copy_files: self.copy_files.clone(),
            clean: overrides.clean.unwrap_or(self.clean),
            transform: self.transform.clone(),
            tools: self.tools.clone(),
        })
    }
}

/// Join `path` onto `base` unless it is already absolute, then drop `.` and
/// fold `..` components lexically.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path to the config file for a project root.
pub fn config_file_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE_NAME)
}

/// Load the project config. Returns defaults if the file does not exist.
pub fn load_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = config_file_path(project_root);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(ProjectConfig::default());
    }

    load_config_from(&path)
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| BuildError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into the project root.
/// Returns the path to the created file; an existing file is left untouched.
pub fn init_config(project_root: &Path) -> Result<PathBuf> {
    let path = config_file_path(project_root);
    if path.exists() {
        return Err(BuildError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&ProjectConfig::default())
        .map_err(|e| BuildError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BuildError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bp-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_serializes() {
        let config = ProjectConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("source_dir = \"src\""));
        assert!(toml_str.contains("module_format = \"esm\""));
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
source_dir = "app"
output_dir = "dist"
use_typecheck = false
module_format = "cjs"
copy_files = ["**/*.json", "static/**/*"]

[transform]
target = "es2022"
decorators = true

[tools.typescript]
config = "tsconfig.build.json"

[tools.postcss]
args = ["--verbose"]
"#;
        let config: ProjectConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.source_dir, "app");
        assert!(!config.use_typecheck);
        assert_eq!(config.module_format, ModuleFormat::Cjs);
        assert_eq!(config.copy_files.len(), 2);
        assert!(config.transform.decorators);
        assert!(config.transform.dynamic_import);
        assert_eq!(
            config.tools["typescript"].config.as_deref(),
            Some("tsconfig.build.json")
        );
        assert_eq!(config.tools["postcss"].args, vec!["--verbose"]);
    }

    #[test]
    fn resolve_makes_paths_absolute() {
        let root = Path::new("/work/project");
        let config = ProjectConfig::default()
            .resolve(root, &ConfigOverrides::default())
            .expect("resolve");
        assert_eq!(config.source_dir, PathBuf::from("/work/project/src"));
        assert_eq!(config.output_dir, PathBuf::from("/work/project/lib"));
        assert!(config.use_typecheck);
    }

    #[test]
    fn overrides_beat_file_values() {
        let root = Path::new("/work/project");
        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("./build/../out")),
            use_typecheck: Some(false),
            module_format: Some(ModuleFormat::Cjs),
            ..Default::default()
        };
        let config = ProjectConfig::default().resolve(root, &overrides).expect("resolve");
        assert_eq!(config.output_dir, PathBuf::from("/work/project/out"));
        assert!(!config.use_typecheck);
        assert_eq!(config.module_format, ModuleFormat::Cjs);
    }

    #[test]
    fn rejects_overlapping_directories() {
        let root = Path::new("/work/project");
        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("src")),
            ..Default::default()
        };
        assert!(ProjectConfig::default().resolve(root, &overrides).is_err());

        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from(".")),
            ..Default::default()
        };
        assert!(ProjectConfig::default().resolve(root, &overrides).is_err());

        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("src/dist")),
            ..Default::default()
        };
        let err = ProjectConfig::default().resolve(root, &overrides).unwrap_err();
        assert!(err.to_string().contains("inside source_dir"), "{err}");

        let overrides = ConfigOverrides {
            output_dir: Some(PathBuf::from("src-dist")),
            ..Default::default()
        };
        assert!(ProjectConfig::default().resolve(root, &overrides).is_ok());
    }

    #[test]
    fn tool_config_path_is_relative_to_project_root() {
        let mut project = ProjectConfig::default();
        project.tools.insert(
            "typescript".into(),
            ToolOptions {
                config: Some("tsconfig.build.json".into()),
                args: vec![],
            },
        );
        let config = project
            .resolve(Path::new("/work/project"), &ConfigOverrides::default())
            .expect("resolve");
        assert_eq!(
            config.tool_config_path("typescript"),
            Some(PathBuf::from("/work/project/tsconfig.build.json"))
        );
        assert!(config.tool_config_path("postcss").is_none());
        assert!(config.tool_args("postcss").is_empty());
    }

    #[test]
    fn module_format_from_str() {
        assert_eq!("CommonJS".parse::<ModuleFormat>().unwrap(), ModuleFormat::Cjs);
        assert_eq!("esm".parse::<ModuleFormat>().unwrap(), ModuleFormat::Esm);
        assert!("umd".parse::<ModuleFormat>().is_err());
    }

    #[test]
    fn missing_file_yields_defaults_and_init_writes_one() {
        let dir = temp_dir();
        let config = load_config(&dir).expect("defaults");
        assert_eq!(config.output_dir, "lib");

        let path = init_config(&dir).expect("init");
        assert!(path.exists());
        assert!(init_config(&dir).is_err());

        let loaded = load_config(&dir).expect("load");
        assert_eq!(loaded.source_dir, "src");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
