//! Shared types, error model, and configuration for buildpipe.
//!
//! This crate is the foundation depended on by all other buildpipe crates.
//! It provides:
//! - [`BuildError`] — the unified error type
//! - Domain types ([`SourceFile`], [`SourceKind`], [`StageResult`], [`StageKind`])
//! - Configuration ([`ProjectConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BuildConfig, CONFIG_FILE_NAME, ConfigOverrides, ModuleFormat, ProjectConfig, ToolOptions,
    TransformSettings, absolutize, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BuildError, Result};
pub use types::{
    DOCUMENT_EXTENSIONS, FONT_EXTENSIONS, IMAGE_EXTENSIONS, SOURCE_EXTENSIONS,
    STYLESHEET_EXTENSION, SourceFile, SourceKind, StageKind, StageResult, is_test_file,
};
