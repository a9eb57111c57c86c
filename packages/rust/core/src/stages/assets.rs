//! Asset copy stage: copies static files to their mirrored output paths.
//!
//! The stage is a sequence of independent sub-passes (images, fonts,
//! documents, then one per `copy_files` glob). Copies inside a sub-pass run
//! concurrently and are awaited together. A failing sub-pass fails the stage
//! but does not stop the sub-passes after it.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use buildpipe_shared::{
    BuildConfig, BuildError, DOCUMENT_EXTENSIONS, FONT_EXTENSIONS, IMAGE_EXTENSIONS, Result,
    StageKind, StageResult,
};

use super::StageContext;
use crate::discovery;

/// One sub-pass: a named set of glob patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPass {
    pub name: String,
    pub patterns: Vec<String>,
}

/// Sub-passes for a config, in execution order.
pub fn passes(config: &BuildConfig) -> Vec<CopyPass> {
    let mut passes = vec![
        CopyPass {
            name: "images".into(),
            patterns: discovery::extension_patterns(IMAGE_EXTENSIONS),
        },
        CopyPass {
            name: "fonts".into(),
            patterns: discovery::extension_patterns(FONT_EXTENSIONS),
        },
        CopyPass {
            name: "documents".into(),
            patterns: discovery::extension_patterns(DOCUMENT_EXTENSIONS),
        },
    ];

    passes.extend(config.copy_files.iter().map(|glob| CopyPass {
        name: glob.clone(),
        patterns: vec![glob.clone()],
    }));

    passes
}

#[instrument(skip_all, fields(passes = tracing::field::Empty))]
pub async fn run(ctx: &StageContext<'_>) -> StageResult {
    let start = Instant::now();
    let stage = StageKind::AssetCopy;
    let passes = passes(ctx.config);
    tracing::Span::current().record("passes", passes.len());

    let mut copied = 0;
    let mut failures = Vec::new();

    for pass in &passes {
        match copy_pass(ctx, pass).await {
            Ok(0) => debug!(pass = %pass.name, "nothing to copy"),
            Ok(n) => {
                info!(pass = %pass.name, files = n, "copied assets");
                copied += n;
            }
            Err(e) => {
                warn!(pass = %pass.name, error = %e, "asset copy failed");
                failures.push(format!("{}: {e}", pass.name));
            }
        }
    }

    let result = if failures.is_empty() {
        StageResult::success(stage, format!("copied {copied} files"))
    } else {
        StageResult::failure(stage, failures.join("; "))
    };

    result.with_files(copied).with_elapsed(start.elapsed())
}

/// Run one sub-pass. Returns the number of files copied, or the first copy
/// error once every copy in the pass has finished.
async fn copy_pass(ctx: &StageContext<'_>, pass: &CopyPass) -> Result<usize> {
    let config = ctx.config;
    let files = discovery::find_files(&config.source_dir, &pass.patterns)?;
    if files.is_empty() {
        return Ok(0);
    }

    let mut handles = Vec::with_capacity(files.len());
    for file in &files {
        let from = config.source_dir.join(&file.relative);
        let to = file.mirrored(&config.output_dir);
        handles.push(tokio::spawn(copy_file(from, to)));
    }

    let total = handles.len();
    let mut first_error = None;
    for (i, (handle, file)) in handles.into_iter().zip(&files).enumerate() {
        let outcome = handle.await.unwrap_or_else(|e| {
            Err(BuildError::CopyFailed {
                from: config.source_dir.join(&file.relative),
                to: file.mirrored(&config.output_dir),
                source: std::io::Error::other(e.to_string()),
            })
        });

        match outcome {
            Ok(()) => ctx
                .progress
                .file_processed(StageKind::AssetCopy, &file.relative, i + 1, total),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(total),
    }
}

async fn copy_file(from: PathBuf, to: PathBuf) -> Result<()> {
    let copy_err = |source: std::io::Error| BuildError::CopyFailed {
        from: from.clone(),
        to: to.clone(),
        source,
    };

    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(copy_err)?;
    }
    tokio::fs::copy(&from, &to).await.map_err(copy_err)?;
    Ok(())
}
