//! Transform stage: compiles each source file to its mirrored output path.
//!
//! Files are processed one at a time in sorted order so memory stays bounded
//! and log output is deterministic. The first failure aborts the stage;
//! files already written stay on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use buildpipe_shared::{BuildError, Result, SOURCE_EXTENSIONS, SourceFile, StageKind, StageResult};

use super::StageContext;
use crate::discovery;
use crate::transformer::TransformOptions;

/// Source files the stage will compile: scripts that are not tests.
pub fn collect(ctx: &StageContext<'_>) -> Result<Vec<SourceFile>> {
    let patterns = discovery::extension_patterns(SOURCE_EXTENSIONS);
    let files = discovery::find_files(&ctx.config.source_dir, &patterns)?;
    Ok(files.into_iter().filter(SourceFile::is_transformable).collect())
}

/// Destinations that more than one source compiles to (`foo.ts` and `foo.js`
/// both land on `foo.js`), with the colliding sources in compile order.
pub fn shared_destinations(
    files: &[SourceFile],
    output_dir: &Path,
) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut by_dest: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        by_dest
            .entry(file.compiled_destination(output_dir))
            .or_default()
            .push(file.relative.clone());
    }
    by_dest.retain(|_, sources| sources.len() > 1);
    by_dest
}

#[instrument(skip_all, fields(source_dir = %ctx.config.source_dir.display()))]
pub async fn run(ctx: &StageContext<'_>) -> StageResult {
    let start = Instant::now();
    let stage = StageKind::Transform;

    let files = match collect(ctx) {
        Ok(files) => files,
        Err(e) => return StageResult::failure(stage, e.to_string()),
    };

    if files.is_empty() {
        debug!("no source files to compile");
        return StageResult::success(stage, "no source files").with_elapsed(start.elapsed());
    }

    info!(files = files.len(), "compiling sources");
    for (dest, sources) in shared_destinations(&files, &ctx.config.output_dir) {
        warn!(
            dest = %dest.display(),
            sources = ?sources,
            "several sources compile to the same file; the last one wins"
        );
    }
    let total = files.len();

    for (i, file) in files.iter().enumerate() {
        if let Err(e) = compile_file(ctx, file).await {
            warn!(file = %file.relative.display(), error = %e, "compilation failed");
            return StageResult::failure(stage, e.to_string())
                .with_files(i)
                .with_elapsed(start.elapsed());
        }
        ctx.progress.file_processed(stage, &file.relative, i + 1, total);
    }

    StageResult::success(stage, format!("compiled {total} files"))
        .with_files(total)
        .with_elapsed(start.elapsed())
}

async fn compile_file(ctx: &StageContext<'_>, file: &SourceFile) -> Result<()> {
    let config = ctx.config;
    let source_path = config.source_dir.join(&file.relative);
    let dest = file.compiled_destination(&config.output_dir);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    let source =
        std::fs::read_to_string(&source_path).map_err(|e| BuildError::io(&source_path, e))?;

    let options = TransformOptions::for_file(config, file);
    let code = ctx.transformer.transform(&source, &options).await?;

    std::fs::write(&dest, code).map_err(|e| BuildError::io(&dest, e))?;
    debug!(from = %file.relative.display(), to = %dest.display(), "compiled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FailingTransformer, IdentityTransformer, Project, RecordingProgress, RecordingRunner,
        context,
    };

    #[tokio::test]
    async fn compiles_sources_to_mirrored_js() {
        let project = Project::new();
        project.source("index.ts", "export const a = 1;");
        project.source("ui/View.tsx", "export const v = <div/>;");
        project.source("util/plain.js", "module.exports = 1;");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let result = run(&ctx).await;
        assert!(result.succeeded, "{}", result.message);
        assert_eq!(result.files, 3);

        assert_eq!(
            std::fs::read_to_string(project.output("index.js")).unwrap(),
            "export const a = 1;"
        );
        assert!(project.output("ui/View.js").exists());
        assert!(project.output("util/plain.js").exists());
        assert!(!project.output("index.ts").exists());
    }

    #[tokio::test]
    async fn test_files_are_not_compiled() {
        let project = Project::new();
        project.source("math.ts", "export {}");
        project.source("math.test.ts", "test()");
        project.source("math.spec.js", "test()");
        project.source("db.integration.ts", "test()");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let files = collect(&ctx).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("math.ts"));

        run(&ctx).await;
        assert!(project.output("math.js").exists());
        assert!(!project.output("math.test.js").exists());
        assert_eq!(transformer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_source_tree_succeeds() {
        let project = Project::new();
        project.source("styles/site.css", "body {}");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let result = run(&ctx).await;
        assert!(result.succeeded);
        assert_eq!(result.files, 0);
        assert!(transformer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_failure_aborts_and_keeps_earlier_output() {
        let project = Project::new();
        project.source("a.ts", "ok");
        project.source("b.ts", "broken");
        project.source("c.ts", "ok");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = FailingTransformer {
            needle: "b.ts",
            attach_path: true,
        };
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let result = run(&ctx).await;
        assert!(!result.succeeded);
        assert_eq!(result.files, 1);
        assert!(result.message.contains("b.ts"), "{}", result.message);
        assert!(result.message.contains("unexpected token"));
        assert!(project.output("a.js").exists());
        assert!(!project.output("c.js").exists());
    }

    #[tokio::test]
    async fn failure_without_path_uses_generic_message() {
        let project = Project::new();
        project.source("a.ts", "broken");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = FailingTransformer {
            needle: "a.ts",
            attach_path: false,
        };
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let result = run(&ctx).await;
        assert_eq!(result.message, "transform failed: unexpected token");
    }

    #[tokio::test]
    async fn reports_progress_per_file() {
        let project = Project::new();
        project.source("a.ts", "");
        project.source("b.ts", "");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let progress = RecordingProgress::default();
        let mut ctx = context(&project.config, &resolver, &runner, &transformer);
        ctx.progress = &progress;

        run(&ctx).await;
        let events = progress.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["transform [1/2] a.ts".to_string(), "transform [2/2] b.ts".to_string()]
        );
    }

    #[tokio::test]
    async fn sibling_ts_and_js_share_a_destination() {
        let project = Project::new();
        project.source("foo.js", "from js");
        project.source("foo.ts", "from ts");
        project.source("bar.ts", "");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let files = collect(&ctx).unwrap();
        let shared = shared_destinations(&files, &project.config.output_dir);
        assert_eq!(shared.len(), 1);
        assert_eq!(
            shared[&project.output("foo.js")],
            vec![PathBuf::from("foo.js"), PathBuf::from("foo.ts")]
        );

        let result = run(&ctx).await;
        assert!(result.succeeded);
        assert_eq!(
            std::fs::read_to_string(project.output("foo.js")).unwrap(),
            "from ts"
        );
    }

    #[tokio::test]
    async fn upper_case_extensions_are_not_compiled() {
        let project = Project::new();
        project.source("Widget.TSX", "");
        project.source("App.tsx", "");
        let resolver = project.resolver();
        let runner = RecordingRunner::exiting(0);
        let transformer = IdentityTransformer::default();
        let ctx = context(&project.config, &resolver, &runner, &transformer);

        let files = collect(&ctx).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("App.tsx"));
        assert!(!SourceFile::new("Widget.TSX").is_transformable());
    }
}
