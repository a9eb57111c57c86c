//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use buildpipe_core::{BuildReport, Pipeline, ProgressReporter, SilentProgress};
use buildpipe_resolver::{BinaryResolver, ResolvedBinary, default_tool_root};
use buildpipe_runner::SystemRunner;
use buildpipe_shared::{
    BuildError, ConfigOverrides, ModuleFormat, StageKind, StageResult, absolutize, init_config,
    load_config,
};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// buildpipe — compile TypeScript/JavaScript packages with their own tools.
#[derive(Parser)]
#[command(
    name = "buildpipe",
    version,
    about = "Type-check, compile, process stylesheets and copy assets from src/ into an output tree.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the build pipeline.
    Build(BuildArgs),

    /// Show where a tool binary resolves to.
    Which {
        /// Tool binary name (e.g. tsc, esbuild, postcss).
        tool: String,

        /// Package that ships the tool, searched for its own bin/ entry.
        #[arg(short, long)]
        package: Option<String>,

        /// Installation root holding bundled tools.
        #[arg(long, env = "BUILDPIPE_HOME")]
        tool_root: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Project root (defaults to the current directory).
        #[arg(short = 'C', long, global = true)]
        project: Option<PathBuf>,

        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `buildpipe build`.
#[derive(Args, Debug, Default)]
pub(crate) struct BuildArgs {
    /// Project root (defaults to the current directory).
    #[arg(short = 'C', long)]
    pub project: Option<PathBuf>,

    /// Source directory, relative to the project root.
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Output directory, relative to the project root.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Skip the type-check stage.
    #[arg(long)]
    pub no_typecheck: bool,

    /// Module format emitted by the transformer: esm or cjs.
    #[arg(long)]
    pub format: Option<ModuleFormat>,

    /// Remove the output directory before building.
    #[arg(long)]
    pub clean: bool,

    /// Type-checker config file, used instead of `[tools.typescript] config`.
    #[arg(long)]
    pub typescript_config: Option<PathBuf>,

    /// Installation root holding bundled tools.
    #[arg(long, env = "BUILDPIPE_HOME")]
    pub tool_root: Option<PathBuf>,

    /// Print the build report as JSON instead of progress output.
    #[arg(long)]
    pub json: bool,
}

impl BuildArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source_dir: self.source.clone(),
            output_dir: self.output.clone(),
            use_typecheck: self.no_typecheck.then_some(false),
            module_format: self.format,
            clean: self.clean.then_some(true),
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a default buildpipe.toml into the project root.
    Init,
    /// Show the resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "buildpipe=info",
        1 => "buildpipe=debug",
        _ => "buildpipe=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `build --json` output stays parseable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => cmd_build(args).await,
        Command::Which {
            tool,
            package,
            tool_root,
        } => cmd_which(&tool, package.as_deref(), tool_root),
        Command::Config { project, action } => {
            let root = project_root(project.as_deref())?;
            match action {
                ConfigAction::Init => cmd_config_init(&root),
                ConfigAction::Show => cmd_config_show(&root),
            }
        }
    }
}

/// Absolute project root: `--project` resolved against the working directory.
fn project_root(project: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
    Ok(match project {
        Some(p) => absolutize(&cwd, p),
        None => cwd,
    })
}

/// Installation root: explicit flag or `BUILDPIPE_HOME`, else derived from
/// the executable's location.
fn tool_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => project_root(Some(&path)),
        None => default_tool_root().ok_or_else(|| {
            eyre!("cannot determine the tool root; set BUILDPIPE_HOME or pass --tool-root")
        }),
    }
}

fn resolver(explicit_root: Option<PathBuf>) -> Result<BinaryResolver> {
    let cwd = std::env::current_dir()?;
    Ok(BinaryResolver::new(tool_root(explicit_root)?, cwd))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(args: BuildArgs) -> Result<()> {
    let root = project_root(args.project.as_deref())?;
    let config = load_config(&root)?.resolve(&root, &args.overrides())?;

    let typecheck_config = match &args.typescript_config {
        Some(path) => Some(project_root(Some(path))?),
        None => None,
    };

    let resolver = resolver(args.tool_root.clone())?;

    info!(
        project = %root.display(),
        tool_root = %resolver.tool_root().display(),
        format = config.module_format.as_str(),
        "building project"
    );

    let pipeline = Pipeline::new(config, resolver, Arc::new(SystemRunner))
        .with_typecheck_config(typecheck_config);

    let report = if args.json {
        let report = pipeline.run(&SilentProgress).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        report
    } else {
        let reporter = CliProgress::new();
        let report = pipeline.run(&reporter).await?;
        print_summary(&report);
        report
    };

    if !report.succeeded() {
        std::process::exit(report.exit_code());
    }

    Ok(())
}

fn print_summary(report: &BuildReport) {
    let secs = report.elapsed.as_secs_f64();
    println!();
    match report.failure() {
        None => {
            let files: usize = report.stages.iter().map(|s| s.files).sum();
            println!("  Build succeeded!");
            println!("  Files:  {files}");
            println!("  Time:   {secs:.1}s");
        }
        Some(failure) => {
            eprintln!("  Build failed at the {} stage", failure.stage);
            eprintln!("  {}", failure.message);
            eprintln!("  Time:   {secs:.1}s");
        }
    }
    println!();
}

fn cmd_which(tool: &str, package: Option<&str>, tool_root: Option<PathBuf>) -> Result<()> {
    let resolver = resolver(tool_root)?;

    match resolver.resolve(tool, package) {
        ResolvedBinary::Found { path, location } => {
            info!(tool, %location, "resolved");
            println!("{}", path.display());
            Ok(())
        }
        ResolvedBinary::NotFound => Err(BuildError::tool_not_found(tool).into()),
    }
}

fn cmd_config_init(root: &Path) -> Result<()> {
    let path = init_config(root)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(root: &Path) -> Result<()> {
    let config = load_config(root)?.resolve(root, &ConfigOverrides::default())?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageKind) {
        self.spinner.set_message(stage.label());
    }

    fn file_processed(&self, stage: StageKind, path: &Path, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "{} [{current}/{total}] {}",
            stage.label(),
            path.display()
        ));
    }

    fn stage_finished(&self, result: &StageResult) {
        let mark = if result.succeeded { "✔" } else { "✖" };
        self.spinner.println(format!(
            "  {mark} {:<24} {}",
            result.stage.label(),
            result.message
        ));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
