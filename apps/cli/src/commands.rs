//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use procbook_core::pipeline::{ProgressReporter, assemble_proceedings};
use procbook_shared::{AppConfig, AssemblyConfig, AssemblyReport, init_config, resolve_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// procbook: assemble a proceedings book from contribution directories.
#[derive(Parser)]
#[command(
    name = "procbook",
    version,
    about = "Render contribution directories with pandoc and merge them into one proceedings PDF.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./procbook.toml, then ~/.procbook/procbook.toml).
    #[arg(long, global = true, env = "PROCBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Defaults to `build` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
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
    /// Render every contribution and merge the book.
    Build(BuildArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `build`. All of them override the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct BuildArgs {
    /// Directory holding the contribution directories (defaults to cwd).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Merged output file, relative to the root.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Keep an existing output file instead of replacing it.
    #[arg(long)]
    pub no_overwrite: bool,

    /// Kill the conversion tool after this many seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write a JSON assembly report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize the user config file with defaults.
    Init,
    /// Show resolved configuration.
    Show {
        /// Book root used to look up a project config.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "procbook=info",
        1 => "procbook=debug",
        _ => "procbook=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        None => cmd_build(config_path, BuildArgs::default()).await,
        Some(Command::Build(args)) => cmd_build(config_path, args).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show { root } => cmd_config_show(config_path, root),
        },
    }
}

/// Resolve the book root: the `--root` flag or the current directory.
fn book_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}")),
    }
}

/// Merge CLI flags into the runtime config.
fn assembly_config(app: &AppConfig, root: PathBuf, args: &BuildArgs) -> AssemblyConfig {
    let mut app = app.clone();
    if let Some(output) = &args.output {
        app.defaults.output = output.clone();
    }
    if args.no_overwrite {
        app.defaults.overwrite = false;
    }
    if args.timeout.is_some() {
        app.pandoc.timeout_secs = args.timeout;
    }
    AssemblyConfig::resolve(&app, root)
}

async fn cmd_build(config_path: Option<&Path>, args: BuildArgs) -> Result<()> {
    let root = book_root(args.root.clone())?;
    let app = resolve_config(config_path, &root)?;
    let config = assembly_config(&app, root, &args);

    info!(
        root = %config.root.display(),
        output = %config.output.display(),
        tool = %config.tool,
        "assembling proceedings"
    );

    let reporter = CliProgress::new();
    let report = assemble_proceedings(&config, &reporter).await?;

    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!(path = %path.display(), "wrote assembly report");
    }

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &AssemblyReport) {
    println!();
    if report.written {
        println!("  Proceedings assembled!");
    } else {
        println!("  Output exists, left untouched (overwrite disabled).");
    }
    println!("  Output:        {}", report.output.display());
    println!(
        "  Contributions: {} rendered / {} found",
        report.rendered_count(),
        report.contributions.len()
    );
    for entry in &report.contributions {
        match (&entry.rendered, &entry.placement) {
            (Some(_), Some(p)) => println!(
                "    {:<32} p. {:>4}  ({} pages, {} blank)",
                entry.name, p.first_page, p.page_count, p.padding
            ),
            (Some(_), None) => println!("    {:<32} rendered", entry.name),
            (None, _) => println!("    {:<32} skipped (no sources)", entry.name),
        }
    }
    if report.written {
        println!("  Pages:         {}", report.total_pages);
    }
    println!();
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
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn contribution_done(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Rendered [{current}/{total}] {name}"));
    }

    fn done(&self, _report: &AssemblyReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // Failed runs never reach `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>, root: Option<PathBuf>) -> Result<()> {
    let root = book_root(root)?;
    let config = resolve_config(config_path, &root)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
