//! CLI tool for jarwright jar transformations.

mod commands;
mod config;
mod exit_codes;
mod output;
mod progress;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;
use jarwright::DuplicatePolicy;

/// Merge, relocate and patch Java archives
#[derive(Parser)]
#[command(name = "jarwright")]
#[command(author, version, about = "Merge, relocate and patch Java archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Log more detail (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge several jars into one (alias: m)
    #[command(alias = "m")]
    Merge {
        /// Primary jar; its entries take part first
        primary: PathBuf,

        /// Further jars, merged in the given order
        #[arg(required = true)]
        others: Vec<PathBuf>,

        /// Output jar (always created fresh)
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// What to do when two jars provide the same path
        #[arg(short = 'd', long, value_enum, default_value = "fail")]
        duplicates: DuplicateMode,

        /// Glob patterns of entries to leave out
        #[arg(short = 'x', long)]
        exclude: Vec<String>,

        /// Also exclude signature files and module-info.class
        #[arg(long)]
        default_excludes: bool,

        /// Treat service files like any other duplicate
        #[arg(long)]
        no_merge_services: bool,

        /// Treat the plugin cache like any other duplicate
        #[arg(long)]
        no_merge_plugin_cache: bool,
    },

    /// Run a transformer chain over a jar (alias: t)
    #[command(alias = "t")]
    Transform {
        /// Jar to transform
        input: PathBuf,

        /// JSON file describing the transformer chain
        #[arg(short = 'c', long, env = "JARWRIGHT_CHAIN")]
        chain: PathBuf,

        /// Write the result here instead of transforming in place
        #[arg(short = 'o', long, conflicts_with = "dependency_dir")]
        output: Option<PathBuf>,

        /// Write `<name>-repackaged.jar` into this directory
        #[arg(long)]
        dependency_dir: Option<PathBuf>,

        /// Leave the target untouched if any transformer fails
        #[arg(long)]
        atomic: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DuplicateMode {
    Overwrite,
    Skip,
    Warn,
    Fail,
}

impl From<DuplicateMode> for DuplicatePolicy {
    fn from(mode: DuplicateMode) -> Self {
        match mode {
            DuplicateMode::Overwrite => DuplicatePolicy::Overwrite,
            DuplicateMode::Skip => DuplicatePolicy::Skip,
            DuplicateMode::Warn => DuplicatePolicy::Warn,
            DuplicateMode::Fail => DuplicatePolicy::Fail,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    // also installs the bridge for `log` records emitted by the library
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() {
    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted");
        std::process::exit(exit_codes::USER_INTERRUPT);
    })
    .ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let exit_code = match cli.command {
        Commands::Merge {
            primary,
            others,
            output,
            duplicates,
            exclude,
            default_excludes,
            no_merge_services,
            no_merge_plugin_cache,
        } => commands::merge(&commands::MergeConfig {
            primary: &primary,
            others: &others,
            output: &output,
            duplicates,
            exclude: &exclude,
            default_excludes,
            merge_services: !no_merge_services,
            merge_plugin_cache: !no_merge_plugin_cache,
            format: cli.format,
            quiet: cli.quiet,
        }),

        Commands::Transform {
            input,
            chain,
            output,
            dependency_dir,
            atomic,
        } => commands::transform(&commands::TransformConfig {
            input: &input,
            chain: &chain,
            output: output.as_deref(),
            dependency_dir: dependency_dir.as_deref(),
            atomic,
            format: cli.format,
            quiet: cli.quiet,
        }),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}
