//! Pybundle CLI - Builds Python runtimes and makes macOS bundles self-contained.

mod commands;
mod discovery;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pybundle_core::Result;
use tracing_subscriber::EnvFilter;

use commands::graph::GraphFormat;

#[derive(Parser)]
#[command(name = "pybundle")]
#[command(
    author,
    version,
    about = "Builds Python runtimes and relocates them into self-contained bundles"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a recipe
    Build {
        /// Recipe to build (the Recipefile default if not specified)
        recipe: Option<String>,

        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Override a recipe setting
        #[arg(short, long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,

        /// Path to Recipefile (auto-detected if not specified)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// Copy vendored libraries into a bundle and rewrite its linkage
    Relocate {
        /// Bundle directory or single binary
        bundle: PathBuf,

        /// Additional library to copy into the bundle
        #[arg(long = "extra-lib", value_name = "PATH")]
        extra_libs: Vec<PathBuf>,

        /// Library directory (defaults to Contents/Frameworks)
        #[arg(long)]
        lib_dir: Option<PathBuf>,

        /// Print the edits instead of applying them
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available recipes
    List {
        /// Show projects and builders
        #[arg(short, long)]
        detailed: bool,

        /// Path to Recipefile (auto-detected if not specified)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// Show the build order of a recipe
    Graph {
        /// Recipe to show (all recipes if not specified)
        recipe: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = GraphFormat::Ascii)]
        format: GraphFormat,

        /// Path to Recipefile (auto-detected if not specified)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// Validate a Recipefile
    Validate {
        /// Path to Recipefile (auto-detected if not specified)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// Write a starter Recipefile
    Init {
        /// Overwrite an existing Recipefile
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::failure(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            recipe,
            dry_run,
            config,
            file,
        } => commands::build::execute(file.as_deref(), recipe.as_deref(), &config, dry_run),

        Commands::Relocate {
            bundle,
            extra_libs,
            lib_dir,
            dry_run,
            json,
        } => commands::relocate::execute(&bundle, &extra_libs, lib_dir.as_deref(), dry_run, json),

        Commands::List { detailed, file } => commands::list::execute(file.as_deref(), detailed),

        Commands::Graph {
            recipe,
            format,
            file,
        } => commands::graph::execute(file.as_deref(), recipe.as_deref(), format),

        Commands::Validate { file } => commands::validate::execute(file.as_deref()),

        Commands::Init { force } => commands::init::execute(force),
    }
}
