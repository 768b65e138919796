//! spath CLI - resolve names across ordered search directories
//!
//! Thin front end over `spath-index`. Search roots come from `--root`
//! flags or from `.spath/config.json` in the current directory.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "spath")]
#[command(author = "spath Contributors")]
#[command(version)]
#[command(about = "Find files across an ordered list of directories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .spath/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config in the given directory
    Init {
        /// Project directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Resolve a name against the search directories
    Search {
        /// Name to resolve, e.g. templates/index.html
        name: String,

        /// Search directory, highest priority first (repeatable)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,

        /// File to look for when the match is a directory (repeatable)
        #[arg(short, long = "index-file")]
        index_files: Vec<String>,

        /// Build the name cache before searching
        #[arg(long)]
        cache: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every name the search directories provide
    List {
        /// Search directory, highest priority first (repeatable)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,
    },

    /// Show search directories and cache size
    Status {
        /// Search directory, highest priority first (repeatable)
        #[arg(short, long = "root")]
        roots: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Search {
            name,
            roots,
            index_files,
            cache,
            json,
        } => commands::search(config, &name, roots, index_files, cache, json),
        Commands::List { roots } => commands::list(config, roots),
        Commands::Status { roots } => commands::status(config, roots),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
