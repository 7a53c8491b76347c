//! BBAnn Command-Line Interface
//!
//! Tools for building and searching indices, driving the harness adapter end
//! to end, and inspecting benchmark files.

use clap::{Parser, Subcommand};
use console::style;

use bbann::cli::{build, info, run, search};

#[derive(Parser)]
#[command(name = "bbann")]
#[command(about = "BBAnn - benchmark adapter for block-based ANN search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress bars and use simple text output
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an index from a .bin vector file
    Build(build::BuildArgs),

    /// Search an existing index
    Search(search::SearchArgs),

    /// Fit or load through the harness adapter, then run query rounds
    Run(run::RunArgs),

    /// Show information about vector and answer files
    Info(info::InfoArgs),
}

fn main() -> bbann::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if !cli.no_progress {
        println!("{}", style("🚀 BBAnn CLI").bold().blue());
        println!("{}", style(format!("version {}", bbann::VERSION)).dim());
        println!();
    }

    let lib_cli = bbann::Cli {
        verbose: cli.verbose,
        no_progress: cli.no_progress,
    };

    match cli.command {
        Commands::Build(args) => build::run(args, &lib_cli),
        Commands::Search(args) => search::run(args, &lib_cli),
        Commands::Run(args) => run::run(args, &lib_cli),
        Commands::Info(args) => info::run(args, &lib_cli),
    }
}
