//! rsgeosys CLI - Command-line interface
//!
//! Searches field imagery coverage, creates field-level maps and downloads
//! their artifacts through the rsgeosys library.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use commands::common::GlobalArgs;

#[derive(Parser)]
#[command(name = "rsgeosys")]
#[command(version, about = "Field-level map products from the Geosys bridge", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List map products, crops, sensors and regions
    Products(commands::products::ProductsArgs),

    /// Search imagery coverage of a field for a map product
    Search(commands::search::SearchArgs),

    /// Create a field map and download its artifacts
    Create(commands::create::CreateArgs),

    /// Create the difference map between two image dates
    Difference(commands::difference::DifferenceArgs),

    /// Create a management-zone map from several image dates
    Zones(commands::zones::ZonesArgs),
}

/// Explicit config path, or the default one.
fn config_path(global: &GlobalArgs) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(rsgeosys::config::config_file_path)
}

fn main() {
    let cli = Cli::parse();
    rsgeosys::logging::init_logging(cli.global.verbose);

    let path = config_path(&cli.global);
    let result = match cli.command {
        Commands::Products(args) => commands::products::run(args),
        Commands::Search(args) => commands::search::run(&cli.global, &path, args),
        Commands::Create(args) => commands::create::run(&cli.global, &path, args),
        Commands::Difference(args) => commands::difference::run(&cli.global, &path, args),
        Commands::Zones(args) => commands::zones::run(&cli.global, &path, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
