use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gambit_core::results::ExportFormat;
use gambit_core::ProgressConfig;
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use commands::dist::DistArgs;
use commands::query::QueryArgs;
use commands::signatures::SignaturesCommands;
use commands::AppContext;
use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "gambit")]
#[command(about = "GAMBIT - Genomic Approximation Method for Bacterial Identification and Tracking")]
#[command(version)]
#[command(long_about = "
GAMBIT predicts the taxonomy of bacterial genomes by comparing their k-mer
signatures against a reference database of genomes with known taxonomy.

Examples:
  gambit --db refdb/ query genome1.fasta genome2.fasta.gz
  gambit --db refdb/ query -l genomes.txt --ldir genomes/ -f json -o results.json
  gambit signatures create -k 11 -p ATGAC -o sigs.gs genomes/*.fasta
  gambit dist -q query.fasta -r refs/*.fasta -o dists.csv
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Reference database directory
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output and progress bars)
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict taxonomy of genome sequences
    Query(QueryArgs),

    /// Create and inspect k-mer signature files
    Signatures {
        #[command(subcommand)]
        action: SignaturesCommands,
    },

    /// Calculate the distance matrix between query and reference genomes
    Dist(DistArgs),

    /// Compute a single signature for the process backend
    #[command(hide = true)]
    Worker,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Json => ExportFormat::Json,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Worker = cli.command {
        return commands::worker::execute();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(threads) = cli.threads {
        if threads == 0 {
            return Err(CliError::config("--threads must be at least 1").into());
        }
        config.general.threads = threads;
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.general.threads.max(1))
        .build_global()
        .context("Failed to set thread count")?;

    let ctx = AppContext {
        progress: ProgressConfig::bar_if(config.general.progress && !cli.quiet),
        config,
        db: cli.db,
    };

    match cli.command {
        Commands::Query(args) => commands::query::execute(&ctx, args),
        Commands::Signatures { action } => commands::signatures::execute(&ctx, action),
        Commands::Dist(args) => commands::dist::execute(&ctx, args),
        Commands::Worker => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();

    // Workers share stderr with the parent's error reporting
    let quiet = cli.quiet || matches!(cli.command, Commands::Worker);
    setup_logging(cli.verbose, quiet);

    if let Err(err) = run(cli) {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            print_error_and_exit(cli_err);
        }
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
