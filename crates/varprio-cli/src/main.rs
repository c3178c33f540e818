//! varprio: variant annotation and prioritization.
//! Entry point for the command-line binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use varprio_common::Config;

#[derive(Parser)]
#[command(name = "varprio")]
#[command(author, version, about = "Annotate VCF variants and rank them by clinical priority")]
#[command(
    long_about = "Annotate VCF variants from ClinVar, gnomAD, CADD and VEP, score them and
write the ranked table as CSV.

Examples:
  varprio parse sample.vcf --lenient
  varprio annotate sample.vcf -o annotated.csv
  varprio prioritize annotated.csv -o scored.csv
  varprio run sample.vcf -o scored.csv"
)]
struct Cli {
    /// Configuration file (default: $VARPRIO_CONFIG, then ./varprio.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a VCF and write the variant table
    Parse {
        /// Input VCF file
        vcf: PathBuf,

        /// Skip malformed data lines instead of failing
        #[arg(long)]
        lenient: bool,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse and annotate a VCF, writing the annotated table
    Annotate {
        /// Input VCF file
        vcf: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score and rank a previously annotated table
    Prioritize {
        /// Annotated CSV produced by `varprio annotate`
        annotated: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse, annotate, score and rank a VCF
    Run {
        /// Input VCF file
        vcf: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries CSV
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("varprio=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Parse { vcf, lenient, output } => {
            commands::parse(&config, &vcf, lenient, output.as_deref())
        }
        Commands::Annotate { vcf, output } => {
            commands::annotate(&config, &vcf, output.as_deref()).await
        }
        Commands::Prioritize { annotated, output } => {
            commands::prioritize(&annotated, output.as_deref())
        }
        Commands::Run { vcf, output } => commands::run(&config, &vcf, output.as_deref()).await,
    }
}
