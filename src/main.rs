//! `mindee` CLI - Split, crop and reconstruct documents

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "mindee")]
#[command(about = "Split, crop and reconstruct documents with the Mindee API")]
#[command(version)]
struct Cli {
    /// More logging (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a multi-invoice PDF into one PDF per invoice
    Split {
        /// PDF to split
        file: PathBuf,

        /// Page groups as JSON (`[{"page_indexes": [0, 1], "confidence": 0.9}]`);
        /// the API classifies the pages when omitted
        #[arg(short, long)]
        groups: Option<PathBuf>,

        /// Fold low-confidence boundaries into their neighbours
        #[arg(short, long)]
        strict: bool,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Crop regions out of an image or a PDF page
    Crop {
        /// Image or PDF
        file: PathBuf,

        /// 0-based page index
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Polygons as JSON (`[[[x, y], ...], ...]`, relative coordinates);
        /// the API detects receipts on every page when omitted
        #[arg(long)]
        polygons: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print OCR words as reading-order lines
    Lines {
        /// OCR JSON: a word list, or a `{"mvision-v1": ...}` block
        file: PathBuf,
    },

    /// Rebuild table rows from per-column positioned values
    Table {
        /// JSON object mapping column name to a list of positioned values
        file: PathBuf,

        /// Anchor column candidates, in priority order
        #[arg(short, long, value_delimiter = ',', required = true)]
        anchors: Vec<String>,

        /// Other columns to place in rows
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Vertical tolerance, relative to page height
        #[arg(short, long, default_value_t = mindee::parsing::DEFAULT_HEIGHT_TOLERANCE)]
        tolerance: f64,
    },

    /// Show the detected kind and page count of a document
    Pages {
        /// Document to inspect
        file: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Split {
            file,
            groups,
            strict,
            output,
        } => {
            cmd::split::cmd_split(&file, groups.as_deref(), strict, &output).await?;
        }
        Commands::Crop {
            file,
            page,
            polygons,
            output,
        } => {
            cmd::crop::cmd_crop(&file, page, polygons.as_deref(), &output).await?;
        }
        Commands::Lines { file } => {
            cmd::lines::cmd_lines(&file)?;
        }
        Commands::Table {
            file,
            anchors,
            columns,
            tolerance,
        } => {
            cmd::table::cmd_table(&file, &anchors, &columns, tolerance)?;
        }
        Commands::Pages { file } => {
            cmd::pages::cmd_pages(&file)?;
        }
    }

    Ok(())
}
