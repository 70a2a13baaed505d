//! dfexport - export search results from the command line
//!
//! Loads an NDJSON dataset into an in-memory index and exports the records
//! matching a query as CSV, bulk JSON lines or a spreadsheet.
//!
//! # Usage
//!
//! ```bash
//! dfexport export -d dataset.ndjson -f csv --fl aaa,eee.ggg -o dataset.csv
//! dfexport export -d dataset.ndjson -f json -q query.json -o -
//! ```

use std::sync::Arc;

use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

use dataformat::backend::MemoryBackend;
use dataformat::cli::{CliInterface, Commands, ExportArgs, OutputTarget};
use dataformat::export::{self, ExportSummary};
use dataformat::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Dispatch the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);

    match &cli.args().command {
        Commands::Config { show, validate } => cli.handle_config_command(*show, *validate),
        Commands::Export(export) => {
            let summary = run_export(&cli, export).await?;
            eprintln!(
                "Exported {} rows ({} columns, {} bytes) in {} ms",
                summary.rows_exported,
                summary.columns.len(),
                summary.bytes_written,
                summary.elapsed_ms
            );
            Ok(())
        }
    }
}

/// Load the dataset and run one export, cancelling on Ctrl+C
async fn run_export(cli: &CliInterface, args: &ExportArgs) -> Result<ExportSummary> {
    let request = CliInterface::build_request(args).await?;

    let backend = Arc::new(MemoryBackend::new());
    backend.load_ndjson(&args.index, &args.data).await?;

    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let config = &cli.config().export;
    let result = match CliInterface::output_target(args, request.format()) {
        OutputTarget::Stdout => {
            let sink = BufWriter::new(tokio::io::stdout());
            export::run(backend, config, &request, sink, Some(cancel_token)).await
        }
        OutputTarget::File(path) => {
            info!("Writing {} export to {}", request.format(), path.display());
            let file = tokio::fs::File::create(&path).await?;
            let sink = BufWriter::new(file);
            export::run(backend, config, &request, sink, Some(cancel_token)).await
        }
    };

    ctrl_c_handle.abort();
    result
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so that stdout can carry export data.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
