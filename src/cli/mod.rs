//! Command-line interface for dfexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and flag overrides
//! - Turning export flags into an [`ExportRequest`]
//! - Resolving the output destination

use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::Config;
use crate::error::Result;
use crate::export::{ExportFormat, ExportRequest};

/// Export search results as CSV, bulk JSON or spreadsheet files
#[derive(Parser, Debug)]
#[command(
    name = "dfexport",
    version,
    about = "Export search results as csv, json or xls",
    long_about = "Loads an NDJSON dataset into an in-memory index and exports the
records matching a query as CSV, bulk JSON lines or a spreadsheet."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for dfexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export the records of an index
    Export(ExportArgs),

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// Arguments of the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// NDJSON file with one hit or source object per line
    #[arg(short = 'd', long, value_name = "FILE")]
    pub data: PathBuf,

    /// Index name
    #[arg(short = 'i', long, value_name = "NAME", default_value = "dataset")]
    pub index: String,

    /// Document type to restrict the export to
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub doc_type: Option<String>,

    /// Output format (csv, json, xls)
    #[arg(short = 'f', long, value_name = "FORMAT", default_value = "csv")]
    pub format: String,

    /// Comma-separated list of columns, e.g. aaa,eee.ggg
    #[arg(long = "fl", value_name = "FIELDS")]
    pub fields: Option<String>,

    /// File holding the query body ({"query": ..., "sort": ...})
    #[arg(short = 'q', long, value_name = "FILE")]
    pub query: Option<PathBuf>,

    /// Output file, `-` for stdout (default: export-<timestamp>.<ext>)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Records per cursor page
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// Where export bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.validate()?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Apply command-line overrides
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        if let Commands::Export(export) = &args.command {
            if let Some(batch_size) = export.batch_size.filter(|n| *n > 0) {
                config.export.batch_size = batch_size;
            }
            if export.no_progress || export.output.as_deref() == Some("-") {
                config.export.show_progress = false;
            }
        }
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the export request from the export flags
    ///
    /// # Arguments
    /// * `export` - Export subcommand arguments
    ///
    /// # Returns
    /// * `Result<ExportRequest>` - Validated request
    pub async fn build_request(export: &ExportArgs) -> Result<ExportRequest> {
        let mut params = HashMap::new();
        params.insert("format".to_string(), export.format.clone());
        if let Some(fields) = &export.fields {
            params.insert("fl".to_string(), fields.clone());
        }

        let body = match &export.query {
            Some(path) => Some(tokio::fs::read_to_string(path).await?),
            None => None,
        };

        ExportRequest::from_params(
            &export.index,
            export.doc_type.as_deref(),
            &params,
            body.as_deref(),
        )
    }

    /// Resolve where the export is written
    pub fn output_target(export: &ExportArgs, format: ExportFormat) -> OutputTarget {
        match export.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None => OutputTarget::File(PathBuf::from(Self::default_filename(format))),
        }
    }

    /// Get suggested filename for format
    pub fn default_filename(format: ExportFormat) -> String {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        format!("export-{}.{}", timestamp, format.file_extension())
    }

    /// Print the effective configuration or validate it
    pub fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.config.validate()?;
            println!("Configuration is valid");
        }
        if show || !validate {
            let source = self
                .args
                .config_file
                .clone()
                .unwrap_or_else(Config::default_path);
            println!("# {}", display_path(&source));
            print!("{}", self.config.to_toml()?);
        }
        Ok(())
    }
}

fn display_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", path.display())
    }
}
