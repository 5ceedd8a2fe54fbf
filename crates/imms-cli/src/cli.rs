//! CLI argument definitions for the batch processor.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};

#[derive(Parser)]
#[command(
    name = "imms-batch",
    version,
    about = "Immunization batch processor - validate and load vaccination record files",
    long_about = "Process supplier batch files of vaccination records.\n\n\
                  Each file is validated, converted to FHIR Immunization resources,\n\
                  applied to the record store and acknowledged row by row."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process every batch file in a folder through the pipeline.
    Process(ProcessArgs),

    /// List the whitelisted ODS codes and their suppliers.
    Suppliers,
}

#[derive(Parser)]
pub struct ProcessArgs {
    /// Folder containing the incoming batch files (.csv or .dat).
    #[arg(value_name = "INPUT_FOLDER")]
    pub input_folder: PathBuf,

    /// Folder holding pipeline state: source copies, acks and archives
    /// (default: <INPUT_FOLDER>/store).
    #[arg(long = "store-dir", value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// JSON file mapping supplier names to granted permission keys, e.g.
    /// {"EMIS": ["FLU_FULL", "RSV_CREATE"]}. Without it, every whitelisted
    /// supplier is granted full permissions for every vaccine type.
    #[arg(long = "permissions", value_name = "PATH")]
    pub permissions: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
