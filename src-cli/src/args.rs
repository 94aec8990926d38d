//! Command-line surface for `worksheetgen`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "worksheetgen",
    version,
    about = "Generate printable and interactive worksheets",
    long_about = None
)]
pub struct Cli {
    /// Path to the JSON configuration file (defaults apply when omitted)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a worksheet request and follow it until it finishes
    Generate {
        /// JSON file with gradeLevel, topic, activities, style and imagesAllowed
        #[arg(long, short)]
        request: PathBuf,
        /// Requester recorded as the job owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print the status of a job
    Status { job_id: String },
    /// Request cancellation of a pending or running job
    Cancel { job_id: String },
    /// List jobs, newest first
    List {
        #[arg(long)]
        owner: Option<String>,
    },
}
