use std::path::PathBuf;

use clap::{Parser, Subcommand};
use volley::ScriptType;

#[derive(Parser, Debug)]
#[command(name = "volley", version, about = "Run a script over every row of a CSV")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a script against every data row of a CSV
    Run(RunArgs),
    /// Write the CSV template for a script type
    Template {
        script_type: ScriptType,
        #[arg(long, help = "Script title, used for the default file name")]
        title: Option<String>,
        #[arg(long, short, help = "Write to this path instead of stdout")]
        output: Option<PathBuf>,
    },
    /// List the methods available to a script type
    Methods { script_type: ScriptType },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[arg(long, help = "CSV file with one row per target")]
    pub csv: PathBuf,
    #[arg(long, conflicts_with = "script_type", help = "Script definition (JSON)")]
    pub script: Option<PathBuf>,
    #[arg(long = "type", required_unless_present = "script", help = "Script type: File, File Item, Item, List, Site")]
    pub script_type: Option<ScriptType>,
    #[arg(long, default_value = "", help = "Default method for rows that leave it empty")]
    pub method: String,
    #[arg(long, default_value = "", help = "Default JSON parameters for rows that leave them empty")]
    pub parameters: String,
    #[arg(long, default_value = "volley")]
    pub title: String,
    #[arg(long, default_value_t = 1, help = "Rows processed at once")]
    pub concurrency: usize,
    #[arg(long, default_value_t = 600000, help = "Timeout per remote call (ms)")]
    pub timeout_ms: u64,
    #[arg(long, help = "Timeout per row (ms)")]
    pub row_timeout_ms: Option<u64>,
    #[arg(long, env = "VOLLEY_ACCESS_TOKEN", hide_env_values = true, help = "Bearer token for the remote API")]
    pub token: Option<String>,
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "",
        help = "Export results as CSV (defaults to {title}_results.csv)"
    )]
    pub export: Option<String>,
    #[arg(long, value_delimiter = ',', default_value = "Error,Message,Output")]
    pub export_columns: Vec<String>,
}
