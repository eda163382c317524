//! TalentFlow Ingest - spreadsheet inspection tool

use anyhow::Result;
use clap::Parser;
use talentflow_common::logging::{init_logging, LogConfig, LogLevel};
use talentflow_ingest::{mapping, normalize, reader::SheetReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "talentflow-ingest")]
#[command(author, version, about = "TalentFlow spreadsheet inspection tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Print the headers of a spreadsheet and how they resolve
    Headers {
        /// Path to a .csv or .xlsx file
        file: String,
    },

    /// Normalize the first rows of a spreadsheet and print the result
    Preview {
        /// Path to a .csv or .xlsx file
        file: String,

        /// Number of rows to preview
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("talentflow-ingest".to_string())
        .build();

    // Environment variables take precedence over CLI defaults
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    match cli.command {
        Command::Headers { file } => {
            let sheet = SheetReader::open(&file)?;
            let headers = sheet.headers().to_vec();
            let resolution = mapping::resolve_headers(&headers);
            info!(file, columns = headers.len(), "resolved headers");
            for (header, field) in &resolution.per_header {
                match field {
                    Some(field) => println!("{header} -> {field}"),
                    None => println!("{header} -> (unmapped)"),
                }
            }
        }
        Command::Preview { file, limit } => {
            let sheet = SheetReader::open(&file)?;
            let headers = sheet.headers().to_vec();
            let resolution = mapping::resolve_headers(&headers);
            for row in sheet.take(limit) {
                let row = row?;
                let raw = row.to_map(&headers);
                let fields = normalize::normalize_row(&raw, &resolution.per_header);
                println!("row {}: {}", row.number, serde_json::to_string(&fields)?);
            }
        }
    }

    Ok(())
}
