//! FIRDS Ingest - reference-data extraction tool

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use firds_common::logging::{init_logging, LogConfig, LogLevel};
use firds_ingest::archive::ZipExtractor;
use firds_ingest::config::IngestConfig;
use firds_ingest::discovery::{find_link, parse_entries, DEFAULT_FILE_TYPE};
use firds_ingest::fetch::HttpFetcher;
use firds_ingest::parser::{extract_to_csv, ExtractOptions, DEFAULT_BATCH_SIZE, DEFAULT_NAMESPACE};
use firds_ingest::pipeline::{Pipeline, PipelineReport};
use firds_ingest::storage::{S3Uploader, StorageConfig, Uploader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "firds-ingest")]
#[command(author, version, about = "ESMA FIRDS reference-data extractor")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, extract and publish the latest matching report
    Run(RunArgs),

    /// Extract a local XML report into a CSV table
    Extract {
        /// Source XML file
        xml: PathBuf,

        /// Destination CSV file (truncated first)
        csv: PathBuf,

        /// Records per flush
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Namespace URI of the record elements
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Do not write the header row
        #[arg(long)]
        no_header: bool,
    },

    /// Print the download link found in a local discovery document
    Locate {
        /// Discovery document
        discovery: PathBuf,

        /// File type to look for
        #[arg(long, default_value = DEFAULT_FILE_TYPE)]
        file_type: String,

        /// List every entry instead of the first match
        #[arg(long)]
        all: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Discovery document URL (overrides the date window)
    #[arg(long)]
    url: Option<String>,

    /// First publication date, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last publication date, YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,

    /// File type whose link is followed
    #[arg(long)]
    file_type: Option<String>,

    /// Scratch directory
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Records per flush
    #[arg(long)]
    batch_size: Option<usize>,

    /// Namespace URI of the record elements
    #[arg(long)]
    namespace: Option<String>,

    /// Do not write header rows
    #[arg(long)]
    no_header: bool,

    /// Keep the tables local
    #[arg(long)]
    skip_upload: bool,

    /// Show a download progress bar
    #[arg(long)]
    progress: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("firds-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Extract {
            xml,
            csv,
            batch_size,
            namespace,
            no_header,
        } => {
            let options = ExtractOptions {
                namespace,
                batch_size,
                include_header: !no_header,
            };
            let summary = extract_to_csv(&xml, &csv, &options)?;
            println!("{} records written to {}", summary.records, csv.display());
            Ok(())
        },
        Command::Locate {
            discovery,
            file_type,
            all,
        } => {
            let document = std::fs::read_to_string(&discovery)
                .with_context(|| format!("failed to read {}", discovery.display()))?;

            if all {
                for entry in parse_entries(&document, &discovery.display().to_string())? {
                    println!(
                        "{}\t{}",
                        entry.get("file_type").unwrap_or("-"),
                        entry.get("download_link").unwrap_or("-")
                    );
                }
                return Ok(());
            }

            match find_link(&document, &file_type) {
                Some(link) => {
                    println!("{}", link);
                    Ok(())
                },
                None => bail!("no '{}' download link in {}", file_type, discovery.display()),
            }
        },
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut builder = IngestConfig::builder().base(IngestConfig::from_env()?);
    if let Some(url) = args.url {
        builder = builder.discovery_url(url);
    }
    if let Some(from) = args.from {
        builder = builder.from_date(from);
    }
    if let Some(to) = args.to {
        builder = builder.to_date(to);
    }
    if let Some(file_type) = args.file_type {
        builder = builder.file_type(file_type);
    }
    if let Some(work_dir) = args.work_dir {
        builder = builder.work_dir(work_dir);
    }
    if let Some(batch_size) = args.batch_size {
        builder = builder.batch_size(batch_size);
    }
    if let Some(namespace) = args.namespace {
        builder = builder.namespace(namespace);
    }
    if args.no_header {
        builder = builder.include_header(false);
    }
    if args.skip_upload {
        builder = builder.skip_upload(true);
    }
    if args.progress {
        builder = builder.show_progress(true);
    }
    let config = builder.build();

    info!(url = %config.discovery_url(), file_type = %config.file_type, "starting run");

    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let uploader: Option<Arc<dyn Uploader>> = if config.skip_upload {
        None
    } else {
        Some(Arc::new(S3Uploader::new(StorageConfig::from_env()?).await?))
    };

    let pipeline = Pipeline::new(config, fetcher, Arc::new(ZipExtractor), uploader)?;
    let report = pipeline.run().await?;

    print_report(&report);

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    for table in &report.tables {
        match &table.published {
            Some(object) => println!("{}\t{} records\t{}", table.table.display(), table.records, object.url),
            None => println!("{}\t{} records", table.table.display(), table.records),
        }
    }
}
