//! datesync CLI
//!
//! Command-line tool for merging fresh CSV exports into published datasets,
//! replacing rows by date.

mod logger;

use clap::{Args, Parser, Subcommand};
use datesync_core::{
    date_key, decode_file, encode_dataset, merge, record_run, resolve, sync, sync_job, BatchFile,
    Dataset, DirStore, LogSink, RunHistory, Store, StoreConfig, SyncJob, SyncOptions,
    SyncOutcome, SyncReport,
};
use datesync_http::{HttpStore, DEFAULT_API_BASE};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "datesync")]
#[command(about = "Merge CSV exports into published datasets by date", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only show warnings
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Merge key settings shared by several commands
#[derive(Args)]
struct MergeArgs {
    /// Column holding the date used to match rows
    #[arg(short, long, env = "DATESYNC_DATE_COLUMN")]
    date_column: String,

    /// Compare dates by calendar day
    #[arg(
        long,
        env = "DATESYNC_NORMALIZE_DATE",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    normalize_date: bool,

    /// Compare raw date text (same as --normalize-date false)
    #[arg(long)]
    no_normalize: bool,
}

impl MergeArgs {
    fn normalize(&self) -> bool {
        self.normalize_date && !self.no_normalize
    }
}

/// Where `sync` publishes to
#[derive(Args)]
struct StoreArgs {
    /// Use a local directory as the store (identifier = file name)
    #[arg(long, env = "DATESYNC_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Remote file API host
    #[arg(long, env = "DATESYNC_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Access token for the remote file API
    #[arg(long, env = "DATESYNC_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two local CSV files
    Merge {
        /// Previously published CSV (treated as empty if missing)
        #[arg(short, long)]
        existing: PathBuf,

        /// Newly exported CSV
        #[arg(short, long)]
        new: PathBuf,

        #[command(flatten)]
        merge: MergeArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge a new export into a published dataset and upload the result
    Sync {
        /// Identifier or sharing URL of the published dataset
        #[arg(short, long, env = "DATESYNC_TARGET")]
        target: String,

        /// Newly exported CSV
        #[arg(short, long)]
        new: PathBuf,

        #[command(flatten)]
        merge: MergeArgs,

        /// Report the merge without uploading
        #[arg(long, env = "DATESYNC_DRY_RUN")]
        dry_run: bool,

        /// Write the merged CSV here during a dry run
        #[arg(long, env = "DATESYNC_PREVIEW_PATH")]
        preview: Option<PathBuf>,

        /// Fail instead of overwriting when the published dataset cannot be fetched
        #[arg(long)]
        strict_fetch: bool,

        #[command(flatten)]
        store: StoreArgs,

        /// Append the run to this history file
        #[arg(long, env = "DATESYNC_HISTORY")]
        history: Option<PathBuf>,
    },

    /// Run every job of a batch file
    Batch {
        /// Path to batch file (JSON)
        #[arg(short, long)]
        batch: PathBuf,
    },

    /// Create a batch file template
    CreateBatch {
        /// Output path for the batch file
        #[arg(short, long)]
        output: PathBuf,

        /// Use a local directory store instead of the remote API
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Parse and display a single CSV file
    Parse {
        /// Path to CSV file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the bare identifier of an identifier or sharing URL
    Resolve {
        /// Identifier or URL
        raw: String,
    },

    /// Print the date key of a value
    DateKey {
        /// Raw date value
        value: String,

        /// Compare raw date text
        #[arg(long)]
        no_normalize: bool,
    },

    /// List recorded runs
    History {
        /// History file
        #[arg(long, env = "DATESYNC_HISTORY")]
        history: PathBuf,

        /// Only show runs for this identifier or URL
        #[arg(short, long)]
        target: Option<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> datesync_core::Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_for(cli.verbose, cli.quiet));

    match cli.command {
        Commands::Merge {
            existing,
            new,
            merge,
            output,
        } => cmd_merge(&existing, &new, &merge, &output),
        Commands::Sync {
            target,
            new,
            merge,
            dry_run,
            preview,
            strict_fetch,
            store,
            history,
        } => {
            let options = SyncOptions {
                date_column: merge.date_column.clone(),
                normalize_date: merge.normalize(),
                dry_run,
                preview_path: preview,
                allow_overwrite_on_fetch_failure: !strict_fetch,
            };
            cmd_sync(&target, &new, &options, &store, history.as_deref())
        }
        Commands::Batch { batch } => cmd_batch(&batch),
        Commands::CreateBatch { output, store_dir } => cmd_create_batch(&output, store_dir),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Resolve { raw } => {
            println!("{}", resolve(&raw));
            Ok(())
        }
        Commands::DateKey {
            value,
            no_normalize,
        } => {
            println!("{}", date_key(&value, !no_normalize));
            Ok(())
        }
        Commands::History { history, target } => cmd_history(&history, target.as_deref()),
    }
}

fn cmd_merge(
    existing_path: &Path,
    new_path: &Path,
    args: &MergeArgs,
    output: &Path,
) -> datesync_core::Result<()> {
    let existing = if existing_path.exists() {
        decode_file(existing_path, &LogSink)?
    } else {
        log::warn!(
            "{} does not exist, treating it as an empty dataset",
            existing_path.display()
        );
        Dataset::empty()
    };
    let new = decode_file(new_path, &LogSink)?;

    let result = merge(existing, new, &args.date_column, args.normalize(), &LogSink)?;
    let text = encode_dataset(&result.dataset)?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output, &text)?;

    let stats = result.stats;
    println!("Merged into {}", output.display());
    println!("  {} existing rows kept", stats.kept);
    println!("  {} existing rows replaced", stats.removed);
    println!("  {} new rows ({} dates)", stats.added, stats.distinct_dates);
    println!("  {} rows total", result.dataset.row_count());

    Ok(())
}

fn cmd_sync(
    target: &str,
    new_path: &Path,
    options: &SyncOptions,
    store_args: &StoreArgs,
    history: Option<&Path>,
) -> datesync_core::Result<()> {
    let store = open_store(store_args)?;
    let report = sync(store.as_ref(), target, new_path, options, &LogSink)?;

    print_report(&report);

    if let Some(path) = history {
        record_run(path, "sync", &report)?;
    }

    Ok(())
}

fn cmd_batch(batch_path: &Path) -> datesync_core::Result<()> {
    let batch = BatchFile::load(batch_path)?;
    let store = store_from_config(&batch.store)?;

    println!("Running batch with {} jobs", batch.jobs.len());
    println!();

    let mut succeeded = 0;
    let mut errors = Vec::new();

    for job in &batch.jobs {
        println!("Processing job: {}", job.name);

        match sync_job(store.as_ref(), job, &LogSink) {
            Ok(report) => {
                succeeded += 1;
                print_report(&report);
                if let Some(path) = &batch.history {
                    if let Err(e) = record_run(path, &job.name, &report) {
                        errors.push((job.name.clone(), e.to_string()));
                    }
                }
            }
            Err(e) => {
                errors.push((job.name.clone(), e.to_string()));
            }
        }
        println!();
    }

    println!("Batch complete:");
    println!("  {} of {} jobs succeeded", succeeded, batch.jobs.len());

    if !errors.is_empty() {
        println!("\nErrors ({}):", errors.len());
        for (job, err) in &errors {
            println!("  {}: {}", job, err);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_create_batch(output: &Path, store_dir: Option<PathBuf>) -> datesync_core::Result<()> {
    let store = match store_dir {
        Some(root) => StoreConfig::Dir { root },
        None => StoreConfig::Http {
            api_base: DEFAULT_API_BASE.to_string(),
            token_env: "DATESYNC_ACCESS_TOKEN".to_string(),
        },
    };

    let batch = BatchFile {
        store,
        history: Some(PathBuf::from("datesync-history.json")),
        jobs: vec![
            SyncJob {
                name: "production".to_string(),
                target: "PRODUCTION_FILE_ID".to_string(),
                new_path: PathBuf::from("downloads/production.csv"),
                options: SyncOptions::new("Date"),
            },
            SyncJob {
                name: "scrap".to_string(),
                target: "SCRAP_FILE_ID".to_string(),
                new_path: PathBuf::from("downloads/scrap.csv"),
                options: SyncOptions::new("Report Date"),
            },
        ],
    };

    batch.save(output)?;
    println!("Created batch file: {}", output.display());
    println!();
    println!("Edit the file to configure your jobs, then run:");
    println!("  datesync batch --batch {}", output.display());

    Ok(())
}

fn cmd_parse(file: &Path) -> datesync_core::Result<()> {
    let dataset = decode_file(file, &LogSink)?;

    println!("File: {}", file.display());
    println!("Columns: {}", dataset.column_count());
    println!("Rows: {}", dataset.row_count());
    println!();

    println!("{}", dataset.fieldnames.join("\t"));
    println!("{}", "-".repeat(dataset.fieldnames.len() * 12));

    // Print first 10 rows
    for row in dataset.rows.iter().take(10) {
        let values: Vec<&str> = dataset
            .fieldnames
            .iter()
            .map(|name| row.get_or_empty(name))
            .collect();
        println!("{}", values.join("\t"));
    }

    if dataset.row_count() > 10 {
        println!("... ({} more rows)", dataset.row_count() - 10);
    }

    Ok(())
}

fn cmd_history(path: &Path, target: Option<&str>) -> datesync_core::Result<()> {
    let history = RunHistory::load(path)?;
    let target = target.map(resolve);

    println!("Runs ({}):", history.total_entries());
    println!();

    for (identifier, entries) in &history.entries {
        if target.as_deref().is_some_and(|t| t != identifier.as_str()) {
            continue;
        }

        println!("{} ({} runs)", identifier, entries.len());
        for entry in entries {
            let stats = &entry.report.stats;
            println!(
                "  {}  {:<12} kept {:>6}  replaced {:>6}  new {:>6}  {}{}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.job,
                stats.kept,
                stats.removed,
                stats.added,
                outcome_label(&entry.report.outcome),
                if entry.report.fetch_degraded {
                    " (fetch failed)"
                } else {
                    ""
                }
            );
        }
        println!();
    }

    Ok(())
}

fn open_store(args: &StoreArgs) -> datesync_core::Result<Box<dyn Store>> {
    if let Some(root) = &args.store_dir {
        return Ok(Box::new(DirStore::new(root)));
    }

    let token = args.token.clone().ok_or_else(|| {
        datesync_core::Error::Configuration(
            "an access token is required (--token or DATESYNC_ACCESS_TOKEN), or use --store-dir"
                .to_string(),
        )
    })?;
    Ok(Box::new(HttpStore::with_base_url(token, &args.api_base)?))
}

fn store_from_config(config: &StoreConfig) -> datesync_core::Result<Box<dyn Store>> {
    match config {
        StoreConfig::Dir { root } => Ok(Box::new(DirStore::new(root))),
        StoreConfig::Http {
            api_base,
            token_env,
        } => {
            let token = std::env::var(token_env).map_err(|_| {
                datesync_core::Error::Configuration(format!(
                    "environment variable {} is not set",
                    token_env
                ))
            })?;
            Ok(Box::new(HttpStore::with_base_url(token, api_base.as_str())?))
        }
    }
}

fn print_report(report: &SyncReport) {
    let stats = &report.stats;
    println!("Dataset: {}", report.identifier);
    if report.fetch_degraded {
        println!("  Existing dataset could not be fetched; published the new rows only");
    }
    println!("  {} existing rows kept", stats.kept);
    println!("  {} existing rows replaced", stats.removed);
    println!("  {} new rows ({} dates)", stats.added, stats.distinct_dates);
    println!("  {} rows total, {} bytes", report.total_rows, report.bytes);

    match &report.outcome {
        SyncOutcome::Uploaded { ack } => {
            println!("  Uploaded ({})", ack.id.as_deref().unwrap_or("?"));
        }
        SyncOutcome::Previewed { path } => {
            println!("  Dry run, preview written to {}", path.display());
        }
        SyncOutcome::Reported => println!("  Dry run, nothing written"),
    }
}

fn outcome_label(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Uploaded { .. } => "uploaded",
        SyncOutcome::Previewed { .. } => "previewed",
        SyncOutcome::Reported => "dry run",
    }
}
