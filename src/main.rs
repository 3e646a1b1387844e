//! hashguard command-line entry point.

use hashguard::core::config::{Config, LogFormat};
use hashguard::core::error::{Error, Result};
use hashguard::core::types::ScanStatus;
use hashguard::detection::SignatureDatabase;
use hashguard::scanner::FileScanner;
use hashguard::ui::cli::{Cli, Commands, ConfigAction, DatabaseArgs, OutputFormat};
use hashguard::ui::output::{self, ScanReport};
use hashguard::utils::logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    let mut log_config = LogConfig::from_config(&config).with_verbosity(cli.verbose);
    if cli.format == OutputFormat::Json {
        log_config.format = LogFormat::Json;
        log_config.color = false;
    }
    init_logging(log_config);

    log::debug!("hashguard v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Scan {
            paths,
            db,
            recursive,
            skip_size,
            no_summary,
            full_path,
            output: report_path,
        }) => {
            let mut config = config;
            config.scan.recursive |= recursive;
            config.scan.skip_size_check |= skip_size;
            config.scan.full_path |= full_path;
            run_scan(config, &db, paths, no_summary, report_path, cli.format).await
        }
        Some(Commands::Info { db }) => run_info(config, &db, cli.format),
        Some(Commands::Lookup { db, hash, size }) => {
            run_lookup(config, &db, hash, size, cli.format)
        }
        Some(Commands::Config { action }) => run_config(action, &config, cli.config),
        None => {
            println!("hashguard - hash-signature malware scanner");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  hashguard scan -d <signatures> -r <dir>   Scan a directory");
            println!("  hashguard info -d <signatures>            Show database statistics");
            Ok(())
        }
    }
}

/// Load the signature database with command-line overrides applied.
fn open_database(config: &Config, args: &DatabaseArgs) -> Result<SignatureDatabase> {
    let mut db_config = config.database.clone();
    args.apply(&mut db_config);
    SignatureDatabase::open(db_config)
}

/// Run a scan.
async fn run_scan(
    mut config: Config,
    db_args: &DatabaseArgs,
    paths: Vec<PathBuf>,
    no_summary: bool,
    report_path: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    db_args.apply(&mut config.database);
    config.validate()?;

    let db = Arc::new(SignatureDatabase::open(config.database.clone())?);
    let known = db.stats()?.count();
    let scanner = Arc::new(FileScanner::new(Arc::new(config), Arc::clone(&db))?);

    let interrupt = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping scan");
                scanner.cancel();
            }
        })
    };

    let summary = scanner.scan_paths(paths).await;
    interrupt.abort();
    let summary = summary?;

    let report = ScanReport::new(&summary, known);
    if let Some(path) = report_path {
        std::fs::write(&path, report.to_json()?)
            .map_err(|e| Error::file_write(&path, e))?;
        log::info!("Report written to {}", path.display());
    }

    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => {
            print!("{}", report.detections_text());
            if !no_summary {
                println!();
                print!("{}", report.summary_text());
            }
        }
    }

    if summary.status == ScanStatus::Cancelled {
        return Err(Error::ScanCancelled);
    }
    Ok(())
}

/// Show database statistics.
fn run_info(config: Config, db_args: &DatabaseArgs, format: OutputFormat) -> Result<()> {
    let db = open_database(&config, db_args)?;
    let stats = db.stats()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("hashguard v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Signature Path:   {}", db.config().signature_dir().display());
            print!("{}", output::stats_text(&stats));
        }
    }
    Ok(())
}

/// Look up one signature by hash or size.
fn run_lookup(
    config: Config,
    db_args: &DatabaseArgs,
    hash: Option<String>,
    size: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let db = open_database(&config, db_args)?;

    let found = match (&hash, size) {
        (Some(hash), _) => db.get_by_hash(hash)?,
        (None, Some(size)) => db.get_by_size(size)?,
        (None, None) => None,
    };

    match (format, found) {
        (OutputFormat::Json, found) => println!("{}", serde_json::to_string_pretty(&found)?),
        (OutputFormat::Text, Some(sig)) => print!("{}", output::signature_text(sig)),
        (OutputFormat::Text, None) => println!("No matching signature"),
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.unwrap_or_else(Config::default_config_path);
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                println!("This overwrites {} with defaults.", path.display());
                println!("Run again with --yes to confirm.");
                return Ok(());
            }
            Config::default().save(&path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }
    Ok(())
}
