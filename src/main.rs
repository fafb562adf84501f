//! Operator CLI for the graveyard store.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `migrate` - open the store, migrating it if needed, and report what happened
//! - `status [--json]` - schema version and graveyard counts
//! - `list` - every stored graveyard, damaged rows flagged
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use graveyards::config::Config;
use graveyards::model::Graveyard;
use graveyards::store::{GraveyardStore, GraveyardStoreBuilder, CURRENT_SCHEMA_VERSION};

#[derive(Parser)]
#[command(name = "graveyards")]
#[command(about = "Manage the graveyard respawn store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Open the store and run any pending schema migration
    Migrate,
    /// Show schema version and graveyard counts
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored graveyards
    List,
}

#[derive(Serialize)]
struct StatusReport {
    db_path: String,
    schema_version: i32,
    supported_version: i32,
    graveyards: usize,
    damaged: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        if std::path::Path::new(&cli.config).exists() {
            warn!("{} already exists; leaving it untouched", cli.config);
            return Ok(());
        }
        Config::create_default(&cli.config).await?;
        println!("Wrote default configuration to {}", cli.config);
        return Ok(());
    }

    let config = match Config::load(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            init_logging(&None, cli.verbose);
            warn!("{}; using built-in defaults", e);
            Config::default()
        }
    };
    init_logging(&Some(config.clone()), cli.verbose);
    let store = open_store(&config)?;

    match cli.command {
        Commands::Init => {}
        Commands::Migrate => match store.migration_report() {
            None => println!("Store already at schema v{}", store.schema_version()),
            Some(report) => {
                println!(
                    "Migrated schema v{} -> v{}",
                    report.from_version, report.to_version
                );
                for table in &report.tables {
                    println!(
                        "  {}: {} read, {} carried forward, {} merged, {} invalid, {} rejected",
                        table.table,
                        table.read,
                        table.reinserted,
                        table.merged,
                        table.invalid,
                        table.failed
                    );
                }
            }
        },
        Commands::Status { json } => {
            let all = store.get_all();
            let damaged = all.iter().filter(|g| !g.is_valid()).count();
            let report = StatusReport {
                db_path: config.storage.db_path.clone(),
                schema_version: store.schema_version(),
                supported_version: CURRENT_SCHEMA_VERSION,
                graveyards: all.len(),
                damaged,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Graveyard store: {}", report.db_path);
                println!(
                    "Schema: v{} (supported v{})",
                    report.schema_version, report.supported_version
                );
                println!("Graveyards: {} ({} damaged)", report.graveyards, report.damaged);
            }
        }
        Commands::List => {
            for graveyard in store.get_all() {
                match graveyard {
                    Graveyard::Valid(g) => {
                        let position = g.location().position();
                        let mut flags = Vec::new();
                        if !g.attributes().enabled() {
                            flags.push("disabled");
                        }
                        if g.attributes().hidden() {
                            flags.push("hidden");
                        }
                        println!(
                            "{:<24} {:<16} {:>9.1} {:>7.1} {:>9.1} {}",
                            g.search_key().as_str(),
                            g.world_name(),
                            position.x,
                            position.y,
                            position.z,
                            flags.join(",")
                        );
                    }
                    Graveyard::Invalid(g) => println!(
                        "!! {} ({}): {}",
                        g.display_name().unwrap_or("<unnamed>"),
                        g.world_name().unwrap_or("<no world>"),
                        g.reason()
                    ),
                }
            }
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<GraveyardStore> {
    let store = GraveyardStoreBuilder::new(&config.storage.db_path)
        .open()
        .map_err(|e| anyhow!("Failed to open graveyard store {}: {}", config.storage.db_path, e))?;
    info!("Graveyard store ready (schema v{})", store.schema_version());
    Ok(store)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    // CLI verbosity overrides config
    let level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Mutex::new(f);
            // foreground runs also echo to the console
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
