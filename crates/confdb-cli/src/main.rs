use anyhow::Context;
use confdb_api::{handlers::AppState, ApiServer};
use confdb_config::{AppConfig, LoggingConfig, StorageBackend, StorageConfig};
use confdb_core::ConfigTypeCatalog;
use confdb_store::{
    ConfigSource, ConfigStore, ReconcileReport, SeedReconciler, UnifiedStorage, YamlSeedSource,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "confdb")]
#[command(about = "Typed configuration store with seed reconciliation", long_about = None)]
struct Cli {
    /// Path to configuration directory
    #[arg(short, long, default_value = "config", global = true)]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API, reconciling the seed first when enabled
    Serve,

    /// Reconcile the store against the seed catalogue once
    Seed,

    /// Write every config to a JSON or YAML file
    Export {
        #[arg(short, long)]
        output: String,
    },

    /// Replace every config with the contents of a JSON or YAML file
    Import {
        #[arg(short, long)]
        input: String,

        /// Count the records without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print one config
    Get { config_type: String, config_id: String },

    /// Print every config of one type
    List { config_type: String },

    /// Delete one config
    Delete { config_type: String, config_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load app config from files and environment variables
    let app_config = AppConfig::load(&cli.config_dir)?;
    init_tracing(&app_config.logging)?;

    let store = open_store(&app_config.storage).await?;

    match cli.command {
        Commands::Serve => {
            let seed = load_seed(app_config.seed.dir.as_deref())?;

            if app_config.seed.reconcile_on_startup {
                let report = SeedReconciler::new(store.clone())
                    .reconcile(seed.as_ref())
                    .await?;
                log_report(&report);
            }

            let state = AppState::new(store.with_validation(), seed);
            let api_config = app_config.api.clone();
            let server = ApiServer::new(
                api_config.host,
                api_config.port,
                api_config.cors_enabled,
                state,
            );

            info!(
                "API server available at http://{}:{}",
                app_config.api.host, app_config.api.port
            );

            // Wait for API server or shutdown signal
            tokio::select! {
                res = server.run() => {
                    if let Err(e) = res {
                        error!("API server error: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down confdb...");
                }
            }
        }

        Commands::Seed => {
            let seed = load_seed(app_config.seed.dir.as_deref())?;
            let report = SeedReconciler::new(store).reconcile(seed.as_ref()).await?;
            log_report(&report);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Export { output } => {
            let dump = store.dump_configs().await?;
            let records: usize = dump.values().map(Vec::len).sum();

            let content = if is_yaml(&output) {
                serde_yaml::to_string(&dump)?
            } else {
                serde_json::to_string_pretty(&dump)?
            };
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write {}", output))?;

            println!("✓ Exported {} config(s) to {}", records, output);
        }

        Commands::Import { input, dry_run } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input))?;
            let configs: BTreeMap<String, Vec<Value>> = if is_yaml(&input) {
                serde_yaml::from_str(&content)?
            } else {
                serde_json::from_str(&content)?
            };

            let records = store
                .with_validation()
                .replace_all_configs(&configs, dry_run)
                .await?;

            if dry_run {
                println!("✓ {} would import {} config(s)", input, records);
            } else {
                println!("✓ Imported {} config(s) from {}", records, input);
            }
        }

        Commands::Get {
            config_type,
            config_id,
        } => {
            let config = store
                .with_validation()
                .get_config(&config_type, &config_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::List { config_type } => {
            let configs = store.with_validation().list_configs(&config_type).await?;
            println!("{}", serde_json::to_string_pretty(&configs)?);
        }

        Commands::Delete {
            config_type,
            config_id,
        } => {
            store.delete_config(&config_type, &config_id).await?;
            println!("✓ Deleted {} {}", config_type, config_id);
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid logging.level")?;

    let builder = FmtSubscriber::builder().with_env_filter(filter);
    if logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<ConfigStore> {
    let engine = match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory config storage");
            UnifiedStorage::in_memory()
        }
        StorageBackend::File => {
            info!("Using file-based config storage from: {}", config.data_dir);
            std::fs::create_dir_all(&config.data_dir)
                .with_context(|| format!("Failed to create {}", config.data_dir))?;
            UnifiedStorage::from_files(&config.data_dir)?
        }
        StorageBackend::Postgres => {
            info!("Using PostgreSQL config storage");
            let engine =
                UnifiedStorage::from_postgres(&config.database_url, config.max_connections)
                    .await?;
            info!("✓ Connected to PostgreSQL config store");
            engine
        }
    };

    Ok(ConfigStore::new(
        Arc::new(engine),
        Arc::new(ConfigTypeCatalog::standard()),
    ))
}

fn load_seed(seed_dir: Option<&str>) -> anyhow::Result<Arc<dyn ConfigSource>> {
    let seed = match seed_dir {
        Some(dir) => {
            info!("Loading seed catalogue from: {}", dir);
            YamlSeedSource::from_dir(dir)?
        }
        None => YamlSeedSource::bundled()?,
    };
    info!("Seed catalogue holds {} definition(s)", seed.len());

    Ok(Arc::new(seed))
}

fn log_report(report: &ReconcileReport) {
    info!(
        mode = ?report.mode,
        inserted = report.inserted,
        updated = report.updated,
        "Seed reconciled"
    );
}

fn is_yaml(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
