use std::path::PathBuf;

use vellum::cli::{Cli, Commands, ConfigAction};
use vellum::config::Config;
use vellum::context::assemble;
use vellum::embedding::provider_from_config;
use vellum::error::{Result, VellumError};
use vellum::ingest::{IngestRequest, Ingestor};
use vellum::partition::{resolve_partition, IngestMode, ReingestPolicy};
use vellum::retrieval::Retriever;
use vellum::store::{store_from_config, MetadataFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest {
            file,
            mode,
            tenant,
            subject,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(config, file, &mode, &tenant, subject).await?;
        }
        Commands::Ask {
            question,
            mode,
            tenant,
            subject,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ask(config, &question, &mode, &tenant, subject).await?;
        }
        Commands::Wipe {
            mode,
            tenant,
            subject,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_wipe(config, &mode, &tenant, subject).await?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "vellum=debug" } else { "vellum=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_ingest(
    config: Config,
    file: PathBuf,
    mode: &str,
    tenant: &str,
    subject: Option<String>,
) -> Result<()> {
    let text = std::fs::read_to_string(&file).map_err(|e| VellumError::Io {
        source: e,
        context: format!("Failed to read document: {:?}", file),
    })?;

    let provider = provider_from_config(&config.embedding)?;
    let store = store_from_config(&config.store)?;
    let ingestor = Ingestor::new(provider, store, config.ingest_options());

    let receipt = ingestor
        .ingest(IngestRequest {
            text,
            tenant_id: tenant.to_string(),
            mode: IngestMode::parse(mode)?,
            subject_id: subject,
        })
        .await?;

    println!("✓ Ingested {}", file.display());
    println!("  Namespace: {}", receipt.namespace);
    println!("  Chunks: {}", receipt.chunk_count);
    println!("  Upserted: {}", receipt.upserted);
    if !receipt.failed_ids.is_empty() {
        println!("  Failed: {} record(s)", receipt.failed_ids.len());
        for id in &receipt.failed_ids {
            println!("    - {id}");
        }
    }

    Ok(())
}

async fn cmd_ask(
    config: Config,
    question: &str,
    mode: &str,
    tenant: &str,
    subject: Option<String>,
) -> Result<()> {
    let provider = provider_from_config(&config.embedding)?;
    let store = store_from_config(&config.store)?;
    let retriever = Retriever::new(provider, store, config.retriever_options());
    let mode = IngestMode::parse(mode)?;

    // Same degradation as the answer flow: backend trouble reduces to
    // context-free generation, only invalid intent is an error.
    let passages = match retriever
        .retrieve_scoped(question, &mode, tenant, subject.as_deref())
        .await
    {
        Ok(passages) => passages,
        Err(err @ VellumError::Validation(_)) => return Err(err),
        Err(err) => {
            tracing::warn!(error = %err, "retrieval failed, continuing without context");
            Vec::new()
        }
    };

    let anchor = if mode.is_shared() {
        let partition =
            resolve_partition(&mode, tenant, subject.as_deref(), ReingestPolicy::Overwrite)?;
        retriever.fetch_anchor(&partition).await
    } else {
        None
    };

    if passages.is_empty() {
        println!("No passages matched.");
    } else {
        println!("Top {} passage(s):", passages.len());
        for (i, passage) in passages.iter().enumerate() {
            println!("  {}. [{:.3}] {}", i + 1, passage.score, passage.text);
        }
    }

    let prompt = assemble(&passages, anchor.as_deref(), &[], question);
    println!("\n--- generation request ---");
    println!("{prompt}");

    Ok(())
}

async fn cmd_wipe(
    config: Config,
    mode: &str,
    tenant: &str,
    subject: Option<String>,
) -> Result<()> {
    let mode = IngestMode::parse(mode)?;
    let partition = resolve_partition(
        &mode,
        tenant,
        subject.as_deref(),
        ReingestPolicy::Overwrite,
    )?;

    // Shared domains are wiped whole (every record there carries the mode);
    // everything else is scoped to the tenant.
    let filter = if mode.is_shared() {
        MetadataFilter::equals("mode", mode.as_str())
    } else {
        MetadataFilter::equals("tenant_id", tenant.trim())
    };

    let store = store_from_config(&config.store)?;
    store.delete_by_filter(&partition.namespace, &filter).await?;

    println!("✓ Wiped matching records from '{}'", partition.namespace);
    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| VellumError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = file.unwrap_or_else(|| Config::default_path().unwrap());
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path()?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| VellumError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = config_path.unwrap_or_else(|| Config::default_path().unwrap());

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'vellum config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile);
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}
