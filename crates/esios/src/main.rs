#![allow(clippy::print_stdout)]

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use esios::cli::{ArchivesCommand, CacheCommand, Cli, Command, ConfigCommand, HorizonArg, IndicatorsCommand, KindArg};
use esios::{ArchiveHandle, Config, HistoryRequest, Manager};
use esios_cache::CacheStore;
use esios_client::ReqwestTransport;
use esios_types::{DateRange, Endpoint, EsiosError, GeoId};
use tracing_subscriber::EnvFilter;
use url::Url;

const BASE_URL: &str = "https://api.esios.ree.es/";

fn default_config_path() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "esios")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("esios.toml"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), EsiosError> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::load(&config_path)?;
    let store = CacheStore::new(config.resolved_cache_dir());
    let now = Utc::now();
    let tz = config.timezone()?;

    // `exec`, `config get/set`, and `cache path` need no transport at all.
    match &cli.command {
        Command::Config(ConfigCommand::Get { key }) => {
            println!("{}", config.get(key)?);
            return Ok(());
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            let mut config = config;
            config.set(key, value, &config_path)?;
            return Ok(());
        }
        Command::Cache(CacheCommand::Path) => {
            println!("{}", store.root().display());
            return Ok(());
        }
        Command::Cache(CacheCommand::Status) => {
            let status = store.status();
            println!(
                "items={} archive_bundles={} bytes={}",
                status.item_count, status.archive_bundle_count, status.total_bytes
            );
            return Ok(());
        }
        Command::Cache(CacheCommand::Clear {
            indicators,
            offer_indicators,
        }) => {
            let endpoint = match (indicators, offer_indicators) {
                (true, false) => Some(Endpoint::Indicators),
                (false, true) => Some(Endpoint::OfferIndicators),
                _ => None,
            };
            let removed = store.clear(endpoint)?;
            println!("removed {removed} files");
            return Ok(());
        }
        Command::Cache(CacheCommand::Geos) => {
            for (id, name) in store.read_geos().iter() {
                println!("{}\t{name}", id.0);
            }
            return Ok(());
        }
        Command::Exec(args) => {
            return Err(EsiosError::UserInput(format!(
                "`exec` is not implemented; no expression evaluator is shipped (got `{}`)",
                args.expression
            )));
        }
        _ => {}
    }

    let api_key = cli
        .api_key
        .clone()
        .ok_or_else(|| EsiosError::Config("missing API key: pass --api-key or set ESIOS_API_KEY".to_string()))?;
    let base_url = Url::parse(BASE_URL).expect("static base url is valid");
    let transport = ReqwestTransport::new(base_url, api_key)?;

    match cli.command {
        Command::Indicators(cmd) => run_indicators(cmd, &transport, &store, &config, now, &tz).await,
        Command::Archives(cmd) => run_archives(cmd, &transport, &store).await,
        Command::Config(_) | Command::Cache(_) | Command::Exec(_) => unreachable!("handled above"),
    }
}

async fn run_indicators(
    cmd: IndicatorsCommand,
    transport: &ReqwestTransport,
    store: &CacheStore,
    config: &Config,
    now: chrono::DateTime<Utc>,
    tz: &chrono_tz::Tz,
) -> Result<(), EsiosError> {
    let manager = Manager::new(Endpoint::Indicators, transport, store, config);

    match cmd {
        IndicatorsCommand::List => {
            for entry in manager.list(now).await? {
                println!("{}\t{}", entry.id, entry.name);
            }
        }
        IndicatorsCommand::Search { query } => {
            for entry in manager.search(&query, now).await? {
                println!("{}\t{}", entry.id, entry.name);
            }
        }
        IndicatorsCommand::Meta { id } => {
            let handle = manager.get(id, now).await?;
            if let Some(meta) = store.read_meta(handle.endpoint, handle.item_id, now, config.meta_ttl()) {
                println!("{}\t{}\tgeos={}", meta.id, meta.name, meta.geos.len());
            }
        }
        IndicatorsCommand::History {
            id,
            start,
            end,
            geo_ids,
            format,
            output,
        } => {
            let handle = manager.get(id, now).await?;
            let range = DateRange::from_dates(start, end, tz);
            let request = if geo_ids.is_empty() {
                HistoryRequest::new()
            } else {
                HistoryRequest::new().geo_ids(geo_ids.into_iter().map(GeoId).collect())
            };
            let frame = handle.historical(range, request, now).await?;
            let rendered = esios::render(&frame, format)?;
            esios::write_output(&rendered, output.as_deref())?;
        }
    }
    Ok(())
}

async fn run_archives(cmd: ArchivesCommand, transport: &ReqwestTransport, store: &CacheStore) -> Result<(), EsiosError> {
    match cmd {
        ArchivesCommand::List => {
            let body = transport.get_json("archives", &[]).await?;
            if let Some(items) = body.get("archives").and_then(|v| v.as_array()) {
                for item in items {
                    let id = item.get("id").and_then(serde_json::Value::as_u64).unwrap_or_default();
                    let name = item.get("name").and_then(serde_json::Value::as_str).unwrap_or_default();
                    println!("{id}\t{name}");
                }
            }
        }
        ArchivesCommand::Download {
            id,
            start,
            end,
            horizon,
            kind,
            output_dir,
        } => {
            let horizon = match horizon {
                HorizonArg::Daily => esios_types::Horizon::Daily,
                HorizonArg::Monthly => esios_types::Horizon::Monthly,
            };
            let kind = match kind {
                KindArg::Zip => esios_types::ArchiveKind::Zip,
                KindArg::Xls => esios_types::ArchiveKind::Excel,
            };
            let handle = ArchiveHandle::new(id, horizon, kind, transport, store);
            let files = handle.download(start, end, output_dir.as_deref()).await?;
            for file in files {
                println!("{}", file.display());
            }
        }
    }
    Ok(())
}
