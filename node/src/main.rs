use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::{Config, File as ConfigFile};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use valset_types::{CallOptions, ValidatorId};
use valset_view::{
    Collaborators, FileMonikerSource, InMemoryLedger, MonikerDiff, ValidatorSetConfig,
    ValidatorSetService, DEFAULT_MONIKER_REFRESH_SECS, DEFAULT_SIGNER_CACHE_CAPACITY,
};

mod version;

use version::{git_commit_hash, VALSET_VERSION};

const DEFAULT_CONFIG_PATH: &str = "./config/valset.toml";

#[derive(Debug, Clone)]
struct AppConfig {
    snapshot_path: PathBuf,
    moniker_path: PathBuf,
    view: ValidatorSetConfig,
    log_level: String,
    log_format: String,
}

impl AppConfig {
    fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                Some(path)
            } else {
                None
            }
        };

        let mut builder = Config::builder();

        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }

        builder = builder.add_source(config::Environment::with_prefix("VALSET"));

        let config = builder.build()?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let snapshot_path = get_string_value(
            config,
            &["snapshot_path", "SNAPSHOT_PATH", "ledger.snapshot_path"],
        )
        .unwrap_or_else(|| "./data/ledger.json".to_string());
        let moniker_path =
            get_string_value(config, &["moniker_path", "MONIKER_PATH", "monikers.path"])
                .unwrap_or_else(|| "./data/monikers.json".to_string());

        let static_ids = match config.get::<Vec<ValidatorId>>("static_ids") {
            Ok(ids) => ids,
            Err(_) => parse_static_ids(
                &get_string_value(
                    config,
                    &["static_ids", "STATIC_IDS", "validators.static_ids"],
                )
                .unwrap_or_default(),
            )?,
        };

        let view = ValidatorSetConfig {
            static_ids,
            signer_cache_capacity: get_u64_value(
                config,
                &[
                    "signer_cache_capacity",
                    "SIGNER_CACHE_CAPACITY",
                    "cache.signer_capacity",
                ],
                DEFAULT_SIGNER_CACHE_CAPACITY as u64,
            )? as usize,
            moniker_refresh_secs: get_u64_value(
                config,
                &[
                    "moniker_refresh_secs",
                    "MONIKER_REFRESH_SECS",
                    "monikers.refresh_secs",
                ],
                DEFAULT_MONIKER_REFRESH_SECS,
            )?,
        };

        Ok(Self {
            snapshot_path: PathBuf::from(snapshot_path),
            moniker_path: PathBuf::from(moniker_path),
            view,
            log_level: get_string_value(config, &["log_level", "LOG_LEVEL", "log.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(config, &["log_format", "LOG_FORMAT", "log.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.moniker_path.as_os_str().is_empty() {
            anyhow::bail!("MONIKER_PATH must not be empty");
        }
        if self.snapshot_path.as_os_str().is_empty() {
            anyhow::bail!("SNAPSHOT_PATH must not be empty");
        }
        if self.view.signer_cache_capacity == 0 {
            anyhow::bail!("SIGNER_CACHE_CAPACITY must be greater than zero");
        }
        if self.view.moniker_refresh_secs == 0 {
            anyhow::bail!("MONIKER_REFRESH_SECS must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "compact") {
            anyhow::bail!("LOG_FORMAT must be 'pretty' or 'compact'");
        }
        Ok(())
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_u64_value(config: &Config, keys: &[&str], default: u64) -> Result<u64> {
    match get_string_value(config, keys) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow!("invalid value {:?} for {}: {}", raw, keys[0], e)),
        None => Ok(default),
    }
}

/// Parse a comma separated id list; blanks are ignored.
fn parse_static_ids(raw: &str) -> Result<Vec<ValidatorId>> {
    raw.split(',')
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<ValidatorId>()
                .map_err(|e| anyhow!("invalid static validator id {:?}: {}", value, e))
        })
        .collect()
}

fn load_config_with_overrides(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &ArgMatches, config: &mut AppConfig) {
    if let Some(path) = matches.get_one::<String>("snapshot") {
        config.snapshot_path = PathBuf::from(path);
    }

    if let Some(path) = matches.get_one::<String>("monikers") {
        config.moniker_path = PathBuf::from(path);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // stdout carries query results; logs go to stderr.
    if config.log_format == "compact" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

fn call_options(matches: &ArgMatches) -> CallOptions {
    match matches.get_one::<u64>("block") {
        Some(number) => CallOptions::at_block(*number),
        None => CallOptions::latest(),
    }
}

fn build_service(config: &AppConfig) -> Result<ValidatorSetService> {
    let ledger = Arc::new(InMemoryLedger::from_json_file(&config.snapshot_path)?);
    let monikers = Arc::new(FileMonikerSource::new(&config.moniker_path));
    Ok(ValidatorSetService::new(
        config.view.clone(),
        Collaborators::from_ledger(ledger, monikers),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_cli() -> Command {
    Command::new("valset-node")
        .version(VALSET_VERSION)
        .about("Read-only validator-set view")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .value_name("FILE")
                .help("Ledger snapshot JSON to serve reads from")
                .global(true),
        )
        .arg(
            Arg::new("monikers")
                .long("monikers")
                .value_name("FILE")
                .help("Moniker JSON mapping validator ids to labels")
                .global(true),
        )
        .arg(
            Arg::new("block")
                .long("block")
                .value_name("NUMBER")
                .value_parser(value_parser!(u64))
                .help("Pin every read to this block (defaults to latest)")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "compact"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            Command::new("tracked-ids")
                .about("Ids tracked for operations (static override or registry)"),
        )
        .subcommand(Command::new("active-ids").about("Active ids from the operator registry"))
        .subcommand(Command::new("registry-version").about("Authoritative registry schema"))
        .subcommand(Command::new("all-ids").about("Every id in the token index"))
        .subcommand(Command::new("validators").about("Every validator record, unfiltered"))
        .subcommand(
            Command::new("active-set").about("Validators active at the current epoch"),
        )
        .subcommand(
            Command::new("signer")
                .about("Resolve a signer address to its validator")
                .arg(Arg::new("address").required(true).value_name("ADDRESS")),
        )
        .subcommand(
            Command::new("moniker").about("Label for a validator id").arg(
                Arg::new("id")
                    .required(true)
                    .value_name("ID")
                    .value_parser(value_parser!(u64)),
            ),
        )
        .subcommand(
            Command::new("refresh-monikers").about("Load monikers and print every label read"),
        )
        .subcommand(
            Command::new("watch")
                .about("Keep refreshing monikers until interrupted")
                .arg(
                    Arg::new("once")
                        .long("once")
                        .action(ArgAction::SetTrue)
                        .help("Exit after the initial load"),
                ),
        )
}

#[derive(Serialize)]
struct SignerResolution {
    signer: String,
    validator_id: ValidatorId,
    moniker: String,
}

/// Answer a one-shot query subcommand as JSON; `None` for anything else.
///
/// `loaded` is the diff from the startup moniker load, which is what a
/// fresh process reports for `refresh-monikers`.
async fn run_query(
    service: &ValidatorSetService,
    command: &str,
    sub: &ArgMatches,
    opts: &CallOptions,
    loaded: &MonikerDiff,
) -> Result<Option<serde_json::Value>> {
    let value = match command {
        "tracked-ids" => serde_json::to_value(service.tracked_ids(opts).await?)?,
        "active-ids" => serde_json::to_value(service.active_ids(opts).await?)?,
        "registry-version" => serde_json::to_value(service.registry_version(opts).await?)?,
        "all-ids" => serde_json::to_value(service.all_ids(opts).await?)?,
        "validators" => serde_json::to_value(service.all_validators(opts).await?)?,
        "active-set" => serde_json::to_value(service.active_snapshot(opts).await?)?,
        "signer" => {
            let signer = sub
                .get_one::<String>("address")
                .ok_or_else(|| anyhow!("missing signer address"))?;
            let validator_id = service.signer_to_validator_id(signer, opts).await?;
            serde_json::to_value(SignerResolution {
                signer: signer.to_lowercase(),
                validator_id,
                moniker: service.moniker(validator_id),
            })?
        }
        "moniker" => {
            let id = *sub
                .get_one::<u64>("id")
                .ok_or_else(|| anyhow!("missing validator id"))?;
            serde_json::to_value(service.moniker(id))?
        }
        "refresh-monikers" => serde_json::to_value(loaded)?,
        _ => return Ok(None),
    };
    Ok(Some(value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let config = load_config_with_overrides(&matches)?;
    init_logging(&config)?;

    info!(
        "valset-node {} ({}) snapshot={} monikers={}",
        VALSET_VERSION,
        git_commit_hash(),
        config.snapshot_path.display(),
        config.moniker_path.display()
    );

    let service = build_service(&config)?;
    let loaded = service.initialize().await?;

    let opts = call_options(&matches);

    match matches.subcommand() {
        Some(("watch", sub)) => {
            if sub.get_flag("once") {
                return Ok(());
            }
            let watcher = service.spawn_moniker_watcher();
            info!(
                "watching monikers every {}s",
                service.config().moniker_refresh_secs
            );
            tokio::select! {
                result = watcher => {
                    result.map_err(|e| anyhow!("moniker watcher panicked: {}", e))??;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("shutting down");
                }
            }
        }
        Some((command, sub)) => match run_query(&service, command, sub, &opts, &loaded).await? {
            Some(value) => print_json(&value)?,
            None => warn!("unhandled subcommand {}", command),
        },
        None => {}
    }

    Ok(())
}
