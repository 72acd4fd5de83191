use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use pulseboard::{AppConfig, FileWidgetStore};
use pulseboard_core::{
    test_connection, CapabilityRegistry, InstanceId, InstanceSource, PollScheduler,
    SchedulerConfig, ServiceState, StatusMap,
};
use pulseboard_sources::BackendClient;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// pulseboard - polls homelab services and publishes their live status
#[derive(Parser, Debug, Clone)]
#[command(name = "pulseboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,

    /// Configuration file to use instead of the platform default
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// List the built-in integrations and exit
    #[arg(long = "list-integrations")]
    list_integrations: bool,

    /// Test the connection of one configured widget and exit
    #[arg(long = "test", value_name = "WIDGET_ID")]
    test: Option<i64>,
}

fn main() {
    let cli = Cli::parse();

    // Level 0 (default): warn only
    // Level 1: info
    // Level 2: debug
    // Level 3+: trace
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting pulseboard v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(cli)) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::config_path()?,
    };
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    info!("Loaded config from {}", config_path.display());

    let client = Arc::new(BackendClient::new(config.api_base_url.clone())?);
    let registry = Arc::new(CapabilityRegistry::new());
    pulseboard_sources::register_all(&registry, client);

    if cli.list_integrations {
        list_integrations(&registry);
        return Ok(());
    }

    let dashboard_file = config.dashboard_file(&config_path);

    if let Some(widget_id) = cli.test {
        return test_widget(&registry, &config, &dashboard_file, InstanceId(widget_id)).await;
    }

    let store = Arc::new(FileWidgetStore::new(&dashboard_file));
    let source = InstanceSource::new(store.clone());
    match source.reload().await {
        Ok(count) => info!("{} enabled widgets in {}", count, store.path().display()),
        Err(e) => warn!("Failed to read widgets from {}: {}", store.path().display(), e),
    }

    let scheduler = PollScheduler::start(
        registry,
        &source,
        SchedulerConfig {
            fetch_timeout: config.fetch_timeout(),
        },
    );

    let mut last_states: HashMap<InstanceId, ServiceState> = HashMap::new();
    let status_listener = scheduler.subscribe_status_with(move |map: &Arc<StatusMap>| {
        log_transitions(&mut last_states, map);
    });

    let mut reload = tokio::time::interval(config.reload_interval());
    reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately and the source is already loaded
    reload.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Shutting down");
                break;
            }
            _ = reload.tick() => {
                if let Err(e) = source.reload().await {
                    warn!("Failed to reload widgets: {}", e);
                }
            }
        }
    }

    status_listener.unsubscribe().await;
    scheduler.shutdown().await;
    Ok(())
}

fn list_integrations(registry: &CapabilityRegistry) {
    for descriptor in registry.list() {
        let required: Vec<&str> = descriptor
            .config_template
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.key.as_str())
            .collect();
        println!(
            "{:<14} {:<14} {:<8} requires: {}",
            descriptor.id(),
            descriptor.metadata.name,
            descriptor.metadata.category,
            required.join(", ")
        );
    }
}

async fn test_widget(
    registry: &CapabilityRegistry,
    config: &AppConfig,
    dashboard_file: &std::path::Path,
    id: InstanceId,
) -> Result<()> {
    use pulseboard_core::WidgetStore;

    let widgets = FileWidgetStore::new(dashboard_file)
        .list_enabled_instances()
        .await?;
    let widget = widgets
        .into_iter()
        .find(|w| w.id == id)
        .ok_or_else(|| anyhow!("No enabled widget with id {}", id))?;

    let payload = test_connection(
        registry,
        &widget.type_id,
        widget.config.clone(),
        config.fetch_timeout(),
    )
    .await?;

    println!(
        "Widget {} ({}): connection OK, state {}",
        id,
        widget.type_id,
        ServiceState::from_reported(payload.state.as_deref())
    );
    Ok(())
}

/// Log state changes and removals since the previous map
fn log_transitions(last: &mut HashMap<InstanceId, ServiceState>, map: &StatusMap) {
    for (id, record) in map {
        if last.get(id) == Some(&record.state) {
            continue;
        }
        if record.is_online() {
            match record.latency() {
                Some(latency) => info!("{} ({}) is online ({:?})", record.name, id, latency),
                None => info!("{} ({}) is online", record.name, id),
            }
        } else {
            warn!(
                "{} ({}) is {}: {}",
                record.name,
                id,
                record.state,
                record.error.as_deref().unwrap_or("no details")
            );
        }
        last.insert(*id, record.state);
    }
    last.retain(|id, _| {
        let present = map.contains_key(id);
        if !present {
            info!("Widget {} no longer reported", id);
        }
        present
    });
}
