//! TouchFree service binary
//!
//! Runs the hand-tracking input service, or connects to one as a monitor.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use touchfree_service::app::cli::{Cli, Commands, ConfigAction};
use touchfree_service::app::config::Settings;
use touchfree_service::client::ServiceClient;
use touchfree_service::config::{ConfigFileKind, ConfigManager, ConfigStore, InteractionConfig, JsonFileStore, PhysicalConfig};
use touchfree_service::connection::{ConnectionManager, RequestQueues, WebSocketServer};
use touchfree_service::protocol::SERVICE_VERSION;
use touchfree_service::service::{Service, ServiceOptions};
use touchfree_service::time::Clock;
use touchfree_service::tracking::provider::DeviceInfo;
use touchfree_service::tracking::{BufferedTrackingProvider, FrameBuffer, HandRecording, ReplaySource};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    Clock::init();

    let settings_path = cli.settings_path();
    let settings = if cli.config.is_some() {
        Settings::load(&settings_path)?
    } else {
        Settings::load_default()?
    };

    match cli.command {
        Commands::Serve {
            port,
            replay,
            loop_replay,
        } => run_serve(settings, port, replay, loop_replay),
        Commands::Connect { url, duration } => run_connect(&settings, url, duration),
        Commands::Init { force } => run_init(force, &settings_path, &settings),
        Commands::Config { action } => run_config(action, &settings_path, &settings),
    }
}

fn stop_on_ctrlc() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })?;
    Ok(stop)
}

fn run_serve(
    mut settings: Settings,
    port: Option<u16>,
    replay: Option<PathBuf>,
    loop_replay: bool,
) -> anyhow::Result<()> {
    if let Some(port) = port {
        settings.server.port = port;
    }
    settings.validate()?;
    info!(version = SERVICE_VERSION, address = %settings.server.socket_address(), "Starting service");

    let stop = stop_on_ctrlc()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tf-io")
        .build()?;

    let (producer, consumer) = FrameBuffer::with_capacity(settings.queues.frame_ring_capacity)?.split();
    let (mut replay_source, source_connected, device) = match replay {
        Some(path) => {
            let recording = HandRecording::load(&path)?;
            let device = DeviceInfo {
                tracking_version: format!("recording v{}", recording.metadata.format_version),
                camera_serial: recording.metadata.name.clone(),
                camera_firmware_version: String::new(),
            };
            let source = ReplaySource::start(recording, producer, loop_replay)?;
            let connected = source.connected_flag();
            (Some(source), connected, device)
        }
        None => {
            warn!("No tracking source given (--replay); tracking will report UNAVAILABLE");
            drop(producer);
            (None, Arc::new(AtomicBool::new(false)), DeviceInfo::default())
        }
    };
    let tracking = BufferedTrackingProvider::new(consumer, source_connected, device);

    let config_dir = settings.paths.config_dir();
    info!(dir = %config_dir.display(), "Loading configuration");
    let config = ConfigManager::load(Arc::new(JsonFileStore::new(config_dir)));

    let requests = RequestQueues::with_capacity(settings.queues.request_queue_capacity);
    let connections = Arc::new(ConnectionManager::with_queues(Arc::new(requests)));
    let server = WebSocketServer::new(settings.server.clone(), Arc::clone(&connections));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_stop = Arc::clone(&stop);
    let server_task = runtime.spawn(async move {
        if let Err(e) = server.run(shutdown_rx).await {
            error!(error = %e, "Server failed");
            server_stop.store(true, Ordering::SeqCst);
        }
    });

    let service = Service::new(
        Box::new(tracking),
        config,
        connections,
        ServiceOptions::from_settings(&settings),
    );
    info!("Service running... Press Ctrl+C to stop");
    service.run(Arc::clone(&stop));

    let _ = shutdown_tx.send(true);
    if let Err(e) = runtime.block_on(server_task) {
        warn!(error = %e, "Server task ended abnormally");
    }
    if let Some(source) = replay_source.as_mut() {
        source.stop();
    }

    info!("Service stopped");
    Ok(())
}

fn run_connect(settings: &Settings, url: Option<String>, duration: u64) -> anyhow::Result<()> {
    let url = url.unwrap_or_else(|| settings.server.url());
    let period = settings.tick.period();
    let stop = stop_on_ctrlc()?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let client = ServiceClient::connect(&url).await?;
        println!("{}", client.handshake().message);

        let status = client.request_service_status().await?;
        println!(
            "Service {} | tracking {:?} | configuration {:?}",
            status.service_version, status.tracking_service_state, status.configuration_state
        );

        let start = Instant::now();
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if stop.load(Ordering::SeqCst) || !client.is_connected() {
                break;
            }
            if duration > 0 && start.elapsed().as_secs() >= duration {
                break;
            }

            let update = client.update();
            if let Some(presence) = update.presence {
                println!("presence  {:?}", presence);
            }
            if let Some(zone) = update.zone {
                println!("zone      {:?}", zone);
            }
            if let Some(status) = update.status {
                println!("status    tracking {:?}", status.tracking_service_state);
            }
            if let Some(action) = update.action {
                println!(
                    "{:<9} {:?} ({:.0}, {:.0}) progress {:.2}",
                    format!("{:?}", action.input_type),
                    action.interaction_type,
                    action.cursor_position.x,
                    action.cursor_position.y,
                    action.progress_to_click
                );
            }
        }

        client.close().await;
        anyhow::Ok(())
    })
}

fn run_init(force: bool, settings_path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if settings_path.exists() && !force {
        anyhow::bail!(
            "Settings already exist at {:?}. Use --force to overwrite.",
            settings_path
        );
    }

    settings.save(&settings_path.to_path_buf())?;
    println!("Created settings at {:?}", settings_path);
    println!("\nSettings content:\n{}", settings.to_toml()?);

    let store = JsonFileStore::new(settings.paths.config_dir());
    for kind in [ConfigFileKind::Interaction, ConfigFileKind::Physical] {
        let path = store.path_for(kind);
        if path.exists() && !force {
            println!("Keeping existing {:?}", path);
            continue;
        }
        let contents = match kind {
            ConfigFileKind::Interaction => serde_json::to_string_pretty(&InteractionConfig::default())?,
            ConfigFileKind::Physical => serde_json::to_string_pretty(&PhysicalConfig::default())?,
        };
        store.save(kind, &contents)?;
        println!("Wrote default {:?}", path);
    }

    Ok(())
}

fn run_config(action: ConfigAction, settings_path: &Path, settings: &Settings) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Settings ({:?}):\n", settings_path);
            println!("{}", settings.to_toml()?);
        }
        ConfigAction::Get { key } => match settings.get_value(&key) {
            Some(value) => println!("{} = {}", key, value),
            None => anyhow::bail!("Settings key '{}' not found", key),
        },
        ConfigAction::Set { key, value } => {
            if !settings_path.exists() {
                anyhow::bail!("No settings file found. Run 'tf-service init' first.");
            }
            let updated = settings.with_value(&key, &value)?;
            updated.save(&settings_path.to_path_buf())?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::Reset { force } => {
            if settings_path.exists() && !force {
                println!("Settings exist at {:?}", settings_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Settings::default().save(&settings_path.to_path_buf())?;
            println!("Settings reset to defaults at {:?}", settings_path);
        }
    }

    Ok(())
}
