//! Mouse Fix helper host process
//!
//! Loads the config, keeps it in sync with the file on disk and repairs the
//! file when it breaks, until SIGINT/SIGTERM.

use clap::Parser;
use mousefix_helper::{
    config::MonitorConfig,
    logging::{init_logging, LogConfig, LogLevel},
    monitor::watcher::WatchHandle,
    ConfigFileMonitor, ConfigMap, HelperError, RepairPolicy, Result, TracingSink,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{signal, sync::broadcast};
use tracing::{debug, error, info, instrument, warn};

#[derive(Parser, Debug)]
#[command(name = "mousefix-helper", version, about = "Mouse Fix helper config monitor")]
struct Args {
    /// Config file to monitor (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Quiet period used to coalesce change events, in milliseconds
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Repair source: "snapshot" or "defaults"
    #[arg(long, value_name = "POLICY")]
    repair_policy: Option<String>,

    /// Log level override
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Load (and repair) the config once, then exit
    #[arg(long)]
    once: bool,
}

struct HelperApp {
    config: MonitorConfig,
    monitor: ConfigFileMonitor,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl HelperApp {
    #[instrument(skip_all)]
    fn new(args: &Args) -> Result<Self> {
        let mut log_config = LogConfig::from_env();
        if let Some(level) = &args.log_level {
            log_config.level = LogLevel::from_str(level).map_err(HelperError::ConfigurationError)?;
        }
        init_logging(&log_config).map_err(|e| {
            HelperError::ConfigurationError(format!("Failed to initialize logging: {}", e))
        })?;

        info!("Mouse Fix helper v{}", env!("CARGO_PKG_VERSION"));

        let config = Self::monitor_config(args)?;
        debug!(?config, "Monitor configuration resolved");

        let monitor = ConfigFileMonitor::new(&config, Arc::new(TracingSink))?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            config,
            monitor,
            shutdown_tx,
            shutdown_rx,
        })
    }

    fn monitor_config(args: &Args) -> Result<MonitorConfig> {
        let mut config = MonitorConfig::from_env();

        if let Some(path) = &args.config {
            let env_backup_dir = std::env::var_os("MOUSEFIX_BACKUP_DIR");
            let overridden = MonitorConfig::for_path(path);
            config.config_path = overridden.config_path;
            if env_backup_dir.is_none() {
                config.backup_dir = overridden.backup_dir;
            }
        }

        if let Some(ms) = args.debounce_ms {
            config.debounce = Duration::from_millis(ms);
        }

        if let Some(policy) = &args.repair_policy {
            config.repair_policy =
                RepairPolicy::from_str(policy).map_err(HelperError::ConfigurationError)?;
        }

        Ok(config)
    }

    /// Watch, then load, until a shutdown signal arrives
    #[instrument(skip_all)]
    async fn run(&mut self, once: bool) -> Result<()> {
        if once {
            return self.load_initial_configuration().await;
        }

        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::setup_signal_handlers(shutdown_tx).await {
                error!("Failed to setup signal handlers: {}", e);
            }
        });

        // Subscribe before loading so an edit in between is not lost
        let (watch, config) = self
            .monitor
            .start(&self.config)
            .await
            .map_err(HelperError::from)?;
        info!(path = %self.config.config_path.display(), "Watching config file");
        self.report_initial_load(&config);

        let _ = self.shutdown_rx.recv().await;
        info!("Shutdown signal received");

        self.shutdown(watch).await;
        Ok(())
    }

    async fn load_initial_configuration(&self) -> Result<()> {
        let store = self.monitor.store();
        let config = tokio::task::spawn_blocking(move || store.config()).await?;
        self.report_initial_load(&config);
        Ok(())
    }

    fn report_initial_load(&self, config: &ConfigMap) {
        let status = self.monitor.status();
        if status.ephemeral {
            warn!("Config file is not writable, running on default settings");
        }
        info!(keys = config.len(), state = ?status.state, "Initial configuration loaded");
    }

    async fn shutdown(&self, watch: WatchHandle) {
        info!("Stopping config watcher...");
        watch.shutdown().await;

        let status = self.monitor.status();
        info!(
            reactions = status.reactions,
            repairs = status.repairs,
            "Mouse Fix helper shutdown complete"
        );
    }

    async fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = signal::ctrl_c() => {
                    match res {
                        Ok(_) => info!("Received SIGINT (Ctrl+C)"),
                        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                    }
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            match signal::ctrl_c().await {
                Ok(_) => info!("Received Ctrl+C"),
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }

        if shutdown_tx.send(()).is_err() {
            warn!("Failed to send shutdown signal - no receivers");
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut app = HelperApp::new(&args)?;

    if let Err(e) = app.run(args.once).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
