//! Config file monitor
//!
//! Reacts to changes of the config file on disk, loads valid content into the
//! [`ConfigStore`] and repairs the file when it is unreadable or invalid.
//!
//! ```text
//! change event -> react_to_config_file_change
//!     -> unchanged bytes?        -> nothing to do
//!     -> parse + validate ok     -> store updated
//!     -> parse/validate failed   -> repair -> write snapshot/defaults -> store updated
//!                                          -> write failed -> in-memory defaults
//! ```

pub mod diagnostics;
pub mod watcher;

use crate::config::error::ConfigError;
use crate::config::parser::ConfigParser;
use crate::config::persistence::{ConfigStorage, FileStorage};
use crate::config::schema::{default_config, ConfigSchema};
use crate::config::settings::{MonitorConfig, RepairPolicy};
use crate::config::store::{ConfigStore, InitialLoad};
use crate::config::validator::ConfigValidator;
use crate::models::config_value::ConfigMap;
use crate::trace_performance;
use diagnostics::{DiagnosticKind, DiagnosticSink, RepairAction, RepairDiagnostic, TracingSink};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use watcher::{ChangeSource, NotifyChangeSource, WatchError, WatchHandle};

/// Lifecycle of the monitored file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFileState {
    Unloaded,
    Reloading,
    Loaded,
    Corrupt,
    Repairing,
}

/// Result of one reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// File content matches what was last loaded or written
    Unchanged,
    Loaded,
    Repaired(RepairOutcome),
    /// The file could not be read; the current config was kept
    Unreadable,
}

/// Result of one repair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The file was valid; nothing was written
    AlreadyValid,
    /// A valid file was written
    Rewritten(RepairAction),
    /// Writing failed; defaults are held in memory only
    Ephemeral,
    /// The file could not be read; nothing was written
    Unreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    pub state: ConfigFileState,
    /// In-memory config is not backed by the file
    pub ephemeral: bool,
    pub has_snapshot: bool,
    pub reactions: u64,
    pub repairs: u64,
}

/// Identity of file content the monitor has loaded or written itself.
///
/// `DefaultHasher` output may change between Rust releases, so identities
/// are only compared within one process and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    len: usize,
    digest: u64,
}

impl FileIdentity {
    fn of(bytes: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self {
            len: bytes.len(),
            digest: hasher.finish(),
        }
    }
}

struct FileState {
    state: ConfigFileState,
    identity: Option<FileIdentity>,
    snapshot: Option<ConfigMap>,
    ephemeral: bool,
    reactions: u64,
    repairs: u64,
}

impl Default for FileState {
    fn default() -> Self {
        Self {
            state: ConfigFileState::Unloaded,
            identity: None,
            snapshot: None,
            ephemeral: false,
            reactions: 0,
            repairs: 0,
        }
    }
}

struct MonitorCore {
    store: Arc<ConfigStore>,
    storage: Arc<dyn ConfigStorage>,
    parser: ConfigParser,
    sink: Arc<dyn DiagnosticSink>,
    defaults: ConfigMap,
    policy: RepairPolicy,
    file: Mutex<FileState>,
}

/// Builder for [`ConfigFileMonitor`]
pub struct ConfigFileMonitorBuilder {
    storage: Arc<dyn ConfigStorage>,
    schema: ConfigSchema,
    defaults: ConfigMap,
    policy: RepairPolicy,
    sink: Arc<dyn DiagnosticSink>,
}

impl ConfigFileMonitorBuilder {
    pub fn schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn defaults(mut self, defaults: ConfigMap) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn repair_policy(mut self, policy: RepairPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Fails with [`ConfigError::RepairSourceExhausted`] when the defaults do
    /// not satisfy the schema, since repair would have nothing valid to write.
    pub fn build(self) -> Result<ConfigFileMonitor, ConfigError> {
        let validator = ConfigValidator::new(self.schema).map_err(|e| {
            ConfigError::RepairSourceExhausted {
                message: e.to_string(),
            }
        })?;
        let parser = ConfigParser::new(validator);

        parser
            .check(&self.defaults)
            .map_err(|e| ConfigError::RepairSourceExhausted {
                message: format!("default config is invalid: {}", e),
            })?;

        let store = Arc::new(ConfigStore::new(self.defaults.clone()));
        let core = Arc::new(MonitorCore {
            store: store.clone(),
            storage: self.storage,
            parser,
            sink: self.sink,
            defaults: self.defaults,
            policy: self.policy,
            file: Mutex::new(FileState::default()),
        });

        let weak: Weak<dyn InitialLoad> = Arc::downgrade(&core) as Weak<dyn InitialLoad>;
        store.set_loader(weak);

        Ok(ConfigFileMonitor { core })
    }
}

/// Sole writer of the [`ConfigStore`] after startup
#[derive(Clone)]
pub struct ConfigFileMonitor {
    core: Arc<MonitorCore>,
}

impl ConfigFileMonitor {
    pub fn builder(storage: Arc<dyn ConfigStorage>) -> ConfigFileMonitorBuilder {
        ConfigFileMonitorBuilder {
            storage,
            schema: ConfigSchema::default(),
            defaults: default_config(),
            policy: RepairPolicy::default(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Monitor for the file described by `config`, with the default schema
    pub fn new(config: &MonitorConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self, ConfigError> {
        Self::builder(Arc::new(FileStorage::new(config)))
            .repair_policy(config.repair_policy)
            .sink(sink)
            .build()
    }

    /// Shared handle consumers read the config through
    pub fn store(&self) -> Arc<ConfigStore> {
        self.core.store.clone()
    }

    pub fn location(&self) -> PathBuf {
        self.core.storage.location()
    }

    pub fn status(&self) -> MonitorStatus {
        let file = self.core.lock_file();
        MonitorStatus {
            state: file.state,
            ephemeral: file.ephemeral,
            has_snapshot: file.snapshot.is_some(),
            reactions: file.reactions,
            repairs: file.repairs,
        }
    }

    /// Load the file into the store, repairing it if needed.
    ///
    /// Safe to call for every notification, including ones caused by the
    /// monitor's own writes: content that matches the last load is a no-op.
    pub fn react_to_config_file_change(&self) -> ReactionOutcome {
        self.core.react()
    }

    /// Repair the file. An already valid file is adopted as-is without writing.
    pub fn repair_config_file(&self, info: &str) -> RepairOutcome {
        self.core.repair(info)
    }

    /// Subscribe to changes through `source` and react to them on a
    /// background task. Must be called inside a tokio runtime.
    pub fn watch(
        &self,
        source: &dyn ChangeSource,
        debounce: std::time::Duration,
    ) -> Result<WatchHandle, WatchError> {
        watcher::spawn_reaction_loop(self.clone(), source, debounce)
    }

    /// Subscribe through `source`, then perform the initial load.
    ///
    /// An edit landing between the two is either seen by the load or
    /// delivered as an event, so the store cannot start out stale.
    pub async fn watch_and_load(
        &self,
        source: &dyn ChangeSource,
        debounce: std::time::Duration,
    ) -> Result<(WatchHandle, Arc<ConfigMap>), WatchError> {
        let handle = self.watch(source, debounce)?;

        let store = self.store();
        let config = match tokio::task::spawn_blocking(move || store.config()).await {
            Ok(config) => config,
            Err(e) => {
                error!("Initial config load panicked: {}", e);
                self.core.store.peek()
            }
        };

        Ok((handle, config))
    }

    /// [`watch_and_load`](Self::watch_and_load) backed by native filesystem
    /// notifications
    pub async fn start(
        &self,
        config: &MonitorConfig,
    ) -> Result<(WatchHandle, Arc<ConfigMap>), WatchError> {
        self.watch_and_load(&NotifyChangeSource::default(), config.debounce)
            .await
    }
}

impl std::fmt::Debug for ConfigFileMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFileMonitor")
            .field("location", &self.location())
            .field("status", &self.status())
            .finish()
    }
}

impl InitialLoad for MonitorCore {
    fn load_initial(&self) {
        let unloaded = self.lock_file().state == ConfigFileState::Unloaded;
        if unloaded {
            self.react();
        }
    }
}

impl MonitorCore {
    fn lock_file(&self) -> MutexGuard<'_, FileState> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all)]
    fn react(&self) -> ReactionOutcome {
        trace_performance!("config_reaction", { self.react_locked() })
    }

    fn react_locked(&self) -> ReactionOutcome {
        let mut file = self.lock_file();
        file.reactions += 1;
        let previous = file.state;
        file.state = ConfigFileState::Reloading;

        let bytes = match self.storage.read() {
            Ok(Some(bytes)) => bytes,
            Ok(None) if previous == ConfigFileState::Unloaded => {
                info!(path = %self.storage.location().display(), "Config file not found, creating it from defaults");
                return match self.install_defaults_quietly(&mut file) {
                    RepairOutcome::AlreadyValid => ReactionOutcome::Loaded,
                    outcome => ReactionOutcome::Repaired(outcome),
                };
            }
            Ok(None) => {
                file.state = ConfigFileState::Corrupt;
                let outcome =
                    self.recover(&mut file, DiagnosticKind::Missing, "config file was removed", None);
                return ReactionOutcome::Repaired(outcome);
            }
            Err(e) => {
                self.keep_current(&mut file, previous, e);
                return ReactionOutcome::Unreadable;
            }
        };

        let identity = FileIdentity::of(&bytes);
        if previous == ConfigFileState::Loaded && file.identity == Some(identity) {
            debug!("Config file content unchanged");
            file.state = ConfigFileState::Loaded;
            return ReactionOutcome::Unchanged;
        }

        match self.parser.parse(&bytes) {
            Ok(config) => {
                self.adopt(&mut file, config, identity);
                info!(keys = file.snapshot.as_ref().map_or(0, |s| s.len()), "Config loaded");
                ReactionOutcome::Loaded
            }
            Err(e) => {
                file.state = ConfigFileState::Corrupt;
                let kind = DiagnosticKind::from_error(&e);
                warn!(%kind, error = %e, "Config file is invalid");
                let outcome = self.recover(&mut file, kind, &e.to_string(), Some(&bytes));
                ReactionOutcome::Repaired(outcome)
            }
        }
    }

    #[instrument(skip(self))]
    fn repair(&self, info: &str) -> RepairOutcome {
        let mut file = self.lock_file();

        // Unknown content is never overwritten
        let current = match self.storage.read() {
            Ok(current) => current,
            Err(e) => {
                let previous = file.state;
                self.keep_current(&mut file, previous, e);
                return RepairOutcome::Unreadable;
            }
        };

        let kind = match &current {
            Some(bytes) => match self.parser.parse(bytes) {
                Ok(config) => {
                    debug!("Config file is already valid, nothing to repair");
                    self.adopt(&mut file, config, FileIdentity::of(bytes));
                    return RepairOutcome::AlreadyValid;
                }
                Err(e) => DiagnosticKind::from_error(&e),
            },
            None => DiagnosticKind::Missing,
        };

        file.state = ConfigFileState::Corrupt;
        self.recover(&mut file, kind, info, current.as_deref())
    }

    fn adopt(&self, file: &mut FileState, config: ConfigMap, identity: FileIdentity) {
        if *self.store.peek() != config {
            self.store.replace(config.clone());
        }
        file.snapshot = Some(config);
        file.identity = Some(identity);
        file.ephemeral = false;
        file.state = ConfigFileState::Loaded;
    }

    /// Rewrite the file from the snapshot or defaults and emit one diagnostic
    fn recover(
        &self,
        file: &mut FileState,
        kind: DiagnosticKind,
        info: &str,
        corrupt: Option<&[u8]>,
    ) -> RepairOutcome {
        file.state = ConfigFileState::Repairing;
        let location = self.storage.location();

        let (config, action) = match (self.policy, &file.snapshot) {
            (RepairPolicy::SnapshotThenDefaults, Some(snapshot)) => {
                (snapshot.clone(), RepairAction::RestoredSnapshot)
            }
            _ => (self.defaults.clone(), RepairAction::RegeneratedDefaults),
        };

        let repair_id = Uuid::new_v4();
        let mut backup = None;
        if let Some(bytes) = corrupt.filter(|b| !b.is_empty()) {
            match self.storage.backup(bytes, info, repair_id) {
                Ok(path) => backup = path,
                Err(e) => warn!(error = %e, "Could not back up corrupt config file"),
            }
        }

        match self.write(&config) {
            Ok(identity) => {
                self.adopt(file, config, identity);
                file.repairs += 1;
                let diagnostic = RepairDiagnostic::new(kind, info, action, location)
                    .with_id(repair_id)
                    .with_backup(backup);
                info!(repair_id = %diagnostic.id, %action, "Config file repaired");
                self.sink.emit(&diagnostic);
                RepairOutcome::Rewritten(action)
            }
            Err(e) => {
                self.fall_back_to_ephemeral(file);
                let diagnostic = RepairDiagnostic::new(
                    DiagnosticKind::RepairWrite,
                    format!("{} ({})", e, info),
                    RepairAction::EphemeralDefaults,
                    location,
                )
                .with_id(repair_id)
                .with_backup(backup);
                self.sink.emit(&diagnostic);
                RepairOutcome::Ephemeral
            }
        }
    }

    /// First run without a file: write defaults, no diagnostic unless that fails
    fn install_defaults_quietly(&self, file: &mut FileState) -> RepairOutcome {
        file.state = ConfigFileState::Repairing;
        let config = self.defaults.clone();

        match self.write(&config) {
            Ok(identity) => {
                self.adopt(file, config, identity);
                RepairOutcome::AlreadyValid
            }
            Err(e) => {
                self.fall_back_to_ephemeral(file);
                self.sink.emit(&RepairDiagnostic::new(
                    DiagnosticKind::RepairWrite,
                    format!("{} (config file did not exist)", e),
                    RepairAction::EphemeralDefaults,
                    self.storage.location(),
                ));
                RepairOutcome::Ephemeral
            }
        }
    }

    fn fall_back_to_ephemeral(&self, file: &mut FileState) {
        self.store.replace(self.defaults.clone());
        file.identity = None;
        file.ephemeral = true;
        file.state = ConfigFileState::Loaded;
    }

    fn keep_current(
        &self,
        file: &mut FileState,
        previous: ConfigFileState,
        error: std::io::Error,
    ) {
        let error = ConfigError::Io(error);
        warn!(%error, "Config file could not be read");

        let action = if previous == ConfigFileState::Unloaded {
            file.ephemeral = true;
            RepairAction::EphemeralDefaults
        } else {
            RepairAction::KeptCurrent
        };
        file.identity = None;
        file.state = ConfigFileState::Loaded;

        self.sink.emit(&RepairDiagnostic::new(
            DiagnosticKind::Unreadable,
            error.to_string(),
            action,
            self.storage.location(),
        ));
    }

    fn write(&self, config: &ConfigMap) -> Result<FileIdentity, ConfigError> {
        let bytes = self.parser.serialize(config).map_err(|e| {
            ConfigError::RepairWrite(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.storage.write(&bytes).map_err(ConfigError::RepairWrite)?;
        Ok(FileIdentity::of(&bytes))
    }
}
