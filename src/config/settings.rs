//! Runtime settings for the config monitor itself

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where a repair takes its replacement mapping from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairPolicy {
    /// Last successfully loaded mapping if there is one, otherwise defaults
    #[default]
    SnapshotThenDefaults,
    /// Always reset to defaults
    DefaultsOnly,
}

impl FromStr for RepairPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "snapshot" | "snapshot-then-defaults" => Ok(RepairPolicy::SnapshotThenDefaults),
            "defaults" | "defaults-only" => Ok(RepairPolicy::DefaultsOnly),
            _ => Err(format!("Invalid repair policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub config_path: PathBuf,
    pub backup_dir: PathBuf,
    /// Corrupt-file backups to keep; 0 disables backups
    pub max_backups: usize,
    /// Quiet period used to coalesce bursts of change events
    pub debounce: Duration,
    pub repair_policy: RepairPolicy,
    pub atomic_writes: bool,
    pub file_permissions: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let base_dir = dirs::config_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        let config_dir = base_dir.join("MouseFix");

        Self {
            config_path: config_dir.join("config.json"),
            backup_dir: config_dir.join("backups"),
            max_backups: 5,
            debounce: Duration::from_millis(250),
            repair_policy: RepairPolicy::default(),
            atomic_writes: true,
            file_permissions: 0o600,
        }
    }
}

impl MonitorConfig {
    /// Settings for a config file at `path`, with backups next to it
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let backup_dir = config_path
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| PathBuf::from("backups"));

        Self {
            config_path,
            backup_dir,
            ..Self::default()
        }
    }

    /// Load settings from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = match std::env::var("MOUSEFIX_CONFIG_PATH") {
            Ok(path) => Self::for_path(path),
            Err(_) => Self::default(),
        };

        if let Ok(dir) = std::env::var("MOUSEFIX_BACKUP_DIR") {
            config.backup_dir = PathBuf::from(dir);
        }

        if let Ok(max) = std::env::var("MOUSEFIX_MAX_BACKUPS") {
            if let Ok(parsed) = max.parse() {
                config.max_backups = parsed;
            }
        }

        if let Ok(ms) = std::env::var("MOUSEFIX_DEBOUNCE_MS") {
            if let Ok(parsed) = ms.parse() {
                config.debounce = Duration::from_millis(parsed);
            }
        }

        if let Ok(policy) = std::env::var("MOUSEFIX_REPAIR_POLICY") {
            if let Ok(parsed) = RepairPolicy::from_str(&policy) {
                config.repair_policy = parsed;
            }
        }

        config
    }
}
