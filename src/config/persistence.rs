use crate::config::settings::MonitorConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Byte-level access to the config file.
///
/// The monitor talks to disk only through this trait so hosts can back the
/// config with something other than a plain file.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigStorage: Send + Sync {
    /// Where the config lives, for logs and diagnostics
    fn location(&self) -> PathBuf;

    /// Current content, `None` if the file does not exist
    fn read(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the content
    fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Keep a copy of content that is about to be overwritten
    fn backup(&self, bytes: &[u8], reason: &str, repair_id: Uuid) -> io::Result<Option<PathBuf>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct BackupMetadata {
    pub timestamp: DateTime<Utc>,
    pub original_file: String,
    pub backup_reason: String,
    pub repair_id: Uuid,
}

/// [`ConfigStorage`] backed by a single file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
    atomic_writes: bool,
    file_permissions: u32,
}

impl FileStorage {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            path: config.config_path.clone(),
            backup_dir: config.backup_dir.clone(),
            max_backups: config.max_backups,
            atomic_writes: config.atomic_writes,
            file_permissions: config.file_permissions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config")
            .to_string()
    }

    fn ensure_parent_exists(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
                }
            }
        }
        Ok(())
    }

    fn write_file_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_parent_exists(&self.path)?;

        let target = if self.atomic_writes {
            self.path.with_extension("tmp")
        } else {
            self.path.clone()
        };

        fs::write(&target, bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(self.file_permissions))?;
        }

        if self.atomic_writes {
            if let Err(e) = fs::rename(&target, &self.path) {
                let _ = fs::remove_file(&target);
                return Err(e);
            }
        }

        Ok(())
    }

    fn cleanup_old_backups(&self) -> io::Result<()> {
        let prefix = format!("{}.", self.file_name());
        let mut backups: Vec<PathBuf> = fs::read_dir(&self.backup_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().and_then(|s| s.to_str()) == Some("corrupt")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();

        // Timestamped names sort chronologically; newest first
        backups.sort();
        backups.reverse();

        for old in backups.iter().skip(self.max_backups) {
            fs::remove_file(old)?;

            let metadata_path = old.with_extension("metadata");
            if metadata_path.exists() {
                fs::remove_file(metadata_path)?;
            }
            debug!(backup = %old.display(), "Removed old config backup");
        }

        Ok(())
    }
}

impl ConfigStorage for FileStorage {
    fn location(&self) -> PathBuf {
        self.path.clone()
    }

    fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.write_file_atomic(bytes)
    }

    fn backup(&self, bytes: &[u8], reason: &str, repair_id: Uuid) -> io::Result<Option<PathBuf>> {
        if self.max_backups == 0 {
            return Ok(None);
        }

        fs::create_dir_all(&self.backup_dir)?;

        let timestamp = Utc::now();
        let original_file = self.file_name();
        let backup_path = self.backup_dir.join(format!(
            "{}.{}.corrupt",
            original_file,
            timestamp.format("%Y%m%dT%H%M%S%.6f")
        ));

        fs::write(&backup_path, bytes)?;

        let metadata = BackupMetadata {
            timestamp,
            original_file,
            backup_reason: reason.to_string(),
            repair_id,
        };
        let metadata_content = toml::to_string_pretty(&metadata)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(backup_path.with_extension("metadata"), metadata_content)?;

        if let Err(e) = self.cleanup_old_backups() {
            warn!(error = %e, "Failed to prune old config backups");
        }

        Ok(Some(backup_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage_in(dir: &TempDir, max_backups: usize) -> FileStorage {
        let config = MonitorConfig {
            max_backups,
            ..MonitorConfig::for_path(dir.path().join("prefs").join("config.json"))
        };
        FileStorage::new(&config)
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir, 5);
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir, 5);

        storage.write(b"{\"ScrollSpeed\": 3}").unwrap();

        assert_eq!(storage.read().unwrap().unwrap(), b"{\"ScrollSpeed\": 3}");
        assert!(!storage.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_write_fails_when_parent_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let storage = FileStorage::new(&MonitorConfig::for_path(blocker.join("config.json")));
        assert!(storage.write(b"{}").is_err());
    }

    #[test]
    fn test_backup_and_cleanup() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir, 2);

        for i in 0..5 {
            std::thread::sleep(std::time::Duration::from_millis(5));
            storage
                .backup(format!("{{broken {}", i).as_bytes(), "test", Uuid::new_v4())
                .unwrap();
        }

        let backup_dir = temp_dir.path().join("prefs").join("backups");
        let mut corrupt: Vec<_> = fs::read_dir(&backup_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("corrupt"))
            .collect();
        corrupt.sort();

        assert_eq!(corrupt.len(), 2);
        assert_eq!(fs::read(&corrupt[1]).unwrap(), b"{broken 4");

        let metadata = fs::read_to_string(corrupt[1].with_extension("metadata")).unwrap();
        let parsed: BackupMetadata = toml::from_str(&metadata).unwrap();
        assert_eq!(parsed.original_file, "config.json");
        assert_eq!(parsed.backup_reason, "test");
    }

    #[test]
    fn test_backups_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage_in(&temp_dir, 0);
        assert!(storage.backup(b"x", "test", Uuid::new_v4()).unwrap().is_none());
    }
}
