//! Repair diagnostics and the sinks that receive them

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, warn};
use uuid::Uuid;

use crate::config::error::ConfigError;

/// What was wrong with the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Bytes did not decode as a config document
    Parse,
    /// Decoded content failed schema checks
    Validation,
    /// The file disappeared
    Missing,
    /// The file exists but could not be read
    Unreadable,
    /// A repaired file could not be written back
    RepairWrite,
}

impl DiagnosticKind {
    pub fn from_error(error: &ConfigError) -> Self {
        match error {
            ConfigError::Parse { .. } => DiagnosticKind::Parse,
            ConfigError::Validation { .. } => DiagnosticKind::Validation,
            ConfigError::RepairWrite(_) => DiagnosticKind::RepairWrite,
            _ => DiagnosticKind::Unreadable,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Parse => "ParseError",
            DiagnosticKind::Validation => "ValidationError",
            DiagnosticKind::Missing => "MissingFile",
            DiagnosticKind::Unreadable => "UnreadableFile",
            DiagnosticKind::RepairWrite => "RepairWriteError",
        };
        f.write_str(name)
    }
}

/// What the monitor did about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    RestoredSnapshot,
    RegeneratedDefaults,
    /// Defaults held in memory only; the file could not be written
    EphemeralDefaults,
    /// File left untouched, last loaded config kept
    KeptCurrent,
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RepairAction::RestoredSnapshot => "restored the last valid config",
            RepairAction::RegeneratedDefaults => "replaced the file with default settings",
            RepairAction::EphemeralDefaults => "using default settings in memory only",
            RepairAction::KeptCurrent => "kept the current settings",
        };
        f.write_str(text)
    }
}

/// Human-readable account of one repair
#[derive(Debug, Clone)]
pub struct RepairDiagnostic {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub kind: DiagnosticKind,
    pub info: String,
    pub action: RepairAction,
    pub location: PathBuf,
    pub backup: Option<PathBuf>,
}

impl RepairDiagnostic {
    pub fn new(kind: DiagnosticKind, info: impl Into<String>, action: RepairAction, location: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            kind,
            info: info.into(),
            action,
            location,
            backup: None,
        }
    }

    /// Share the id with the backup taken for the same repair
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_backup(mut self, backup: Option<PathBuf>) -> Self {
        self.backup = backup;
        self
    }
}

impl fmt::Display for RepairDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {}: {}; {}",
            self.kind,
            self.location.display(),
            self.info,
            self.action
        )?;
        if let Some(backup) = &self.backup {
            write!(f, " (previous content saved to {})", backup.display())?;
        }
        Ok(())
    }
}

/// Write-only destination for repair diagnostics
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: &RepairDiagnostic);
}

/// Sends diagnostics to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: &RepairDiagnostic) {
        match diagnostic.kind {
            DiagnosticKind::RepairWrite => error!(
                repair_id = %diagnostic.id,
                kind = %diagnostic.kind,
                "{}",
                diagnostic
            ),
            _ => warn!(
                repair_id = %diagnostic.id,
                kind = %diagnostic.kind,
                "{}",
                diagnostic
            ),
        }
    }
}

/// Keeps diagnostics in memory, e.g. for a host UI to show later
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<RepairDiagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RepairDiagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: &RepairDiagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_kind_info_and_action() {
        let diagnostic = RepairDiagnostic::new(
            DiagnosticKind::Parse,
            "invalid JSON: key must be a string at line 1 column 2",
            RepairAction::RegeneratedDefaults,
            PathBuf::from("/tmp/config.json"),
        )
        .with_backup(Some(PathBuf::from("/tmp/backups/config.json.1.corrupt")));

        let text = diagnostic.to_string();
        assert!(text.starts_with("ParseError in /tmp/config.json"));
        assert!(text.contains("invalid JSON"));
        assert!(text.contains("default settings"));
        assert!(text.contains("config.json.1.corrupt"));
    }

    #[test]
    fn test_recording_sink_collects() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());

        sink.emit(&RepairDiagnostic::new(
            DiagnosticKind::Missing,
            "config file not found",
            RepairAction::RestoredSnapshot,
            PathBuf::from("config.json"),
        ));

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::Missing);
    }

    #[test]
    fn test_kind_from_error() {
        let err = ConfigError::Parse {
            message: "bad".to_string(),
        };
        assert_eq!(DiagnosticKind::from_error(&err), DiagnosticKind::Parse);

        let err = ConfigError::RepairWrite(std::io::Error::other("disk full"));
        assert_eq!(DiagnosticKind::from_error(&err), DiagnosticKind::RepairWrite);
    }
}
