//! Change notifications for the config file and the debounced reaction loop

use super::ConfigFileMonitor;
use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::any::Any;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot watch path without a file name: {0}")]
    InvalidPath(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Renamed,
    Removed,
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            _ => ChangeKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Stream of change events for one path.
///
/// Holds whatever keeps the underlying notification source alive; dropping
/// the subscription stops delivery.
pub struct ChangeSubscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl ChangeSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            events,
            _guard: None,
        }
    }

    pub fn with_guard(mut self, guard: impl Any + Send) -> Self {
        self._guard = Some(Box::new(guard));
        self
    }

    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

/// Something that can report changes to a single file
pub trait ChangeSource: Send + Sync {
    fn subscribe(&self, path: &Path) -> Result<ChangeSubscription, WatchError>;
}

/// [`ChangeSource`] backed by the platform's native notification API
#[derive(Debug, Clone)]
pub struct NotifyChangeSource {
    /// Only used when notify falls back to polling
    pub poll_interval: Duration,
}

impl Default for NotifyChangeSource {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&self, path: &Path) -> Result<ChangeSubscription, WatchError> {
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| WatchError::InvalidPath(path.to_path_buf()))?
            .to_os_string();

        // Atomic saves replace the file, so the watch sits on the directory
        // and events are filtered down to the one file name.
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    let kind = ChangeKind::from(&event.kind);
                    for changed in event.paths {
                        if changed.file_name() == Some(file_name.as_os_str()) {
                            let _ = tx.send(ChangeEvent {
                                kind,
                                path: changed,
                            });
                        }
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "Config watcher started");

        Ok(ChangeSubscription::new(rx).with_guard(watcher))
    }
}

/// Running reaction loop; stop it with [`WatchHandle::shutdown`]
pub struct WatchHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Config watcher task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub(super) fn spawn_reaction_loop(
    monitor: ConfigFileMonitor,
    source: &dyn ChangeSource,
    debounce: Duration,
) -> Result<WatchHandle, WatchError> {
    let subscription = source.subscribe(&monitor.location())?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(reaction_loop(monitor, subscription, debounce, shutdown_rx));

    Ok(WatchHandle {
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn reaction_loop(
    monitor: ConfigFileMonitor,
    mut subscription: ChangeSubscription,
    debounce: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    'events: loop {
        let first = tokio::select! {
            _ = &mut shutdown => break,
            event = subscription.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        // Collapse a burst of events into one reaction on the final state
        let mut coalesced = 1usize;
        loop {
            tokio::select! {
                _ = &mut shutdown => break 'events,
                next = tokio::time::timeout(debounce, subscription.recv()) => match next {
                    Ok(Some(_)) => coalesced += 1,
                    _ => break,
                },
            }
        }
        debug!(kind = ?first.kind, coalesced, "Config file change detected");

        let reacting = monitor.clone();
        match tokio::task::spawn_blocking(move || reacting.react_to_config_file_change()).await {
            Ok(outcome) => debug!(?outcome, "Config reaction finished"),
            Err(e) => error!("Config reaction panicked: {}", e),
        }
    }

    debug!("Config watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};

    #[test]
    fn test_change_kind_mapping() {
        assert_eq!(
            ChangeKind::from(&EventKind::Create(CreateKind::File)),
            ChangeKind::Created
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modified
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            ChangeKind::Renamed
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Remove(RemoveKind::File)),
            ChangeKind::Removed
        );
        assert_eq!(
            ChangeKind::from(&EventKind::Access(AccessKind::Any)),
            ChangeKind::Other
        );
    }

    #[test]
    fn test_subscribe_rejects_path_without_file_name() {
        let result = NotifyChangeSource::default().subscribe(Path::new("/"));
        assert!(matches!(result, Err(WatchError::InvalidPath(_))));
    }
}
