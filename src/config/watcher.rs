use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    ffi::{OsStr, OsString},
    path::Path,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::AppConfig;

/// Watches the configuration file and publishes every successfully parsed
/// revision to subscribers.
///
/// The containing directory is watched rather than the file itself, so saves
/// that replace the file (write to a temporary, then rename over it) are seen
/// as well as in-place writes.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    reload_tx: broadcast::Sender<AppConfig>,
}

impl ConfigWatcher {
    pub fn new(config_path: &str) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel(16);

        let path = Path::new(config_path);
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| anyhow::anyhow!("config path has no file name: {}", config_path))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let reload_tx_clone = reload_tx.clone();
        let load_path = config_path.to_string();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if is_config_change(&event, &file_name) => {
                    info!("Configuration file changed, reloading...");

                    match AppConfig::load_from(&load_path) {
                        Ok(new_config) => {
                            if let Err(e) = reload_tx_clone.send(new_config) {
                                warn!("No active config reload subscribers: {}", e);
                            } else {
                                info!("Configuration reloaded successfully");
                            }
                        }
                        Err(e) => {
                            error!("Failed to reload configuration: {}", e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!("Started watching configuration file: {}", config_path);

        Ok(ConfigWatcher {
            _watcher: watcher,
            reload_tx,
        })
    }

    pub fn subscribe_to_reloads(&self) -> broadcast::Receiver<AppConfig> {
        self.reload_tx.subscribe()
    }
}

/// True when `event` creates or modifies (including renames onto) the file
/// named `file_name`.
fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingMode;
    use notify::{
        event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode},
        EventKind,
    };
    use std::{path::PathBuf, time::Duration};

    fn name() -> OsString {
        OsString::from("default.yaml")
    }

    #[test]
    fn in_place_write_is_a_change() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/etc/app/default.yaml"));
        assert!(is_config_change(&event, &name()));
    }

    #[test]
    fn rename_onto_the_file_is_a_change() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/etc/app/.default.yaml.swp"))
            .add_path(PathBuf::from("/etc/app/default.yaml"));
        assert!(is_config_change(&event, &name()));

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/app/default.yaml"));
        assert!(is_config_change(&created, &name()));
    }

    #[test]
    fn other_files_and_removals_are_ignored() {
        let sibling = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/etc/app/other.yaml"));
        assert!(!is_config_change(&sibling, &name()));

        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/etc/app/default.yaml"));
        assert!(!is_config_change(&removed, &name()));
    }

    #[tokio::test]
    async fn replaced_file_is_reloaded() {
        let dir = std::env::temp_dir().join(format!("traffic-logger-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("app.yaml");
        std::fs::write(&config_path, "logging:\n  mode: all\n").unwrap();

        let watcher = ConfigWatcher::new(config_path.to_str().unwrap()).unwrap();
        let mut reloads = watcher.subscribe_to_reloads();

        let staged = dir.join("app.yaml.tmp");
        std::fs::write(&staged, "logging:\n  mode: inbound\n").unwrap();
        std::fs::rename(&staged, &config_path).unwrap();

        let reloaded = tokio::time::timeout(Duration::from_secs(5), reloads.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.logging.mode, LoggingMode::Inbound);

        drop(watcher);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
