//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - Watches the parent directory and filters by file name, so editors that
//!   save by writing a temp file and renaming it over the config are seen
//! - A reload equal to the last forwarded config is not forwarded again
//! - Once the receiver is gone the handler logs once and goes quiet

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventHandler, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::InstrumentationConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<InstrumentationConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates, suitable
    /// for [`SpecCatalog::follow`](crate::config::SpecCatalog::follow).
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<InstrumentationConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let handler = ReloadHandler::new(&self.path, self.update_tx)?;
        let dir = watched_dir(&self.path).to_path_buf();

        let mut watcher = RecommendedWatcher::new(handler, Config::default().with_poll_interval(Duration::from_secs(2)))?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

fn watched_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Turns file events in the config directory into validated configs.
struct ReloadHandler {
    path: PathBuf,
    file_name: OsString,
    tx: mpsc::UnboundedSender<InstrumentationConfig>,
    /// Last config known to the receiver.
    current: Option<InstrumentationConfig>,
    closed: bool,
}

impl ReloadHandler {
    fn new(path: &Path, tx: mpsc::UnboundedSender<InstrumentationConfig>) -> Result<Self, notify::Error> {
        let file_name = path
            .file_name()
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?
            .to_os_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            tx,
            current: load_config(path).ok(),
            closed: false,
        })
    }

    fn concerns_config(&self, event: &Event) -> bool {
        (event.kind.is_modify() || event.kind.is_create())
            && event.paths.iter().any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    fn reload(&mut self) {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                return;
            }
        };
        if self.current.as_ref() == Some(&config) {
            tracing::debug!(path = ?self.path, "Config unchanged, skipping reload");
            return;
        }

        tracing::info!(path = ?self.path, methods = config.methods.len(), "Config file changed, reloading");
        match self.tx.send(config.clone()) {
            Ok(()) => self.current = Some(config),
            Err(_) => {
                tracing::warn!(path = ?self.path, "Config update receiver dropped, ignoring further changes");
                self.closed = true;
            }
        }
    }
}

impl EventHandler for ReloadHandler {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        if self.closed {
            return;
        }
        match event {
            Ok(event) if self.concerns_config(&event) => self.reload(),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        }
    }
}
