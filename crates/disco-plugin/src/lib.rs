pub mod config;
pub mod logging;
pub mod view;

use config::PluginConfig;
use disco_core::{JournalEntry, System};
use disco_journal::{ReconcileError, Reconciler, Routed};
use disco_storage::{DiscoStore, StorageError};
use logging::Logging;
use std::io;
use thiserror::Error;
use tracing::{debug, info};
use view::{not_found_message, SystemView};

pub const PLUGIN_NAME: &str = "EDDisco";
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("logging error: {0}")]
    Logging(String),
}

pub trait DialogSink: Send {
    fn dialog_update(&mut self, system: Option<&System>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginWidget {
    pub label: String,
    pub button_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Found(SystemView),
    NotFound { message: String },
}

pub struct DiscoPlugin {
    config: PluginConfig,
    reconciler: Reconciler,
    logging: Option<Logging>,
    dialog: Option<Box<dyn DialogSink>>,
    button_text: String,
}

const SEARCH_BUTTON_TEXT: &str = "Search System";

impl DiscoPlugin {
    /// Creates the data directory, starts logging and opens the store. A store
    /// that cannot be opened fails the start. The tracing subscriber is
    /// process-wide: a plugin started again after `stop` logs into its own
    /// file through the subscriber the first start installed.
    pub fn start(config: PluginConfig) -> Result<Self, PluginError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let logging = Logging::init(&config)?;
        let store = DiscoStore::open(config.db_path())?;

        info!(
            event = "plugin_started",
            plugin = PLUGIN_NAME,
            version = PLUGIN_VERSION,
            db = %config.db_path().display(),
        );
        Ok(Self {
            config,
            reconciler: Reconciler::new(store),
            logging: Some(logging),
            dialog: None,
            button_text: SEARCH_BUTTON_TEXT.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.reconciler.store().is_closed()
    }

    pub fn stop(&mut self) -> Result<(), PluginError> {
        if self.is_running() {
            info!(event = "plugin_stopping", plugin = PLUGIN_NAME);
        }
        let closed = self.reconciler.close();
        if let Some(mut logging) = self.logging.take() {
            logging.shutdown();
        }
        Ok(closed?)
    }

    pub fn prefs_changed(&mut self, log_level: &str) -> Result<bool, PluginError> {
        self.config.log_level = log_level.to_string();
        match &self.logging {
            Some(logging) => logging.set_level(log_level),
            None => Ok(false),
        }
    }

    pub fn journal_entry(&mut self, entry: &JournalEntry) -> Result<Routed, PluginError> {
        let routed = self.reconciler.route(entry)?;
        if let Routed::Handled(system) = &routed {
            if let Some(system) = system.as_ref().filter(|system| !system.name.is_empty()) {
                self.button_text = format!("{} [{}]", system.name, system.progress());
            }
            if let Some(dialog) = self.dialog.as_mut() {
                dialog.dialog_update(system.as_ref());
            }
        }
        Ok(routed)
    }

    pub fn app_widget(&self) -> PluginWidget {
        PluginWidget {
            label: format!("{PLUGIN_NAME} v{PLUGIN_VERSION}:"),
            button_text: self.button_text.clone(),
        }
    }

    pub fn attach_dialog(&mut self, dialog: Box<dyn DialogSink>) {
        self.dialog = Some(dialog);
    }

    pub fn detach_dialog(&mut self) -> Option<Box<dyn DialogSink>> {
        self.dialog.take()
    }

    pub fn search_system(&self, name: &str) -> Result<SearchResult, PluginError> {
        let name = name.trim();
        let result = match self.reconciler.find_system_by_name(name)? {
            Some(system) => SearchResult::Found(SystemView::build(&system)),
            None => SearchResult::NotFound {
                message: not_found_message(name),
            },
        };
        debug!(
            event = "system_searched",
            name = %name,
            found = matches!(result, SearchResult::Found(_)),
        );
        Ok(result)
    }
}

impl Drop for DiscoPlugin {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
