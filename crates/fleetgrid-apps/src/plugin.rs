//! Resolve collaborator implementations from configuration.

use std::sync::Arc;

use fleet_core::{Application, FleetConfig, HistoryStore, PluginError, PluginResult};
use fleetgrid_state::{HistoryLog, StateStore};
use tracing::info;

use crate::service::ApplicationService;

/// History backend that accepts and discards every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledHistory;

impl HistoryStore for DisabledHistory {
    fn create_application(&self, _app: &Application) -> PluginResult<()> {
        Ok(())
    }

    fn delete_application(&self, _namespace: &str, _name: &str, _version: &str) -> PluginResult<bool> {
        Ok(false)
    }
}

/// The collaborators selected by a [`FleetConfig`].
#[derive(Clone)]
pub struct Plugins {
    /// Resource store; also serves the reference index.
    pub store: StateStore,
    /// `None` when history is disabled.
    pub history: Option<HistoryLog>,
}

impl Plugins {
    /// Open the configured backends, creating the data directory for
    /// on-disk ones.
    pub fn from_config(config: &FleetConfig) -> PluginResult<Self> {
        let data_dir = &config.store.data_dir;
        let needs_dir = config.store.backend == "redb" || config.history.backend == "redb";
        if needs_dir {
            std::fs::create_dir_all(data_dir).map_err(|e| {
                PluginError::Backend(format!("create data dir {}: {e}", data_dir.display()))
            })?;
        }

        let store = match config.store.backend.as_str() {
            "redb" => StateStore::open(&data_dir.join("resources.redb"))?,
            "memory" => StateStore::open_in_memory()?,
            other => {
                return Err(PluginError::UnknownPlugin {
                    role: "store",
                    name: other.to_string(),
                });
            }
        };

        let history = match config.history.backend.as_str() {
            "redb" => Some(HistoryLog::open(&data_dir.join("history.redb"))?),
            "memory" => Some(HistoryLog::open_in_memory()?),
            "disabled" => None,
            other => {
                return Err(PluginError::UnknownPlugin {
                    role: "history",
                    name: other.to_string(),
                });
            }
        };

        info!(
            store = %config.store.backend,
            history = %config.history.backend,
            "plugins resolved"
        );
        Ok(Self { store, history })
    }

    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        match &self.history {
            Some(log) => Arc::new(log.clone()),
            None => Arc::new(DisabledHistory),
        }
    }

    /// Build an application service over these collaborators.
    pub fn application_service(&self) -> ApplicationService {
        let store = Arc::new(self.store.clone());
        ApplicationService::new(store.clone(), self.history_store(), store)
    }
}

impl ApplicationService {
    /// Build a service from the backends named in `config`.
    pub fn from_config(config: &FleetConfig) -> PluginResult<Self> {
        Ok(Plugins::from_config(config)?.application_service())
    }
}
