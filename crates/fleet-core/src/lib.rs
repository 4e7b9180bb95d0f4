pub mod config;
pub mod plugin;
pub mod types;

pub use config::FleetConfig;
pub use plugin::{HistoryStore, IndexService, PluginError, PluginResult, ResourceStore};
pub use types::*;
