//! Collaborator contracts consumed by the application service.
//!
//! Concrete implementations are chosen from configuration at startup and
//! injected as trait objects. Every method is synchronous; timeouts and
//! cancellation are the implementation's concern.

use thiserror::Error;

use crate::types::*;

/// Result type alias for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors reported by collaborator implementations.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: ResourceKind, key: String },

    #[error("unknown {role} plugin: {name}")]
    UnknownPlugin { role: &'static str, name: String },

    #[error("{0}")]
    Backend(String),
}

impl PluginError {
    /// Whether this failure signals an absent resource.
    ///
    /// Backends that only report text are recognized by a "not found"
    /// marker in the message.
    pub fn is_not_found(&self) -> bool {
        match self {
            PluginError::NotFound { .. } => true,
            PluginError::Backend(msg) => msg.to_ascii_lowercase().contains("not found"),
            _ => false,
        }
    }
}

/// Primary store for applications, configs, and secrets.
pub trait ResourceStore: Send + Sync {
    /// Get an application; `version` of `None` means the current one.
    fn get_application(
        &self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> PluginResult<Application>;

    /// Create an application, assigning its version.
    fn create_application(&self, namespace: &str, app: &Application) -> PluginResult<Application>;

    /// Update an existing application, advancing its version on change.
    fn update_application(&self, namespace: &str, app: &Application) -> PluginResult<Application>;

    /// Delete an application. Returns true if it existed.
    fn delete_application(&self, namespace: &str, name: &str) -> PluginResult<bool>;

    fn list_application(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> PluginResult<ApplicationList>;

    fn get_config(&self, namespace: &str, name: &str, version: Option<&str>)
    -> PluginResult<Config>;

    /// Create a config in `namespace`, assigning its version.
    fn create_config(&self, namespace: &str, config: &Config) -> PluginResult<Config>;

    fn get_secret(&self, namespace: &str, name: &str, version: Option<&str>)
    -> PluginResult<Secret>;

    fn create_secret(&self, namespace: &str, secret: &Secret) -> PluginResult<Secret>;
}

/// Append-only audit trail of application versions.
pub trait HistoryStore: Send + Sync {
    /// Record a persisted application version.
    fn create_application(&self, app: &Application) -> PluginResult<()>;

    /// Mark an application version deleted. Returns true if that version
    /// had been recorded before.
    fn delete_application(&self, namespace: &str, name: &str, version: &str) -> PluginResult<bool>;
}

/// Reverse index from Configs/Secrets to the applications using them.
///
/// Both refresh calls replace the application's full contribution, so
/// repeating a call with the same input leaves the index unchanged. An
/// empty list clears the application from the index.
pub trait IndexService: Send + Sync {
    fn refresh_config_index_by_app(
        &self,
        namespace: &str,
        app_name: &str,
        config_names: &[String],
    ) -> PluginResult<()>;

    fn refresh_secret_index_by_app(
        &self,
        namespace: &str,
        app_name: &str,
        secret_names: &[String],
    ) -> PluginResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        let typed = PluginError::NotFound {
            kind: ResourceKind::App,
            key: "ns/app".into(),
        };
        assert!(typed.is_not_found());
        assert!(PluginError::Backend("applications \"x\" Not Found".into()).is_not_found());
        assert!(!PluginError::Backend("connection refused".into()).is_not_found());
        assert!(
            !PluginError::AlreadyExists {
                kind: ResourceKind::Config,
                key: "ns/cfg".into()
            }
            .is_not_found()
        );
    }
}
