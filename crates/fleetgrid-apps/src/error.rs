//! Error types returned by the application service.

use std::fmt;

use fleet_core::{PluginError, ResourceKind};
use thiserror::Error;

/// Result type alias for application service operations.
pub type AppResult<T> = Result<T, AppError>;

/// Which collection of an application a name conflict occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    Volumes,
    Services,
}

impl fmt::Display for NameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameScope::Volumes => f.write_str("Volumes[]"),
            NameScope::Services => f.write_str("Services[]"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("the {kind} ({name}) is not found{}", in_namespace(.namespace))]
    ResourceNotFound {
        kind: ResourceKind,
        namespace: Option<String>,
        name: String,
    },

    #[error("name ({name}) is duplicated in {scope}")]
    AppNameConflict { scope: NameScope, name: String },

    #[error("volume ({name}) is not found when mounting")]
    VolumeNotFoundWhenMount { name: String },

    #[error(transparent)]
    Plugin(#[from] PluginError),
}

fn in_namespace(namespace: &Option<String>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace {ns}"),
        None => String::new(),
    }
}

impl AppError {
    pub(crate) fn not_found(kind: ResourceKind, name: &str) -> Self {
        AppError::ResourceNotFound {
            kind,
            namespace: None,
            name: name.to_string(),
        }
    }
}
