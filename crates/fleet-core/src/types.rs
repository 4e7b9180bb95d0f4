//! Resource types shared across FleetGrid crates.
//!
//! Applications, Configs, and Secrets are namespace-scoped and versioned.
//! Versions are assigned by the resource store on write; callers never
//! choose them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a namespaced resource, used in error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    App,
    Config,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::App => "app",
            ResourceKind::Config => "config",
            ResourceKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Application ───────────────────────────────────────────────────

/// A versioned workload specification deployed to a fleet of nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Application {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    /// Assigned by the resource store; empty until first persisted.
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Unix timestamp (seconds) of first creation.
    #[serde(default)]
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last version change.
    #[serde(default)]
    pub updated_at: u64,
}

/// A workload process inside an application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,
}

/// Attaches a declared volume to a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeMount {
    /// Name of the volume being mounted.
    pub name: String,
    #[serde(default)]
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A named attachment point, optionally backed by a Config or Secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<VolumeSource>,
}

/// What a volume is backed by. A volume holds at most one reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    Config(ObjectRef),
    Secret(ObjectRef),
    HostPath { path: String },
}

/// A version pin on a Config or Secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRef {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl ObjectRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: String::new(),
        }
    }
}

impl Volume {
    pub fn config(name: &str, config: &str) -> Self {
        Self {
            name: name.to_string(),
            source: Some(VolumeSource::Config(ObjectRef::named(config))),
        }
    }

    pub fn secret(name: &str, secret: &str) -> Self {
        Self {
            name: name.to_string(),
            source: Some(VolumeSource::Secret(ObjectRef::named(secret))),
        }
    }

    /// The referenced Config, if this volume is Config-backed.
    pub fn config_ref(&self) -> Option<&ObjectRef> {
        match &self.source {
            Some(VolumeSource::Config(r)) => Some(r),
            _ => None,
        }
    }

    /// The referenced Secret, if this volume is Secret-backed.
    pub fn secret_ref(&self) -> Option<&ObjectRef> {
        match &self.source {
            Some(VolumeSource::Secret(r)) => Some(r),
            _ => None,
        }
    }
}

impl Application {
    /// Build the composite key for the applications table.
    pub fn table_key(&self) -> String {
        resource_key(&self.namespace, &self.name)
    }

    /// Whether the user-specified parts of two applications are equal,
    /// ignoring identity, version, and timestamps.
    pub fn same_spec(&self, other: &Application) -> bool {
        self.description == other.description
            && self.labels == other.labels
            && self.services == other.services
            && self.volumes == other.volumes
    }
}

// ── Config / Secret ───────────────────────────────────────────────

/// Configuration data mounted into applications.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

/// Sensitive data mounted into applications.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Secret {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

// ── Listing ───────────────────────────────────────────────────────

/// Caller-supplied listing options, passed through to the resource store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListOptions {
    /// Only include applications whose name contains this substring.
    #[serde(default)]
    pub name_contains: Option<String>,
    /// Maximum number of items to return.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Exclusive name cursor returned as `next` by a previous page.
    #[serde(default)]
    pub continue_from: Option<String>,
}

/// One page of applications.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationList {
    pub items: Vec<Application>,
    /// Number of matching applications before paging.
    pub total: usize,
    /// Cursor for the next page, if truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Composite table key for a namespaced resource.
///
/// The namespace is length-prefixed (`{len}:{namespace}/{name}`), so no two
/// (namespace, name) pairs share a key whatever characters they contain.
pub fn resource_key(namespace: &str, name: &str) -> String {
    format!("{}{name}", namespace_prefix(namespace))
}

/// Key prefix shared by every resource in `namespace` and no other.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}:{namespace}/", namespace.len())
}
