//! redb table definitions for the FleetGrid state stores.
//!
//! JSON tables use `&str` keys and `&[u8]` values. Composite keys follow
//! the pattern `{namespace}/{name}`.

use redb::TableDefinition;

/// A table of JSON-serialized records.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Applications keyed by `{namespace}/{name}`.
pub const APPLICATIONS: JsonTable = TableDefinition::new("applications");

/// Configs keyed by `{namespace}/{name}`.
pub const CONFIGS: JsonTable = TableDefinition::new("configs");

/// Secrets keyed by `{namespace}/{name}`.
pub const SECRETS: JsonTable = TableDefinition::new("secrets");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key of the resource-version counter in [`META`].
pub const RESOURCE_VERSION: &str = "resource_version";

/// Set of application names keyed by `{namespace}/{config}`.
pub const CONFIG_INDEX: JsonTable = TableDefinition::new("config_index");

/// Set of application names keyed by `{namespace}/{secret}`.
pub const SECRET_INDEX: JsonTable = TableDefinition::new("secret_index");

/// An application's current config references, keyed by `{namespace}/{app}`.
pub const APP_CONFIG_REFS: JsonTable = TableDefinition::new("app_config_refs");

/// An application's current secret references, keyed by `{namespace}/{app}`.
pub const APP_SECRET_REFS: JsonTable = TableDefinition::new("app_secret_refs");

/// Application history keyed by `{namespace}/{name}:{padded version}`.
pub const HISTORY: JsonTable = TableDefinition::new("history");
