//! StateStore — redb-backed resource persistence for FleetGrid.
//!
//! Implements [`ResourceStore`] over applications, configs, and secrets.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fleet_core::*;
use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

pub(crate) use map_err;

/// Thread-safe resource store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) db: Arc<Database>,
}

/// A namespaced record whose version the store assigns.
trait Versioned: Serialize + DeserializeOwned + Clone {
    const KIND: ResourceKind;

    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn created_at(&self) -> u64;
    fn stamp(&mut self, namespace: &str, version: String, created_at: u64, updated_at: u64);
}

macro_rules! impl_versioned {
    ($ty:ty, $kind:expr) => {
        impl Versioned for $ty {
            const KIND: ResourceKind = $kind;

            fn name(&self) -> &str {
                &self.name
            }

            fn version(&self) -> &str {
                &self.version
            }

            fn created_at(&self) -> u64 {
                self.created_at
            }

            fn stamp(&mut self, namespace: &str, version: String, created_at: u64, updated_at: u64) {
                self.namespace = namespace.to_string();
                self.version = version;
                self.created_at = created_at;
                self.updated_at = updated_at;
            }
        }
    };
}

impl_versioned!(Application, ResourceKind::App);
impl_versioned!(Config, ResourceKind::Config);
impl_versioned!(Secret, ResourceKind::Secret);

/// Human-readable `{namespace}/{name}` form of a key, for errors and logs.
pub(crate) fn display_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Advance the store-wide resource version inside `txn`.
fn next_version(txn: &WriteTransaction) -> StateResult<String> {
    let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
    let current = meta
        .get(RESOURCE_VERSION)
        .map_err(map_err!(Read))?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = current + 1;
    meta.insert(RESOURCE_VERSION, next).map_err(map_err!(Write))?;
    Ok(next.to_string())
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        txn.open_table(CONFIGS).map_err(map_err!(Table))?;
        txn.open_table(SECRETS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.open_table(CONFIG_INDEX).map_err(map_err!(Table))?;
        txn.open_table(SECRET_INDEX).map_err(map_err!(Table))?;
        txn.open_table(APP_CONFIG_REFS).map_err(map_err!(Table))?;
        txn.open_table(APP_SECRET_REFS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Current value of the resource-version counter.
    pub fn resource_version(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let meta = txn.open_table(META).map_err(map_err!(Table))?;
        let current = meta
            .get(RESOURCE_VERSION)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok(current)
    }

    // ── Generic record access ──────────────────────────────────────

    fn get_record<T: Versioned>(
        &self,
        table_def: JsonTable,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> StateResult<T> {
        let key = resource_key(namespace, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        let record: T = match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
            None => {
                return Err(StateError::NotFound {
                    kind: T::KIND,
                    key: display_key(namespace, name),
                });
            }
        };
        match version {
            Some(v) if !v.is_empty() && v != record.version() => Err(StateError::NotFound {
                kind: T::KIND,
                key: format!("{}@{v}", display_key(namespace, name)),
            }),
            _ => Ok(record),
        }
    }

    fn create_record<T: Versioned>(
        &self,
        table_def: JsonTable,
        namespace: &str,
        item: &T,
    ) -> StateResult<T> {
        let key = resource_key(namespace, item.name());
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let record = {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists {
                    kind: T::KIND,
                    key: display_key(namespace, item.name()),
                });
            }
            let now = unix_now();
            let mut record = item.clone();
            record.stamp(namespace, next_version(&txn)?, now, now);
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            record
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            kind = %T::KIND,
            key = %display_key(namespace, item.name()),
            version = record.version(),
            "resource created"
        );
        Ok(record)
    }

    // ── Applications ───────────────────────────────────────────────

    fn update_app_record(&self, namespace: &str, app: &Application) -> StateResult<Application> {
        let key = resource_key(namespace, &app.name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let (record, changed) = {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            let existing: Application = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => {
                    return Err(StateError::NotFound {
                        kind: ResourceKind::App,
                        key: display_key(namespace, &app.name),
                    });
                }
            };
            if existing.same_spec(app) {
                (existing, false)
            } else {
                let mut record = app.clone();
                record.stamp(namespace, next_version(&txn)?, existing.created_at(), unix_now());
                let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                (record, true)
            }
        };
        if changed {
            txn.commit().map_err(map_err!(Transaction))?;
            debug!(namespace, name = %record.name, version = %record.version, "application updated");
        } else {
            txn.abort().map_err(map_err!(Transaction))?;
            debug!(namespace, name = %record.name, version = %record.version, "application unchanged");
        }
        Ok(record)
    }

    fn delete_app_record(&self, namespace: &str, name: &str) -> StateResult<bool> {
        let key = resource_key(namespace, name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(namespace, name, existed, "application deleted");
        Ok(existed)
    }

    fn list_app_records(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> StateResult<ApplicationList> {
        let prefix = namespace_prefix(namespace);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPLICATIONS).map_err(map_err!(Table))?;
        let mut matches = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                continue;
            }
            let app: Application =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if let Some(needle) = &options.name_contains {
                if !app.name.contains(needle.as_str()) {
                    continue;
                }
            }
            matches.push(app);
        }

        let total = matches.len();
        let mut remaining = matches.into_iter().filter(|app| match &options.continue_from {
            Some(cursor) => app.name.as_str() > cursor.as_str(),
            None => true,
        });
        let limit = options.limit.unwrap_or(usize::MAX);
        let items: Vec<Application> = remaining.by_ref().take(limit).collect();
        let next = match remaining.next() {
            Some(_) => items.last().map(|app| app.name.clone()),
            None => None,
        };
        Ok(ApplicationList { items, total, next })
    }
}

impl ResourceStore for StateStore {
    fn get_application(
        &self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> PluginResult<Application> {
        Ok(self.get_record(APPLICATIONS, namespace, name, version)?)
    }

    fn create_application(&self, namespace: &str, app: &Application) -> PluginResult<Application> {
        Ok(self.create_record(APPLICATIONS, namespace, app)?)
    }

    fn update_application(&self, namespace: &str, app: &Application) -> PluginResult<Application> {
        Ok(self.update_app_record(namespace, app)?)
    }

    fn delete_application(&self, namespace: &str, name: &str) -> PluginResult<bool> {
        Ok(self.delete_app_record(namespace, name)?)
    }

    fn list_application(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> PluginResult<ApplicationList> {
        Ok(self.list_app_records(namespace, options)?)
    }

    fn get_config(
        &self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> PluginResult<Config> {
        Ok(self.get_record(CONFIGS, namespace, name, version)?)
    }

    fn create_config(&self, namespace: &str, config: &Config) -> PluginResult<Config> {
        Ok(self.create_record(CONFIGS, namespace, config)?)
    }

    fn get_secret(
        &self,
        namespace: &str,
        name: &str,
        version: Option<&str>,
    ) -> PluginResult<Secret> {
        Ok(self.get_record(SECRETS, namespace, name, version)?)
    }

    fn create_secret(&self, namespace: &str, secret: &Secret) -> PluginResult<Secret> {
        Ok(self.create_record(SECRETS, namespace, secret)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn test_app(name: &str) -> Application {
        Application {
            name: name.to_string(),
            services: vec![Service {
                name: "svc".to_string(),
                image: "registry.local/svc:1".to_string(),
                volume_mounts: vec![VolumeMount {
                    name: "vol".to_string(),
                    mount_path: "/etc/svc".to_string(),
                    read_only: true,
                }],
            }],
            volumes: vec![Volume::config("vol", "cfg")],
            ..Default::default()
        }
    }

    fn test_config(name: &str) -> Config {
        Config {
            name: name.to_string(),
            data: BTreeMap::from([("conf.yml".to_string(), "level: debug".to_string())]),
            ..Default::default()
        }
    }

    // ── Application CRUD ───────────────────────────────────────────

    #[test]
    fn application_create_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_application("default", &test_app("api")).unwrap();

        assert_eq!(created.namespace, "default");
        assert_eq!(created.version, "1");
        assert!(created.created_at > 0);

        let retrieved = store.get_application("default", "api", None).unwrap();
        assert_eq!(retrieved, created);
    }

    #[test]
    fn application_create_twice_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_application("default", &test_app("api")).unwrap();

        let err = store.create_application("default", &test_app("api")).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyExists { kind: ResourceKind::App, .. }));
    }

    #[test]
    fn application_get_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.get_application("nope", "nothing", None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn application_get_pinned_version() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_application("default", &test_app("api")).unwrap();

        assert!(store.get_application("default", "api", Some(&created.version)).is_ok());
        assert!(store.get_application("default", "api", Some("")).is_ok());
        let err = store.get_application("default", "api", Some("999")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn application_update_bumps_version_on_change() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_application("default", &test_app("api")).unwrap();

        let mut changed = created.clone();
        changed.description = "new description".to_string();
        let updated = store.update_application("default", &changed).unwrap();

        assert_ne!(updated.version, created.version);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.description, "new description");
    }

    #[test]
    fn application_update_without_change_keeps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_application("default", &test_app("api")).unwrap();
        let counter = store.resource_version().unwrap();

        let updated = store.update_application("default", &created).unwrap();
        assert_eq!(updated.version, created.version);
        assert_eq!(store.resource_version().unwrap(), counter);
    }

    #[test]
    fn application_update_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.update_application("default", &test_app("ghost")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn application_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_application("default", &test_app("api")).unwrap();

        assert!(store.delete_application("default", "api").unwrap());
        assert!(!store.delete_application("default", "api").unwrap());
        assert!(store.get_application("default", "api", None).is_err());
    }

    // ── Listing ────────────────────────────────────────────────────

    #[test]
    fn application_list_scoped_to_namespace() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_application("ns1", &test_app("a")).unwrap();
        store.create_application("ns1", &test_app("b")).unwrap();
        store.create_application("ns2", &test_app("c")).unwrap();

        let list = store.list_application("ns1", &ListOptions::default()).unwrap();
        assert_eq!(list.total, 2);
        assert_eq!(list.items.len(), 2);
        assert!(list.next.is_none());
    }

    #[test]
    fn application_list_pages_with_cursor() {
        let store = StateStore::open_in_memory().unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            store.create_application("ns", &test_app(name)).unwrap();
        }

        let mut options = ListOptions {
            limit: Some(2),
            ..Default::default()
        };
        let first = store.list_application("ns", &options).unwrap();
        assert_eq!(first.total, 5);
        let names: Vec<_> = first.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(first.next.as_deref(), Some("b"));

        options.continue_from = Some("d".to_string());
        let last = store.list_application("ns", &options).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].name, "e");
        assert!(last.next.is_none());
    }

    #[test]
    fn application_list_filters_by_name() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_application("ns", &test_app("web-api")).unwrap();
        store.create_application("ns", &test_app("worker")).unwrap();

        let options = ListOptions {
            name_contains: Some("api".to_string()),
            ..Default::default()
        };
        let list = store.list_application("ns", &options).unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].name, "web-api");
    }

    #[test]
    fn namespaces_containing_separators_stay_isolated() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_application("t1", &test_app("x/y")).unwrap();
        store.create_application("t1/x", &test_app("y")).unwrap();

        let nested = store.get_application("t1/x", "y", None).unwrap();
        assert_eq!((nested.namespace.as_str(), nested.name.as_str()), ("t1/x", "y"));
        let outer = store.get_application("t1", "x/y", None).unwrap();
        assert_eq!((outer.namespace.as_str(), outer.name.as_str()), ("t1", "x/y"));

        let list = store.list_application("t1", &ListOptions::default()).unwrap();
        let names: Vec<_> = list.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["x/y"]);

        store.create_config("t1", &test_config("c/d")).unwrap();
        store.create_config("t1/c", &test_config("d")).unwrap();
        assert!(store.get_config("t1", "c", None).unwrap_err().is_not_found());
    }

    #[test]
    fn not_found_reports_readable_key() {
        let store = StateStore::open_in_memory().unwrap();
        match store.get_application("t1", "ghost", None).unwrap_err() {
            PluginError::NotFound { key, .. } => assert_eq!(key, "t1/ghost"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    // ── Config / Secret ────────────────────────────────────────────

    #[test]
    fn config_create_assigns_version_and_namespace() {
        let store = StateStore::open_in_memory().unwrap();
        let created = store.create_config("t1", &test_config("cfg")).unwrap();
        assert_eq!(created.namespace, "t1");
        assert!(!created.version.is_empty());

        let fetched = store.get_config("t1", "cfg", None).unwrap();
        assert_eq!(fetched.data.get("conf.yml").unwrap(), "level: debug");
        assert!(store.get_config("t2", "cfg", None).unwrap_err().is_not_found());
    }

    #[test]
    fn config_create_conflict_in_same_namespace() {
        let store = StateStore::open_in_memory().unwrap();
        store.create_config("t1", &test_config("cfg")).unwrap();
        assert!(store.create_config("t2", &test_config("cfg")).is_ok());

        let err = store.create_config("t1", &test_config("cfg")).unwrap_err();
        assert!(matches!(err, PluginError::AlreadyExists { kind: ResourceKind::Config, .. }));
    }

    #[test]
    fn secret_create_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let secret = Secret {
            name: "creds".to_string(),
            data: BTreeMap::from([("password".to_string(), "hunter2".to_string())]),
            ..Default::default()
        };
        let created = store.create_secret("t1", &secret).unwrap();
        let fetched = store.get_secret("t1", "creds", None).unwrap();
        assert_eq!(fetched.version, created.version);
    }

    #[test]
    fn versions_are_monotonic_across_kinds() {
        let store = StateStore::open_in_memory().unwrap();
        let cfg = store.create_config("ns", &test_config("cfg")).unwrap();
        let app = store.create_application("ns", &test_app("api")).unwrap();

        let cfg_v: u64 = cfg.version.parse().unwrap();
        let app_v: u64 = app.version.parse().unwrap();
        assert!(app_v > cfg_v);
        assert_eq!(store.resource_version().unwrap(), app_v);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("resources.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.create_application("prod", &test_app("api")).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let app = store.get_application("prod", "api", None).unwrap();
        assert_eq!(app.name, "api");
        assert_eq!(store.resource_version().unwrap(), 1);
    }
}
