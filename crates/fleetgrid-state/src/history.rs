//! HistoryLog — append-only record of application versions.
//!
//! Kept in its own redb database so the audit trail survives independently
//! of the resource store. Records are never removed; deleting an
//! application marks its last version deleted.

use std::path::Path;
use std::sync::Arc;

use fleet_core::{Application, HistoryStore, PluginResult, namespace_prefix};
use redb::{Database, ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{map_err, unix_now};
use crate::tables::HISTORY;

/// One recorded application version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    pub namespace: String,
    pub name: String,
    pub version: String,
    /// Snapshot of the application; absent for tombstones of versions
    /// that were never recorded.
    pub application: Option<Application>,
    pub deleted: bool,
    /// Unix timestamp of the last change to this record.
    pub recorded_at: u64,
}

impl HistoryRecord {
    /// Build the composite key for the history table.
    pub fn table_key(&self) -> String {
        history_key(&self.namespace, &self.name, &self.version)
    }
}

/// Prefix of every history key of one application. Both parts are
/// length-prefixed so one application's prefix never matches another's.
fn history_prefix(namespace: &str, name: &str) -> String {
    format!("{}{}:{name}:", namespace_prefix(namespace), name.len())
}

/// Versions are left-padded so keys sort in version order.
fn history_key(namespace: &str, name: &str, version: &str) -> String {
    format!("{}{version:0>20}", history_prefix(namespace, name))
}

/// Thread-safe history store backed by redb.
#[derive(Clone)]
pub struct HistoryLog {
    db: Arc<Database>,
}

impl HistoryLog {
    /// Open (or create) a persistent history log at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let log = Self { db: Arc::new(db) };
        log.ensure_tables()?;
        debug!(?path, "history log opened");
        Ok(log)
    }

    /// Create an ephemeral in-memory history log.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let log = Self { db: Arc::new(db) };
        log.ensure_tables()?;
        debug!("in-memory history log opened");
        Ok(log)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(HISTORY).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or overwrite a history record.
    pub fn put_record(&self, record: &HistoryRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, deleted = record.deleted, "history recorded");
        Ok(())
    }

    /// Get the record for one application version.
    pub fn get_record(
        &self,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> StateResult<Option<HistoryRecord>> {
        let key = history_key(namespace, name, version);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: HistoryRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// All recorded versions of one application, oldest first.
    pub fn list_history(&self, namespace: &str, name: &str) -> StateResult<Vec<HistoryRecord>> {
        let prefix = history_prefix(namespace, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: HistoryRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Mark one version deleted, writing a tombstone if it was never
    /// recorded. Read and write share one write transaction.
    fn mark_deleted(&self, namespace: &str, name: &str, version: &str) -> StateResult<bool> {
        let key = history_key(namespace, name, version);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut table = txn.open_table(HISTORY).map_err(map_err!(Table))?;
            let existing: Option<HistoryRecord> = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            let existed = existing.is_some();
            let record = match existing {
                Some(mut record) => {
                    record.deleted = true;
                    record.recorded_at = unix_now();
                    record
                }
                None => HistoryRecord {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                    application: None,
                    deleted: true,
                    recorded_at: unix_now(),
                },
            };
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            existed
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(namespace, name, version, existed, "history marked deleted");
        Ok(existed)
    }
}

impl HistoryStore for HistoryLog {
    fn create_application(&self, app: &Application) -> PluginResult<()> {
        let record = HistoryRecord {
            namespace: app.namespace.clone(),
            name: app.name.clone(),
            version: app.version.clone(),
            application: Some(app.clone()),
            deleted: false,
            recorded_at: unix_now(),
        };
        Ok(self.put_record(&record)?)
    }

    fn delete_application(&self, namespace: &str, name: &str, version: &str) -> PluginResult<bool> {
        Ok(self.mark_deleted(namespace, name, version)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app(name: &str, version: &str) -> Application {
        Application {
            namespace: "ns".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn history_lists_versions_in_order() {
        let log = HistoryLog::open_in_memory().unwrap();
        for version in ["10", "9", "11"] {
            log.create_application(&test_app("api", version)).unwrap();
        }
        log.create_application(&test_app("api-other", "1")).unwrap();

        let versions: Vec<_> = log
            .list_history("ns", "api")
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, ["9", "10", "11"]);
    }

    #[test]
    fn delete_marks_recorded_version() {
        let log = HistoryLog::open_in_memory().unwrap();
        log.create_application(&test_app("api", "3")).unwrap();

        assert!(log.delete_application("ns", "api", "3").unwrap());
        let record = log.get_record("ns", "api", "3").unwrap().unwrap();
        assert!(record.deleted);
        assert!(record.application.is_some());
    }

    #[test]
    fn delete_of_unrecorded_version_writes_tombstone() {
        let log = HistoryLog::open_in_memory().unwrap();

        assert!(!log.delete_application("ns", "ghost", "5").unwrap());
        let history = log.list_history("ns", "ghost").unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].deleted);
        assert!(history[0].application.is_none());
    }

    #[test]
    fn history_is_scoped_to_exact_application() {
        let log = HistoryLog::open_in_memory().unwrap();
        log.create_application(&test_app("a", "1")).unwrap();
        log.create_application(&test_app("a:b", "2")).unwrap();
        let mut nested = test_app("b", "3");
        nested.namespace = "ns/a".to_string();
        log.create_application(&nested).unwrap();

        let history = log.list_history("ns", "a").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, "1");
        assert_eq!(log.list_history("ns", "a:b").unwrap().len(), 1);
        assert!(log.list_history("ns", "a/b").unwrap().is_empty());
    }

    #[test]
    fn delete_twice_keeps_one_record() {
        let log = HistoryLog::open_in_memory().unwrap();
        log.create_application(&test_app("api", "4")).unwrap();

        assert!(log.delete_application("ns", "api", "4").unwrap());
        assert!(log.delete_application("ns", "api", "4").unwrap());
        let history = log.list_history("ns", "api").unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].deleted);
        assert!(history[0].application.is_some());
    }

    #[test]
    fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.redb");
        {
            let log = HistoryLog::open(&path).unwrap();
            log.create_application(&test_app("api", "1")).unwrap();
        }
        let log = HistoryLog::open(&path).unwrap();
        assert_eq!(log.list_history("ns", "api").unwrap().len(), 1);
    }
}
