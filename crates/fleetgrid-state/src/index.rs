//! Config/secret reverse index kept alongside the resource tables.
//!
//! For every (namespace, resource) the index holds the set of application
//! names referencing it. Each application's last contribution is stored
//! too, so a refresh can retract stale entries without scanning the whole
//! index. A refresh runs in a single write transaction.

use std::collections::BTreeSet;

use fleet_core::{IndexService, PluginResult, resource_key};
use redb::{ReadableDatabase, ReadableTable, Table};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{StateStore, map_err};
use crate::tables::*;

type JsonRows<'txn> = Table<'txn, &'static str, &'static [u8]>;

/// Load the JSON set at `key`, apply `f`, and write it back (or drop the
/// row when the set ends up empty).
fn update_members(
    table: &mut JsonRows<'_>,
    key: &str,
    f: impl FnOnce(&mut BTreeSet<String>),
) -> StateResult<()> {
    let mut members: BTreeSet<String> = match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
        None => BTreeSet::new(),
    };
    f(&mut members);
    if members.is_empty() {
        table.remove(key).map_err(map_err!(Write))?;
    } else {
        let value = serde_json::to_vec(&members).map_err(map_err!(Serialize))?;
        table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
    }
    Ok(())
}

impl StateStore {
    fn refresh_index(
        &self,
        index_def: JsonTable,
        refs_def: JsonTable,
        namespace: &str,
        app_name: &str,
        names: &[String],
    ) -> StateResult<()> {
        let app_key = resource_key(namespace, app_name);
        let wanted: BTreeSet<String> = names.iter().cloned().collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut refs = txn.open_table(refs_def).map_err(map_err!(Table))?;
            let mut index = txn.open_table(index_def).map_err(map_err!(Table))?;

            let previous: BTreeSet<String> = match refs.get(app_key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => BTreeSet::new(),
            };

            for stale in previous.difference(&wanted) {
                update_members(&mut index, &resource_key(namespace, stale), |set| {
                    set.remove(app_name);
                })?;
            }
            for name in &wanted {
                update_members(&mut index, &resource_key(namespace, name), |set| {
                    set.insert(app_name.to_string());
                })?;
            }

            if wanted.is_empty() {
                refs.remove(app_key.as_str()).map_err(map_err!(Write))?;
            } else {
                let value = serde_json::to_vec(&wanted).map_err(map_err!(Serialize))?;
                refs.insert(app_key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(namespace, app = app_name, refs = wanted.len(), "reference index refreshed");
        Ok(())
    }

    fn index_members(
        &self,
        index_def: JsonTable,
        namespace: &str,
        name: &str,
    ) -> StateResult<Vec<String>> {
        let key = resource_key(namespace, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(index_def).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let members: BTreeSet<String> =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(members.into_iter().collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Applications in `namespace` currently referencing config `name`.
    pub fn list_apps_by_config(&self, namespace: &str, name: &str) -> StateResult<Vec<String>> {
        self.index_members(CONFIG_INDEX, namespace, name)
    }

    /// Applications in `namespace` currently referencing secret `name`.
    pub fn list_apps_by_secret(&self, namespace: &str, name: &str) -> StateResult<Vec<String>> {
        self.index_members(SECRET_INDEX, namespace, name)
    }
}

impl IndexService for StateStore {
    fn refresh_config_index_by_app(
        &self,
        namespace: &str,
        app_name: &str,
        config_names: &[String],
    ) -> PluginResult<()> {
        Ok(self.refresh_index(CONFIG_INDEX, APP_CONFIG_REFS, namespace, app_name, config_names)?)
    }

    fn refresh_secret_index_by_app(
        &self,
        namespace: &str,
        app_name: &str,
        secret_names: &[String],
    ) -> PluginResult<()> {
        Ok(self.refresh_index(SECRET_INDEX, APP_SECRET_REFS, namespace, app_name, secret_names)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn refresh_adds_app_to_each_config() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .refresh_config_index_by_app("ns", "app1", &names(&["c1", "c2"]))
            .unwrap();

        assert_eq!(store.list_apps_by_config("ns", "c1").unwrap(), ["app1"]);
        assert_eq!(store.list_apps_by_config("ns", "c2").unwrap(), ["app1"]);
        assert!(store.list_apps_by_config("other", "c1").unwrap().is_empty());
    }

    #[test]
    fn refresh_replaces_previous_contribution() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .refresh_config_index_by_app("ns", "app1", &names(&["c1", "c2"]))
            .unwrap();
        store
            .refresh_config_index_by_app("ns", "app1", &names(&["c2", "c3"]))
            .unwrap();

        assert!(store.list_apps_by_config("ns", "c1").unwrap().is_empty());
        assert_eq!(store.list_apps_by_config("ns", "c2").unwrap(), ["app1"]);
        assert_eq!(store.list_apps_by_config("ns", "c3").unwrap(), ["app1"]);
    }

    #[test]
    fn refresh_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        for _ in 0..2 {
            store
                .refresh_secret_index_by_app("ns", "app1", &names(&["s1", "s1"]))
                .unwrap();
        }
        assert_eq!(store.list_apps_by_secret("ns", "s1").unwrap(), ["app1"]);
    }

    #[test]
    fn empty_refresh_clears_only_that_app() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .refresh_config_index_by_app("ns", "app1", &names(&["shared"]))
            .unwrap();
        store
            .refresh_config_index_by_app("ns", "app2", &names(&["shared"]))
            .unwrap();

        store.refresh_config_index_by_app("ns", "app1", &[]).unwrap();
        assert_eq!(store.list_apps_by_config("ns", "shared").unwrap(), ["app2"]);

        store.refresh_config_index_by_app("ns", "app2", &[]).unwrap();
        assert!(store.list_apps_by_config("ns", "shared").unwrap().is_empty());
    }

    #[test]
    fn separators_in_names_do_not_merge_entries() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .refresh_config_index_by_app("t1", "app1", &names(&["c/d"]))
            .unwrap();
        store
            .refresh_config_index_by_app("t1/c", "app2", &names(&["d"]))
            .unwrap();

        assert_eq!(store.list_apps_by_config("t1", "c/d").unwrap(), ["app1"]);
        assert_eq!(store.list_apps_by_config("t1/c", "d").unwrap(), ["app2"]);

        store.refresh_config_index_by_app("t1/c", "app2", &[]).unwrap();
        assert_eq!(store.list_apps_by_config("t1", "c/d").unwrap(), ["app1"]);
    }

    #[test]
    fn config_and_secret_indexes_are_separate() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .refresh_config_index_by_app("ns", "app1", &names(&["x"]))
            .unwrap();
        store.refresh_secret_index_by_app("ns", "app1", &[]).unwrap();

        assert_eq!(store.list_apps_by_config("ns", "x").unwrap(), ["app1"]);
        assert!(store.list_apps_by_secret("ns", "x").unwrap().is_empty());
    }
}
