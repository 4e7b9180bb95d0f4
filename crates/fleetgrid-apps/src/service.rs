//! ApplicationService — create, update, and delete applications while
//! keeping the reference index and history in step with the resource store.
//!
//! Ordering per operation:
//!
//! - **create**: resolve references → reject a taken name → refresh index
//!   (fatal) → persist → record history (best-effort). A failed persist may
//!   leave index entries for an application that does not exist until its
//!   next refresh.
//! - **update**: validate → resolve → persist → refresh index
//!   (best-effort) → record history if the version changed (best-effort).
//! - **delete**: delete (fatal) → clear index (best-effort) → mark history
//!   deleted (best-effort).

use std::sync::Arc;

use fleet_core::*;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::outcome::{Outcome, Step};
use crate::resolve::resolve_references;
use crate::validate::validate;

/// Length of the random suffix appended to a copied config whose name is
/// already taken in the target namespace.
const CONFIG_SUFFIX_LEN: usize = 9;

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

#[derive(Clone)]
pub struct ApplicationService {
    storage: Arc<dyn ResourceStore>,
    history: Arc<dyn HistoryStore>,
    index: Arc<dyn IndexService>,
}

impl ApplicationService {
    pub fn new(
        storage: Arc<dyn ResourceStore>,
        history: Arc<dyn HistoryStore>,
        index: Arc<dyn IndexService>,
    ) -> Self {
        Self {
            storage,
            history,
            index,
        }
    }

    /// Get an application. A missing application is reported as
    /// [`AppError::ResourceNotFound`] whatever the store's wording.
    pub fn get(&self, namespace: &str, name: &str, version: Option<&str>) -> AppResult<Application> {
        self.storage
            .get_application(namespace, name, version)
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::not_found(ResourceKind::App, name)
                } else {
                    AppError::Plugin(e)
                }
            })
    }

    pub fn create(&self, namespace: &str, app: &Application) -> AppResult<Outcome<Application>> {
        let resolved = resolve_references(self.storage.as_ref(), namespace, app)?;
        self.ensure_absent(namespace, &resolved.app.name)?;

        self.index
            .refresh_config_index_by_app(namespace, &resolved.app.name, &resolved.configs)?;
        self.index
            .refresh_secret_index_by_app(namespace, &resolved.app.name, &resolved.secrets)?;

        let created = self.storage.create_application(namespace, &resolved.app)?;
        let mut outcome = Outcome::new(created);
        self.record_history(&mut outcome);

        info!(
            namespace,
            name = %outcome.value.name,
            version = %outcome.value.version,
            "application created"
        );
        Ok(outcome)
    }

    pub fn update(&self, namespace: &str, app: &Application) -> AppResult<Outcome<Application>> {
        validate(app)?;
        let resolved = resolve_references(self.storage.as_ref(), namespace, app)?;

        let updated = self.storage.update_application(namespace, &resolved.app)?;
        let mut outcome = Outcome::new(updated);

        let name = outcome.value.name.clone();
        if let Err(e) = self
            .index
            .refresh_config_index_by_app(namespace, &name, &resolved.configs)
        {
            warn!(namespace, %name, error = %e, "application config index refresh failed");
            outcome.warn(Step::ConfigIndex, e);
        }
        if let Err(e) = self
            .index
            .refresh_secret_index_by_app(namespace, &name, &resolved.secrets)
        {
            warn!(namespace, %name, error = %e, "application secret index refresh failed");
            outcome.warn(Step::SecretIndex, e);
        }

        if app.version != outcome.value.version {
            self.record_history(&mut outcome);
            info!(
                namespace,
                %name,
                from = %app.version,
                to = %outcome.value.version,
                "application updated"
            );
        } else {
            debug!(namespace, %name, version = %app.version, "application unchanged");
        }
        Ok(outcome)
    }

    /// Delete an application. Succeeds once the resource store delete
    /// succeeds, including when the application was already gone.
    pub fn delete(&self, namespace: &str, name: &str, version: &str) -> AppResult<Outcome<()>> {
        let existed = self.storage.delete_application(namespace, name)?;
        if !existed {
            debug!(namespace, name, "application already absent, cleaning up references");
        }

        let mut outcome = Outcome::new(());
        if let Err(e) = self.index.refresh_config_index_by_app(namespace, name, &[]) {
            error!(namespace, name, error = %e, "application clean config index failed");
            outcome.warn(Step::ConfigIndex, e);
        }
        if let Err(e) = self.index.refresh_secret_index_by_app(namespace, name, &[]) {
            error!(namespace, name, error = %e, "application clean secret index failed");
            outcome.warn(Step::SecretIndex, e);
        }

        if let Err(e) = self.history.delete_application(namespace, name, version) {
            error!(namespace, name, version, error = %e, "delete application history failed");
            outcome.warn(Step::History, e);
        }

        info!(namespace, name, version, "application deleted");
        Ok(outcome)
    }

    pub fn list(&self, namespace: &str, options: &ListOptions) -> AppResult<ApplicationList> {
        Ok(self.storage.list_application(namespace, options)?)
    }

    /// Create `app` on top of a `base` template.
    ///
    /// A base from another namespace has its config volumes copied into
    /// `namespace` first. The base's services and volumes precede the
    /// application's own in the result.
    pub fn create_with_base(
        &self,
        namespace: &str,
        app: &Application,
        base: Option<Application>,
    ) -> AppResult<Outcome<Application>> {
        let mut merged = app.clone();
        if let Some(mut base) = base {
            if base.namespace != namespace {
                self.copy_base_configs(namespace, &mut base)?;
            }
            merged.services = base.services.into_iter().chain(app.services.iter().cloned()).collect();
            merged.volumes = base.volumes.into_iter().chain(app.volumes.iter().cloned()).collect();
        }

        validate(&merged)?;
        self.create(namespace, &merged)
    }

    /// Copy every config referenced by `base` into `namespace`, repointing
    /// the base volumes at the copies.
    fn copy_base_configs(&self, namespace: &str, base: &mut Application) -> AppResult<()> {
        let base_namespace = base.namespace.clone();
        for volume in &mut base.volumes {
            let Some(VolumeSource::Config(reference)) = volume.source.as_mut() else {
                continue;
            };

            let mut config = self
                .storage
                .get_config(&base_namespace, &reference.name, None)
                .map_err(|e| {
                    error!(
                        namespace = %base_namespace,
                        name = %reference.name,
                        error = %e,
                        "failed to get base config"
                    );
                    if e.is_not_found() {
                        AppError::ResourceNotFound {
                            kind: ResourceKind::Config,
                            namespace: Some(base_namespace.clone()),
                            name: reference.name.clone(),
                        }
                    } else {
                        AppError::Plugin(e)
                    }
                })?;
            config.namespace = namespace.to_string();

            let copied = match self.storage.create_config(namespace, &config) {
                Ok(copied) => copied,
                Err(e) => {
                    warn!(
                        namespace,
                        name = %config.name,
                        error = %e,
                        "failed to create config copy, retrying under a new name"
                    );
                    config.name = format!("{}-{}", config.name, random_suffix(CONFIG_SUFFIX_LEN));
                    self.storage.create_config(namespace, &config)?
                }
            };
            debug!(
                namespace,
                from = %reference.name,
                to = %copied.name,
                version = %copied.version,
                "base config copied"
            );
            reference.name = copied.name;
            reference.version = copied.version;
        }
        Ok(())
    }

    /// Fail with `AlreadyExists` when `name` is taken, so a duplicate create
    /// never rewrites the live application's index entries.
    fn ensure_absent(&self, namespace: &str, name: &str) -> AppResult<()> {
        match self.storage.get_application(namespace, name, None) {
            Ok(_) => Err(AppError::Plugin(PluginError::AlreadyExists {
                kind: ResourceKind::App,
                key: format!("{namespace}/{name}"),
            })),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn record_history(&self, outcome: &mut Outcome<Application>) {
        if let Err(e) = self.history.create_application(&outcome.value) {
            error!(
                name = %outcome.value.name,
                namespace = %outcome.value.namespace,
                version = %outcome.value.version,
                error = %e,
                "store application history failed"
            );
            outcome.warn(Step::History, e);
        }
    }
}
