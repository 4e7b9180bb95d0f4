//! Version pinning of config and secret references.

use fleet_core::{Application, PluginResult, ResourceStore, VolumeSource};

/// An application with every reference pinned to the current version of
/// its target, plus the names it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub app: Application,
    /// Referenced configs, in volume order.
    pub configs: Vec<String>,
    /// Referenced secrets, in volume order.
    pub secrets: Vec<String>,
}

/// Pin every config/secret reference of `app` to its current version in
/// `namespace`.
///
/// Returns a new application; `app` is left untouched. The first failed
/// lookup aborts resolution.
pub fn resolve_references(
    storage: &dyn ResourceStore,
    namespace: &str,
    app: &Application,
) -> PluginResult<Resolved> {
    let mut resolved = app.clone();
    let mut configs = Vec::new();
    let mut secrets = Vec::new();

    for volume in &mut resolved.volumes {
        match &mut volume.source {
            Some(VolumeSource::Config(reference)) => {
                let config = storage.get_config(namespace, &reference.name, None)?;
                reference.version = config.version;
                configs.push(reference.name.clone());
            }
            Some(VolumeSource::Secret(reference)) => {
                let secret = storage.get_secret(namespace, &reference.name, None)?;
                reference.version = secret.version;
                secrets.push(reference.name.clone());
            }
            Some(VolumeSource::HostPath { .. }) | None => {}
        }
    }

    Ok(Resolved {
        app: resolved,
        configs,
        secrets,
    })
}
