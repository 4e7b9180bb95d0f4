//! Name invariants of an application.

use std::collections::HashSet;

use fleet_core::Application;

use crate::error::{AppError, AppResult, NameScope};

/// Check volume and service names of `app`.
///
/// All volumes are collected before any service is checked, so a mount may
/// name a volume declared anywhere in the application. The first violation
/// is returned.
pub fn validate(app: &Application) -> AppResult<()> {
    let mut volumes = HashSet::new();
    for volume in &app.volumes {
        if !volumes.insert(volume.name.as_str()) {
            return Err(AppError::AppNameConflict {
                scope: NameScope::Volumes,
                name: volume.name.clone(),
            });
        }
    }

    let mut services = HashSet::new();
    for service in &app.services {
        if !services.insert(service.name.as_str()) {
            return Err(AppError::AppNameConflict {
                scope: NameScope::Services,
                name: service.name.clone(),
            });
        }
        for mount in &service.volume_mounts {
            if !volumes.contains(mount.name.as_str()) {
                return Err(AppError::VolumeNotFoundWhenMount {
                    name: mount.name.clone(),
                });
            }
        }
    }

    Ok(())
}
