//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, bail};
use fleet_core::*;
use fleetgrid_apps::{AppError, ApplicationService, Outcome, Plugins};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{AppAction, Command, DataAction, RefTarget};

/// Run one command and return its JSON output.
pub(crate) fn run(config: &FleetConfig, command: Command) -> anyhow::Result<String> {
    let plugins = Plugins::from_config(config)?;
    let service = plugins.application_service();

    match command {
        Command::App { action } => app(&plugins, &service, action),
        Command::Config { action } => match action {
            DataAction::Get { name, namespace } => {
                render(&plugins.store.get_config(&namespace, &name, None)?)
            }
            DataAction::Create { namespace, file } => {
                let config: Config = read_json(&file)?;
                render(&plugins.store.create_config(&namespace, &config)?)
            }
        },
        Command::Secret { action } => match action {
            DataAction::Get { name, namespace } => {
                render(&plugins.store.get_secret(&namespace, &name, None)?)
            }
            DataAction::Create { namespace, file } => {
                let secret: Secret = read_json(&file)?;
                render(&plugins.store.create_secret(&namespace, &secret)?)
            }
        },
        Command::Refs { target } => match target {
            RefTarget::Config { name, namespace } => {
                render(&plugins.store.list_apps_by_config(&namespace, &name)?)
            }
            RefTarget::Secret { name, namespace } => {
                render(&plugins.store.list_apps_by_secret(&namespace, &name)?)
            }
        },
    }
}

fn app(plugins: &Plugins, service: &ApplicationService, action: AppAction) -> anyhow::Result<String> {
    match action {
        AppAction::Get {
            name,
            namespace,
            version,
        } => render(&service.get(&namespace, &name, version.as_deref())?),
        AppAction::Create {
            namespace,
            file,
            base,
            base_namespace,
        } => {
            let app: Application = read_json(&file)?;
            let outcome = match base {
                Some(base) => {
                    let base_namespace = base_namespace.unwrap_or_else(|| namespace.clone());
                    let base = service.get(&base_namespace, &base, None)?;
                    service.create_with_base(&namespace, &app, Some(base))?
                }
                None => service.create(&namespace, &app)?,
            };
            render(&report(outcome))
        }
        AppAction::Update { namespace, file } => {
            let app: Application = read_json(&file)?;
            render(&report(service.update(&namespace, &app)?))
        }
        AppAction::Delete {
            name,
            namespace,
            version,
        } => {
            let version = match version {
                Some(version) => version,
                None => match service.get(&namespace, &name, None) {
                    Ok(app) => app.version,
                    Err(AppError::ResourceNotFound { .. }) => String::new(),
                    Err(e) => return Err(e.into()),
                },
            };
            report(service.delete(&namespace, &name, &version)?);
            render(&serde_json::json!({
                "deleted": name,
                "namespace": namespace,
                "version": version,
            }))
        }
        AppAction::List {
            namespace,
            name_contains,
            limit,
            continue_from,
        } => {
            let options = ListOptions {
                name_contains,
                limit,
                continue_from,
            };
            render(&service.list(&namespace, &options)?)
        }
        AppAction::History { name, namespace } => match &plugins.history {
            Some(log) => render(&log.list_history(&namespace, &name)?),
            None => bail!("history is disabled in this configuration"),
        },
    }
}

/// Log swallowed failures and unwrap the value.
fn report<T>(outcome: Outcome<T>) -> T {
    for warning in &outcome.warnings {
        warn!(step = %warning.step, error = %warning.error, "best-effort step failed");
    }
    outcome.into_inner()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn render<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
