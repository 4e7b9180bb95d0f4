//! fleetgrid-apps — lifecycle of Application resources.
//!
//! [`ApplicationService`] orchestrates three collaborators: the resource
//! store, the config/secret reverse index, and the history store. No
//! operation is atomic across them; each one fixes the order of its side
//! effects and which collaborator failures abort the call. Failures that
//! do not abort are logged and returned as [`Warning`]s on an
//! [`Outcome`].

pub mod error;
pub mod outcome;
pub mod plugin;
pub mod resolve;
pub mod service;
pub mod validate;

pub use error::{AppError, AppResult, NameScope};
pub use outcome::{Outcome, Step, Warning};
pub use plugin::Plugins;
pub use resolve::{Resolved, resolve_references};
pub use service::ApplicationService;
pub use validate::validate;
