//! fleetgrid-state — embedded stores for FleetGrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides the three collaborators
//! the application service depends on:
//!
//! - [`StateStore`] — applications, configs, and secrets, plus the
//!   config/secret reverse index kept in the same database.
//! - [`HistoryLog`] — append-only record of application versions, usually
//!   in its own database file.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{namespace}/{name}`, `{namespace}/{name}:{version}`)
//! enable prefix scans for related records. Every write to the resource
//! tables draws the next value of a single resource-version counter.
//!
//! Both stores are `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod history;
pub mod index;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use history::{HistoryLog, HistoryRecord};
pub use store::StateStore;
