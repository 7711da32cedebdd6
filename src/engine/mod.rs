//! The state-sync and mutation engine.
//!
//! Provides:
//! - `StateCell` - versioned snapshot cache with change notification
//! - `views` - read-only projections recomputed on every change
//! - `Engine` - the four write operations behind a single-writer gate
//! - `RebuildScheduler` - periodic/manual out-of-band rebuild dispatch

pub mod audit;
pub mod builder;
pub mod error;
pub mod mutation;
pub mod state;
pub mod trigger;
pub mod views;

pub use audit::{AuditRecord, Operation};
pub use builder::{BuildError, CatalogBuilder, RowJoinBuilder};
pub use error::OpError;
pub use mutation::{Engine, Outcome};
pub use state::{StateCell, StateChange};
pub use trigger::{BuildDispatch, BuildDispatcher, DispatchError, RebuildScheduler, TriggerHandle};
pub use views::DerivedViews;
