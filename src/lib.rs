#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod store;
pub mod telemetry;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    CompiledData, CompiledReferent, CompiledSoftware, Db, Dereferencing, MimGroup, Patch,
    ReferentRow, ServiceRow, SoftwareDraft, SoftwareId, SoftwarePatch, SoftwareRef,
    SoftwareReferentRow, SoftwareRow, State, StrippedSoftware, TestUrl, WallClock,
};
pub use crate::engine::{
    AuditRecord, BuildDispatch, BuildDispatcher, CatalogBuilder, DerivedViews, Engine, OpError,
    Operation, Outcome, RebuildScheduler, RowJoinBuilder, StateCell, StateChange, TriggerHandle,
};
pub use crate::store::{GitRowStore, MemoryRowStore, RowStore, StoreError};
