//! Data model: raw rows (the system of record) and the compiled catalog
//! derived from them.

pub mod catalog;
pub mod patch;
pub mod row;
pub mod time;

pub use catalog::{CompiledData, CompiledReferent, CompiledSoftware, State, StrippedSoftware};
pub use patch::{ClearRequired, Patch, SoftwarePatch};
pub use row::{
    Db, Dereferencing, MimGroup, ReferentRow, ServiceRow, SoftwareDraft, SoftwareId, SoftwareRef,
    SoftwareReferentRow, SoftwareRow, TestUrl,
};
pub use time::WallClock;
