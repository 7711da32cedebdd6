//! Structured audit trail, decoupled from commit messages.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateReferentLink,
    RemoveReferentLink,
    AddSoftware,
    UpdateSoftware,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateReferentLink => "create_referent_link",
            Operation::RemoveReferentLink => "remove_referent_link",
            Operation::AddSoftware => "add_software",
            Operation::UpdateSoftware => "update_software",
        }
    }
}

/// Emitted once per committed mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub operation: Operation,
    /// Email of the acting referent.
    pub actor: String,
    pub timestamp_ms: u64,
    pub before_version: u64,
    pub after_version: u64,
}
