//! Compiled catalog: the derived, read-oriented view of the rows.
//!
//! Produced by a catalog builder, never mutated directly. Enrichment
//! fields (`wikidataData`, `comptoirDuLibreSoftware`) come from an
//! out-of-band pipeline and are carried forward across local recomputes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::row::{Db, ReferentRow, SoftwareId, SoftwareRow};

/// A referent as exposed by the catalog: the row plus its relation fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledReferent {
    #[serde(flatten)]
    pub referent: ReferentRow,
    pub is_expert: bool,
    pub use_case_description: String,
}

/// One catalog entry: the raw row enriched with referents and whatever
/// the out-of-band pipeline attached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSoftware {
    #[serde(flatten)]
    pub row: SoftwareRow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comptoir_du_libre_software: Option<Value>,
    pub referents: Vec<CompiledReferent>,
}

impl CompiledSoftware {
    pub fn id(&self) -> SoftwareId {
        self.row.id
    }

    /// Privacy-stripped variant: referent identity replaced by a count.
    pub fn without_referents(&self) -> StrippedSoftware {
        StrippedSoftware {
            row: self.row.clone(),
            wikidata_data: self.wikidata_data.clone(),
            comptoir_du_libre_software: self.comptoir_du_libre_software.clone(),
            referent_count: self.referents.len(),
        }
    }
}

/// Catalog entry for contexts that must not expose referent identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrippedSoftware {
    #[serde(flatten)]
    pub row: SoftwareRow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comptoir_du_libre_software: Option<Value>,
    pub referent_count: usize,
}

/// The compiled artifact, as produced by the build pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledData {
    pub catalog: Vec<CompiledSoftware>,
}

impl CompiledData {
    pub fn entry(&self, id: SoftwareId) -> Option<&CompiledSoftware> {
        self.catalog.iter().find(|software| software.id() == id)
    }
}

/// The unit held by the state cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct State {
    pub compiled_data: CompiledData,
    pub db: Db,
}
