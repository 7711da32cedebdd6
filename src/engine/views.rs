//! Read-only projections of the current state.
//!
//! Pure functions of `State`, recomputed by the cell on every install.

use std::collections::BTreeMap;

use crate::core::{CompiledReferent, SoftwareId, State, StrippedSoftware};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedViews {
    pub referents_by_software_id: BTreeMap<SoftwareId, Vec<CompiledReferent>>,
    pub catalog_without_referents: Vec<StrippedSoftware>,
}

impl DerivedViews {
    pub fn derive(state: &State) -> Self {
        Self {
            referents_by_software_id: referents_by_software_id(state),
            catalog_without_referents: strip_referents(state),
        }
    }
}

pub fn referents_by_software_id(state: &State) -> BTreeMap<SoftwareId, Vec<CompiledReferent>> {
    state
        .compiled_data
        .catalog
        .iter()
        .map(|software| (software.id(), software.referents.clone()))
        .collect()
}

pub fn strip_referents(state: &State) -> Vec<StrippedSoftware> {
    state
        .compiled_data
        .catalog
        .iter()
        .map(|software| software.without_referents())
        .collect()
}
