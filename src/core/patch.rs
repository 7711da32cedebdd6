//! Field-level patches for software updates.
//!
//! A patch distinguishes "leave the field alone" (absent in JSON) from
//! "clear the field" (explicit null) from "set a new value".

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::row::{Dereferencing, MimGroup, SoftwareRef, SoftwareRow, TestUrl};

#[derive(Clone, Debug, PartialEq)]
pub enum Patch<T> {
    /// Don't change the field.
    Keep,
    /// Clear the field (set to None).
    Clear,
    /// Set the field to a new value.
    Set(T),
}

// Not derived: the derive would demand T: Default for no reason.
impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Keep
    }
}

impl<T> Patch<T> {
    /// Check if this patch would change the value.
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }

    /// Apply the patch to a current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Keep => current,
            Patch::Clear => None,
            Patch::Set(v) => Some(v),
        }
    }
}

// Custom serde for Patch: absent = Keep, null = Clear, value = Set
impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Patch::Keep => serializer.serialize_none(),
            Patch::Clear => serializer.serialize_none(),
            Patch::Set(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        })
    }
}

/// A required field received an explicit null.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot clear required field {0}")]
pub struct ClearRequired(pub &'static str);

/// Partial update of a software row. `id` and `referencedSinceTime` are
/// owned by the lifecycle and cannot be patched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftwarePatch {
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub name: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub function: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub dereferencing: Patch<Dereferencing>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub is_still_in_observation: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub parent_software: Patch<SoftwareRef>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub is_from_french_public_service: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub is_present_in_support_contract: Patch<bool>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub alike_softwares: Patch<Vec<SoftwareRef>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub wikidata_id: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub comptoir_du_libre_id: Patch<u64>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub license: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub context_of_use: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub catalog_numerique_gouv_fr_id: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub mim_group: Patch<MimGroup>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub version_min: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub workshop_urls: Patch<Vec<String>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub test_urls: Patch<Vec<TestUrl>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub use_case_urls: Patch<Vec<String>>,
    #[serde(skip_serializing_if = "Patch::is_keep")]
    pub agent_workstation: Patch<bool>,
}

impl SoftwarePatch {
    /// Merge onto an existing row, field by field.
    ///
    /// Required fields reject `Clear`; list fields treat `Clear` as empty.
    pub fn apply(self, row: &mut SoftwareRow) -> Result<(), ClearRequired> {
        required("name", self.name, &mut row.name)?;
        required("function", self.function, &mut row.function)?;
        optional(self.dereferencing, &mut row.dereferencing);
        required(
            "isStillInObservation",
            self.is_still_in_observation,
            &mut row.is_still_in_observation,
        )?;
        optional(self.parent_software, &mut row.parent_software);
        required(
            "isFromFrenchPublicService",
            self.is_from_french_public_service,
            &mut row.is_from_french_public_service,
        )?;
        required(
            "isPresentInSupportContract",
            self.is_present_in_support_contract,
            &mut row.is_present_in_support_contract,
        )?;
        list(self.alike_softwares, &mut row.alike_softwares);
        optional(self.wikidata_id, &mut row.wikidata_id);
        optional(self.comptoir_du_libre_id, &mut row.comptoir_du_libre_id);
        required("license", self.license, &mut row.license)?;
        optional(self.context_of_use, &mut row.context_of_use);
        optional(
            self.catalog_numerique_gouv_fr_id,
            &mut row.catalog_numerique_gouv_fr_id,
        );
        required("mimGroup", self.mim_group, &mut row.mim_group)?;
        required("versionMin", self.version_min, &mut row.version_min)?;
        list(self.workshop_urls, &mut row.workshop_urls);
        list(self.test_urls, &mut row.test_urls);
        list(self.use_case_urls, &mut row.use_case_urls);
        required(
            "agentWorkstation",
            self.agent_workstation,
            &mut row.agent_workstation,
        )?;
        Ok(())
    }
}

fn required<T>(field: &'static str, patch: Patch<T>, slot: &mut T) -> Result<(), ClearRequired> {
    match patch {
        Patch::Keep => Ok(()),
        Patch::Clear => Err(ClearRequired(field)),
        Patch::Set(v) => {
            *slot = v;
            Ok(())
        }
    }
}

fn optional<T>(patch: Patch<T>, slot: &mut Option<T>) {
    if !patch.is_keep() {
        *slot = patch.apply(slot.take());
    }
}

fn list<T>(patch: Patch<Vec<T>>, slot: &mut Vec<T>) {
    match patch {
        Patch::Keep => {}
        Patch::Clear => slot.clear(),
        Patch::Set(v) => *slot = v,
    }
}
