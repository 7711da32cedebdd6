//! Raw row types, persisted as pretty-printed JSON arrays.
//!
//! Field declaration order matters: it is the order the JSON files carry,
//! and the data repository is diffed by humans.

use serde::de;
use serde::{Deserialize, Serialize};

use super::time::WallClock;

pub type SoftwareId = u64;

/// Reference to another software, catalogued or not.
///
/// Serializes as `{"isKnown": true, "softwareId": n}` or
/// `{"isKnown": false, "softwareName": s}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoftwareRef {
    Known { software_id: SoftwareId },
    Unknown { software_name: String },
}

impl Serialize for SoftwareRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            SoftwareRef::Known { software_id } => {
                let mut st = serializer.serialize_struct("SoftwareRef", 2)?;
                st.serialize_field("isKnown", &true)?;
                st.serialize_field("softwareId", software_id)?;
                st.end()
            }
            SoftwareRef::Unknown { software_name } => {
                let mut st = serializer.serialize_struct("SoftwareRef", 2)?;
                st.serialize_field("isKnown", &false)?;
                st.serialize_field("softwareName", software_name)?;
                st.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSoftwareRef {
    is_known: bool,
    #[serde(default)]
    software_id: Option<SoftwareId>,
    #[serde(default)]
    software_name: Option<String>,
}

impl<'de> Deserialize<'de> for SoftwareRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawSoftwareRef::deserialize(deserializer)?;
        match raw {
            RawSoftwareRef {
                is_known: true,
                software_id: Some(software_id),
                ..
            } => Ok(SoftwareRef::Known { software_id }),
            RawSoftwareRef {
                is_known: false,
                software_name: Some(software_name),
                ..
            } => Ok(SoftwareRef::Unknown { software_name }),
            RawSoftwareRef { is_known: true, .. } => Err(de::Error::missing_field("softwareId")),
            RawSoftwareRef { .. } => Err(de::Error::missing_field("softwareName")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimGroup {
    MIMO,
    MIMDEV,
    MIMPROD,
    MIMDEVOPS,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dereferencing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub time: WallClock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recommended_version: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUrl {
    pub description: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareRow {
    pub id: SoftwareId,
    pub name: String,
    pub function: String,
    pub referenced_since_time: WallClock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dereferencing: Option<Dereferencing>,
    pub is_still_in_observation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_software: Option<SoftwareRef>,
    pub is_from_french_public_service: bool,
    pub is_present_in_support_contract: bool,
    pub alike_softwares: Vec<SoftwareRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comptoir_du_libre_id: Option<u64>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_of_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_numerique_gouv_fr_id: Option<String>,
    pub mim_group: MimGroup,
    pub version_min: String,
    pub workshop_urls: Vec<String>,
    pub test_urls: Vec<TestUrl>,
    pub use_case_urls: Vec<String>,
    pub agent_workstation: bool,
}

/// Caller-supplied fields when referencing a new software.
///
/// Everything the lifecycle owns (`id`, `referencedSinceTime`, observation
/// and support-contract flags, list fields, `mimGroup`) is seeded by the
/// engine, not by the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftwareDraft {
    pub name: String,
    pub function: String,
    pub license: String,
    pub version_min: String,
    pub is_from_french_public_service: bool,
    pub agent_workstation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_software: Option<SoftwareRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wikidata_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comptoir_du_libre_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_of_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_numerique_gouv_fr_id: Option<String>,
}

impl SoftwareDraft {
    /// Build the full row: allocated id, seeded defaults, caller fields.
    pub fn into_row(self, id: SoftwareId, referenced_since_time: WallClock) -> SoftwareRow {
        SoftwareRow {
            id,
            name: self.name,
            function: self.function,
            referenced_since_time,
            dereferencing: None,
            is_still_in_observation: false,
            parent_software: self.parent_software,
            is_from_french_public_service: self.is_from_french_public_service,
            is_present_in_support_contract: false,
            alike_softwares: Vec::new(),
            wikidata_id: self.wikidata_id,
            comptoir_du_libre_id: self.comptoir_du_libre_id,
            license: self.license,
            context_of_use: self.context_of_use,
            catalog_numerique_gouv_fr_id: self.catalog_numerique_gouv_fr_id,
            mim_group: MimGroup::MIMO,
            version_min: self.version_min,
            workshop_urls: Vec::new(),
            test_urls: Vec::new(),
            use_case_urls: Vec::new(),
            agent_workstation: self.agent_workstation,
        }
    }
}

/// A person associated with software entries, unique by email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentRow {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_alt: Option<String>,
}

/// Join row: this referent is associated with this software.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareReferentRow {
    pub software_id: SoftwareId,
    pub referent_email: String,
    pub is_expert: bool,
    pub use_case_description: String,
}

/// Opaque to the mutation engine: read and persisted verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceRow(pub serde_json::Value);

/// The four collections - the system of record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Db {
    pub software_rows: Vec<SoftwareRow>,
    pub referent_rows: Vec<ReferentRow>,
    pub software_referent_rows: Vec<SoftwareReferentRow>,
    pub service_rows: Vec<ServiceRow>,
}

impl Db {
    pub fn software(&self, id: SoftwareId) -> Option<&SoftwareRow> {
        self.software_rows.iter().find(|row| row.id == id)
    }

    pub fn software_mut(&mut self, id: SoftwareId) -> Option<&mut SoftwareRow> {
        self.software_rows.iter_mut().find(|row| row.id == id)
    }

    /// Next software id: max of existing ids, or 0, plus one.
    pub fn next_software_id(&self) -> SoftwareId {
        self.software_rows
            .iter()
            .map(|row| row.id)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn relation(&self, software_id: SoftwareId, email: &str) -> Option<&SoftwareReferentRow> {
        self.software_referent_rows
            .iter()
            .find(|row| row.software_id == software_id && row.referent_email == email)
    }

    pub fn relation_mut(
        &mut self,
        software_id: SoftwareId,
        email: &str,
    ) -> Option<&mut SoftwareReferentRow> {
        self.software_referent_rows
            .iter_mut()
            .find(|row| row.software_id == software_id && row.referent_email == email)
    }

    pub fn is_referent(&self, email: &str) -> bool {
        self.software_referent_rows
            .iter()
            .any(|row| row.referent_email == email)
    }

    /// Insert the referent row unless one with the same email exists.
    pub fn upsert_referent(&mut self, referent: ReferentRow) {
        if !self
            .referent_rows
            .iter()
            .any(|row| row.email == referent.email)
        {
            self.referent_rows.push(referent);
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_software_row() -> SoftwareRow {
    SoftwareRow {
        id: 1,
        name: "Foo".into(),
        function: "text editing".into(),
        referenced_since_time: WallClock(1_600_000_000_000),
        dereferencing: None,
        is_still_in_observation: false,
        parent_software: None,
        is_from_french_public_service: false,
        is_present_in_support_contract: false,
        alike_softwares: vec![SoftwareRef::Unknown {
            software_name: "Baz".into(),
        }],
        wikidata_id: None,
        comptoir_du_libre_id: None,
        license: "MIT".into(),
        context_of_use: None,
        catalog_numerique_gouv_fr_id: None,
        mim_group: MimGroup::MIMO,
        version_min: "7.0".into(),
        workshop_urls: Vec::new(),
        test_urls: Vec::new(),
        use_case_urls: Vec::new(),
        agent_workstation: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row() -> SoftwareRow {
        sample_software_row()
    }

    #[test]
    fn software_ref_serializes_tagged_by_is_known() {
        let known = SoftwareRef::Known { software_id: 42 };
        assert_eq!(
            serde_json::to_value(&known).unwrap(),
            json!({"isKnown": true, "softwareId": 42})
        );

        let unknown = SoftwareRef::Unknown {
            software_name: "LibreOffice".into(),
        };
        assert_eq!(
            serde_json::to_value(&unknown).unwrap(),
            json!({"isKnown": false, "softwareName": "LibreOffice"})
        );
    }

    #[test]
    fn software_ref_rejects_mismatched_tag() {
        let err = serde_json::from_value::<SoftwareRef>(json!({"isKnown": true}));
        assert!(err.is_err());
        let err = serde_json::from_value::<SoftwareRef>(
            json!({"isKnown": false, "softwareId": 3}),
        );
        assert!(err.is_err());
    }

    #[test]
    fn software_row_round_trips_with_camel_case_fields() {
        let row = sample_row();
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["referencedSinceTime"], json!(1_600_000_000_000u64));
        assert_eq!(value["mimGroup"], json!("MIMO"));
        assert_eq!(value["versionMin"], json!("7.0"));
        // absent optionals stay absent, not null
        assert!(value.get("wikidataId").is_none());
        assert!(value.get("dereferencing").is_none());

        let back: SoftwareRow = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn draft_seeds_engine_owned_defaults() {
        let draft = SoftwareDraft {
            name: "Bar".into(),
            function: "drawing".into(),
            license: "GPL-3.0".into(),
            version_min: "1.0".into(),
            ..Default::default()
        };
        let row = draft.into_row(7, WallClock(123));
        assert_eq!(row.id, 7);
        assert_eq!(row.referenced_since_time, WallClock(123));
        assert!(!row.is_still_in_observation);
        assert!(!row.is_present_in_support_contract);
        assert_eq!(row.mim_group, MimGroup::MIMO);
        assert!(row.alike_softwares.is_empty());
        assert!(row.workshop_urls.is_empty());
        assert!(row.test_urls.is_empty());
        assert!(row.use_case_urls.is_empty());
    }

    #[test]
    fn next_software_id_skips_holes() {
        let mut db = Db::default();
        assert_eq!(db.next_software_id(), 1);
        for id in [1, 5, 7] {
            let mut row = sample_row();
            row.id = id;
            db.software_rows.push(row);
        }
        assert_eq!(db.next_software_id(), 8);
    }
}
