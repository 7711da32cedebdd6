//! Row store: checkout-read and atomic-commit-write over the four row
//! collections, plus read access to the compiled artifact.

pub mod error;
pub mod git_store;
pub mod memory;

pub use error::StoreError;
pub use git_store::GitRowStore;
pub use memory::MemoryRowStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::{CompiledData, Db};

/// Data-repository file names.
pub const SOFTWARE_FILE: &str = "software.json";
pub const REFERENT_FILE: &str = "referent.json";
pub const SOFTWARE_REFERENT_FILE: &str = "softwareReferent.json";
pub const SERVICE_FILE: &str = "service.json";
/// Build-artifact file name, on the build ref.
pub const COMPILED_DATA_FILE: &str = "compiledData.json";

/// Abstraction over the version-controlled data location.
///
/// `commit_db` is atomic: either all four collections persist under one
/// commit, or none do.
pub trait RowStore: Send + Sync {
    /// Read the compiled artifact from the build location.
    fn fetch_compiled(&self) -> Result<CompiledData, StoreError>;

    /// Read the four row collections from the data location.
    fn fetch_db(&self) -> Result<Db, StoreError>;

    /// Persist the four row collections as a single commit.
    fn commit_db(&self, db: &Db, message: &str) -> Result<(), StoreError>;
}

/// Render a collection the way the data repository stores it:
/// pretty-printed, 4-space indent, trailing newline.
pub fn to_pretty_json_bytes<T: Serialize>(file: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(|source| StoreError::Render {
        file: file.to_string(),
        source,
    })?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn from_json_bytes<T: DeserializeOwned>(file: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Parse {
        file: file.to_string(),
        source,
    })
}

/// The four (file name, rendered bytes) pairs a commit carries.
pub fn render_db(db: &Db) -> Result<Vec<(&'static str, Vec<u8>)>, StoreError> {
    Ok(vec![
        (SOFTWARE_FILE, to_pretty_json_bytes(SOFTWARE_FILE, &db.software_rows)?),
        (REFERENT_FILE, to_pretty_json_bytes(REFERENT_FILE, &db.referent_rows)?),
        (
            SOFTWARE_REFERENT_FILE,
            to_pretty_json_bytes(SOFTWARE_REFERENT_FILE, &db.software_referent_rows)?,
        ),
        (SERVICE_FILE, to_pretty_json_bytes(SERVICE_FILE, &db.service_rows)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::sample_software_row;

    #[test]
    fn pretty_rendering_uses_four_space_indent() {
        let rows = vec![sample_software_row()];
        let bytes = to_pretty_json_bytes(SOFTWARE_FILE, &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("[\n    {\n        \"id\": 1,"));
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn rendered_db_parses_back_value_equal() {
        let mut db = Db::default();
        db.software_rows.push(sample_software_row());
        db.service_rows
            .push(crate::core::ServiceRow(serde_json::json!({"id": 9})));
        let files = render_db(&db).unwrap();
        let software: Vec<crate::core::SoftwareRow> =
            from_json_bytes(SOFTWARE_FILE, &files[0].1).unwrap();
        assert_eq!(software, db.software_rows);
        let services: Vec<crate::core::ServiceRow> =
            from_json_bytes(SERVICE_FILE, &files[3].1).unwrap();
        assert_eq!(services, db.service_rows);
    }
}
