//! Catalog builder contract and the local row-join implementation.

use std::collections::HashMap;

use thiserror::Error;

use crate::core::{CompiledData, CompiledReferent, CompiledSoftware, Db};

#[derive(Error, Debug)]
#[error("catalog build failed: {0}")]
pub struct BuildError(pub String);

/// `(previous catalog, rows) -> new catalog`.
///
/// Must be deterministic given identical inputs, aside from enrichment
/// fields deliberately carried forward from the previous catalog.
pub trait CatalogBuilder: Send + Sync {
    fn build(&self, previous: &CompiledData, db: &Db) -> Result<CompiledData, BuildError>;
}

/// Local recompute: one entry per software row, referents joined from the
/// relation rows, enrichment copied from the previous entry with the same
/// id. Full enrichment is the out-of-band pipeline's job.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowJoinBuilder;

impl CatalogBuilder for RowJoinBuilder {
    fn build(&self, previous: &CompiledData, db: &Db) -> Result<CompiledData, BuildError> {
        let referents_by_email: HashMap<&str, &crate::core::ReferentRow> = db
            .referent_rows
            .iter()
            .map(|row| (row.email.as_str(), row))
            .collect();

        let catalog = db
            .software_rows
            .iter()
            .map(|row| {
                let referents = db
                    .software_referent_rows
                    .iter()
                    .filter(|relation| relation.software_id == row.id)
                    .filter_map(|relation| {
                        let referent = referents_by_email.get(relation.referent_email.as_str());
                        if referent.is_none() {
                            tracing::warn!(
                                software_id = row.id,
                                email = %relation.referent_email,
                                "relation references a missing referent row"
                            );
                        }
                        referent.map(|referent| CompiledReferent {
                            referent: (*referent).clone(),
                            is_expert: relation.is_expert,
                            use_case_description: relation.use_case_description.clone(),
                        })
                    })
                    .collect();

                let carried = previous.entry(row.id);
                CompiledSoftware {
                    row: row.clone(),
                    wikidata_data: carried.and_then(|entry| entry.wikidata_data.clone()),
                    comptoir_du_libre_software: carried
                        .and_then(|entry| entry.comptoir_du_libre_software.clone()),
                    referents,
                }
            })
            .collect();

        Ok(CompiledData { catalog })
    }
}
