//! The four write operations.
//!
//! Protocol per operation: take the write gate, clone the current rows
//! (readers keep their snapshots), apply the change, check preconditions,
//! commit all four collections atomically, rebuild the catalog from the
//! previous one plus the new rows, install the new state, emit an audit
//! record. A failed commit leaves the cache exactly as it was.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{Receiver, Sender};

use super::audit::{AuditRecord, Operation};
use super::builder::CatalogBuilder;
use super::error::OpError;
use super::state::{StateCell, StateChange};
use super::views::DerivedViews;
use crate::core::{
    CompiledSoftware, Db, ReferentRow, SoftwareDraft, SoftwareId, SoftwarePatch,
    SoftwareReferentRow, State, WallClock,
};
use crate::store::RowStore;
use crate::Result;

/// Distinguishes "already satisfied" from "changed".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A commit was performed.
    Committed,
    /// The rows were already in the requested state; nothing was written.
    Unchanged,
}

pub struct Engine<S, B> {
    store: S,
    builder: B,
    cell: Arc<StateCell>,
    // Serializes mutations so two calls can never clone the same snapshot
    // and silently discard each other's commit.
    write_gate: Mutex<()>,
    audit_tx: Option<Sender<AuditRecord>>,
}

impl<S: RowStore, B: CatalogBuilder> Engine<S, B> {
    /// Initial state is built from two independent reads: the compiled
    /// artifact from the build location, the rows from the data location.
    /// Both must succeed before the cache exists.
    pub fn bootstrap(store: S, builder: B) -> Result<Self> {
        let compiled_data = store.fetch_compiled()?;
        let db = store.fetch_db()?;
        let cell = Arc::new(StateCell::new(State { compiled_data, db }));
        Ok(Self {
            store,
            builder,
            cell,
            write_gate: Mutex::new(()),
            audit_tx: None,
        })
    }

    /// Route audit records to a channel in addition to the log.
    pub fn with_audit(mut self, tx: Sender<AuditRecord>) -> Self {
        self.audit_tx = Some(tx);
        self
    }

    pub fn state_cell(&self) -> &Arc<StateCell> {
        &self.cell
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.cell.subscribe()
    }

    pub fn current(&self) -> (u64, Arc<State>) {
        self.cell.current()
    }

    pub fn views(&self) -> Arc<DerivedViews> {
        self.cell.views()
    }

    /// Wholesale re-fetch, driven by the external "data changed" signal.
    ///
    /// Replaces the cache, never merges. Guarded by the version observed
    /// before fetching: if a mutation installed in the meantime, the
    /// refetched snapshot is stale and dropped (returns false; the signal
    /// source will fire again).
    pub fn refresh(&self) -> Result<bool> {
        let (observed, _) = self.cell.current();
        let compiled_data = self.store.fetch_compiled()?;
        let db = self.store.fetch_db()?;
        let installed = self
            .cell
            .install_if_version(observed, State { compiled_data, db });
        Ok(installed.is_some())
    }

    /// Associate a referent with a software entry.
    ///
    /// No-op when the relation already exists with the same expert flag;
    /// updates the flag in place when it differs.
    pub fn create_referent_link(
        &self,
        referent: ReferentRow,
        software_id: SoftwareId,
        is_expert: bool,
        use_case_description: String,
    ) -> Result<Outcome> {
        let gate = self.gate();
        let (before, state) = self.cell.current();
        let mut db = state.db.clone();

        let software_name = db
            .software(software_id)
            .ok_or(OpError::SoftwareNotFound(software_id))?
            .name
            .clone();
        let email = referent.email.clone();

        db.upsert_referent(referent);

        match db.relation_mut(software_id, &email) {
            Some(relation) if relation.is_expert == is_expert => {
                return Ok(Outcome::Unchanged);
            }
            Some(relation) => {
                relation.is_expert = is_expert;
            }
            None => {
                db.software_referent_rows.push(SoftwareReferentRow {
                    software_id,
                    referent_email: email.clone(),
                    is_expert,
                    use_case_description,
                });
            }
        }

        let message = format!("Add referent {email} to software {software_name}");
        let change = self.commit_build_install(&state, db, &message)?;
        self.emit_audit(Operation::CreateReferentLink, &email, before, change.version);
        drop(gate);
        Ok(Outcome::Committed)
    }

    /// Dissociate a referent from a software entry.
    ///
    /// Removes the referent row too when this was its last relation.
    pub fn remove_referent_link(&self, email: &str, software_id: SoftwareId) -> Result<Outcome> {
        let gate = self.gate();
        let (before, state) = self.cell.current();
        let mut db = state.db.clone();

        let software_name = db
            .software(software_id)
            .ok_or(OpError::SoftwareNotFound(software_id))?
            .name
            .clone();

        let Some(index) = db
            .software_referent_rows
            .iter()
            .position(|row| row.software_id == software_id && row.referent_email == email)
        else {
            return Ok(Outcome::Unchanged);
        };
        db.software_referent_rows.remove(index);

        if !db.is_referent(email) {
            db.referent_rows.retain(|row| row.email != email);
        }

        let message = format!("Remove referent {email} from software {software_name}");
        let change = self.commit_build_install(&state, db, &message)?;
        self.emit_audit(Operation::RemoveReferentLink, email, before, change.version);
        drop(gate);
        Ok(Outcome::Committed)
    }

    /// Reference a new software entry, with its first referent.
    ///
    /// Returns the compiled entity from the freshly recomputed catalog.
    pub fn add_software(
        &self,
        draft: SoftwareDraft,
        referent: ReferentRow,
        is_expert: bool,
        use_case_description: String,
    ) -> Result<CompiledSoftware> {
        let gate = self.gate();
        let (before, state) = self.cell.current();
        let mut db = state.db.clone();

        let normalized = normalize_name(&draft.name);
        if let Some(existing) = db
            .software_rows
            .iter()
            .find(|row| normalize_name(&row.name) == normalized)
        {
            return Err(OpError::NameConflict {
                name: existing.name.clone(),
                normalized,
            }
            .into());
        }

        let software_id = db.next_software_id();
        let name = draft.name.clone();
        let email = referent.email.clone();
        db.software_rows
            .push(draft.into_row(software_id, WallClock::now()));
        db.upsert_referent(referent);
        db.software_referent_rows.push(SoftwareReferentRow {
            software_id,
            referent_email: email.clone(),
            is_expert,
            use_case_description,
        });

        let message = format!("Add {name} and {email} as referent");
        let change = self.commit_build_install(&state, db, &message)?;
        self.emit_audit(Operation::AddSoftware, &email, before, change.version);
        drop(gate);

        compiled_entry(&change, software_id)
    }

    /// Partially update a software row.
    ///
    /// The requester must be a referent (of any software; the historical
    /// data model does not scope this check). Absent patch fields leave
    /// the row untouched.
    pub fn update_software(
        &self,
        software_id: SoftwareId,
        requesting_email: &str,
        patch: SoftwarePatch,
    ) -> Result<CompiledSoftware> {
        let gate = self.gate();
        let (before, state) = self.cell.current();
        let mut db = state.db.clone();

        if !db.is_referent(requesting_email) {
            return Err(OpError::NotAReferent {
                email: requesting_email.to_string(),
            }
            .into());
        }

        let row = db
            .software_mut(software_id)
            .ok_or(OpError::SoftwareNotFound(software_id))?;
        patch.apply(row).map_err(|e| OpError::ValidationFailed {
            field: e.0.to_string(),
            reason: "cannot clear required field".to_string(),
        })?;
        let name = row.name.clone();

        let message = format!("Update software {name}");
        let change = self.commit_build_install(&state, db, &message)?;
        self.emit_audit(
            Operation::UpdateSoftware,
            requesting_email,
            before,
            change.version,
        );
        drop(gate);

        compiled_entry(&change, software_id)
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        match self.write_gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn commit_build_install(
        &self,
        previous: &Arc<State>,
        db: Db,
        message: &str,
    ) -> Result<StateChange> {
        self.store.commit_db(&db, message)?;
        let compiled_data = self
            .builder
            .build(&previous.compiled_data, &db)
            .map_err(OpError::from)?;
        Ok(self.cell.install(State { compiled_data, db }))
    }

    fn emit_audit(&self, operation: Operation, actor: &str, before: u64, after: u64) {
        tracing::info!(
            operation = operation.as_str(),
            actor,
            before_version = before,
            after_version = after,
            "mutation committed"
        );
        if let Some(tx) = &self.audit_tx {
            let record = AuditRecord {
                operation,
                actor: actor.to_string(),
                timestamp_ms: WallClock::now().0,
                before_version: before,
                after_version: after,
            };
            // A dropped audit consumer must not fail the mutation.
            let _ = tx.send(record);
        }
    }
}

/// Software names collide when they differ only by case or spacing.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

fn compiled_entry(change: &StateChange, software_id: SoftwareId) -> Result<CompiledSoftware> {
    change
        .state
        .compiled_data
        .entry(software_id)
        .cloned()
        .ok_or_else(|| OpError::MissingCompiledEntry(software_id).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_normalize_by_case_and_spacing() {
        assert_eq!(normalize_name("Libre Office"), "libre-office");
        assert_eq!(normalize_name("libre-office"), "libre-office");
        assert_eq!(normalize_name("LIBRE OFFICE"), "libre-office");
    }
}
