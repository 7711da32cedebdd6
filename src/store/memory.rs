//! In-memory row store for tests and embedded use.
//!
//! Goes through the same JSON codec as the git store, so everything the
//! engine persists round-trips through the real wire representation, and
//! counts commits so no-op semantics are observable.

use std::sync::Mutex;

use super::error::StoreError;
use super::{from_json_bytes, render_db, to_pretty_json_bytes, RowStore};
use super::{COMPILED_DATA_FILE, REFERENT_FILE, SERVICE_FILE, SOFTWARE_FILE, SOFTWARE_REFERENT_FILE};
use crate::core::{CompiledData, Db};

#[derive(Default)]
struct Inner {
    compiled_bytes: Vec<u8>,
    software: Vec<u8>,
    referent: Vec<u8>,
    software_referent: Vec<u8>,
    service: Vec<u8>,
    commit_messages: Vec<String>,
    fail_next_commit: bool,
}

#[derive(Default)]
pub struct MemoryRowStore {
    inner: Mutex<Inner>,
}

impl MemoryRowStore {
    pub fn new(compiled: &CompiledData, db: &Db) -> Result<Self, StoreError> {
        let store = Self::default();
        store.set_compiled(compiled)?;
        store.set_db(db)?;
        Ok(store)
    }

    /// Replace the compiled artifact, as the out-of-band pipeline would.
    pub fn set_compiled(&self, compiled: &CompiledData) -> Result<(), StoreError> {
        let bytes = to_pretty_json_bytes(COMPILED_DATA_FILE, compiled)?;
        self.lock().compiled_bytes = bytes;
        Ok(())
    }

    /// Replace the stored rows without recording a commit.
    pub fn set_db(&self, db: &Db) -> Result<(), StoreError> {
        let files = render_db(db)?;
        let mut inner = self.lock();
        write_files(&mut inner, files);
        Ok(())
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commit_messages.len()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.lock().commit_messages.clone()
    }

    /// Make the next `commit_db` fail without persisting anything.
    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn write_files(inner: &mut Inner, files: Vec<(&'static str, Vec<u8>)>) {
    for (name, bytes) in files {
        match name {
            SOFTWARE_FILE => inner.software = bytes,
            REFERENT_FILE => inner.referent = bytes,
            SOFTWARE_REFERENT_FILE => inner.software_referent = bytes,
            SERVICE_FILE => inner.service = bytes,
            _ => unreachable!("render_db yields the four collection files"),
        }
    }
}

impl RowStore for MemoryRowStore {
    fn fetch_compiled(&self) -> Result<CompiledData, StoreError> {
        let inner = self.lock();
        from_json_bytes(COMPILED_DATA_FILE, &inner.compiled_bytes)
    }

    fn fetch_db(&self) -> Result<Db, StoreError> {
        let inner = self.lock();
        Ok(Db {
            software_rows: from_json_bytes(SOFTWARE_FILE, &inner.software)?,
            referent_rows: from_json_bytes(REFERENT_FILE, &inner.referent)?,
            software_referent_rows: from_json_bytes(
                SOFTWARE_REFERENT_FILE,
                &inner.software_referent,
            )?,
            service_rows: from_json_bytes(SERVICE_FILE, &inner.service)?,
        })
    }

    fn commit_db(&self, db: &Db, message: &str) -> Result<(), StoreError> {
        let files = render_db(db)?;
        let mut inner = self.lock();
        if inner.fail_next_commit {
            inner.fail_next_commit = false;
            return Err(StoreError::Commit(git2::Error::from_str(
                "injected commit failure",
            )));
        }
        write_files(&mut inner, files);
        inner.commit_messages.push(message.to_string());
        Ok(())
    }
}
