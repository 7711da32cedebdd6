//! git2-backed row store.
//!
//! Rows live as blobs under the data ref, the compiled artifact under a
//! separate build ref written only by the external pipeline. A write is
//! one commit carrying all four collection files; keeping the remote
//! checkout fresh (fetch/clone) is the hosting process's concern.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use git2::{Commit, ErrorCode, Oid, Repository, Signature};

use super::error::StoreError;
use super::{from_json_bytes, render_db, RowStore};
use super::{COMPILED_DATA_FILE, REFERENT_FILE, SERVICE_FILE, SOFTWARE_FILE, SOFTWARE_REFERENT_FILE};
use crate::config::StoreConfig;
use crate::core::{CompiledData, Db};

pub struct GitRowStore {
    // git2::Repository is Send but not Sync; the mutex restores Sync.
    repo: Mutex<Repository>,
    data_ref: String,
    build_ref: String,
    push_on_commit: bool,
    author_name: String,
    author_email: String,
}

impl GitRowStore {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open_at(&config.data_repo_path, config)
    }

    pub fn open_at(path: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        let repo = Repository::open(path)
            .map_err(|e| StoreError::OpenRepo(path.to_path_buf(), e))?;
        Ok(Self {
            repo: Mutex::new(repo),
            data_ref: config.data_ref.clone(),
            build_ref: config.build_ref.clone(),
            push_on_commit: config.push_on_commit,
            author_name: config.commit_author.clone(),
            author_email: config.commit_email.clone(),
        })
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        match self.repo.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock cannot leave the repository
            // handle in a state git2 can't recover from.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn push_data_ref(&self, repo: &Repository) -> Result<(), StoreError> {
        let mut remote = repo.find_remote("origin").map_err(StoreError::Push)?;
        let refspec = format!("{r}:{r}", r = self.data_ref);
        remote
            .push(&[refspec.as_str()], None)
            .map_err(StoreError::Push)
    }
}

impl RowStore for GitRowStore {
    fn fetch_compiled(&self) -> Result<CompiledData, StoreError> {
        let repo = self.repo();
        let tree = ref_tree(&repo, &self.build_ref)?;
        let bytes = read_blob(&repo, &tree, COMPILED_DATA_FILE)?;
        from_json_bytes(COMPILED_DATA_FILE, &bytes)
    }

    fn fetch_db(&self) -> Result<Db, StoreError> {
        let repo = self.repo();
        let tree = ref_tree(&repo, &self.data_ref)?;
        Ok(Db {
            software_rows: from_json_bytes(
                SOFTWARE_FILE,
                &read_blob(&repo, &tree, SOFTWARE_FILE)?,
            )?,
            referent_rows: from_json_bytes(
                REFERENT_FILE,
                &read_blob(&repo, &tree, REFERENT_FILE)?,
            )?,
            software_referent_rows: from_json_bytes(
                SOFTWARE_REFERENT_FILE,
                &read_blob(&repo, &tree, SOFTWARE_REFERENT_FILE)?,
            )?,
            service_rows: from_json_bytes(
                SERVICE_FILE,
                &read_blob(&repo, &tree, SERVICE_FILE)?,
            )?,
        })
    }

    fn commit_db(&self, db: &Db, message: &str) -> Result<(), StoreError> {
        let files = render_db(db)?;
        let repo = self.repo();

        let parent_oid = refname_to_id_optional(&repo, &self.data_ref)?;
        let base_tree = match parent_oid {
            Some(oid) => Some(repo.find_commit(oid)?.tree()?),
            None => None,
        };

        let mut builder = repo
            .treebuilder(base_tree.as_ref())
            .map_err(StoreError::BuildTree)?;
        for (name, bytes) in &files {
            let blob = repo.blob(bytes).map_err(StoreError::WriteBlob)?;
            builder
                .insert(*name, blob, 0o100644)
                .map_err(StoreError::BuildTree)?;
        }
        let tree_oid = builder.write().map_err(StoreError::BuildTree)?;
        let tree = repo.find_tree(tree_oid)?;

        let sig = Signature::now(&self.author_name, &self.author_email)?;
        let parents: Vec<Commit> = match parent_oid {
            Some(oid) => vec![repo.find_commit(oid)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<_> = parents.iter().collect();
        let commit_oid = repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .map_err(StoreError::Commit)?;
        repo.reference(&self.data_ref, commit_oid, true, message)
            .map_err(StoreError::Commit)?;

        if self.push_on_commit {
            self.push_data_ref(&repo)?;
        }
        Ok(())
    }
}

fn refname_to_id_optional(repo: &Repository, refname: &str) -> Result<Option<Oid>, StoreError> {
    match repo.refname_to_id(refname) {
        Ok(oid) => Ok(Some(oid)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(StoreError::Git(e)),
    }
}

fn ref_tree<'r>(repo: &'r Repository, refname: &str) -> Result<git2::Tree<'r>, StoreError> {
    let oid = refname_to_id_optional(repo, refname)?
        .ok_or_else(|| StoreError::NoRef(refname.to_string()))?;
    Ok(repo.find_commit(oid)?.tree()?)
}

fn read_blob(repo: &Repository, tree: &git2::Tree<'_>, file: &str) -> Result<Vec<u8>, StoreError> {
    let entry = tree
        .get_name(file)
        .ok_or_else(|| StoreError::MissingFile(file.to_string()))?;
    let object = entry.to_object(repo)?;
    let blob = object
        .as_blob()
        .ok_or_else(|| StoreError::NotABlob(file.to_string()))?;
    Ok(blob.content().to_vec())
}
