//! The object store a clone, pull or push works against.
//!
//! Objects are looked up in the loose directory first and then in every
//! loaded pack. New objects are written loose unless a pack already holds
//! them; fetched packs are stored whole next to a generated index.

mod config;
mod graph;
pub mod refs;
mod search;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use git_hash::ObjectId;
use git_loose::LooseObjectStore;
use git_object::{Commit, ObjectType, Tree};
use git_pack::index::{pack_name, write_pack_idx};
use git_pack::reader::ParsedPack;
use git_pack::{IndexEntry, PackError, PackFile, PackSource};
use tracing::{debug, warn};

pub use config::RepoConfig;
pub use graph::{CommitGraph, GraphCommit, PushCommit, PushPlan};
pub use refs::RemoteRef;

#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object {oid} is a {actual}, expected a {expected}")]
    WrongType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("malformed ref {name}: {reason}")]
    MalformedRef { name: String, reason: String },

    #[error("no changes to push")]
    PushNoChanges,

    #[error("push would not be a fast-forward of the remote branch")]
    PushNonFastForward,

    #[error("no commits on the current branch")]
    CommitNoChanges,

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Loose(#[from] git_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Object(#[from] git_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A whole object as stored, without its loose header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

/// Loose objects, packs, refs and config under one `.git` directory.
pub struct ObjectStore {
    git_dir: PathBuf,
    loose: LooseObjectStore,
    packs: RwLock<Vec<PackFile>>,
    write_lock: Mutex<()>,
}

impl ObjectStore {
    /// Open the repository at `work_dir`, creating `.git/objects` and a
    /// `HEAD` pointing at `refs/heads/master` when `.git` does not exist.
    pub fn init(work_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let git_dir = work_dir.as_ref().join(".git");
        if !git_dir.is_dir() {
            fs::create_dir_all(git_dir.join("objects"))?;
            fs::write(git_dir.join("HEAD"), "ref: refs/heads/master\n")?;
            debug!(path = %git_dir.display(), "initialised repository");
        }
        Self::open(work_dir)
    }

    /// Open an existing repository and load every pack under
    /// `.git/objects/pack`.
    pub fn open(work_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let git_dir = work_dir.as_ref().join(".git");
        let objects_dir = git_dir.join("objects");
        let packs = discover_packs(&objects_dir)?;
        debug!(packs = packs.len(), path = %git_dir.display(), "object store opened");
        Ok(Self {
            loose: LooseObjectStore::open(&objects_dir),
            packs: RwLock::new(packs),
            write_lock: Mutex::new(()),
            git_dir,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn objects_dir(&self) -> &Path {
        self.loose.objects_dir()
    }

    pub fn pack_count(&self) -> usize {
        self.packs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Loose storage first, then each pack in load order.
    pub fn retrieve_raw_object(&self, oid: &ObjectId) -> Result<RawObject, OdbError> {
        search::find_object(self, oid)?.ok_or(OdbError::NotFound(*oid))
    }

    pub fn retrieve_commit(&self, oid: &ObjectId) -> Result<Commit, OdbError> {
        let raw = self.retrieve_typed(oid, ObjectType::Commit)?;
        Ok(Commit::parse(&raw)?)
    }

    pub fn retrieve_tree(&self, oid: &ObjectId) -> Result<Tree, OdbError> {
        let raw = self.retrieve_typed(oid, ObjectType::Tree)?;
        Ok(Tree::parse(&raw)?)
    }

    fn retrieve_typed(&self, oid: &ObjectId, expected: ObjectType) -> Result<Vec<u8>, OdbError> {
        let raw = self.retrieve_raw_object(oid)?;
        if raw.obj_type != expected {
            return Err(OdbError::WrongType {
                oid: *oid,
                expected,
                actual: raw.obj_type,
            });
        }
        Ok(raw.data)
    }

    /// Whether any loaded pack holds `oid`. Index lookup only.
    pub fn is_packed(&self, oid: &ObjectId) -> bool {
        self.packs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|p| p.contains(oid))
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.loose.exists_nonempty(oid) || self.is_packed(oid)
    }

    /// Hash `content` and store it as a loose object unless a pack or an
    /// existing loose file already holds it.
    pub fn write_raw_object(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        let oid = obj_type.hash(content)?;
        if self.is_packed(&oid) {
            return Ok(oid);
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.loose.write_raw(obj_type, content)?)
    }

    /// Persist a fetched pack and make its objects visible.
    ///
    /// `parsed` must be the result of parsing `data`; its records supply the
    /// index entries. Returns the pack's file stem.
    pub fn add_pack(&self, data: &[u8], parsed: &ParsedPack) -> Result<String, OdbError> {
        let entries: Vec<IndexEntry> = parsed
            .objects
            .iter()
            .map(|o| IndexEntry {
                oid: o.sha,
                offset: o.offset,
                crc32: o.crc32,
            })
            .collect();
        let idx = write_pack_idx(&entries, &parsed.checksum)?;
        let name = pack_name(&entries)?;

        let pack_dir = self.objects_dir().join("pack");
        fs::create_dir_all(&pack_dir)?;
        let pack_path = pack_dir.join(format!("{name}.pack"));

        let mut packs = self.packs.write().unwrap_or_else(PoisonError::into_inner);
        fs::write(&pack_path, data)?;
        fs::write(pack_path.with_extension("idx"), &idx)?;
        packs.push(PackFile::open(&pack_path)?);
        debug!(%name, objects = entries.len(), bytes = data.len(), "pack stored");
        Ok(name)
    }

    /// Content and type of a delta base stored anywhere in this repository.
    /// Used while parsing thin packs.
    pub fn resolve_base(&self, oid: &ObjectId) -> Option<(ObjectType, Vec<u8>)> {
        match self.retrieve_raw_object(oid) {
            Ok(raw) => Some((raw.obj_type, raw.data)),
            Err(OdbError::NotFound(_)) => None,
            Err(e) => {
                warn!(%oid, error = %e, "delta base unreadable");
                None
            }
        }
    }
}

impl PackSource for ObjectStore {
    fn read_raw(&self, oid: &ObjectId) -> Result<(ObjectType, Vec<u8>), PackError> {
        match self.retrieve_raw_object(oid) {
            Ok(raw) => Ok((raw.obj_type, raw.data)),
            Err(OdbError::NotFound(oid)) => Err(PackError::MissingObject(oid)),
            Err(OdbError::Pack(e)) => Err(e),
            Err(e) => Err(PackError::Source(e.to_string())),
        }
    }

    fn is_packed(&self, oid: &ObjectId) -> bool {
        ObjectStore::is_packed(self, oid)
    }
}

fn discover_packs(objects_dir: &Path) -> Result<Vec<PackFile>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(&pack_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "pack"))
        .collect();
    paths.sort();

    let mut packs = Vec::with_capacity(paths.len());
    for path in paths {
        match PackFile::open(&path) {
            Ok(pack) => packs.push(pack),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable pack"),
        }
    }
    Ok(packs)
}
