//! Pack serialization and the object walk that feeds a push.

use std::collections::HashSet;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use git_hash::hasher::Hasher;
use git_hash::ObjectId;
use git_object::{Commit, ObjectType, Tree};
use tracing::debug;

use crate::entry::{encode_entry_header, encode_ofs_delta_offset};
use crate::index::IndexEntry;
use crate::{CancellationToken, EntryKind, PackError, PACK_SIGNATURE, PACK_VERSION};

/// What the pack walk needs from an object store.
pub trait PackSource {
    /// Raw content and type of `oid`.
    fn read_raw(&self, oid: &ObjectId) -> Result<(ObjectType, Vec<u8>), PackError>;

    /// Whether `oid` already sits in a pack fetched from the remote, meaning
    /// the remote has it too.
    fn is_packed(&self, oid: &ObjectId) -> bool;
}

/// A finished pack.
#[derive(Debug, Clone)]
pub struct WrittenPack {
    pub data: Vec<u8>,
    pub entries: Vec<IndexEntry>,
    pub checksum: ObjectId,
}

/// Accumulates entries in memory; [`finish`](Self::finish) adds the header
/// and trailer.
#[derive(Debug)]
pub struct PackWriter {
    body: Vec<u8>,
    entries: Vec<IndexEntry>,
    level: Compression,
}

impl Default for PackWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PackWriter {
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            entries: Vec::new(),
            level: Compression::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Offsets are final-pack offsets, so they include the 12-byte header.
    fn next_offset(&self) -> u64 {
        (crate::PACK_HEADER_SIZE + self.body.len()) as u64
    }

    fn push_entry(
        &mut self,
        kind: EntryKind,
        base_ref: &[u8],
        payload: &[u8],
        oid: ObjectId,
    ) -> Result<u64, PackError> {
        let offset = self.next_offset();
        let start = self.body.len();
        self.body.extend(encode_entry_header(kind, payload.len() as u64));
        self.body.extend_from_slice(base_ref);
        let mut enc = ZlibEncoder::new(&mut self.body, self.level);
        enc.write_all(payload)?;
        enc.finish()?;
        let crc32 = crc32fast::hash(&self.body[start..]);
        self.entries.push(IndexEntry { oid, offset, crc32 });
        Ok(offset)
    }

    /// Append a whole object. Returns its id and entry offset.
    pub fn add_object(&mut self, obj_type: ObjectType, data: &[u8]) -> Result<(ObjectId, u64), PackError> {
        let oid = obj_type.hash(data)?;
        let offset = self.push_entry(obj_type.into(), &[], data, oid)?;
        Ok((oid, offset))
    }

    /// Append an OFS_DELTA entry against the entry at `base_offset`.
    /// `target` is the id the delta expands to.
    pub fn add_ofs_delta(&mut self, base_offset: u64, delta: &[u8], target: ObjectId) -> Result<u64, PackError> {
        let distance = self
            .next_offset()
            .checked_sub(base_offset)
            .filter(|d| *d > 0)
            .ok_or_else(|| PackError::Format(format!("base offset {base_offset} is not behind the writer")))?;
        self.push_entry(EntryKind::OfsDelta, &encode_ofs_delta_offset(distance), delta, target)
    }

    /// Append a REF_DELTA entry against `base`.
    pub fn add_ref_delta(&mut self, base: &ObjectId, delta: &[u8], target: ObjectId) -> Result<u64, PackError> {
        self.push_entry(EntryKind::RefDelta, base.as_bytes(), delta, target)
    }

    pub fn finish(self) -> Result<WrittenPack, PackError> {
        let mut data = Vec::with_capacity(crate::PACK_HEADER_SIZE + self.body.len() + 20);
        data.extend_from_slice(PACK_SIGNATURE);
        data.extend_from_slice(&PACK_VERSION.to_be_bytes());
        data.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        data.extend_from_slice(&self.body);
        let checksum = Hasher::digest(&data)?;
        data.extend_from_slice(checksum.as_bytes());
        Ok(WrittenPack {
            data,
            entries: self.entries,
            checksum,
        })
    }
}

struct TreeFrame {
    raw: Vec<u8>,
    tree: Tree,
    next: usize,
}

/// Pack `commits` (raw commit bodies) plus every tree and blob they reach
/// that the remote does not already have.
///
/// Each tree is written after all of its children. A visited set keeps any
/// object from being packed or walked twice.
pub fn build_pack(
    commits: &[Vec<u8>],
    source: &dyn PackSource,
    cancel: &CancellationToken,
) -> Result<WrittenPack, PackError> {
    let mut writer = PackWriter::new();
    let mut visited = HashSet::new();

    for raw in commits {
        cancel.check()?;
        let commit = Commit::parse(raw)?;
        writer.add_object(ObjectType::Commit, raw)?;
        walk_tree(commit.tree, source, &mut writer, &mut visited, cancel)?;
    }

    debug!(commits = commits.len(), objects = writer.len(), "pack built");
    writer.finish()
}

fn load_tree(oid: &ObjectId, source: &dyn PackSource) -> Result<TreeFrame, PackError> {
    let (_, raw) = source.read_raw(oid)?;
    let tree = Tree::parse(&raw)?;
    Ok(TreeFrame { raw, tree, next: 0 })
}

fn walk_tree(
    root: ObjectId,
    source: &dyn PackSource,
    writer: &mut PackWriter,
    visited: &mut HashSet<ObjectId>,
    cancel: &CancellationToken,
) -> Result<(), PackError> {
    if !visited.insert(root) || source.is_packed(&root) {
        return Ok(());
    }
    let mut stack = vec![load_tree(&root, source)?];

    while let Some(frame) = stack.last_mut() {
        cancel.check()?;
        let Some(child) = frame.tree.entries.get(frame.next).cloned() else {
            if let Some(done) = stack.pop() {
                writer.add_object(ObjectType::Tree, &done.raw)?;
            }
            continue;
        };
        frame.next += 1;

        if source.is_packed(&child.oid) {
            continue;
        }
        if child.is_blob() {
            if visited.insert(child.oid) {
                let (_, raw) = source.read_raw(&child.oid)?;
                writer.add_object(ObjectType::Blob, &raw)?;
            }
        } else if visited.insert(child.oid) {
            stack.push(load_tree(&child.oid, source)?);
        }
    }
    Ok(())
}
