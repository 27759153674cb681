//! A pack paired with its index, as kept by the object store.

use std::path::{Path, PathBuf};

use git_hash::ObjectId;
use git_object::ObjectType;

use crate::data::PackBytes;
use crate::index::PackIndex;
use crate::reader::{BaseResolver, PackReader};
use crate::PackError;

pub struct PackFile {
    data: PackBytes,
    index: PackIndex,
    path: Option<PathBuf>,
}

impl PackFile {
    /// Map `<name>.pack` and its sibling `<name>.idx`.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref();
        let data = PackBytes::map(pack_path)?;
        let index = PackIndex::open(pack_path.with_extension("idx"))?;
        Self::assemble(data, index, Some(pack_path.to_path_buf()))
    }

    /// Wrap an in-memory pack and index.
    pub fn from_parts(data: Vec<u8>, index: PackIndex) -> Result<Self, PackError> {
        Self::assemble(PackBytes::Owned(data), index, None)
    }

    fn assemble(data: PackBytes, index: PackIndex, path: Option<PathBuf>) -> Result<Self, PackError> {
        let count = PackReader::new(&data)?.object_count() as usize;
        if count != index.len() {
            return Err(PackError::IndexFormat(format!(
                "pack holds {count} objects but its index lists {}",
                index.len()
            )));
        }
        Ok(Self { data, index, path })
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.contains(oid)
    }

    /// Expand `oid` if this pack holds it. REF_DELTA bases missing from the
    /// pack are requested from `resolver`.
    pub fn read_object(
        &self,
        oid: &ObjectId,
        resolver: BaseResolver<'_>,
    ) -> Result<Option<(ObjectType, Vec<u8>)>, PackError> {
        let Some(offset) = self.index.object_offset(oid)? else {
            return Ok(None);
        };
        let reader = PackReader::new(&self.data)?;
        let locate = |sha: &ObjectId| self.index.object_offset(sha).ok().flatten();
        reader.expand_at_offset(offset, &locate, resolver).map(Some)
    }
}
