//! Loose objects under `objects/`.
//!
//! An object with id `da39a3...` is stored at `objects/da/39a3...` as the
//! zlib stream of `"<type> <len>\0<content>"`. Clone and pull only ever land
//! packs here; loose files come from local commits and are read back when a
//! push needs them.

mod read;
mod write;

use std::path::{Path, PathBuf};

use git_hash::ObjectId;

#[derive(Debug)]
pub struct LooseObjectStore {
    objects_dir: PathBuf,
}

impl LooseObjectStore {
    pub fn open(objects_dir: impl AsRef<Path>) -> Self {
        Self { objects_dir: objects_dir.as_ref().to_path_buf() }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Where the file for `oid` lives, whether or not it exists.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir.join(oid.loose_path())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LooseError {
    #[error("loose object {oid} is corrupt: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("loose object {oid} does not inflate: {source}")]
    Decompress {
        oid: ObjectId,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] git_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_directory_is_the_first_byte() {
        let store = LooseObjectStore::open("/repo/.git/objects");
        let oid = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        assert_eq!(
            store.object_path(&oid),
            PathBuf::from("/repo/.git/objects/da/39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
    }
}
