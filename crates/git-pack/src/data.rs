use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

/// Backing bytes for a pack or index: either mapped from disk or owned.
pub(crate) enum PackBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl PackBytes {
    pub(crate) fn map(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        // SAFETY: pack and index files are written once and only ever
        // replaced by rename, never modified in place.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self::Mapped(map))
    }
}

impl Deref for PackBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => m,
            Self::Owned(v) => v,
        }
    }
}
