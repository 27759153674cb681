//! Pack files: the binary container git uses to move and store many objects.
//!
//! - [`delta`]: size varints and copy/insert delta application.
//! - [`entry`]: per-object headers, including the biased OFS_DELTA offset.
//! - [`reader`]: whole-pack parsing with deferred delta resolution, and
//!   single-object expansion for on-demand reads.
//! - [`index`]: `.idx` v2 lookup and generation.
//! - [`writer`]: pack serialization and the commit/tree walk used for push.

mod cancel;
mod data;
pub mod delta;
pub mod entry;
pub mod index;
pub mod pack;
pub mod reader;
pub mod writer;

pub use cancel::CancellationToken;
pub use index::{IndexEntry, PackIndex};
pub use pack::PackFile;
pub use reader::{PackReader, PackedObjectRecord};
pub use writer::{PackSource, PackWriter, WrittenPack};

use git_hash::ObjectId;
use git_object::ObjectType;

/// Errors raised while reading, indexing or writing packs.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("pack format error: {0}")]
    Format(String),

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("delta error: {0}")]
    Delta(String),

    #[error("delta base object {0} not found in pack or object store")]
    MissingBase(ObjectId),

    #[error("object {0} needed for the pack could not be read")]
    MissingObject(ObjectId),

    #[error("pack index format error: {0}")]
    IndexFormat(String),

    #[error("pack offsets beyond 2 GiB are not supported")]
    UnsupportedLargePack,

    #[error("pack checksum mismatch: trailer {expected}, computed {actual}")]
    ChecksumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("operation cancelled")]
    Cancelled,

    #[error("object source error: {0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Object(#[from] git_object::ObjectError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

pub const IDX_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63];
pub const IDX_VERSION: u32 = 2;

/// Type codes stored in bits 4-6 of an entry's first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    Commit = 1,
    Tree = 2,
    Blob = 3,
    Tag = 4,
    OfsDelta = 6,
    RefDelta = 7,
}

impl EntryKind {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Commit,
            2 => Self::Tree,
            3 => Self::Blob,
            4 => Self::Tag,
            6 => Self::OfsDelta,
            7 => Self::RefDelta,
            _ => return None,
        })
    }

    pub fn object_type(self) -> Option<ObjectType> {
        match self {
            Self::Commit => Some(ObjectType::Commit),
            Self::Tree => Some(ObjectType::Tree),
            Self::Blob => Some(ObjectType::Blob),
            Self::Tag => Some(ObjectType::Tag),
            Self::OfsDelta | Self::RefDelta => None,
        }
    }
}

impl From<ObjectType> for EntryKind {
    fn from(t: ObjectType) -> Self {
        match t {
            ObjectType::Commit => Self::Commit,
            ObjectType::Tree => Self::Tree,
            ObjectType::Blob => Self::Blob,
            ObjectType::Tag => Self::Tag,
        }
    }
}
