//! Typed git objects.
//!
//! Objects are decoded eagerly from the raw bytes the store hands out and are
//! immutable afterwards. Identity is always the SHA-1 of the canonical frame,
//! see [`ObjectType::hash`].

mod blob;
mod commit;
pub mod header;
mod signature;
mod tag;
pub mod tree;

pub use blob::Blob;
pub use commit::Commit;
pub use signature::Signature;
pub use tag::Tag;
pub use tree::{Tree, TreeEntry};

use bstr::BString;
use git_hash::{hasher::Hasher, HashError, ObjectId};

/// Errors produced while decoding objects.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("malformed tree at offset {offset}: {reason}")]
    MalformedTree { offset: usize, reason: &'static str },

    #[error("malformed commit: {0}")]
    MalformedCommit(String),

    #[error("malformed tag: {0}")]
    MalformedTag(String),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The four kinds of git object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    /// Name used in object frames and loose headers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Object id of `content` framed as this type.
    pub fn hash(&self, content: &[u8]) -> Result<ObjectId, HashError> {
        Hasher::hash_object(self.name(), content)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// A decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Decode a full loose frame (`"<type> <size>\0<content>"`).
    pub fn parse(data: &[u8]) -> Result<Self, ObjectError> {
        let (obj_type, size, header_len) = header::parse_header(data)?;
        let content = &data[header_len..];
        if content.len() < size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: content.len(),
            });
        }
        Self::parse_content(obj_type, &content[..size])
    }

    /// Decode content whose type is already known.
    pub fn parse_content(obj_type: ObjectType, content: &[u8]) -> Result<Self, ObjectError> {
        Ok(match obj_type {
            ObjectType::Blob => Self::Blob(Blob::from(content)),
            ObjectType::Tree => Self::Tree(Tree::parse(content)?),
            ObjectType::Commit => Self::Commit(Commit::parse(content)?),
            ObjectType::Tag => Self::Tag(Tag::parse(content)?),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Blob(_) => ObjectType::Blob,
            Self::Tree(_) => ObjectType::Tree,
            Self::Commit(_) => ObjectType::Commit,
            Self::Tag(_) => ObjectType::Tag,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Self::Tree(t) => Some(t),
            _ => None,
        }
    }
}
