//! Object identity for the git object store.
//!
//! Every object is addressed by the SHA-1 of its canonical frame
//! `"<type> <len>\0<content>"`. This crate holds the 20-byte [`ObjectId`],
//! the streaming [`hasher::Hasher`], a hex codec and the 256-entry fan-out
//! table shared by pack indexes.

mod error;
pub mod fanout;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::{ObjectId, SHA1_HEX_LEN, SHA1_LEN};
