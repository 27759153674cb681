//! Git's smart-HTTP protocol, version 0/1.
//!
//! - [`pktline`]: length-prefixed framing.
//! - [`sideband`]: band 1/2/3 demultiplexing of the pack stream.
//! - [`advertise`]: `info/refs` ref advertisements.
//! - [`fetch`]: upload-pack request and response.
//! - [`push`]: receive-pack request and status.
//! - [`remote`]: [`SmartHttpRemote`], which drives all of the above over an
//!   [`HttpClient`](git_transport::HttpClient).

pub mod advertise;
pub mod fetch;
pub mod pktline;
pub mod push;
pub mod remote;
pub mod sideband;

pub use advertise::RefAdvertisement;
pub use fetch::{FetchOutcome, FetchRequest, FetchedPack};
pub use git_odb::RemoteRef;
pub use push::RefUpdate;
pub use remote::SmartHttpRemote;

use git_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The upload-pack response held neither `ACK` nor `NAK`.
    #[error("unexpected upload-pack response: {0}")]
    UnexpectedResponse(String),

    /// Band 3 of a sideband stream.
    #[error("remote error: {0}")]
    Remote(String),

    /// receive-pack did not answer `unpack ok`.
    #[error("remote could not unpack the pushed pack: {0}")]
    Unpack(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pack(#[from] git_pack::PackError),

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
