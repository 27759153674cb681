//! Sideband demultiplexing.
//!
//! After negotiation the server multiplexes its answer over bands:
//! - Band 1: pack data
//! - Band 2: progress text
//! - Band 3: fatal error

use std::io::Read;

use tracing::trace;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Data = 1,
    Progress = 2,
    Error = 3,
}

impl Band {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Data),
            2 => Some(Self::Progress),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Concatenate every band-1 payload until flush or end of input.
///
/// Band-2 text goes to `progress`. Band 3 aborts with
/// [`ProtocolError::Remote`].
pub fn collect_data<R: Read>(
    reader: &mut PktLineReader<R>,
    progress: &mut dyn FnMut(&str),
) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    while let Some(PktLine::Data(pkt)) = reader.next_pkt()? {
        let Some((&band, payload)) = pkt.split_first() else {
            continue;
        };
        match Band::from_byte(band) {
            Some(Band::Data) => out.extend_from_slice(payload),
            Some(Band::Progress) => {
                let text = String::from_utf8_lossy(payload);
                trace!(message = %text.trim_end(), "remote progress");
                progress(text.trim_end());
            }
            Some(Band::Error) => {
                return Err(ProtocolError::Remote(String::from_utf8_lossy(payload).trim_end().to_owned()))
            }
            None => {
                return Err(ProtocolError::Protocol(format!("unknown sideband channel: {band}")));
            }
        }
    }
    Ok(out)
}

/// Frame `data` as a single band packet.
pub fn encode_band(band: Band, data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", data.len() + 5).into_bytes();
    out.push(band as u8);
    out.extend_from_slice(data);
    out
}
