//! upload-pack negotiation: the request body and the response parser.

use std::io::Cursor;

use git_hash::ObjectId;
use git_pack::reader::ParsedPack;
use tracing::debug;

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::sideband;
use crate::ProtocolError;

/// Capabilities requested on the first `want` line.
pub const FETCH_CAPABILITIES: &str = "multi_ack_detailed side-band-64k thin-pack ofs-delta";

/// One negotiation round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub wants: Vec<ObjectId>,
    pub haves: Vec<ObjectId>,
    /// Boundary of an existing shallow clone.
    pub shallow: Option<ObjectId>,
    /// Depth for a new shallow clone. Only sent when there are no haves.
    pub depth: Option<u32>,
    /// Whether more haves will follow in a later round. When set the round
    /// ends with a flush instead of `done`.
    pub more_haves: bool,
}

impl FetchRequest {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let (first, rest) = self
            .wants
            .split_first()
            .ok_or_else(|| ProtocolError::Protocol("fetch request without wants".into()))?;

        let mut w = PktLineWriter::new(Vec::new());
        w.write_text(&format!("want {first} {FETCH_CAPABILITIES}"))?;
        for want in rest {
            w.write_text(&format!("want {want}"))?;
        }

        if self.haves.is_empty() {
            if let Some(depth) = self.depth {
                w.write_text(&format!("deepen {depth}"))?;
            }
            w.write_flush()?;
            w.write_text("done")?;
        } else {
            if let Some(shallow) = &self.shallow {
                w.write_text(&format!("shallow {shallow}"))?;
            }
            w.write_flush()?;
            for have in &self.haves {
                w.write_text(&format!("have {have}"))?;
            }
            if self.more_haves {
                w.write_flush()?;
            } else {
                w.write_text("done")?;
            }
        }
        Ok(w.into_inner())
    }
}

/// Decoded upload-pack response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPackResponse {
    /// Last `shallow <sha>` line, if any.
    pub shallow: Option<ObjectId>,
    /// Shas from `ACK <sha> common` lines.
    pub common: Vec<ObjectId>,
    pub nak: bool,
    /// Raw pack bytes from band 1.
    pub pack: Vec<u8>,
}

/// Whether the response starts with a bare `NAK` packet.
pub fn is_nak(body: &[u8]) -> bool {
    body.get(4..7) == Some(&b"NAK"[..])
}

/// Parse an upload-pack response.
///
/// Leading `shallow` lines (and flushes among them) are skipped, then
/// `ACK`/`NAK` lines are read until the first other packet. A response with
/// neither is rejected. Everything after is sideband data.
pub fn parse_response(body: &[u8], progress: &mut dyn FnMut(&str)) -> Result<UploadPackResponse, ProtocolError> {
    let mut reader = PktLineReader::new(Cursor::new(body));
    let mut out = UploadPackResponse::default();

    let mut pkt = reader.next_pkt()?;
    while let Some(rest) = pkt.as_ref().and_then(|p| p.as_data()).and_then(|d| d.strip_prefix(b"shallow ")) {
        out.shallow = Some(parse_sha(rest)?);
        pkt = reader.next_pkt()?;
        while matches!(pkt, Some(PktLine::Flush)) {
            pkt = reader.next_pkt()?;
        }
    }

    let mut got_ack_or_nak = false;
    let mut pending = None;
    while let Some(p) = pkt.take() {
        let Some(data) = p.as_data() else {
            pending = Some(p);
            break;
        };
        if data == b"NAK\n" || data == b"NAK" {
            out.nak = true;
        } else if let Some(rest) = data.strip_prefix(b"ACK ") {
            if let Some(sha) = rest.strip_suffix(b" common\n").or_else(|| rest.strip_suffix(b" common")) {
                out.common.push(parse_sha(sha)?);
            }
        } else {
            pending = Some(p);
            break;
        }
        got_ack_or_nak = true;
        pkt = reader.next_pkt()?;
    }

    if !got_ack_or_nak {
        let first = pending
            .as_ref()
            .and_then(|p| p.as_data())
            .map(|d| String::from_utf8_lossy(&d[..d.len().min(40)]).into_owned())
            .unwrap_or_else(|| "empty response".into());
        return Err(ProtocolError::UnexpectedResponse(format!("got neither ACK nor NAK: {first:?}")));
    }

    // The packet that ended the ACK/NAK section already belongs to the
    // sideband stream.
    if let Some(PktLine::Data(first)) = pending {
        let mut prefix = PktLineReader::new(Cursor::new(reframe(&first)));
        out.pack.extend(sideband::collect_data(&mut prefix, progress)?);
        out.pack.extend(sideband::collect_data(&mut reader, progress)?);
    }

    debug!(
        common = out.common.len(),
        nak = out.nak,
        shallow = out.shallow.is_some(),
        pack_bytes = out.pack.len(),
        "upload-pack response"
    );
    Ok(out)
}

fn reframe(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", data.len() + 4).into_bytes();
    out.extend_from_slice(data);
    out
}

fn parse_sha(bytes: &[u8]) -> Result<ObjectId, ProtocolError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ProtocolError::Protocol("non-ASCII sha in response".into()))?;
    Ok(ObjectId::from_hex(text.trim_end())?)
}

/// A pack received and parsed by [`SmartHttpRemote::fetch_ref`](crate::SmartHttpRemote::fetch_ref).
#[derive(Debug)]
pub struct FetchedPack {
    pub data: Vec<u8>,
    pub parsed: ParsedPack,
    pub common: Vec<ObjectId>,
    pub shallow: Option<ObjectId>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Pack(FetchedPack),
    /// The server acknowledged none of our history and we have nothing
    /// older to offer.
    NoCommon,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sideband::{encode_band, Band};

    fn oid(b: u8) -> ObjectId {
        ObjectId::new([b; 20])
    }

    #[test]
    fn clone_request() {
        let req = FetchRequest {
            wants: vec![oid(1)],
            depth: Some(1),
            ..Default::default()
        };
        let body = String::from_utf8(req.encode().unwrap()).unwrap();
        let want = format!("want {} {FETCH_CAPABILITIES}\n", oid(1));
        assert!(body.starts_with(&format!("{:04x}{want}", want.len() + 4)));
        assert!(body.ends_with("000ddeepen 1\n00000009done\n"));
    }

    #[test]
    fn pull_round_with_more_haves() {
        let req = FetchRequest {
            wants: vec![oid(1), oid(2)],
            haves: vec![oid(3)],
            shallow: Some(oid(4)),
            depth: Some(5),
            more_haves: true,
        };
        let body = String::from_utf8(req.encode().unwrap()).unwrap();
        assert!(body.contains(&format!("0032want {}\n", oid(2))));
        assert!(body.contains(&format!("0035shallow {}\n0000", oid(4))));
        assert!(body.ends_with(&format!("0032have {}\n0000", oid(3))));
        assert!(!body.contains("deepen"));
        assert!(!body.contains("done"));
    }

    #[test]
    fn no_wants_is_an_error() {
        assert!(FetchRequest::default().encode().is_err());
    }

    #[test]
    fn response_with_shallow_ack_and_pack() {
        let mut w = PktLineWriter::new(Vec::new());
        w.write_text(&format!("shallow {}", oid(9))).unwrap();
        w.write_flush().unwrap();
        w.write_text(&format!("ACK {} common", oid(7))).unwrap();
        w.write_text(&format!("ACK {} ready", oid(8))).unwrap();
        w.write_text("NAK").unwrap();
        let mut body = w.into_inner();
        body.extend(encode_band(Band::Progress, b"Total 3\n"));
        body.extend(encode_band(Band::Data, b"PACKdata"));
        body.extend_from_slice(b"0000");

        let mut progress = Vec::new();
        let resp = parse_response(&body, &mut |m: &str| progress.push(m.to_owned())).unwrap();
        assert_eq!(resp.shallow, Some(oid(9)));
        assert_eq!(resp.common, vec![oid(7)]);
        assert!(resp.nak);
        assert_eq!(resp.pack, b"PACKdata");
        assert_eq!(progress, vec!["Total 3".to_string()]);
    }

    #[test]
    fn response_without_ack_or_nak_is_rejected() {
        let body = encode_band(Band::Data, b"PACK");
        let err = parse_response(&body, &mut |_: &str| {}).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedResponse(_)));
    }

    #[test]
    fn nak_detection() {
        assert!(is_nak(b"0008NAK\n"));
        assert!(!is_nak(b"0031ACK 1111111111111111111111111111111111111111\n"));
        assert!(!is_nak(b""));
    }
}
