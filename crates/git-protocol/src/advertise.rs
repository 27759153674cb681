//! Ref advertisements from `GET info/refs?service=...`.

use std::io::Cursor;

use bstr::ByteSlice;
use git_hash::ObjectId;
use git_odb::RemoteRef;
use git_transport::Service;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefAdvertisement {
    /// Refs in advertised order, `HEAD` included. Peeled `^{}` entries and
    /// the placeholder an empty repository advertises are left out.
    pub refs: Vec<RemoteRef>,
    pub capabilities: Vec<String>,
}

impl RefAdvertisement {
    /// Parse a smart-HTTP discovery body.
    ///
    /// The body starts with `# service=<service>` and a flush, then one
    /// `<sha> <name>` packet per ref; the first one carries the capability
    /// list after a NUL.
    pub fn parse(body: &[u8], service: Service) -> Result<Self, ProtocolError> {
        let mut reader = PktLineReader::new(Cursor::new(body));
        let mut adv = Self::default();
        let mut first = true;

        while let Some(pkt) = reader.next_pkt()? {
            let PktLine::Data(line) = pkt else {
                continue;
            };
            let line = line.strip_suffix(b"\n").unwrap_or(&line);
            if first {
                if let Some(announced) = line.strip_prefix(b"# service=") {
                    if announced != service.as_str().as_bytes() {
                        return Err(ProtocolError::Protocol(format!(
                            "expected service {}, server announced {}",
                            service.as_str(),
                            announced.as_bstr()
                        )));
                    }
                    continue;
                }
            }

            let (ref_part, caps) = match line.find_byte(0) {
                Some(nul) => (&line[..nul], Some(&line[nul + 1..])),
                None => (line, None),
            };
            if let Some(caps) = caps.filter(|_| first) {
                adv.capabilities = caps
                    .split_str(" ")
                    .filter(|c| !c.is_empty())
                    .map(|c| c.to_str_lossy().into_owned())
                    .collect();
            }
            first = false;

            let (sha, name) = ref_part
                .split_once_str(" ")
                .ok_or_else(|| ProtocolError::Protocol(format!("malformed ref line {:?}", ref_part.as_bstr())))?;
            let sha = std::str::from_utf8(sha)
                .map_err(|_| ProtocolError::Protocol("non-ASCII ref sha".into()))
                .and_then(|s| ObjectId::from_hex(s).map_err(ProtocolError::from))?;
            let name = name.to_str_lossy();
            if name.ends_with("^{}") {
                continue;
            }
            adv.refs.push(RemoteRef::new(name.into_owned(), sha));
        }
        Ok(adv)
    }

    pub fn find(&self, name: &str) -> Option<&RemoteRef> {
        self.refs.iter().find(|r| r.name == name)
    }

    /// What the remote's `HEAD` points at.
    pub fn head(&self) -> Option<ObjectId> {
        self.find("HEAD").map(|r| r.sha)
    }

    /// Refs other than `HEAD`.
    pub fn branches_and_tags(&self) -> impl Iterator<Item = &RemoteRef> {
        self.refs.iter().filter(|r| r.name != "HEAD")
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.iter().any(|c| c == cap || c.starts_with(&format!("{cap}=")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktline::PktLineWriter;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    fn body(service: &str, lines: &[String]) -> Vec<u8> {
        let mut w = PktLineWriter::new(Vec::new());
        w.write_text(&format!("# service={service}")).unwrap();
        w.write_flush().unwrap();
        for l in lines {
            w.write_text(l).unwrap();
        }
        w.write_flush().unwrap();
        w.into_inner()
    }

    #[test]
    fn upload_pack_refs() {
        let data = body(
            "git-upload-pack",
            &[
                format!("{A} HEAD\0multi_ack_detailed side-band-64k thin-pack ofs-delta symref=HEAD:refs/heads/master"),
                format!("{A} refs/heads/master"),
                format!("{B} refs/tags/v1"),
                format!("{A} refs/tags/v1^{{}}"),
            ],
        );
        let adv = RefAdvertisement::parse(&data, Service::UploadPack).unwrap();
        assert_eq!(adv.refs.len(), 3);
        assert_eq!(adv.head().unwrap().to_hex(), A);
        assert_eq!(adv.find("refs/tags/v1").unwrap().sha.to_hex(), B);
        assert!(adv.has_capability("side-band-64k"));
        assert!(adv.has_capability("symref"));
        assert_eq!(adv.branches_and_tags().count(), 2);
    }

    #[test]
    fn empty_receive_pack_repository() {
        let zero = "0".repeat(40);
        let data = body(
            "git-receive-pack",
            &[format!("{zero} capabilities^{{}}\0report-status delete-refs")],
        );
        let adv = RefAdvertisement::parse(&data, Service::ReceivePack).unwrap();
        assert!(adv.refs.is_empty());
        assert!(adv.has_capability("report-status"));
    }

    #[test]
    fn wrong_service_is_rejected() {
        let data = body("git-receive-pack", &[]);
        assert!(RefAdvertisement::parse(&data, Service::UploadPack).is_err());
    }
}
