//! receive-pack: ref update commands and the status report.

use std::fmt;

use git_hash::ObjectId;
use tracing::debug;

use crate::pktline::PktLineWriter;
use crate::ProtocolError;

/// Move `name` on the remote from `old` to `new`. A null `old` creates the
/// ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: ObjectId,
    pub new: ObjectId,
    pub name: String,
}

impl RefUpdate {
    pub fn new(old: ObjectId, new: ObjectId, name: impl Into<String>) -> Self {
        Self {
            old,
            new,
            name: name.into(),
        }
    }
}

impl fmt::Display for RefUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.old, self.new, self.name)
    }
}

/// Command lines, a flush, then the raw pack.
///
/// Only the first command carries the `report-status` capability.
pub fn encode_request(updates: &[RefUpdate], pack: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if updates.is_empty() {
        return Err(ProtocolError::Protocol("push without ref updates".into()));
    }
    let mut w = PktLineWriter::new(Vec::with_capacity(pack.len() + 128 * updates.len()));
    for (i, update) in updates.iter().enumerate() {
        if i == 0 {
            w.write_text(&format!("{update}\0report-status"))?;
        } else {
            w.write_text(&update.to_string())?;
        }
    }
    w.write_flush()?;
    w.write_raw(pack)?;
    Ok(w.into_inner())
}

/// Accept only a report that opens with `unpack ok`.
pub fn check_response(body: &[u8]) -> Result<(), ProtocolError> {
    if body.starts_with(b"000eunpack ok") {
        debug!("remote unpacked pushed pack");
        return Ok(());
    }
    let shown = String::from_utf8_lossy(&body[..body.len().min(200)]).into_owned();
    Err(ProtocolError::Unpack(shown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_command_carries_report_status() {
        let old = ObjectId::new([1; 20]);
        let new = ObjectId::new([2; 20]);
        let updates = [
            RefUpdate::new(old, new, "refs/heads/master"),
            RefUpdate::new(ObjectId::NULL, new, "refs/heads/topic"),
        ];
        let body = encode_request(&updates, b"PACKxyz").unwrap();
        let text = String::from_utf8_lossy(&body);
        let first = format!("{old} {new} refs/heads/master\0report-status\n");
        assert!(text.starts_with(&format!("{:04x}{first}", first.len() + 4)));
        assert_eq!(text.matches("report-status").count(), 1);
        assert!(text.ends_with("refs/heads/topic\n0000PACKxyz"));
    }

    #[test]
    fn unpack_status() {
        assert!(check_response(b"000eunpack ok\n0019ok refs/heads/master\n0000").is_ok());
        let err = check_response(b"0023unpack index-pack abnormal exit\n").unwrap_err();
        assert!(matches!(err, ProtocolError::Unpack(msg) if msg.contains("abnormal")));
        assert!(check_response(b"").is_err());
    }
}
