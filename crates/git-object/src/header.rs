//! The `"<type> <size>\0"` prefix of every loose object.

use crate::{ObjectError, ObjectType};

/// A decoded loose header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooseHeader {
    pub obj_type: ObjectType,
    pub size: usize,
    /// Offset of the first content byte, just past the NUL.
    pub content_offset: usize,
}

/// Split a decompressed loose object into type, declared size and content offset.
pub fn parse_header(data: &[u8]) -> Result<(ObjectType, usize, usize), ObjectError> {
    let h = parse_loose_header(data)?;
    Ok((h.obj_type, h.size, h.content_offset))
}

pub fn parse_loose_header(data: &[u8]) -> Result<LooseHeader, ObjectError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ObjectError::InvalidHeader("missing NUL terminator".into()))?;
    let (kind, size) = data[..nul]
        .iter()
        .position(|&b| b == b' ')
        .map(|sp| (&data[..sp], &data[sp + 1..nul]))
        .ok_or_else(|| ObjectError::InvalidHeader("missing space".into()))?;

    let obj_type = ObjectType::from_bytes(kind)?;
    let size = std::str::from_utf8(size)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            ObjectError::InvalidHeader(format!(
                "bad size {:?}",
                String::from_utf8_lossy(size)
            ))
        })?;

    Ok(LooseHeader {
        obj_type,
        size,
        content_offset: nul + 1,
    })
}

/// Encode a loose header.
pub fn write_header(obj_type: ObjectType, size: usize) -> Vec<u8> {
    format!("{} {}\0", obj_type, size).into_bytes()
}
