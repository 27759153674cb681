//! Pack entry headers.

use git_hash::{ObjectId, SHA1_LEN};

use crate::{EntryKind, PackError};

/// Where a delta entry finds its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaBase {
    /// Absolute pack offset of the base entry.
    Offset(u64),
    /// Object id of the base, possibly outside this pack.
    Sha(ObjectId),
}

/// A decoded entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    /// Inflated size of the entry's zlib stream.
    pub size: usize,
    pub base: Option<DeltaBase>,
    /// Bytes from the entry start to the first compressed byte.
    pub header_len: usize,
}

fn truncated(offset: u64) -> PackError {
    PackError::Corrupt {
        offset,
        reason: "truncated entry header".into(),
    }
}

/// Decode the header of the entry starting at `data[0]`, which sits at
/// absolute pack offset `entry_offset`.
pub fn parse_entry_header(data: &[u8], entry_offset: u64) -> Result<EntryHeader, PackError> {
    let mut bytes = data.iter().copied();
    let mut c = bytes.next().ok_or_else(|| truncated(entry_offset))?;
    let mut used = 1;

    let code = (c >> 4) & 0x07;
    let kind = EntryKind::from_code(code).ok_or_else(|| PackError::Corrupt {
        offset: entry_offset,
        reason: format!("unknown entry type {code}"),
    })?;

    let mut size = (c & 0x0f) as u64;
    let mut shift = 4u32;
    while c & 0x80 != 0 {
        c = bytes.next().ok_or_else(|| truncated(entry_offset))?;
        used += 1;
        if shift > 57 {
            return Err(PackError::Corrupt {
                offset: entry_offset,
                reason: "entry size overflows".into(),
            });
        }
        size |= ((c & 0x7f) as u64) << shift;
        shift += 7;
    }

    let base = match kind {
        EntryKind::OfsDelta => {
            let (distance, n) = read_ofs_delta_offset(&data[used..])
                .ok_or_else(|| truncated(entry_offset))?;
            used += n;
            if distance == 0 || distance > entry_offset {
                return Err(PackError::Corrupt {
                    offset: entry_offset,
                    reason: format!("delta base distance {distance} out of range"),
                });
            }
            Some(DeltaBase::Offset(entry_offset - distance))
        }
        EntryKind::RefDelta => {
            let sha = data
                .get(used..used + SHA1_LEN)
                .ok_or_else(|| truncated(entry_offset))?;
            used += SHA1_LEN;
            Some(DeltaBase::Sha(ObjectId::from_bytes(sha)?))
        }
        _ => None,
    };

    Ok(EntryHeader {
        kind,
        size: size as usize,
        base,
        header_len: used,
    })
}

/// Decode the backward distance of an OFS_DELTA entry.
///
/// Each continuation adds one before shifting, so two-byte encodings start
/// at 128 rather than overlapping the one-byte range.
pub fn read_ofs_delta_offset(data: &[u8]) -> Option<(u64, usize)> {
    let mut bytes = data.iter().copied();
    let mut c = bytes.next()?;
    let mut value = (c & 0x7f) as u64;
    let mut used = 1;
    while c & 0x80 != 0 {
        c = bytes.next()?;
        used += 1;
        value = value.checked_add(1)?.checked_mul(128)? + (c & 0x7f) as u64;
    }
    Some((value, used))
}

/// Encode a type/size header.
pub fn encode_entry_header(kind: EntryKind, size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut c = ((kind as u8) << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest > 0 {
        out.push(c | 0x80);
        c = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(c);
    out
}

/// Encode an OFS_DELTA backward distance.
pub fn encode_ofs_delta_offset(distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    let mut rest = distance >> 7;
    while rest > 0 {
        rest -= 1;
        out.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_header() {
        // commit, size 5
        let h = parse_entry_header(&[0x15], 0).unwrap();
        assert_eq!(h.kind, EntryKind::Commit);
        assert_eq!(h.size, 5);
        assert_eq!(h.header_len, 1);
        assert_eq!(h.base, None);
    }

    #[test]
    fn multi_byte_sizes() {
        for size in [15u64, 16, 100, 2047, 2048, 1_000_000] {
            let hdr = encode_entry_header(EntryKind::Blob, size);
            let h = parse_entry_header(&hdr, 0).unwrap();
            assert_eq!(h.size as u64, size);
            assert_eq!(h.header_len, hdr.len());
        }
    }

    #[test]
    fn ofs_distance_is_biased() {
        // 0x81 0x00 is (1 + 1) << 7 = 256, not the naive 128
        assert_eq!(read_ofs_delta_offset(&[0x81, 0x00]), Some((256, 2)));
        assert_eq!(read_ofs_delta_offset(&[0x80, 0x00]), Some((128, 2)));
        for d in [1u64, 127, 128, 255, 16_511, 16_512, 3_000_000] {
            let enc = encode_ofs_delta_offset(d);
            assert_eq!(read_ofs_delta_offset(&enc), Some((d, enc.len())));
        }
    }

    #[test]
    fn ofs_delta_header_resolves_absolute_base() {
        let mut data = encode_entry_header(EntryKind::OfsDelta, 9);
        data.extend(encode_ofs_delta_offset(300));
        let h = parse_entry_header(&data, 1000).unwrap();
        assert_eq!(h.base, Some(DeltaBase::Offset(700)));
        assert_eq!(h.header_len, data.len());
    }

    #[test]
    fn ofs_delta_before_pack_start_rejected() {
        let mut data = encode_entry_header(EntryKind::OfsDelta, 9);
        data.extend(encode_ofs_delta_offset(50));
        assert!(parse_entry_header(&data, 20).is_err());
    }

    #[test]
    fn ref_delta_reads_base_sha() {
        let base = ObjectId::new([0xab; 20]);
        let mut data = encode_entry_header(EntryKind::RefDelta, 3);
        data.extend_from_slice(base.as_bytes());
        let h = parse_entry_header(&data, 12).unwrap();
        assert_eq!(h.base, Some(DeltaBase::Sha(base)));
        assert_eq!(h.header_len, 21);
    }

    #[test]
    fn unknown_type_and_truncation() {
        assert!(parse_entry_header(&[0x50], 0).is_err()); // type 5 is reserved
        assert!(parse_entry_header(&[0x95], 0).is_err()); // continuation with no byte
        assert!(parse_entry_header(&[], 0).is_err());
    }
}
