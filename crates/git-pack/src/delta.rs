//! Git delta format.
//!
//! ```text
//! [base size: varint] [result size: varint] [opcode]*
//! ```
//!
//! - copy `1xxxxxxx`: bits 0-3 select little-endian offset bytes, bits 4-6
//!   select size bytes; a size of zero means 0x10000.
//! - insert `0nnnnnnn` (n > 0): the next n bytes are literal output.
//! - `0x00` is reserved and rejected.

use crate::PackError;

/// Read a base-128 little-endian size: low 7 bits per byte, high bit set
/// while more bytes follow. Returns `(value, bytes consumed)`.
pub fn read_size_varint(data: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    for (i, &byte) in data.iter().enumerate() {
        let shift = 7 * i;
        if shift >= usize::BITS as usize {
            return None;
        }
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Encode a size the way [`read_size_varint`] decodes it.
pub fn write_size_varint(mut value: usize, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self, what: &str) -> Result<u8, PackError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| PackError::Delta(format!("truncated {what} at byte {}", self.pos)))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| PackError::Delta(format!("insert of {n} bytes runs past end")))?;
        self.pos += n;
        Ok(slice)
    }

    fn size(&mut self, what: &str) -> Result<usize, PackError> {
        let (v, used) = read_size_varint(&self.data[self.pos..])
            .ok_or_else(|| PackError::Delta(format!("truncated {what}")))?;
        self.pos += used;
        Ok(v)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Rebuild a target object from `base` and a delta stream.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PackError> {
    let mut cur = Cursor { data: delta, pos: 0 };

    let base_size = cur.size("base size")?;
    if base_size != base.len() {
        return Err(PackError::Delta(format!(
            "base size mismatch: delta expects {base_size}, base has {}",
            base.len()
        )));
    }
    let result_size = cur.size("result size")?;
    let mut out = Vec::with_capacity(result_size);

    while !cur.at_end() {
        let op = cur.byte("opcode")?;
        if op & 0x80 != 0 {
            let mut offset = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    offset |= (cur.byte("copy offset")? as usize) << (8 * i);
                }
            }
            let mut size = 0usize;
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    size |= (cur.byte("copy size")? as usize) << (8 * i);
                }
            }
            if size == 0 {
                size = 0x10000;
            }
            let src = offset
                .checked_add(size)
                .and_then(|end| base.get(offset..end))
                .ok_or_else(|| {
                    PackError::Delta(format!(
                        "copy {offset}+{size} outside base of {} bytes",
                        base.len()
                    ))
                })?;
            out.extend_from_slice(src);
        } else if op != 0 {
            out.extend_from_slice(cur.take(op as usize)?);
        } else {
            return Err(PackError::Delta("invalid opcode 0".into()));
        }
    }

    if out.len() != result_size {
        return Err(PackError::Delta(format!(
            "result size mismatch: expected {result_size}, produced {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Incremental builder for delta streams.
#[derive(Debug, Clone)]
pub struct DeltaBuilder {
    out: Vec<u8>,
}

impl DeltaBuilder {
    pub fn new(base_size: usize, result_size: usize) -> Self {
        let mut out = Vec::new();
        write_size_varint(base_size, &mut out);
        write_size_varint(result_size, &mut out);
        Self { out }
    }

    /// Copy `size` bytes of the base starting at `offset`. Sizes above
    /// 0x10000 are split over several opcodes.
    pub fn copy(mut self, mut offset: usize, mut size: usize) -> Self {
        while size > 0 {
            let chunk = size.min(0x10000);
            let mut op = 0x80u8;
            let mut args = Vec::with_capacity(7);
            for i in 0..4 {
                let b = (offset >> (8 * i)) as u8;
                if b != 0 {
                    op |= 1 << i;
                    args.push(b);
                }
            }
            let encoded = if chunk == 0x10000 { 0 } else { chunk };
            for i in 0..2 {
                let b = (encoded >> (8 * i)) as u8;
                if b != 0 {
                    op |= 0x10 << i;
                    args.push(b);
                }
            }
            self.out.push(op);
            self.out.extend_from_slice(&args);
            offset += chunk;
            size -= chunk;
        }
        self
    }

    /// Insert literal bytes, at most 127 per opcode.
    pub fn insert(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(0x7f) {
            self.out.push(chunk.len() as u8);
            self.out.extend_from_slice(chunk);
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_sizes() {
        for v in [0usize, 1, 127, 128, 300, 16_383, 16_384, 1 << 28] {
            let mut buf = Vec::new();
            write_size_varint(v, &mut buf);
            assert_eq!(read_size_varint(&buf), Some((v, buf.len())));
        }
        assert_eq!(read_size_varint(&[0x80, 0x80]), None);
    }

    #[test]
    fn copy_and_insert() {
        let base = b"the quick brown fox";
        let delta = DeltaBuilder::new(base.len(), 15)
            .copy(4, 5)
            .insert(b" red ")
            .copy(16, 3)
            .insert(b"es")
            .build();
        assert_eq!(apply_delta(base, &delta).unwrap(), b"quick red foxes");
    }

    #[test]
    fn zero_size_copy_means_64k() {
        let base = vec![7u8; 0x10000];
        // copy, no offset bytes, no size bytes
        let mut delta = Vec::new();
        write_size_varint(base.len(), &mut delta);
        write_size_varint(0x10000, &mut delta);
        delta.push(0x80);
        assert_eq!(apply_delta(&base, &delta).unwrap(), base);
    }

    #[test]
    fn third_copy_size_byte_is_honoured() {
        let base: Vec<u8> = (0..0x20000u32).map(|i| (i % 251) as u8).collect();
        let mut delta = Vec::new();
        write_size_varint(base.len(), &mut delta);
        write_size_varint(0x10001, &mut delta);
        // offset 0; size bytes 0 and 2 present, byte 1 absent: 0x010001
        delta.extend_from_slice(&[0x80 | 0x01 | 0x10 | 0x40, 0x00, 0x01, 0x01]);
        assert_eq!(apply_delta(&base, &delta).unwrap(), &base[..0x10001]);
    }

    #[test]
    fn base_size_mismatch() {
        let delta = DeltaBuilder::new(10, 1).insert(b"x").build();
        let err = apply_delta(b"short", &delta).unwrap_err();
        assert!(matches!(err, PackError::Delta(m) if m.contains("base size")));
    }

    #[test]
    fn opcode_zero_rejected() {
        let mut delta = DeltaBuilder::new(3, 0).build();
        delta.push(0);
        assert!(matches!(
            apply_delta(b"abc", &delta),
            Err(PackError::Delta(m)) if m.contains("opcode 0")
        ));
    }

    #[test]
    fn copy_past_base_rejected() {
        let delta = DeltaBuilder::new(3, 4).copy(1, 4).build();
        assert!(apply_delta(b"abc", &delta).is_err());
    }

    #[test]
    fn truncated_insert_rejected() {
        let mut delta = DeltaBuilder::new(0, 5).build();
        delta.extend_from_slice(&[5, b'a', b'b']);
        assert!(apply_delta(b"", &delta).is_err());
    }
}
