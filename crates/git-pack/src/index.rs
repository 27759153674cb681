//! Pack index v2.
//!
//! ```text
//! ff 74 4f 63 | version 2
//! fan-out:  256 x u32 cumulative counts
//! shas:     N x 20 bytes, ascending
//! crc32:    N x u32
//! offsets:  N x u32 (31 bits; the high bit would point at a 64-bit table)
//! trailer:  pack sha | sha of everything above
//! ```
//!
//! All integers are big-endian. Packs large enough to need the 64-bit offset
//! table are rejected with [`PackError::UnsupportedLargePack`].

use std::cmp::Ordering;
use std::path::Path;

use git_hash::fanout::{FanoutTable, FANOUT_BYTES};
use git_hash::hasher::Hasher;
use git_hash::{ObjectId, SHA1_LEN};

use crate::data::PackBytes;
use crate::{PackError, IDX_SIGNATURE, IDX_VERSION};

const HEADER_LEN: usize = 8;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// One object's row in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub oid: ObjectId,
    pub offset: u64,
    pub crc32: u32,
}

/// A parsed `.idx` v2 file.
pub struct PackIndex {
    data: PackBytes,
    fanout: FanoutTable,
    count: usize,
}

impl PackIndex {
    /// Parse an index held in memory.
    pub fn parse(data: Vec<u8>) -> Result<Self, PackError> {
        Self::from_bytes(PackBytes::Owned(data))
    }

    /// Map and parse an index file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackError> {
        Self::from_bytes(PackBytes::map(path.as_ref())?)
    }

    fn from_bytes(data: PackBytes) -> Result<Self, PackError> {
        if data.len() < HEADER_LEN + FANOUT_BYTES + 2 * SHA1_LEN {
            return Err(PackError::IndexFormat(format!(
                "{} bytes is too short for an index",
                data.len()
            )));
        }
        if data[..4] != IDX_SIGNATURE {
            return Err(PackError::IndexFormat("bad index signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(PackError::IndexFormat(format!("unsupported index version {version}")));
        }

        let fanout = FanoutTable::from_bytes(&data[HEADER_LEN..])
            .map_err(|e| PackError::IndexFormat(e.to_string()))?;
        let count = fanout.total() as usize;
        let needed = HEADER_LEN + FANOUT_BYTES + count * (SHA1_LEN + 8) + 2 * SHA1_LEN;
        if data.len() < needed {
            return Err(PackError::IndexFormat(format!(
                "index for {count} objects needs {needed} bytes, have {}",
                data.len()
            )));
        }

        Ok(Self { data, fanout, count })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn sha_table(&self) -> usize {
        HEADER_LEN + FANOUT_BYTES
    }

    fn crc_table(&self) -> usize {
        self.sha_table() + self.count * SHA1_LEN
    }

    fn offset_table(&self) -> usize {
        self.crc_table() + self.count * 4
    }

    fn sha_bytes(&self, i: usize) -> &[u8] {
        let start = self.sha_table() + i * SHA1_LEN;
        &self.data[start..start + SHA1_LEN]
    }

    fn u32_at(&self, pos: usize) -> u32 {
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    /// Row of `oid`, if present.
    pub fn position(&self, oid: &ObjectId) -> Option<usize> {
        let bucket = self.fanout.range(oid.first_byte());
        // The first byte is equal for every row in the bucket.
        let want = &oid.as_bytes()[1..];
        let (mut lo, mut hi) = (bucket.start, bucket.end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.sha_bytes(mid)[1..].cmp(want) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Pack offset of `oid`, or `Ok(None)` when it is not in this pack.
    pub fn object_offset(&self, oid: &ObjectId) -> Result<Option<u64>, PackError> {
        self.position(oid).map(|i| self.offset_at(i)).transpose()
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.position(oid).is_some()
    }

    pub fn oid_at(&self, i: usize) -> ObjectId {
        let mut bytes = [0u8; SHA1_LEN];
        bytes.copy_from_slice(self.sha_bytes(i));
        ObjectId::new(bytes)
    }

    pub fn crc32_at(&self, i: usize) -> u32 {
        self.u32_at(self.crc_table() + i * 4)
    }

    pub fn offset_at(&self, i: usize) -> Result<u64, PackError> {
        let raw = self.u32_at(self.offset_table() + i * 4);
        if raw & LARGE_OFFSET_FLAG != 0 {
            return Err(PackError::UnsupportedLargePack);
        }
        Ok(u64::from(raw))
    }

    /// Checksum of the pack this index describes.
    pub fn pack_checksum(&self) -> ObjectId {
        let start = self.offset_table() + self.count * 4;
        let mut bytes = [0u8; SHA1_LEN];
        bytes.copy_from_slice(&self.data[start..start + SHA1_LEN]);
        ObjectId::new(bytes)
    }

    pub fn fanout(&self) -> &FanoutTable {
        &self.fanout
    }

    /// All rows in sha order.
    pub fn entries(&self) -> impl Iterator<Item = Result<IndexEntry, PackError>> + '_ {
        (0..self.count).map(move |i| {
            Ok(IndexEntry {
                oid: self.oid_at(i),
                offset: self.offset_at(i)?,
                crc32: self.crc32_at(i),
            })
        })
    }
}

/// Serialize an index for `entries` of the pack whose trailer is `pack_sha`.
pub fn write_pack_idx(entries: &[IndexEntry], pack_sha: &ObjectId) -> Result<Vec<u8>, PackError> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.oid.cmp(&b.oid));

    let oids: Vec<ObjectId> = sorted.iter().map(|e| e.oid).collect();
    let fanout = FanoutTable::build(&oids);

    let mut out = Vec::with_capacity(
        HEADER_LEN + FANOUT_BYTES + sorted.len() * (SHA1_LEN + 8) + 2 * SHA1_LEN,
    );
    out.extend_from_slice(&IDX_SIGNATURE);
    out.extend_from_slice(&IDX_VERSION.to_be_bytes());
    out.extend_from_slice(&fanout.to_bytes());
    for e in &sorted {
        out.extend_from_slice(e.oid.as_bytes());
    }
    for e in &sorted {
        out.extend_from_slice(&e.crc32.to_be_bytes());
    }
    for e in &sorted {
        let offset = u32::try_from(e.offset)
            .ok()
            .filter(|o| o & LARGE_OFFSET_FLAG == 0)
            .ok_or(PackError::UnsupportedLargePack)?;
        out.extend_from_slice(&offset.to_be_bytes());
    }
    out.extend_from_slice(pack_sha.as_bytes());
    let own = Hasher::digest(&out)?;
    out.extend_from_slice(own.as_bytes());
    Ok(out)
}

/// Pack name derived from the sorted object ids: `pack-<sha1 of ids>`.
pub fn pack_name(entries: &[IndexEntry]) -> Result<String, PackError> {
    let mut oids: Vec<ObjectId> = entries.iter().map(|e| e.oid).collect();
    oids.sort();
    let mut h = Hasher::new();
    for oid in &oids {
        h.update(oid.as_bytes());
    }
    Ok(format!("pack-{}", h.finalize()?))
}
