use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use git_hash::ObjectId;
use git_object::header;
use git_object::ObjectType;

use crate::{LooseError, LooseObjectStore};

impl LooseObjectStore {
    /// Whether a loose file exists for `oid`.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Whether a loose file exists for `oid` and is not empty. A zero-length
    /// file is what an interrupted writer leaves behind and does not count.
    pub fn exists_nonempty(&self, oid: &ObjectId) -> bool {
        fs::metadata(self.object_path(oid))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Read a loose object's type and content.
    ///
    /// Returns `Ok(None)` if the object does not exist and `Err` if it exists
    /// but is corrupt, including a header size that disagrees with the
    /// content length.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<(ObjectType, Vec<u8>)>, LooseError> {
        let compressed = match fs::read(self.object_path(oid)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let mut raw = decompress_all(&compressed, oid)?;
        let hdr = header::parse_loose_header(&raw)?;
        let actual = raw.len() - hdr.content_offset;
        if actual != hdr.size {
            return Err(LooseError::Corrupt {
                oid: *oid,
                reason: format!("header declares {} bytes, content has {actual}", hdr.size),
            });
        }
        raw.drain(..hdr.content_offset);
        Ok(Some((hdr.obj_type, raw)))
    }
}

fn decompress_all(compressed: &[u8], oid: &ObjectId) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LooseError::Decompress { oid: *oid, source: e })?;
    Ok(decompressed)
}
