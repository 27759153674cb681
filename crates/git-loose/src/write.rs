use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use git_hash::hasher::Hasher;
use git_hash::ObjectId;
use git_object::{header, ObjectType};
use tracing::trace;

use crate::{LooseError, LooseObjectStore};

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// A half-written object file. Removed on drop unless it was persisted.
struct TempObject {
    path: PathBuf,
    persisted: bool,
}

impl TempObject {
    fn create(objects_dir: &Path) -> Result<(Self, File), LooseError> {
        let n = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
        let path = objects_dir.join(format!("incoming_{}_{n}", std::process::id()));
        let file = File::create(&path)?;
        Ok((Self { path, persisted: false }, file))
    }

    /// Rename into place. Another writer getting there first is fine since
    /// the content is identical.
    fn persist(mut self, dest: &Path) -> Result<(), LooseError> {
        match fs::rename(&self.path, dest) {
            Ok(()) => {
                self.persisted = true;
                Ok(())
            }
            Err(_) if dest.is_file() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for TempObject {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl LooseObjectStore {
    /// Store `content` as a loose object of kind `obj_type` and return its id.
    /// An existing non-empty file for the id is never rewritten.
    pub fn write_raw(&self, obj_type: ObjectType, content: &[u8]) -> Result<ObjectId, LooseError> {
        let hdr = header::write_header(obj_type, content.len());
        let mut hasher = Hasher::new();
        hasher.update(&hdr);
        hasher.update(content);
        let oid = hasher.finalize()?;

        if self.exists_nonempty(&oid) {
            return Ok(oid);
        }

        let dest = self.object_path(&oid);
        if let Some(fan_out) = dest.parent() {
            fs::create_dir_all(fan_out)?;
        }

        let (temp, file) = TempObject::create(&self.objects_dir)?;
        let mut zlib = ZlibEncoder::new(file, Compression::default());
        zlib.write_all(&hdr)?;
        zlib.write_all(content)?;
        zlib.finish()?.sync_all()?;
        temp.persist(&dest)?;

        trace!(%oid, kind = %obj_type, len = content.len(), "stored loose object");
        Ok(oid)
    }
}
