//! `HEAD` and loose ref files.
//!
//! `HEAD` holds `ref: <refname>\n`; each ref lives at `.git/<refname>` and
//! holds `<sha>\n`.

use std::fs;
use std::io::ErrorKind;

use git_hash::{ObjectId, SHA1_HEX_LEN};
use serde::{Deserialize, Serialize};

use crate::{ObjectStore, OdbError};

/// A ref as advertised by a remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub name: String,
    pub sha: ObjectId,
}

impl RemoteRef {
    pub fn new(name: impl Into<String>, sha: ObjectId) -> Self {
        Self { name: name.into(), sha }
    }
}

impl ObjectStore {
    /// The ref `HEAD` points at, e.g. `refs/heads/master`.
    pub fn head_ref_name(&self) -> Result<String, OdbError> {
        let text = fs::read_to_string(self.git_dir.join("HEAD"))?;
        text.strip_prefix("ref: ")
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| OdbError::MalformedRef {
                name: "HEAD".into(),
                reason: format!("expected a symbolic ref, got {:?}", text.trim()),
            })
    }

    pub fn set_head_ref(&self, ref_name: &str) -> Result<(), OdbError> {
        fs::write(self.git_dir.join("HEAD"), format!("ref: {ref_name}\n"))?;
        Ok(())
    }

    /// Target of `ref_name`, or `None` if the ref file does not exist.
    pub fn ref_sha(&self, ref_name: &str) -> Result<Option<ObjectId>, OdbError> {
        let text = match fs::read_to_string(self.git_dir.join(ref_name)) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let hex = text.get(..SHA1_HEX_LEN).ok_or_else(|| OdbError::MalformedRef {
            name: ref_name.into(),
            reason: format!("{} bytes is too short for a sha", text.len()),
        })?;
        ObjectId::from_hex(hex).map(Some).map_err(|e| OdbError::MalformedRef {
            name: ref_name.into(),
            reason: e.to_string(),
        })
    }

    pub fn write_ref(&self, ref_name: &str, sha: &ObjectId) -> Result<(), OdbError> {
        let path = self.git_dir.join(ref_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{sha}\n"))?;
        Ok(())
    }

    /// Sha of the branch `HEAD` points at, `None` before the first commit.
    pub fn head_sha(&self) -> Result<Option<ObjectId>, OdbError> {
        let name = self.head_ref_name()?;
        self.ref_sha(&name)
    }

    /// Local branch names under `refs/heads`.
    pub fn local_branches(&self) -> Result<Vec<String>, OdbError> {
        let dir = self.git_dir.join("refs").join("heads");
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }
}
