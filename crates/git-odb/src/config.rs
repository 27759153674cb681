use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use git_hash::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{ObjectStore, OdbError};

const CONFIG_FILE: &str = "config.json";

/// Per-repository remote state, stored as JSON at `.git/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Last change, in milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Boundary commit of a shallow clone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shallow: Option<ObjectId>,
    /// What the remote's branches pointed at after the last fetch or push.
    #[serde(default)]
    pub remote_heads: BTreeMap<String, ObjectId>,
}

impl RepoConfig {
    /// Read the config under `git_dir`; a missing file is an empty config.
    pub fn load(git_dir: &Path) -> Result<Self, OdbError> {
        match fs::read(git_dir.join(CONFIG_FILE)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, git_dir: &Path) -> Result<(), OdbError> {
        let tmp = git_dir.join(format!("{CONFIG_FILE}.lock"));
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, git_dir.join(CONFIG_FILE))?;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.time = Some(chrono::Utc::now().timestamp_millis());
    }
}

impl ObjectStore {
    pub fn config(&self) -> Result<RepoConfig, OdbError> {
        RepoConfig::load(&self.git_dir)
    }

    pub fn set_config(&self, config: &RepoConfig) -> Result<(), OdbError> {
        config.save(&self.git_dir)
    }

    /// Stamp the current time into `config` (or the stored config) and save it.
    pub fn update_last_change(&self, config: Option<RepoConfig>) -> Result<RepoConfig, OdbError> {
        let mut config = match config {
            Some(c) => c,
            None => self.config()?,
        };
        config.touch();
        self.set_config(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(RepoConfig::load(dir.path()).unwrap(), RepoConfig::default());
    }

    #[test]
    fn json_shape() {
        let sha = ObjectId::from_hex("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391").unwrap();
        let mut cfg = RepoConfig {
            url: Some("https://example.com/repo.git".into()),
            ..Default::default()
        };
        cfg.remote_heads.insert("refs/heads/master".into(), sha);
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["url"], "https://example.com/repo.git");
        assert_eq!(json["remoteHeads"]["refs/heads/master"], sha.to_hex());
        assert!(json.get("shallow").is_none());

        let dir = tempfile::tempdir().unwrap();
        cfg.touch();
        cfg.save(dir.path()).unwrap();
        assert_eq!(RepoConfig::load(dir.path()).unwrap(), cfg);
    }
}
