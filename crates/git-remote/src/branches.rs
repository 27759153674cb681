use git_odb::ObjectStore;
use git_protocol::SmartHttpRemote;
use git_transport::{Credentials, HttpClient, ReqwestClient};

use crate::GitError;

const HEADS: &str = "refs/heads/";

/// Short name of the branch `HEAD` points at.
pub fn current_branch(store: &ObjectStore) -> Result<String, GitError> {
    let name = store.head_ref_name()?;
    Ok(name.strip_prefix(HEADS).unwrap_or(&name).to_owned())
}

pub fn local_branches(store: &ObjectStore) -> Result<Vec<String>, GitError> {
    Ok(store.local_branches()?)
}

/// Short names of the branches advertised by the remote at `url`.
pub fn remote_branches(url: &str, credentials: Option<Credentials>) -> Result<Vec<String>, GitError> {
    remote_branches_with(ReqwestClient::new(credentials)?, url)
}

pub fn remote_branches_with<C: HttpClient>(client: C, url: &str) -> Result<Vec<String>, GitError> {
    let adv = SmartHttpRemote::new(client, url)?.fetch_refs()?;
    Ok(adv
        .refs
        .iter()
        .filter_map(|r| r.name.strip_prefix(HEADS))
        .map(str::to_owned)
        .collect())
}
