//! Clone, pull and push against a smart-HTTP remote.
//!
//! Each operation runs to completion and returns either its result or a
//! single [`GitError`] whose [`ErrorKind`] carries a stable numeric code.
//! The working copy is reached only through [`WorkingTree`].

mod branches;
mod clone;
mod error;
mod options;
pub mod progress;
mod pull;
mod push;
mod worktree;

pub use branches::{current_branch, local_branches, remote_branches, remote_branches_with};
pub use clone::{clone, clone_with};
pub use error::{ErrorKind, GitError};
pub use options::{CloneOptions, PullOptions, PushOptions, DEFAULT_BRANCH};
pub use progress::Progress;
pub use pull::{pull, pull_with};
pub use push::{push, push_with};
pub use worktree::{BareWorkingTree, WorkingTree};

pub use git_odb::{ObjectStore, RemoteRef, RepoConfig};
pub use git_pack::CancellationToken;
pub use git_protocol::RefUpdate;
pub use git_transport::Credentials;

use git_protocol::FetchedPack;

/// Persist a fetched pack and its index and make it readable through
/// `store`.
fn store_pack(store: &ObjectStore, fetched: &FetchedPack) -> Result<(), GitError> {
    let name = store.add_pack(&fetched.data, &fetched.parsed)?;
    tracing::debug!(pack = %name, objects = fetched.parsed.objects.len(), "stored pack");
    Ok(())
}
