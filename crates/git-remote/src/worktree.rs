use git_hash::ObjectId;
use git_odb::ObjectStore;

use crate::GitError;

/// The checked-out files next to `.git`.
///
/// Clone and pull only decide which trees to move between; writing the
/// files is left to the implementation.
pub trait WorkingTree {
    /// Whether files differ from the last commit on the current branch.
    fn has_uncommitted_changes(&self, store: &ObjectStore) -> Result<bool, GitError>;

    /// Move the files from tree `from` to tree `to`. `from` is `None` for an
    /// empty directory right after clone.
    fn checkout(&self, store: &ObjectStore, from: Option<ObjectId>, to: ObjectId) -> Result<(), GitError>;
}

/// A repository without checked-out files.
#[derive(Debug, Clone, Copy, Default)]
pub struct BareWorkingTree;

impl WorkingTree for BareWorkingTree {
    fn has_uncommitted_changes(&self, _store: &ObjectStore) -> Result<bool, GitError> {
        Ok(false)
    }

    fn checkout(&self, _store: &ObjectStore, _from: Option<ObjectId>, _to: ObjectId) -> Result<(), GitError> {
        Ok(())
    }
}
