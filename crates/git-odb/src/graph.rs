//! History walks over the store: negotiation batches and push analysis.

use std::collections::{BTreeMap, HashSet};

use git_hash::ObjectId;
use git_object::Commit;
use tracing::{debug, warn};

use crate::refs::RemoteRef;
use crate::{ObjectStore, OdbError, RawObject};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphCommit {
    pub oid: ObjectId,
    pub commit: Commit,
}

/// One batch of history, newest first, plus the parents not yet visited.
#[derive(Debug, Clone, Default)]
pub struct CommitGraph {
    pub commits: Vec<GraphCommit>,
    pub frontier: Vec<ObjectId>,
}

/// A local commit that the remote does not have yet.
#[derive(Debug, Clone)]
pub struct PushCommit {
    pub oid: ObjectId,
    pub commit: Commit,
    pub raw: Vec<u8>,
}

/// Result of [`ObjectStore::commits_for_push`].
#[derive(Debug, Clone)]
pub struct PushPlan {
    /// Newest first.
    pub commits: Vec<PushCommit>,
    /// The remote branch being updated. `sha` is null for a new branch.
    pub remote_ref: RemoteRef,
    /// What the remote branch will point at afterwards.
    pub local_head: ObjectId,
}

impl ObjectStore {
    /// Walk back from `heads` one generation at a time.
    ///
    /// Stops after the generation in which `limit` commits have been
    /// collected, or when no parents remain. Commits that are not in the
    /// store are skipped; a shallow clone has no history past its boundary.
    pub fn commit_graph(&self, heads: &[ObjectId], limit: usize) -> Result<CommitGraph, OdbError> {
        let mut seen = HashSet::new();
        let mut commits: Vec<GraphCommit> = Vec::new();
        let mut level = heads.to_vec();

        loop {
            let mut next = Vec::new();
            for oid in level {
                if !seen.insert(oid) {
                    continue;
                }
                let commit = match self.retrieve_commit(&oid) {
                    Ok(c) => c,
                    Err(OdbError::NotFound(_)) => {
                        warn!(%oid, "commit missing from store during graph walk");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                next.extend(commit.parents.iter().copied());
                insert_by_time(&mut commits, GraphCommit { oid, commit });
            }
            if commits.len() >= limit || next.is_empty() {
                debug!(commits = commits.len(), frontier = next.len(), "commit graph batch");
                return Ok(CommitGraph {
                    commits,
                    frontier: next,
                });
            }
            level = next;
        }
    }

    /// Work out which local commits a push of the current branch sends.
    ///
    /// `remote_refs` is the receive-pack advertisement. When the remote has
    /// no branch of our name, `known_remote_heads` (what the remote held
    /// after our last fetch or push) bounds the walk instead. Local history
    /// is followed through first parents only; a merge commit means the
    /// branch has diverged and the push cannot fast-forward.
    pub fn commits_for_push(
        &self,
        remote_refs: &[RemoteRef],
        known_remote_heads: &BTreeMap<String, ObjectId>,
    ) -> Result<PushPlan, OdbError> {
        let head_ref = self.head_ref_name()?;
        let empty_remote = remote_refs.iter().all(|r| r.sha.is_null());

        let existing = remote_refs.iter().find(|r| r.name == head_ref && !r.sha.is_null());
        let new_branch = existing.is_none();
        let remote_ref = existing
            .cloned()
            .unwrap_or_else(|| RemoteRef::new(head_ref.clone(), ObjectId::NULL));

        let remote_shas: HashSet<ObjectId> = if new_branch && !empty_remote {
            known_remote_heads.values().copied().collect()
        } else {
            HashSet::new()
        };

        if !remote_ref.sha.is_null() && self.retrieve_commit(&remote_ref.sha).is_err() {
            return Err(OdbError::PushNonFastForward);
        }

        let local_head = self.ref_sha(&head_ref)?.ok_or(OdbError::CommitNoChanges)?;
        if local_head == remote_ref.sha {
            return Err(OdbError::PushNoChanges);
        }

        let mut commits = Vec::new();
        if new_branch && remote_shas.contains(&local_head) {
            return Ok(PushPlan {
                commits,
                remote_ref,
                local_head,
            });
        }

        let mut next = local_head;
        loop {
            let RawObject { data: raw, .. } = self
                .retrieve_raw_object(&next)
                .map_err(|_| OdbError::PushNonFastForward)?;
            let commit = Commit::parse(&raw)?;
            if commit.parents.len() > 1 {
                return Err(OdbError::PushNonFastForward);
            }
            let parent = commit.first_parent().copied();
            commits.push(PushCommit {
                oid: next,
                commit,
                raw,
            });
            match parent {
                Some(p) if p != remote_ref.sha && !remote_shas.contains(&p) => next = p,
                _ => break,
            }
        }

        debug!(branch = %remote_ref.name, commits = commits.len(), new_branch, "push plan");
        Ok(PushPlan {
            commits,
            remote_ref,
            local_head,
        })
    }
}

/// Keep `commits` ordered by author time, newest first. A commit goes in
/// front of any existing commits with the same timestamp.
fn insert_by_time(commits: &mut Vec<GraphCommit>, c: GraphCommit) {
    let t = c.commit.author.timestamp;
    let pos = commits
        .iter()
        .rposition(|e| e.commit.author.timestamp > t)
        .map_or(0, |i| i + 1);
    commits.insert(pos, c);
}
