use git_odb::ObjectStore;
use git_protocol::{FetchOutcome, FetchRequest, RefUpdate, SmartHttpRemote};
use git_protocol::remote::NEGOTIATION_BATCH;
use git_transport::{HttpClient, ReqwestClient};
use tracing::{debug, info};

use crate::options::PullOptions;
use crate::progress::Reporter;
use crate::{store_pack, ErrorKind, GitError, WorkingTree};

/// Fast-forward the current branch to the remote's copy of it.
///
/// Fails with [`ErrorKind::PullUpToDate`] when the remote head is already
/// known locally and with [`ErrorKind::PullNonFastForward`] when the local
/// head is not part of the remote branch's history. Diverged branches are
/// never merged.
pub fn pull(store: &ObjectStore, options: PullOptions<'_>, worktree: &dyn WorkingTree) -> Result<RefUpdate, GitError> {
    let client = ReqwestClient::new(options.credentials.clone())?;
    pull_with(client, store, options, worktree)
}

/// [`pull`] over a caller-supplied HTTP client.
pub fn pull_with<C: HttpClient>(
    client: C,
    store: &ObjectStore,
    options: PullOptions<'_>,
    worktree: &dyn WorkingTree,
) -> Result<RefUpdate, GitError> {
    let PullOptions { progress, cancel, .. } = options;
    let mut reporter = Reporter::new(progress);

    reporter.report(0.0, "Checking for uncommitted changes...");
    if worktree.has_uncommitted_changes(store)? {
        return Err(GitError::new(ErrorKind::UncommittedChanges));
    }
    let mut config = store.config()?;
    let url = config
        .url
        .clone()
        .ok_or_else(|| GitError::with_msg(ErrorKind::PushNoRemote, "repository has no remote URL"))?;
    let remote = SmartHttpRemote::new(client, &url)?;

    let head_ref = store.head_ref_name()?;
    reporter.report(10.0, "Querying remote git server...");
    let adv = remote.fetch_refs()?;
    let branch = adv.find(&head_ref).cloned().ok_or_else(|| {
        GitError::with_msg(ErrorKind::RemoteBranchNotFound, format!("remote has no branch {head_ref}"))
    })?;
    if store.contains(&branch.sha) {
        return Err(GitError::new(ErrorKind::PullUpToDate));
    }

    let local_head = store.ref_sha(&head_ref)?;
    let (haves, frontier) = match local_head {
        Some(head) => {
            let graph = store.commit_graph(&[head], NEGOTIATION_BATCH)?;
            (graph.commits.into_iter().map(|c| c.oid).collect(), graph.frontier)
        }
        None => (Vec::new(), Vec::new()),
    };
    let request = FetchRequest {
        wants: vec![branch.sha],
        haves,
        shallow: config.shallow,
        ..Default::default()
    };
    let outcome = {
        let mut on_remote = reporter.chunk(20.0, 0.5);
        remote.fetch_ref(request, frontier, store, &cancel, &mut on_remote)?
    };
    let fetched = match outcome {
        FetchOutcome::Pack(fetched) => fetched,
        FetchOutcome::NoCommon => return Err(GitError::new(ErrorKind::PullNonFastForward)),
    };
    if let Some(head) = local_head {
        if !fetched.common.contains(&head) {
            debug!(local = %head, remote = %branch.sha, "remote does not build on the local head");
            return Err(GitError::new(ErrorKind::PullNonFastForward));
        }
    }

    store_pack(store, &fetched)?;
    store.write_ref(&branch.name, &branch.sha)?;

    reporter.report(70.0, "Applying fast-forward merge");
    let from = local_head
        .map(|head| store.retrieve_commit(&head).map(|c| c.tree))
        .transpose()?;
    let to = store.retrieve_commit(&branch.sha)?.tree;
    worktree.checkout(store, from, to)?;

    reporter.report(99.0, "Finishing up");
    config.remote_heads.insert(branch.name.clone(), branch.sha);
    store.update_last_change(Some(config))?;

    let old = local_head.unwrap_or(git_hash::ObjectId::NULL);
    info!(branch = %branch.name, %old, new = %branch.sha, "pull complete");
    Ok(RefUpdate::new(old, branch.sha, branch.name))
}
