use std::fs;
use std::io;
use std::path::Path;

use git_odb::{ObjectStore, RemoteRef, RepoConfig};
use git_protocol::{FetchOutcome, FetchRequest, RefAdvertisement, SmartHttpRemote};
use git_transport::{HttpClient, ReqwestClient};
use tracing::{debug, info};

use crate::options::{CloneOptions, DEFAULT_BRANCH};
use crate::progress::Reporter;
use crate::{store_pack, ErrorKind, GitError, WorkingTree};

/// Clone `options.url` into the empty repository `store`.
///
/// Returns the branch that was checked out, or `None` when the remote has no
/// refs at all; an empty remote still leaves a config behind.
pub fn clone(
    store: &ObjectStore,
    options: CloneOptions<'_>,
    worktree: &dyn WorkingTree,
) -> Result<Option<RemoteRef>, GitError> {
    let client = ReqwestClient::new(options.credentials.clone())?;
    clone_with(client, store, options, worktree)
}

/// [`clone`] over a caller-supplied HTTP client.
pub fn clone_with<C: HttpClient>(
    client: C,
    store: &ObjectStore,
    options: CloneOptions<'_>,
    worktree: &dyn WorkingTree,
) -> Result<Option<RemoteRef>, GitError> {
    let CloneOptions {
        dir,
        url,
        branch,
        depth,
        progress,
        cancel,
        ..
    } = options;
    let mut reporter = Reporter::new(progress);

    check_directory(&dir, store)?;

    let remote = SmartHttpRemote::new(client, &url)?;
    reporter.report(0.0, "Fetching refs");
    let adv = remote.fetch_refs()?;

    if adv.refs.is_empty() {
        debug!(%url, "cloned an empty repository");
        store.update_last_change(Some(initial_config(&url, None, None)))?;
        return Ok(None);
    }

    let target = select_branch(&adv, branch.as_deref())?;
    store.set_head_ref(&target.name)?;
    store.write_ref(&target.name, &target.sha)?;

    let request = FetchRequest {
        wants: vec![target.sha],
        depth,
        ..Default::default()
    };
    let outcome = {
        let mut on_remote = reporter.chunk(0.0, 0.95);
        remote.fetch_ref(request, Vec::new(), store, &cancel, &mut on_remote)?
    };
    let FetchOutcome::Pack(fetched) = outcome else {
        return Err(GitError::with_msg(ErrorKind::Ajax, "remote sent no pack for a clone"));
    };

    reporter.report(95.0, "Writing pack");
    store_pack(store, &fetched)?;

    reporter.report(95.0, "Building file tree from pack. Be patient...");
    let tree = store.retrieve_commit(&target.sha)?.tree;
    worktree.checkout(store, None, tree)?;

    let shallow = depth.and(fetched.shallow);
    store.update_last_change(Some(initial_config(&url, shallow, Some(&target))))?;
    reporter.report(100.0, "Done");
    info!(%url, branch = %target.name, head = %target.sha, objects = fetched.parsed.objects.len(), "clone complete");
    Ok(Some(target))
}

/// The explicitly requested branch, else `master`, else whichever branch the
/// remote `HEAD` points at.
fn select_branch(adv: &RefAdvertisement, requested: Option<&str>) -> Result<RemoteRef, GitError> {
    let wanted = format!("refs/heads/{}", requested.unwrap_or(DEFAULT_BRANCH));
    if let Some(r) = adv.find(&wanted) {
        return Ok(r.clone());
    }
    if requested.is_some() {
        return Err(GitError::with_msg(
            ErrorKind::RemoteBranchNotFound,
            format!("remote has no branch {wanted}"),
        ));
    }
    let head = adv.head();
    adv.refs
        .iter()
        .find(|r| r.name.starts_with("refs/heads/") && Some(r.sha) == head)
        .cloned()
        .ok_or_else(|| GitError::new(ErrorKind::RemoteBranchNotFound))
}

fn initial_config(url: &str, shallow: Option<git_hash::ObjectId>, head: Option<&RemoteRef>) -> RepoConfig {
    let mut config = RepoConfig {
        url: Some(url.to_owned()),
        shallow,
        ..Default::default()
    };
    if let Some(head) = head {
        config.remote_heads.insert(head.name.clone(), head.sha);
    }
    config
}

/// `dir` must contain exactly one entry, the `.git` directory, and that
/// repository must not hold any objects yet.
fn check_directory(dir: &Path, store: &ObjectStore) -> Result<(), GitError> {
    let entries = list(dir)?;
    if entries.is_empty() {
        return Err(GitError::new(ErrorKind::CloneDirNotInitialized));
    }
    let lone_git_dir = match entries.as_slice() {
        [only] => only.file_name() == ".git" && only.file_type()?.is_dir(),
        _ => false,
    };
    if !lone_git_dir {
        return Err(GitError::new(ErrorKind::CloneDirNotEmpty));
    }

    let objects = match fs::read_dir(store.objects_dir()) {
        Ok(entries) => entries.collect::<Result<Vec<_>, _>>()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let in_use = match objects.as_slice() {
        [] => false,
        [only] if only.file_name() == "pack" => !only.file_type()?.is_dir() || !list(&only.path())?.is_empty(),
        _ => true,
    };
    if in_use {
        return Err(GitError::new(ErrorKind::CloneGitDirInUse));
    }
    Ok(())
}

fn list(dir: &Path) -> Result<Vec<fs::DirEntry>, GitError> {
    Ok(fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?)
}
