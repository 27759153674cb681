use git_odb::ObjectStore;
use git_pack::writer::build_pack;
use git_protocol::{RefUpdate, SmartHttpRemote};
use git_transport::{HttpClient, ReqwestClient};
use tracing::info;

use crate::options::PushOptions;
use crate::progress::Reporter;
use crate::{ErrorKind, GitError};

/// Push the current branch.
///
/// The remote URL comes from the repository config, or from `options.url`
/// when the config has none. On success the config records the new remote
/// head and the URL.
pub fn push(store: &ObjectStore, options: PushOptions<'_>) -> Result<RefUpdate, GitError> {
    let client = ReqwestClient::new(options.credentials.clone())?;
    push_with(client, store, options)
}

/// [`push`] over a caller-supplied HTTP client.
pub fn push_with<C: HttpClient>(client: C, store: &ObjectStore, options: PushOptions<'_>) -> Result<RefUpdate, GitError> {
    let PushOptions {
        url, progress, cancel, ..
    } = options;
    let mut reporter = Reporter::new(progress);

    let mut config = store.config()?;
    let url = config
        .url
        .clone()
        .or(url)
        .ok_or_else(|| GitError::new(ErrorKind::PushNoRemote))?;
    let remote = SmartHttpRemote::new(client, &url)?;

    reporter.report(0.0, "Contacting server...");
    let adv = remote.fetch_receive_refs()?;
    let plan = store.commits_for_push(&adv.refs, &config.remote_heads)?;

    reporter.report(20.0, "Building pack...");
    let raws: Vec<Vec<u8>> = plan.commits.into_iter().rev().map(|c| c.raw).collect();
    let pack = build_pack(&raws, store, &cancel)?;

    reporter.report(40.0, "Sending pack...");
    let update = RefUpdate::new(plan.remote_ref.sha, plan.local_head, plan.remote_ref.name);
    {
        let mut on_remote = reporter.chunk(40.0, 0.6);
        remote.push_refs(std::slice::from_ref(&update), &pack.data, &mut on_remote)?;
    }

    config.remote_heads.insert(update.name.clone(), update.new);
    config.url = Some(url);
    store.set_config(&config)?;
    reporter.report(100.0, "Done");
    info!(branch = %update.name, old = %update.old, new = %update.new, commits = raws.len(), "push complete");
    Ok(update)
}
