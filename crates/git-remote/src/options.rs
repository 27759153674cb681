use std::path::PathBuf;

use git_pack::CancellationToken;
use git_transport::Credentials;

use crate::progress::ProgressFn;

/// Branch checked out by [`clone`](crate::clone) when none is named.
pub const DEFAULT_BRANCH: &str = "master";

pub struct CloneOptions<'a> {
    /// Working directory; must hold nothing but an initialised `.git`.
    pub dir: PathBuf,
    pub url: String,
    /// Short branch name. Defaults to [`DEFAULT_BRANCH`], falling back to
    /// the remote's HEAD branch.
    pub branch: Option<String>,
    /// Fetch only this many commits of history.
    pub depth: Option<u32>,
    pub credentials: Option<Credentials>,
    pub progress: Option<ProgressFn<'a>>,
    pub cancel: CancellationToken,
}

impl<'a> CloneOptions<'a> {
    pub fn new(dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url: url.into(),
            branch: None,
            depth: None,
            credentials: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Default)]
pub struct PullOptions<'a> {
    pub credentials: Option<Credentials>,
    pub progress: Option<ProgressFn<'a>>,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct PushOptions<'a> {
    /// Used when the repository config has no URL yet.
    pub url: Option<String>,
    pub credentials: Option<Credentials>,
    pub progress: Option<ProgressFn<'a>>,
    pub cancel: CancellationToken,
}
