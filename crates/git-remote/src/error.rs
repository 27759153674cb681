//! The error every public operation returns.
//!
//! Lower crates keep their own error enums; here each of them is folded
//! into one [`ErrorKind`] with a stable numeric code, plus a message and
//! whatever request context the failure carried.

use std::collections::BTreeMap;
use std::fmt;

use git_odb::OdbError;
use git_pack::PackError;
use git_protocol::ProtocolError;
use git_transport::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileIo,
    Ajax,
    CloneDirNotEmpty,
    CloneDirNotInitialized,
    CloneGitDirInUse,
    RemoteBranchNotFound,
    PullNonFastForward,
    PullUpToDate,
    CommitNoChanges,
    PushNoChanges,
    PushNonFastForward,
    UncommittedChanges,
    BranchNameNotValid,
    BranchAlreadyExists,
    CheckoutBranchNoExists,
    PushNoRemote,
    ObjectStoreCorrupted,
    HttpAuthError,
    UnpackError,
    Cancelled,
}

impl ErrorKind {
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::FileIo => 0,
            ErrorKind::Ajax => 1,
            ErrorKind::CloneDirNotEmpty => 2,
            ErrorKind::CloneDirNotInitialized => 3,
            ErrorKind::CloneGitDirInUse => 4,
            ErrorKind::RemoteBranchNotFound => 5,
            ErrorKind::PullNonFastForward => 6,
            ErrorKind::PullUpToDate => 7,
            ErrorKind::CommitNoChanges => 8,
            ErrorKind::PushNoChanges => 9,
            ErrorKind::PushNonFastForward => 10,
            ErrorKind::UncommittedChanges => 11,
            ErrorKind::BranchNameNotValid => 12,
            ErrorKind::BranchAlreadyExists => 14,
            ErrorKind::CheckoutBranchNoExists => 15,
            ErrorKind::PushNoRemote => 16,
            ErrorKind::ObjectStoreCorrupted => 200,
            ErrorKind::HttpAuthError => 201,
            ErrorKind::UnpackError => 202,
            ErrorKind::Cancelled => 203,
        }
    }

    /// The English message used when no more specific one is available.
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::FileIo => "File I/O error",
            ErrorKind::Ajax => "Network error while talking to the remote",
            ErrorKind::CloneDirNotEmpty => "The target directory contains files",
            ErrorKind::CloneDirNotInitialized => "The target directory hasn't been initialized",
            ErrorKind::CloneGitDirInUse => "The target directory already holds a git repository",
            ErrorKind::RemoteBranchNotFound => "Can't find the branch on the remote",
            ErrorKind::PullNonFastForward => "Can't pull: the remote branch is not a fast-forward of the local one",
            ErrorKind::PullUpToDate => "Everything is up to date",
            ErrorKind::CommitNoChanges => "No changes to commit",
            ErrorKind::PushNoChanges => "No new commits to push to the remote",
            ErrorKind::PushNonFastForward => "The remote has changes that are not in the local branch",
            ErrorKind::UncommittedChanges => "There are changes in the working directory that haven't been committed",
            ErrorKind::BranchNameNotValid => "The branch name is not valid",
            ErrorKind::BranchAlreadyExists => "A branch with that name already exists",
            ErrorKind::CheckoutBranchNoExists => "No local branch with that name exists",
            ErrorKind::PushNoRemote => "No remote to push to",
            ErrorKind::ObjectStoreCorrupted => "Git object store may be corrupted",
            ErrorKind::HttpAuthError => "HTTP authentication failed",
            ErrorKind::UnpackError => "The remote git server wasn't able to understand the push request",
            ErrorKind::Cancelled => "Operation cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
#[error("{msg}")]
pub struct GitError {
    pub kind: ErrorKind,
    pub msg: String,
    /// Extra detail such as the HTTP status, URL and method of a failed
    /// request.
    pub context: BTreeMap<&'static str, String>,
    #[source]
    source: Option<Source>,
}

impl GitError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            msg: kind.message().to_owned(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    pub fn with_msg(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            ..Self::new(kind)
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }

    fn caused_by(kind: ErrorKind, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            kind,
            msg: source.to_string(),
            context: BTreeMap::new(),
            source: Some(Box::new(source)),
        }
    }

    fn context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.insert(key, value.into());
        self
    }
}

impl From<ErrorKind> for GitError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        Self::caused_by(ErrorKind::FileIo, e)
    }
}

impl From<TransportError> for GitError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Auth { ref www_authenticate } => {
                let challenge = www_authenticate.clone();
                let err = Self::caused_by(ErrorKind::HttpAuthError, e);
                match challenge {
                    Some(c) => err.context("www-authenticate", c),
                    None => err,
                }
            }
            TransportError::Http {
                status,
                ref url,
                method,
            } => {
                let url = url.clone();
                Self::caused_by(ErrorKind::Ajax, e)
                    .context("status", status.to_string())
                    .context("url", url)
                    .context("method", method.to_string())
            }
            TransportError::Network { ref url, method, .. } => {
                let url = url.clone();
                Self::caused_by(ErrorKind::Ajax, e)
                    .context("url", url)
                    .context("method", method.to_string())
            }
            TransportError::UnsupportedScheme(_) | TransportError::InvalidUrl(_) => Self::caused_by(ErrorKind::Ajax, e),
        }
    }
}

impl From<PackError> for GitError {
    fn from(e: PackError) -> Self {
        let kind = match e {
            PackError::Cancelled => ErrorKind::Cancelled,
            PackError::Io(_) => ErrorKind::FileIo,
            _ => ErrorKind::ObjectStoreCorrupted,
        };
        Self::caused_by(kind, e)
    }
}

impl From<OdbError> for GitError {
    fn from(e: OdbError) -> Self {
        match e {
            OdbError::PushNoChanges => Self::new(ErrorKind::PushNoChanges),
            OdbError::PushNonFastForward => Self::new(ErrorKind::PushNonFastForward),
            OdbError::CommitNoChanges => Self::new(ErrorKind::CommitNoChanges),
            OdbError::Pack(p) => p.into(),
            OdbError::Io(_) | OdbError::Config(_) | OdbError::Loose(git_loose::LooseError::Io(_)) => {
                Self::caused_by(ErrorKind::FileIo, e)
            }
            _ => Self::caused_by(ErrorKind::ObjectStoreCorrupted, e),
        }
    }
}

impl From<ProtocolError> for GitError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Transport(t) => t.into(),
            ProtocolError::Pack(p) => p.into(),
            ProtocolError::Odb(o) => o.into(),
            ProtocolError::Remote(_) | ProtocolError::Unpack(_) => Self::caused_by(ErrorKind::UnpackError, e),
            ProtocolError::Hash(_) => Self::caused_by(ErrorKind::ObjectStoreCorrupted, e),
            ProtocolError::Io(_) => Self::caused_by(ErrorKind::FileIo, e),
            ProtocolError::InvalidPktLine(_) | ProtocolError::Protocol(_) | ProtocolError::UnexpectedResponse(_) => {
                Self::caused_by(ErrorKind::Ajax, e)
            }
        }
    }
}
