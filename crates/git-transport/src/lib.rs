//! HTTP plumbing for the smart protocol.
//!
//! Protocol logic lives in `git-protocol`; this crate only moves request and
//! response bodies and turns HTTP failures into typed errors.

pub mod http;
pub mod memory;
pub mod url;

use std::fmt;

pub use http::ReqwestClient;
pub use memory::MemoryClient;
pub use url::RemoteUrl;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// HTTP 401. Carries the `WWW-Authenticate` challenge, if any.
    #[error("HTTP authentication failed")]
    Auth { www_authenticate: Option<String> },

    #[error("HTTP {method} {url} failed with status {status}")]
    Http {
        status: u16,
        url: String,
        method: Method,
    },

    #[error("network error during {method} {url}: {message}")]
    Network {
        url: String,
        method: Method,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

/// Service type for smart-HTTP endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// git-upload-pack (for fetch/clone).
    UploadPack,
    /// git-receive-pack (for push).
    ReceivePack,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::UploadPack => "git-upload-pack",
            Service::ReceivePack => "git-receive-pack",
        }
    }

    pub fn request_content_type(&self) -> &'static str {
        match self {
            Service::UploadPack => "application/x-git-upload-pack-request",
            Service::ReceivePack => "application/x-git-receive-pack-request",
        }
    }
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            content_type: Some(content_type.to_owned()),
            body,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends one request and returns whatever the server answered. Status
/// codes are not interpreted here; see [`send_checked`].
pub trait HttpClient: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Send `request` and return the body of a 200 response. A 401 becomes
/// [`TransportError::Auth`]; any other status becomes
/// [`TransportError::Http`]. Nothing is retried.
pub fn send_checked(client: &dyn HttpClient, request: &HttpRequest) -> Result<Vec<u8>, TransportError> {
    let response = client.send(request)?;
    match response.status {
        200 => Ok(response.body),
        401 => Err(TransportError::Auth {
            www_authenticate: response.header("www-authenticate").map(str::to_owned),
        }),
        status => Err(TransportError::Http {
            status,
            url: request.url.clone(),
            method: request.method,
        }),
    }
}
