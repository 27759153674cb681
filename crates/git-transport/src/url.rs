//! Smart-HTTP endpoint URLs.
//!
//! The remote URL is kept without its query string or trailing `/`; any
//! query parameters it carried are appended again to every endpoint.

use crate::{Service, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    base: String,
    query: Option<String>,
}

impl RemoteUrl {
    /// Accepts `http://` and `https://` URLs only.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(TransportError::InvalidUrl("empty URL".into()));
        }
        let scheme_end = url
            .find("://")
            .ok_or_else(|| TransportError::InvalidUrl(format!("missing scheme in {url:?}")))?;
        let scheme = &url[..scheme_end];
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(TransportError::UnsupportedScheme(scheme.to_owned()));
        }

        let (base, query) = match url.split_once('?') {
            Some((b, q)) => (b, Some(q).filter(|q| !q.is_empty()).map(str::to_owned)),
            None => (url, None),
        };
        let base = base.trim_end_matches('/');
        if base.len() <= scheme_end + 3 {
            return Err(TransportError::InvalidUrl(format!("missing host in {url:?}")));
        }
        Ok(Self {
            base: base.to_owned(),
            query,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `GET` target for ref discovery.
    pub fn info_refs(&self, service: Service) -> String {
        let mut url = format!("{}/info/refs?service={}", self.base, service.as_str());
        if let Some(q) = &self.query {
            url.push('&');
            url.push_str(q);
        }
        url
    }

    /// `POST` target for `service`.
    pub fn service_endpoint(&self, service: Service) -> String {
        let mut url = format!("{}/{}", self.base, service.as_str());
        if let Some(q) = &self.query {
            url.push('?');
            url.push_str(q);
        }
        url
    }
}

impl std::fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}
