//! Blocking smart-HTTP client on top of reqwest.

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::{Credentials, HttpClient, HttpRequest, HttpResponse, Method, TransportError};

const USER_AGENT: &str = concat!("git-remote/", env!("CARGO_PKG_VERSION"));

pub struct ReqwestClient {
    client: Client,
    credentials: Option<Credentials>,
}

impl ReqwestClient {
    pub fn new(credentials: Option<Credentials>) -> Result<Self, TransportError> {
        Self::with_user_agent(USER_AGENT, credentials)
    }

    pub fn with_user_agent(user_agent: &str, credentials: Option<Credentials>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Network {
                url: String::new(),
                method: Method::Get,
                message: e.to_string(),
            })?;
        Ok(Self { client, credentials })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let network = |e: reqwest::Error| TransportError::Network {
            url: request.url.clone(),
            method: request.method,
            message: e.to_string(),
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).body(request.body.clone()),
        };
        if let Some(ct) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        if let Some(c) = &self.credentials {
            builder = builder.basic_auth(&c.username, Some(&c.password));
        }

        let response = builder.send().map_err(network)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        let body = response.bytes().map_err(network)?.to_vec();
        debug!(method = %request.method, url = %request.url, status, bytes = body.len(), "http exchange");

        Ok(HttpResponse { status, headers, body })
    }
}
