use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::blocking::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{username}:{password}"));
        self.header("Authorization", format!("Basic {encoded}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response>;
}

/// `reqwest` backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let method = Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("Invalid HTTP method: {}", request.method))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(request.body.clone())
            .send()
            .with_context(|| format!("{} {} failed", request.method, request.url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .with_context(|| format!("Failed to read response body from {}", request.url))?;
        Ok(Response { status, body })
    }
}

/// Adds `Authorization: Bearer <token>` to a copy of every request.
pub struct TokenAuthTransport {
    token: String,
    inner: Arc<dyn Transport>,
}

impl TokenAuthTransport {
    pub fn new(token: impl Into<String>, inner: Arc<dyn Transport>) -> Self {
        Self {
            token: token.into(),
            inner,
        }
    }
}

impl Transport for TokenAuthTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let authorized = request
            .clone()
            .header("Authorization", format!("Bearer {}", self.token));
        self.inner.send(&authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Request>>,
    }

    impl Transport for Recording {
        fn send(&self, request: &Request) -> Result<Response> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(Response {
                status: 201,
                body: String::new(),
            })
        }
    }

    #[test]
    fn token_transport_leaves_original_untouched() {
        let inner = Arc::new(Recording::default());
        let transport = TokenAuthTransport::new("s3cr3t", inner.clone());
        let original =
            Request::new("GET", "https://api.example.com/x").header("Accept", "application/json");
        let before = original.clone();

        let response = transport.send(&original).unwrap();
        assert!(response.is_success());
        assert_eq!(original, before);

        let seen = inner.seen.lock().unwrap();
        assert_eq!(seen[0].headers.get("Authorization").map(String::as_str), Some("Bearer s3cr3t"));
        assert_eq!(seen[0].headers.get("Accept").map(String::as_str), Some("application/json"));
    }

    #[test]
    fn basic_auth_header() {
        let request = Request::new("PUT", "https://x").basic_auth("user", "pass");
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
    }
}
