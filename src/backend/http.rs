// src/backend/http.rs
use super::error::BackendError;
use super::transport::{Backend, Request, Response};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::collections::HashMap;
use url::Url;

const HEALTH_PATH: &str = "/health";

// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
    "content-length",
];

/// Reaches one backend address over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    client: Client,
}

impl HttpBackend {
    /// `addr` may omit the scheme, in which case `http://` is assumed.
    pub fn new(addr: &str) -> Result<Self, BackendError> {
        Self::with_client(addr, Client::new())
    }

    pub fn with_client(addr: &str, client: Client) -> Result<Self, BackendError> {
        let base = normalize_addr(addr)?;
        Ok(Self { base, client })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url_for(&self, path: &str) -> String {
        let mut url = String::with_capacity(self.base.len() + path.len() + 1);
        url.push_str(&self.base);
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);
        url
    }
}

fn normalize_addr(addr: &str) -> Result<String, BackendError> {
    let with_scheme = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| BackendError::InvalidAddress(addr.to_string(), e.to_string()))?;
    if parsed.host_str().is_none() {
        return Err(BackendError::InvalidAddress(
            addr.to_string(),
            "missing host".to_string(),
        ));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn invoke(&self, request: Request) -> Result<Response, BackendError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let mut builder = self.client.request(method, self.url_for(&request.path));
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if is_hop_by_hop(name.as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            body,
            headers,
        })
    }

    async fn health(&self) -> Result<(), BackendError> {
        let response = self.client.get(self.url_for(HEALTH_PATH)).send().await?;
        match response.status() {
            StatusCode::OK => Ok(()),
            other => Err(BackendError::Unhealthy(other.as_u16())),
        }
    }
}
