// src/backend/transport.rs
use super::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

/// How a pool member reaches its backend.
///
/// Implementations don't need to handle cancellation themselves: callers race
/// the returned future against their [`Context`](super::Context) and drop it.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn invoke(&self, request: Request) -> Result<Response, BackendError>;

    /// Out-of-band liveness probe. Only an explicit success may return `Ok`.
    async fn health(&self) -> Result<(), BackendError> {
        Err(BackendError::HealthUnsupported)
    }
}
