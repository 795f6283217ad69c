// src/server/handler.rs
use crate::backend::{self, Context};
use crate::balancer::{Balancer, BalancerError};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::Service;
use tracing::Instrument;

/// Answers `/health` locally and forwards everything else through the balancer.
#[derive(Clone)]
pub struct RequestHandler {
    balancer: Arc<Balancer>,
    request_timeout: Duration,
}

impl RequestHandler {
    pub fn new(balancer: Arc<Balancer>, request_timeout: Duration) -> Self {
        Self {
            balancer,
            request_timeout,
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        if req.method() == Method::GET && req.uri().path() == "/health" {
            return Response::new(Body::empty());
        }

        let request = match into_backend_request(req).await {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return status_response(StatusCode::BAD_REQUEST, "Bad request");
            }
        };

        // Dropping this future (client went away) drops the backend call too.
        let ctx = Context::new().with_timeout(self.request_timeout);
        match self.balancer.invoke(&ctx, request).await {
            Ok(response) => from_backend_response(response),
            Err(err) => {
                tracing::warn!(error = %err, "request failed");
                err.into()
            }
        }
    }
}

async fn into_backend_request(req: Request<Body>) -> Result<backend::Request, hyper::Error> {
    let (parts, body) = req.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut headers = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let body = hyper::body::to_bytes(body).await?.to_vec();

    Ok(backend::Request {
        method: parts.method.as_str().to_string(),
        path,
        body,
        headers,
    })
}

fn from_backend_response(response: backend::Response) -> Response<Body> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| status_response(StatusCode::BAD_GATEWAY, "Bad gateway"))
}

fn status_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

// Convert BalancerError to a Hyper response for the client
impl From<BalancerError> for Response<Body> {
    fn from(err: BalancerError) -> Self {
        match err {
            BalancerError::NoBackend | BalancerError::EmptyPool => {
                status_response(StatusCode::SERVICE_UNAVAILABLE, "No backend available")
            }
            _ => status_response(StatusCode::GATEWAY_TIMEOUT, "Gateway timeout"),
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        let span = tracing::info_span!(
            "request",
            id = %uuid::Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        );
        Box::pin(async move { Ok(handler.handle(req).await) }.instrument(span))
    }
}
