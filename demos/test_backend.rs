//! demos/test_backend.rs
//! Mock upstream for local runs of the balancer.
//! Run: PORT=8001 cargo run --example test_backend

use anyhow::{bail, Context, Result};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;
use tracing::info;

#[derive(Clone)]
struct BackendState {
    counter: Arc<AtomicU32>,
    healthy_flag: Arc<AtomicBool>,
}

async fn handle(req: Request<Body>, state: BackendState) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/health") => {
            if state.healthy_flag.load(Ordering::SeqCst) {
                empty(StatusCode::OK)
            } else {
                empty(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
        (&Method::GET, "/count") => {
            let delay = rand::thread_rng().gen_range(1..=100);
            sleep(Duration::from_millis(delay)).await;

            let count = state.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let body = serde_json::json!({ "count": count.to_string() }).to_string();
            let mut response = Response::new(Body::from(body));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        _ => empty(StatusCode::NOT_FOUND),
    };
    Ok(response)
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8001".into())
        .parse()
        .context("wrong port env var")?;
    if port <= 1000 || port == u16::MAX {
        bail!("wrong port env var");
    }

    let state = BackendState {
        counter: Arc::new(AtomicU32::new(0)),
        healthy_flag: Arc::new(AtomicBool::new(true)),
    };

    // FLAP_SECS=n toggles /health every n seconds.
    if let Some(secs) = std::env::var("FLAP_SECS").ok().and_then(|v| v.parse().ok()) {
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(secs)).await;
                let healthy = !st.healthy_flag.fetch_xor(true, Ordering::SeqCst);
                info!(healthy, "health flipped");
            }
        });
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, st.clone()))) }
    });

    info!("listening on {}", addr);
    Server::try_bind(&addr)?.serve(make_svc).await?;
    Ok(())
}
