// src/main.rs
use anyhow::{Context, Result};
use backend_balancer::{
    balancer::Balancer,
    config::{self, Config},
    logging,
    metrics::MetricsRegistry,
    server::{RequestHandler, ServerBuilder},
};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load().await?;
    logging::init(&config.logging)?;

    // Initialize metrics
    let metrics_registry = Arc::new(
        MetricsRegistry::new(&config.metrics.prefix).context("Failed to create metrics registry")?,
    );

    let balancer = Arc::new(Balancer::new(&config, metrics_registry.collector())?);

    let shutdown = CancellationToken::new();

    // Start the reconciliation routine
    {
        let balancer = balancer.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { balancer.routine(shutdown).await });
    }

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(
            metrics_addr,
            metrics_registry,
            config.metrics.path.clone(),
            shutdown.clone(),
        )?;
    }

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let handler = RequestHandler::new(balancer, config.server.request_timeout());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Starting load balancer on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(handler)
        .with_shutdown(shutdown)
        .serve()
        .await?;

    Ok(())
}

/// Config file from the first argument; otherwise the environment
/// (`PORT`, `ADDRS`, ...) when `ADDRS` is set; otherwise `config.yaml`.
async fn load() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return config::load_config(&path).await;
    }
    if std::env::var_os("ADDRS").is_some() {
        return config::from_env();
    }
    config::load_config("config.yaml").await
}

fn start_metrics_server(
    addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
    path: String,
    shutdown: CancellationToken,
) -> Result<()> {
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let response = if req.uri().path() == path.as_str() {
                        let mut response = Response::new(Body::from(registry.gather()));
                        response.headers_mut().insert(
                            hyper::header::CONTENT_TYPE,
                            hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
                        );
                        response
                    } else {
                        let mut response = Response::new(Body::from("Not Found"));
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        response
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?
        .serve(make_service)
        .with_graceful_shutdown(async move { shutdown.cancelled().await });

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
