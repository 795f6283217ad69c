// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use backend_balancer::config::Config;
use backend_balancer::metrics::MetricsRegistry;
use backend_balancer::{Backend, BackendError, Balancer, Request, Response};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Knobs and counters shared between a test and its mock backend.
#[derive(Default)]
pub struct Script {
    pub fail: AtomicBool,
    pub hang: AtomicBool,
    pub healthy: AtomicBool,
    pub calls: AtomicUsize,
    pub probes: AtomicUsize,
}

impl Script {
    pub fn failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn hanging(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedBackend {
    name: String,
    script: Arc<Script>,
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn invoke(&self, _request: Request) -> Result<Response, BackendError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.hang.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.script.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!("{} refused", self.name)));
        }
        Ok(Response {
            status: 200,
            body: self.name.clone().into_bytes(),
            headers: Default::default(),
        })
    }

    async fn health(&self) -> Result<(), BackendError> {
        self.script.probes.fetch_add(1, Ordering::SeqCst);
        if self.script.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unhealthy(503))
        }
    }
}

pub struct Harness {
    pub balancer: Arc<Balancer>,
    pub scripts: Vec<Arc<Script>>,
    pub registry: MetricsRegistry,
}

impl Harness {
    pub fn new(names: &[&str]) -> Self {
        Self::with_config(names, Config::with_backends(names.iter().copied()))
    }

    pub fn with_config(names: &[&str], config: Config) -> Self {
        let registry = MetricsRegistry::new("balancer_").unwrap();
        let mut scripts = Vec::new();
        let backends = names
            .iter()
            .map(|name| {
                let script = Arc::new(Script::default());
                scripts.push(script.clone());
                let backend: Box<dyn Backend> = Box::new(ScriptedBackend {
                    name: name.to_string(),
                    script,
                });
                (name.to_string(), backend)
            })
            .collect();

        let balancer = Balancer::with_backends(backends, &config, registry.collector()).unwrap();
        Self {
            balancer: Arc::new(balancer),
            scripts,
            registry,
        }
    }

    pub fn global_errors(&self) -> u64 {
        self.balancer.metrics().errors.get()
    }
}

pub fn body(response: &Response) -> &str {
    std::str::from_utf8(&response.body).unwrap()
}

/// Captures formatted log output for the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}
