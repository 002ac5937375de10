//! Shared helpers for integration tests: a scripted probe transport and a
//! minimal HTTP responder for exercising the real reqwest transport.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use chaos_monitor::{
    ProbeRequest, ProbeResponse, ProbeTransport, ServiceDescriptor, ServiceKind, ServiceRegistry,
    TransportError,
};

/// Scripted behaviour for one URL
#[derive(Debug, Clone)]
pub enum Script {
    /// Complete after `delay` with `response`
    Respond {
        delay: Duration,
        response: ProbeResponse,
    },
    /// Fail after `delay` with `error`
    Fail {
        delay: Duration,
        error: TransportError,
    },
    /// Never complete, ignoring the request timeout
    Hang,
}

/// Transport whose outcome per URL is scripted up front
///
/// Unscripted URLs fail with a connection error.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: HashMap<String, Script>,
    panic_once: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: impl Into<String>, delay_ms: u64, status: u16) -> Self {
        self.scripts.insert(
            url.into(),
            Script::Respond {
                delay: Duration::from_millis(delay_ms),
                response: ProbeResponse::with_status(status),
            },
        );
        self
    }

    pub fn respond_with(
        mut self,
        url: impl Into<String>,
        delay_ms: u64,
        response: ProbeResponse,
    ) -> Self {
        self.scripts.insert(
            url.into(),
            Script::Respond {
                delay: Duration::from_millis(delay_ms),
                response,
            },
        );
        self
    }

    pub fn fail(mut self, url: impl Into<String>, delay_ms: u64, error: TransportError) -> Self {
        self.scripts.insert(
            url.into(),
            Script::Fail {
                delay: Duration::from_millis(delay_ms),
                error,
            },
        );
        self
    }

    pub fn hang(mut self, url: impl Into<String>) -> Self {
        self.scripts.insert(url.into(), Script::Hang);
        self
    }

    /// Panic on the first request to `url`, then follow its script
    pub fn panic_once(self, url: impl Into<String>) -> Self {
        self.panic_once.lock().insert(url.into());
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeTransport for MockTransport {
    fn transport_name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(request.url.clone()).or_insert(0) += 1;

        let should_panic = self.panic_once.lock().remove(&request.url);
        if should_panic {
            panic!("scripted panic for {}", request.url);
        }

        match self.scripts.get(&request.url).cloned() {
            Some(Script::Respond { delay, response }) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Script::Fail { delay, error }) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            Some(Script::Hang) => std::future::pending().await,
            None => Err(TransportError::Connect("connection refused".to_string())),
        }
    }
}

/// Generic service at `http://{name}.test`
pub fn service(name: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(name, format!("http://{name}.test"), ServiceKind::Generic)
}

/// Probe URL of [`service`]
pub fn health_url(name: &str) -> String {
    format!("http://{name}.test/health")
}

pub fn registry(names: &[&str]) -> Arc<ServiceRegistry> {
    Arc::new(
        ServiceRegistry::new(names.iter().map(|n| service(n)).collect())
            .expect("test registry should be valid"),
    )
}

/// Serve `responder(request_line)` as `(status, body)` on a local port.
/// Returns the base URL. Each connection gets one response and is closed.
pub async fn spawn_http_server<F>(responder: F) -> String
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let responder = Arc::new(responder);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let responder = Arc::clone(&responder);
            tokio::spawn(async move {
                let mut buffer = vec![0u8; 4096];
                let read = socket.read(&mut buffer).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buffer[..read]);
                let request_line = request.lines().next().unwrap_or_default().to_string();

                let (status, body) = responder(&request_line);
                let response = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// Accept connections and never answer them
pub async fn spawn_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}")
}

/// A local URL with nothing listening
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    format!("http://{addr}")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
