//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use load_harness::config::HarnessConfig;
use load_harness::http::HttpServer;
use load_harness::lifecycle::Shutdown;
use load_harness::work::{SimulatedWork, WorkArtifact};

/// Body a healthy harness server would return for request `id`.
pub fn receipt_body(id: u64) -> String {
    format!(r#"{{"id":{},"key":"0x{:040x}","elapse_ms":1}}"#, id, id)
}

/// Start a programmable mock backend with async support.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Work that blocks its thread for a fixed time.
pub struct SlowWork(pub Duration);

impl SimulatedWork for SlowWork {
    fn perform(&self, id: u64) -> WorkArtifact {
        std::thread::sleep(self.0);
        WorkArtifact {
            key: format!("slow-{}", id),
            rounds: 1,
        }
    }
}

/// Run a harness server on `addr` until the returned handle is triggered.
pub async fn start_harness_server(addr: SocketAddr, mut config: HarnessConfig, work: Option<Arc<dyn SimulatedWork>>) -> Shutdown {
    config.server.bind_address = addr.to_string();
    let server = match work {
        Some(work) => HttpServer::with_work(config, work),
        None => HttpServer::new(config),
    };

    let shutdown = Shutdown::new();
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
