//! Loopback HTTP stub used by probe, supervisor and status tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Request line and headers seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    fn parse(raw: &str) -> Self {
        let mut lines = raw.split("\r\n");
        let path = lines
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default()
            .to_string();
        let headers = lines
            .take_while(|line| !line.is_empty())
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Self { path, headers }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Minimal HTTP/1.1 server answering every request with a configurable
/// status. A status of 0 means "accept and never answer".
pub struct StubServer {
    addr: std::net::SocketAddr,
    status: Arc<AtomicU16>,
    requests: mpsc::UnboundedReceiver<RecordedRequest>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status = Arc::new(AtomicU16::new(status));
        let (tx, requests) = mpsc::unbounded_channel();

        let shared = Arc::clone(&status);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                let status = shared.load(Ordering::SeqCst);
                tokio::spawn(serve(stream, status, tx));
            }
        });

        Self {
            addr,
            status,
            requests,
            handle,
        }
    }

    pub async fn start_hanging() -> Self {
        Self::start(0).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    /// Shared handle for flipping the status from another task.
    pub fn status_handle(&self) -> Arc<AtomicU16> {
        Arc::clone(&self.status)
    }

    /// Whether a request arrived that `next_request` has not consumed.
    pub fn has_pending_request(&mut self) -> bool {
        self.requests.try_recv().is_ok()
    }

    pub async fn next_request(&mut self) -> RecordedRequest {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("timed out waiting for request")
            .expect("stub server stopped")
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, status: u16, tx: mpsc::UnboundedSender<RecordedRequest>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let _ = tx.send(RecordedRequest::parse(&String::from_utf8_lossy(&buf)));

    if status == 0 {
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// URL of a loopback port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
