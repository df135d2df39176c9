use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::http_utils::{RawRequest, read_request};

pub const BACKEND_STATUS: u16 = 404;
pub const BACKEND_BODY: &str = "I am the backend";

/// A stand-in Alertmanager that records every request and answers each one
/// with a fixed response.
pub struct TestUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RawRequest>>>,
    handle: JoinHandle<()>,
}

impl TestUpstream {
    /// Answers `404 I am the backend`, so a forwarded request is easy to tell
    /// apart from a rejection.
    pub async fn backend() -> Result<Self> {
        let response = format!(
            "HTTP/1.1 {BACKEND_STATUS} Not Found\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{BACKEND_BODY}",
            BACKEND_BODY.len()
        );
        Self::spawn(Arc::new(response.into_bytes())).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RawRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    async fn spawn(response: Arc<Vec<u8>>) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let response = response.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, response, recorded).await;
                });
            }
        });
        Ok(Self {
            addr,
            requests,
            handle,
        })
    }
}

impl Drop for TestUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    response: Arc<Vec<u8>>,
    recorded: Arc<Mutex<Vec<RawRequest>>>,
) -> Result<()> {
    while let Some(request) = read_request(&mut stream).await? {
        recorded
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(request);
        stream.write_all(&response).await?;
        stream.flush().await?;
    }
    Ok(())
}
