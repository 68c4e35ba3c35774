//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const OWNER: &str = "0x00000000000000000000000000000000000000aa";
pub const PEER: &str = "0x00000000000000000000000000000000000000bb";

/// Start a mock indexer on an ephemeral port.
///
/// `route` maps the request path to a status code and JSON body.
pub async fn start_json_backend<F>(route: F) -> SocketAddr
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let route = Arc::new(route);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let route = Arc::clone(&route);
            tokio::spawn(async move {
                let _ = serve_one(socket, route.as_ref()).await;
            });
        }
    });

    addr
}

async fn serve_one<F>(mut socket: TcpStream, route: &F) -> std::io::Result<()>
where
    F: Fn(&str) -> (u16, String),
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    let (status, body) = route(&path);
    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    };
    let response = format!(
        "HTTP/1.1 {status_text}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

pub fn transfers_body() -> String {
    serde_json::json!({
        "transfers": [
            {
                "id": "t-old",
                "tx_hash": format!("0x{}", "11".repeat(32)),
                "from": PEER,
                "to": OWNER,
                "amount": "1000",
                "timestamp": 1_700_000_000u64
            },
            {
                "id": "t-new",
                "tx_hash": format!("0x{}", "22".repeat(32)),
                "from": OWNER,
                "to": PEER,
                "amount": "250",
                "timestamp": 1_700_000_500u64
            }
        ]
    })
    .to_string()
}

pub fn streams_body() -> String {
    serde_json::json!({
        "streams": [
            {
                "id": "s-1",
                "sender": PEER,
                "recipient": OWNER,
                "total_amount": "1000",
                "withdrawn_amount": "100",
                "streamed_amount": "1000",
                "start_time": 1_600_000_000u64,
                "end_time": 1_600_001_000u64,
                "status": "completed"
            }
        ]
    })
    .to_string()
}
