//! A gateway stand-in on a real socket, so that tests can drive the engine through [`GatewayApi`].
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use cpg_common::Secret;
use gateway_tools::{GatewayApi, GatewayConfig, RetryPolicy};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

pub const SERVER_KEY: &str = "stub-server-key";

/// Answers each request with the next scripted `(status, body)`. The last entry repeats once the script runs out.
pub async fn start(script: Vec<(u16, String)>) -> GatewayApi {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(reply(stream, script.clone()));
        }
    });
    let config = GatewayConfig {
        base_url: format!("http://{addr}"),
        server_key: Secret::new(SERVER_KEY.to_string()),
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    GatewayApi::new(config).unwrap().with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1)))
}

async fn reply(mut stream: TcpStream, script: Arc<Mutex<VecDeque<(u16, String)>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    // Read the head, then as much body as Content-Length promises
    let expected = loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break end + 4 + length;
        }
    };
    while buf.len() < expected {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let (status, body) = {
        let mut script = script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or((500, String::new()))
        }
    };
    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: \
         close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
