//! # Integration Test Support
//!
//! Shared fixtures for the tests under `tests/`: scripted capabilities with
//! call counters, a deadline-bounded wait, and a mock HTTP server on a
//! random local port.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lib_refdata::ReferenceDefinition;
use serde_json::Value;

/// Counts calls made to a scripted capability.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// A definition whose retriever returns `payloads[n]` on its n-th call,
/// repeating the last one (or failing, if `then_fail`) once exhausted.
pub fn scripted(name: &str, payloads: Vec<Value>, then_fail: bool, changed: Option<bool>) -> (ReferenceDefinition, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let payloads = Arc::new(payloads);
    let definition = ReferenceDefinition::new(name)
        .retriever(move || {
            let n = counter.bump();
            let payloads = Arc::clone(&payloads);
            async move {
                match payloads.get(n) {
                    Some(payload) => Ok(payload.clone()),
                    None if then_fail => Err(anyhow::anyhow!("upstream unavailable")),
                    None => payloads.last().cloned().ok_or_else(|| anyhow::anyhow!("no payloads")),
                }
            }
        })
        .poller(move || async move { Ok(changed) });
    (definition, calls)
}

/// A definition alternating between two payloads on every fetch.
pub fn alternating(name: &str, first: Value, second: Value) -> (ReferenceDefinition, Calls) {
    let calls = Calls::default();
    let counter = calls.clone();
    let definition = ReferenceDefinition::new(name)
        .retriever(move || {
            let n = counter.bump();
            let payload = if n % 2 == 0 { first.clone() } else { second.clone() };
            async move { Ok(payload) }
        })
        .poller(|| async { Ok(Some(true)) });
    (definition, calls)
}

/// Polls `condition` every few milliseconds until it holds or `within` elapses.
pub async fn eventually<F>(within: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// What the mock server answers for one request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(body: &Value) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Serves every connection on a background thread until the process exits.
///
/// `respond` receives the request method and the zero-based request number.
/// Returns the server's base URL.
pub fn mock_server<F>(respond: F) -> String
where
    F: Fn(&str, usize) -> MockResponse + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().expect("no local addr").port();

    thread::spawn(move || {
        let mut served = 0;
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 4096];
            let Ok(read) = stream.read(&mut buf) else { continue };
            let request = String::from_utf8_lossy(&buf[..read]);
            let method = request.split_whitespace().next().unwrap_or("GET").to_string();

            let response = respond(&method, served);
            served += 1;

            let mut head = format!(
                "HTTP/1.1 {} MOCK\r\nContent-Length: {}\r\nConnection: close\r\n",
                response.status,
                response.body.len()
            );
            for (name, value) in &response.headers {
                head.push_str(&format!("{}: {}\r\n", name, value));
            }
            head.push_str("\r\n");

            let _ = stream.write_all(head.as_bytes());
            if method != "HEAD" {
                let _ = stream.write_all(response.body.as_bytes());
            }
            let _ = stream.flush();
        }
    });

    format!("http://127.0.0.1:{}/data.json", port)
}
