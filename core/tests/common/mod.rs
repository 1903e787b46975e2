#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use relaylog_core::config::RecordConfig;
use relaylog_core::transport::{Collector, TcpCollector};
use relaylog_core::WrapOptions;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Loopback collector that records every payload it receives.
pub struct TestCollector {
    pub port: u16,
    rx: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl TestCollector {
    pub async fn start() -> Self {
        Self::start_on(0).await
    }

    pub async fn start_on(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                // Read connections one at a time so arrival order is kept.
                let mut buf = Vec::new();
                if sock.read_to_end(&mut buf).await.is_ok() {
                    let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
                }
            }
        });
        Self { port, rx, task }
    }

    pub async fn next_message(&mut self, within: Duration) -> Option<String> {
        tokio::time::timeout(within, self.rx.recv()).await.ok().flatten()
    }

    pub async fn messages(&mut self, n: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_message(Duration::from_secs(5)).await {
                Some(msg) => out.push(msg),
                None => break,
            }
        }
        out
    }
}

impl Drop for TestCollector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A loopback port with nothing listening on it.
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn collector_on(port: u16) -> Arc<dyn Collector> {
    Arc::new(TcpCollector::new("127.0.0.1", port, Duration::from_secs(2)))
}

pub fn fast_options() -> WrapOptions {
    WrapOptions {
        buffer_size: 1024,
        retry_interval: Duration::from_millis(100),
        bootstrap_window: Duration::from_secs(10),
        term_grace: Duration::from_secs(5),
        drain_grace: Duration::from_secs(5),
        record: RecordConfig {
            hostname: Some("testhost".to_string()),
            app_name: "wrapped".to_string(),
            ..RecordConfig::default()
        },
    }
}

pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Message body after the `APPNAME: ` header.
pub fn body(msg: &str) -> &str {
    msg.split_once(" wrapped: ")
        .map(|(_, b)| b)
        .unwrap_or(msg)
        .trim_end_matches('\n')
}
