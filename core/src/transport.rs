use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::CollectorConfig;

/// A log collector reachable by one self-contained send per record.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Human-readable address for diagnostics.
    fn endpoint(&self) -> String;

    async fn deliver(&self, payload: &[u8]) -> io::Result<()>;
}

/// Opens a fresh TCP connection per record, writes it and closes.
/// Nothing is read back from the collector.
pub struct TcpCollector {
    host: String,
    port: u16,
    attempt_timeout: Duration,
}

impl TcpCollector {
    pub fn new(host: impl Into<String>, port: u16, attempt_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            attempt_timeout,
        }
    }

    pub fn from_config(cfg: &CollectorConfig) -> Self {
        Self::new(cfg.host.clone(), cfg.port, cfg.connect_timeout())
    }

    async fn send_once(&self, payload: &[u8]) -> io::Result<()> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(payload).await?;
        stream.shutdown().await
    }
}

#[async_trait]
impl Collector for TcpCollector {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn deliver(&self, payload: &[u8]) -> io::Result<()> {
        match tokio::time::timeout(self.attempt_timeout, self.send_once(payload)).await {
            Ok(res) => res,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no completion within {:?}", self.attempt_timeout),
            )),
        }
    }
}
