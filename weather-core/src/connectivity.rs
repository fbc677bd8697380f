use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Answers "is the network up right now".
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_network_available(&self) -> bool;
}

/// Treats a successful TCP connect to the API host as "online".
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { host: host.into(), port, timeout }
    }

    /// Probe the host and port that `url` points at.
    pub fn for_url(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let parsed = Url::parse(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL '{url}' has no host"))?
            .to_string();
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("URL '{url}' has no known port"))?;

        Ok(Self::new(host, port, timeout))
    }

    pub fn target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_network_available(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let up = matches!(tokio::time::timeout(self.timeout, connect).await, Ok(Ok(_)));
        debug!(host = %self.host, port = self.port, up, "connectivity probe");
        up
    }
}
