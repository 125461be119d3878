use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Reports whether the network is currently reachable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Probes connectivity by opening a TCP connection to a well-known address.
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    address: String,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Default for TcpConnectivityProbe {
    fn default() -> Self {
        Self::new("1.1.1.1:443", Duration::from_secs(5))
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_connected(&self) -> bool {
        match timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Connectivity probe to {} failed: {e}", self.address);
                false
            }
            Err(_) => {
                debug!("Connectivity probe to {} timed out", self.address);
                false
            }
        }
    }
}
