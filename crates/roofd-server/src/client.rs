//! [`RoofClient`] – async client for the roof daemon.

use std::net::SocketAddr;
use std::time::Duration;

use roofd_types::{Command, CommandStatus, Response, RoofError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Upper bound on a single request, long enough for a full roof motion.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct RoofClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl RoofClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    /// Override the request timeout (builder-style).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send `command` and wait for its response.
    ///
    /// Never fails: connection, I/O, timeout and decoding problems are
    /// reported as [`CommandStatus::CommunicationFailure`].
    pub async fn send(&self, command: &Command) -> Response {
        match tokio::time::timeout(self.timeout, self.exchange(command)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(addr = %self.addr, %command, error = %e, "request failed");
                CommandStatus::CommunicationFailure.into()
            }
            Err(_) => {
                warn!(addr = %self.addr, %command, timeout = ?self.timeout, "request timed out");
                CommandStatus::CommunicationFailure.into()
            }
        }
    }

    async fn exchange(&self, command: &Command) -> Result<Response, RoofError> {
        let mut request = serde_json::to_string(command)
            .map_err(|e| RoofError::Protocol(format!("request encoding: {e}")))?;
        request.push('\n');

        let stream = TcpStream::connect(self.addr).await?;
        let (reader, mut writer) = stream.into_split();
        writer.write_all(request.as_bytes()).await?;
        debug!(addr = %self.addr, %command, "request sent");

        let line = BufReader::new(reader)
            .lines()
            .next_line()
            .await?
            .ok_or_else(|| RoofError::Protocol("connection closed before response".into()))?;
        serde_json::from_str(&line).map_err(|e| RoofError::Protocol(format!("bad response: {e}")))
    }
}
