//! [`CommandServer`] – line-oriented JSON command server.
//!
//! Listens on `0.0.0.0:9030` by default (configurable via
//! [`CommandServer::with_addr`]).  Each connection may send any number of
//! request lines; every line gets exactly one response line, in order.
//! A line longer than [`MAX_LINE_LENGTH`] gets a `Failed` response and ends
//! the connection.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use roofd_kernel::RoofController;
use roofd_types::{Command, CommandStatus, Response, RoofError};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Default TCP port of the roof daemon.
pub const DEFAULT_PORT: u16 = 9030;

/// Longest request line accepted, in bytes.
pub const MAX_LINE_LENGTH: usize = 4096;

// ---------------------------------------------------------------------------
// CommandServer
// ---------------------------------------------------------------------------

pub struct CommandServer {
    controller: Arc<RoofController>,
    addr: SocketAddr,
}

impl CommandServer {
    /// Create a server for `controller` on `0.0.0.0:`[`DEFAULT_PORT`].
    pub fn new(controller: Arc<RoofController>) -> Self {
        Self {
            controller,
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }

    /// Override the listening address (builder-style).
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the listener without accepting connections yet.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::Io`] if the address cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, RoofError> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "command server listening");
        Ok(BoundServer {
            controller: self.controller,
            listener,
        })
    }

    /// Bind and serve until the controller shuts down.
    pub async fn run(self) -> Result<(), RoofError> {
        self.bind().await?.serve().await;
        Ok(())
    }
}

/// A server whose listener is bound; see [`CommandServer::bind`].
pub struct BoundServer {
    controller: Arc<RoofController>,
    listener: TcpListener,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr, RoofError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until [`RoofController::shutdown`] is called.
    pub async fn serve(self) {
        let mut shutdown = self.controller.subscribe_shutdown();
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let controller = Arc::clone(&self.controller);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, peer, controller).await {
                                warn!(%peer, error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("command server stopped");
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    controller: Arc<RoofController>,
) -> Result<(), RoofError> {
    debug!(%peer, "client connected");
    let (reader, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        let (response, keep_open) = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => (handle_line(&controller, peer.ip(), &line).await, true),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(%peer, limit = MAX_LINE_LENGTH, "request line too long; closing connection");
                (refuse(&controller, peer.ip()), false)
            }
            Err(LinesCodecError::Io(e)) => return Err(e.into()),
        };
        let mut encoded = serde_json::to_string(&response)
            .map_err(|e| RoofError::Protocol(format!("response encoding: {e}")))?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes()).await?;
        if !keep_open {
            break;
        }
    }
    debug!(%peer, "client disconnected");
    Ok(())
}

/// Response to a line that could not be decoded: the gate's refusal for an
/// unlisted origin, `Failed` otherwise.
fn refuse(controller: &RoofController, origin: IpAddr) -> Response {
    match controller.gate().check(origin) {
        Err(status) => status.into(),
        Ok(()) => CommandStatus::Failed.into(),
    }
}

/// Decode one request line and run it through the controller.
///
/// Unlisted origins are refused before the line is decoded.  A line that is
/// not a valid command yields a `Failed` response.
pub(crate) async fn handle_line(controller: &RoofController, origin: IpAddr, line: &str) -> Response {
    if let Err(status) = controller.gate().check(origin) {
        warn!(%origin, "request from unlisted origin refused");
        return status.into();
    }
    match serde_json::from_str::<Command>(line) {
        Ok(command) => controller.handle(origin, command).await,
        Err(e) => {
            warn!(%origin, error = %e, "malformed request");
            CommandStatus::Failed.into()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use roofd_hal::{RoofDriver, SimRoof};
    use roofd_kernel::AccessGate;
    use roofd_types::RoofState;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    const LOCAL: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn make_controller(allowed: IpAddr) -> Arc<RoofController> {
        let (roof, reports) = SimRoof::new(Duration::from_millis(10));
        let driver: Arc<dyn RoofDriver> = Arc::new(roof);
        Arc::new(
            RoofController::new(AccessGate::new([allowed]), driver, reports)
                .with_initial_state(RoofState::Closed),
        )
    }

    #[test]
    fn default_addr_uses_default_port() {
        let server = CommandServer::new(make_controller(LOCAL));
        assert_eq!(server.addr().port(), DEFAULT_PORT);
    }

    #[tokio::test]
    async fn malformed_line_fails() {
        let controller = make_controller(LOCAL);
        for line in ["not json", r#"{"command":"launch"}"#, r#"{"command":"heartbeat-enable"}"#] {
            let response = handle_line(&controller, LOCAL, line).await;
            assert_eq!(response.result.status(), Some(CommandStatus::Failed), "{line}");
        }
    }

    #[tokio::test]
    async fn line_is_dispatched_with_origin() {
        let controller = make_controller(LOCAL);
        let response = handle_line(&controller, LOCAL, r#"{"command":"status-query"}"#).await;
        assert!(response.result.is_success());
        assert_eq!(response.status.map(|s| s.roof), Some(RoofState::Closed));

        let stranger = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        let response = handle_line(&controller, stranger, r#"{"command":"open"}"#).await;
        assert_eq!(response.result.status(), Some(CommandStatus::InvalidControlIP));
    }

    #[tokio::test]
    async fn unlisted_origin_is_refused_before_decoding() {
        let controller = make_controller(LOCAL);
        let stranger = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        for line in ["not json", r#"{"command":"launch"}"#] {
            let response = handle_line(&controller, stranger, line).await;
            assert_eq!(response.result.status(), Some(CommandStatus::InvalidControlIP), "{line}");
        }
    }

    #[tokio::test]
    async fn serves_lines_over_tcp_until_shutdown() {
        let controller = make_controller(LOCAL);
        let server = CommandServer::new(Arc::clone(&controller))
            .with_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let serving = tokio::spawn(server.serve());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"garbage\n{\"command\":\"open\"}\n").await.unwrap();
        let first: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first.result.status(), Some(CommandStatus::Failed));
        let second: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(second.result.is_success());
        assert_eq!(controller.status_report().roof, RoofState::Open);

        controller.shutdown();
        tokio::time::timeout(Duration::from_secs(1), serving)
            .await
            .expect("server did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn oversized_line_is_refused_and_connection_closed() {
        let controller = make_controller(LOCAL);
        let server = CommandServer::new(Arc::clone(&controller))
            .with_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let serving = tokio::spawn(server.serve());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let mut request = "x".repeat(MAX_LINE_LENGTH + 100);
        request.push('\n');
        writer.write_all(request.as_bytes()).await.unwrap();
        let response: Response = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(response.result.status(), Some(CommandStatus::Failed));
        let closed = tokio::time::timeout(Duration::from_secs(1), lines.next_line())
            .await
            .expect("connection stayed open");
        assert!(matches!(closed, Ok(None) | Err(_)));

        controller.shutdown();
        serving.await.unwrap();
    }
}
