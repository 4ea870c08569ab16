//! Telnet client for DX cluster nodes.
//!
//! This module owns the TCP connection to the cluster: it performs the
//! callsign login, runs a background task that feeds parsed spots into the
//! [`SpotStore`], and tears the session down on request.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::band::Region;
use crate::config::ConfigError;
use crate::parser;
use crate::spot::DxSpot;
use crate::store::SpotStore;

/// Default DX cluster node.
pub const DEFAULT_CLUSTER_HOST: &str = "dxc.nc7j.com";

/// Default DX cluster port.
pub const DEFAULT_CLUSTER_PORT: u16 = 7300;

/// How long `disconnect` waits for the receive task to stop.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from connection operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not connected to cluster")]
    NotConnected,

    #[error("Already connected to cluster")]
    AlreadyConnected,

    #[error("Connection timeout to {addr} after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the cluster client.
#[derive(Debug, Clone)]
pub struct ClusterClientConfig {
    /// Hostname of the cluster node.
    pub host: String,

    /// Port number.
    pub port: u16,

    /// Callsign to use for login.
    pub callsign: String,

    /// Region used for band lookups when none is given.
    pub region: Region,

    /// Number of spots kept in memory.
    pub buffer_size: usize,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Maximum silence on the connection before it is considered stale.
    pub receive_timeout: Duration,

    /// Settle delay before and after sending the login callsign.
    pub login_delay: Duration,

    /// Time `connect` waits for the server's initial backlog of spots.
    pub initial_wait: Duration,
}

impl Default for ClusterClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CLUSTER_HOST.to_string(),
            port: DEFAULT_CLUSTER_PORT,
            callsign: "N0CALL".to_string(),
            region: Region::Two,
            buffer_size: 500,
            connect_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(120),
            login_delay: Duration::from_secs(1),
            initial_wait: Duration::from_secs(3),
        }
    }
}

impl ClusterClientConfig {
    /// Create a new configuration with the given callsign.
    pub fn with_callsign(callsign: impl Into<String>) -> Self {
        Self {
            callsign: callsign.into(),
            ..Default::default()
        }
    }

    /// Set the host and port.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Check the values before any connection attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(0));
        }
        if self.callsign.trim().is_empty() {
            return Err(ConfigError::EmptyCallsign);
        }
        if self.buffer_size < 1 {
            return Err(ConfigError::InvalidBufferSize(self.buffer_size));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("Connection"));
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("Receive"));
        }
        Ok(())
    }
}

/// Lifecycle of a cluster connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session, or the last one has ended.
    Disconnected,
    /// TCP connection in progress.
    Connecting,
    /// Connected, sending the login callsign.
    Authenticating,
    /// Logged in and receiving spots.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Point-in-time view of the client for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    /// Whether the client is logged in and receiving.
    pub connected: bool,

    /// Current connection state.
    pub state: ConnectionState,

    /// Cluster hostname.
    pub host: String,

    /// Cluster port.
    pub port: u16,

    /// Callsign used for login.
    pub callsign: String,

    /// Region used for band lookups.
    pub iaru_region: Region,

    /// Spots currently held in the store.
    pub cached_spots: usize,

    /// Spots received since the client was created.
    pub total_spots: u64,

    /// Spots dropped to make room for newer ones.
    pub evicted_spots: u64,

    /// When the most recent spot arrived.
    pub last_spot_at: Option<DateTime<Utc>>,
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DX Cluster Connection Status:")?;
        writeln!(f, "• Connected: {}", self.connected)?;
        writeln!(f, "• Host: {}:{}", self.host, self.port)?;
        writeln!(f, "• Callsign: {}", self.callsign)?;
        writeln!(f, "• IARU Region: {}", self.iaru_region)?;
        write!(f, "• Cached spots: {}", self.cached_spots)
    }
}

/// A live connection: the write half plus the task reading the other half.
struct Session {
    writer: OwnedWriteHalf,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Session {
    /// Stop the receive task and close the socket.
    async fn close(mut self) {
        let _ = self.shutdown.send(true);
        stop_task(self.task, DISCONNECT_TIMEOUT).await;

        if let Err(e) = self.writer.shutdown().await {
            debug!("Error closing connection: {}", e);
        }
    }
}

/// Async DX cluster client.
///
/// Connecting and disconnecting must be serialized by the caller; queries
/// and [`status`](Self::status) may be called at any time from any task.
pub struct ClusterClient {
    config: ClusterClientConfig,
    store: Arc<SpotStore>,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<Session>>,
}

impl ClusterClient {
    /// Create a new client. Fails if the configuration is invalid.
    pub fn new(config: ClusterClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            store: Arc::new(SpotStore::new(config.buffer_size)),
            config,
            state: Arc::new(state),
            session: Mutex::new(None),
        })
    }

    /// The client's configuration.
    pub fn config(&self) -> &ClusterClientConfig {
        &self.config
    }

    /// Shared handle to the spot history.
    pub fn store(&self) -> Arc<SpotStore> {
        Arc::clone(&self.store)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether the client is logged in and receiving.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("Connection state: {}", state);
        self.state.send_replace(state);
    }

    /// Connect to the cluster, log in and start receiving spots.
    ///
    /// Returns once the receive task is running and the initial backlog wait
    /// has elapsed. Failures leave the client disconnected; no retry is made.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connect_with(TcpStream::connect((self.config.host.as_str(), self.config.port)))
            .await
    }

    /// Run the connect sequence over an already started dial.
    async fn connect_with<F>(&self, dial: F) -> Result<(), ClientError>
    where
        F: Future<Output = std::io::Result<TcpStream>>,
    {
        let mut session = self.session.lock().await;
        if session.is_some() && self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }
        // A previous session may have ended on its own (EOF or timeout).
        if let Some(stale) = session.take() {
            stale.close().await;
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Connecting to {}...", addr);
        self.set_state(ConnectionState::Connecting);

        let stream = match timeout(self.config.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", addr, e);
                self.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
            Err(_) => {
                warn!("Connection timeout to {}", addr);
                self.set_state(ConnectionState::Disconnected);
                return Err(ClientError::ConnectTimeout {
                    addr,
                    timeout: self.config.connect_timeout,
                });
            }
        };

        info!("Connected to {}", addr);
        self.set_state(ConnectionState::Authenticating);

        let (reader, mut writer) = stream.into_split();
        if let Err(e) = self.login(&mut writer).await {
            error!("Login failed: {}", e);
            self.set_state(ConnectionState::Disconnected);
            return Err(e.into());
        }

        self.set_state(ConnectionState::Connected);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(receive_loop(
            BufReader::new(reader),
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            shutdown_rx,
            self.config.receive_timeout,
        ));
        *session = Some(Session {
            writer,
            shutdown: shutdown_tx,
            task,
        });
        drop(session);

        tokio::time::sleep(self.config.initial_wait).await;
        Ok(())
    }

    /// Send the login callsign once the server has had time to prompt.
    async fn login<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> std::io::Result<()> {
        tokio::time::sleep(self.config.login_delay).await;
        info!("Sending callsign: {}", self.config.callsign);
        write_line(writer, &self.config.callsign).await?;
        tokio::time::sleep(self.config.login_delay).await;
        Ok(())
    }

    /// Stop receiving and close the connection. Safe to call in any state.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            info!("Disconnecting from {}:{}", self.config.host, self.config.port);
            session.close().await;
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Send a line of text to the cluster.
    pub async fn send_line(&self, text: &str) -> Result<(), ClientError> {
        let mut session = self.session.lock().await;
        match session.as_mut() {
            Some(session) if self.is_connected() => {
                write_line(&mut session.writer, text).await?;
                Ok(())
            }
            _ => Err(ClientError::NotConnected),
        }
    }

    /// Up to `count` most recent spots, oldest first.
    pub fn recent(&self, count: usize) -> Vec<DxSpot> {
        self.store.recent(count)
    }

    /// Spots whose callsign contains `pattern`, ignoring case.
    pub fn by_callsign(&self, pattern: &str) -> Vec<DxSpot> {
        self.store.by_callsign(pattern)
    }

    /// Spots between `min` and `max` kHz inclusive.
    pub fn by_frequency(&self, min: f64, max: f64) -> Vec<DxSpot> {
        self.store.by_frequency(min, max)
    }

    /// Spots on `band`.
    ///
    /// Without a region the configured one is used. An unrecognized region
    /// string falls back to region 2 rather than failing.
    pub fn by_band(&self, band: &str, region: Option<&str>) -> Vec<DxSpot> {
        let region = region.map_or(self.config.region, Region::lenient);
        self.store.by_band(band, region)
    }

    /// Copy of all stored spots.
    pub fn snapshot(&self) -> Vec<DxSpot> {
        self.store.snapshot()
    }

    /// Current status. Never blocks on the network.
    pub fn status(&self) -> ClusterStatus {
        let state = self.state();
        ClusterStatus {
            connected: state == ConnectionState::Connected,
            state,
            host: self.config.host.clone(),
            port: self.config.port,
            callsign: self.config.callsign.clone(),
            iaru_region: self.config.region,
            cached_spots: self.store.len(),
            total_spots: self.store.total_appended.load(Relaxed),
            evicted_spots: self.store.evicted.load(Relaxed),
            last_spot_at: self.store.last_append(),
        }
    }
}

impl Drop for ClusterClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            let _ = session.shutdown.send(true);
        }
    }
}

/// Wait up to `limit` for a receive task to finish, aborting it otherwise.
///
/// A stuck task must not outlive its session, or it could mark a newer
/// session as disconnected when it finally exits.
async fn stop_task(mut task: JoinHandle<()>, limit: Duration) {
    match timeout(limit, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Receive task failed: {}", e),
        Err(_) => {
            warn!(
                "Receive task did not stop within {} seconds, aborting",
                limit.as_secs()
            );
            task.abort();
        }
    }
}

/// Write `text` followed by a telnet line terminator.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(format!("{}\r\n", text).as_bytes()).await?;
    writer.flush().await
}

/// Decode one received line and store it if it is a spot.
///
/// Returns true if a spot was stored.
fn handle_line(bytes: &[u8], store: &SpotStore) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let line = text.trim();
    if line.is_empty() {
        return false;
    }

    match parser::parse_spot(line) {
        Ok(spot) => {
            trace!("Spot: {}", spot);
            store.append(spot);
            true
        }
        Err(e) => {
            if parser::looks_like_spot(line) {
                debug!("Rejected spot line '{}': {}", line, e);
            } else {
                debug!("Non-spot line: {}", line);
            }
            false
        }
    }
}

/// Read lines until shutdown, EOF, a read error or the receive timeout.
///
/// Always leaves the state at `Disconnected` on exit.
async fn receive_loop<R: AsyncBufRead + Unpin>(
    mut reader: R,
    store: Arc<SpotStore>,
    state: Arc<watch::Sender<ConnectionState>>,
    mut shutdown: watch::Receiver<bool>,
    receive_timeout: Duration,
) {
    let mut buf = Vec::with_capacity(256);

    let reason = loop {
        buf.clear();

        let read = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            result = timeout(receive_timeout, reader.read_until(b'\n', &mut buf)) => Some(result),
        };

        match read {
            None => break "shutdown requested",
            Some(Ok(Ok(0))) => break "connection closed by server",
            Some(Ok(Ok(_))) => {
                handle_line(&buf, &store);
            }
            Some(Ok(Err(e))) => {
                error!("Read error: {}", e);
                break "read error";
            }
            Some(Err(_)) => {
                warn!("Receive timeout, connection may be stale");
                break "receive timeout";
            }
        }
    };

    info!("Receive loop stopped: {}", reason);
    state.send_replace(ConnectionState::Disconnected);
}
