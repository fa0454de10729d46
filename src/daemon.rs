use std::{fmt, thread, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Relative path of the item the daemon is currently playing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAddr {
    pub host: String,
    pub port: u16,
}

impl DaemonAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for DaemonAddr {
    fn default() -> Self {
        Self::new("localhost", 6600)
    }
}

impl fmt::Display for DaemonAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Nothing is listening yet. The only failure the connect step retries.
    #[error("connection to {addr} refused")]
    Refused {
        addr: DaemonAddr,
        #[source]
        source: BoxError,
    },
    #[error("failed to connect to {addr}")]
    Connect {
        addr: DaemonAddr,
        #[source]
        source: BoxError,
    },
    #[error("daemon request `{op}` failed")]
    Request {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl SessionError {
    pub fn request(op: &'static str, source: impl Into<BoxError>) -> Self {
        SessionError::Request {
            op,
            source: source.into(),
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, SessionError::Refused { .. })
    }
}

/// One live connection to the daemon.
pub trait DaemonClient {
    /// The playing track, or `None` when playback is stopped.
    fn current_track(&mut self) -> Result<Option<TrackRef>, SessionError>;

    /// Blocks until the daemon reports any state change.
    fn block_until_change(&mut self) -> Result<(), SessionError>;

    /// Raw embedded picture bytes for `track`; `None` when the file carries none.
    fn fetch_embedded_art(&mut self, track: &TrackRef) -> Result<Option<Vec<u8>>, SessionError>;

    fn disconnect(&mut self) -> Result<(), SessionError>;
}

pub trait Connector {
    type Client: DaemonClient;

    fn connect(&mut self, addr: &DaemonAddr) -> Result<Self::Client, SessionError>;

    /// Pause between connection attempts.
    fn backoff(&mut self, delay: Duration) {
        thread::sleep(delay);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Owns exactly one daemon connection and disconnects it exactly once,
/// either through [`Session::close`] or when dropped (including while
/// unwinding out of a failed request).
pub struct Session<C: DaemonClient> {
    client: Option<C>,
    addr: DaemonAddr,
    state: SessionState,
}

impl<C: DaemonClient> Session<C> {
    /// A session with no connection yet; dropping it releases nothing.
    pub fn new(addr: DaemonAddr) -> Self {
        Self {
            client: None,
            addr,
            state: SessionState::Disconnected,
        }
    }

    /// Creates a session and connects it. See [`Session::connect`].
    pub fn open<K>(connector: &mut K, addr: &DaemonAddr, policy: RetryPolicy) -> Result<Self, SessionError>
    where
        K: Connector<Client = C>,
    {
        let mut session = Self::new(addr.clone());
        session.connect(connector, policy)?;
        Ok(session)
    }

    /// Connects with bounded retry. Only a refused connection is retried;
    /// any other error, or refusal on the last attempt, is returned as is.
    pub fn connect<K>(&mut self, connector: &mut K, policy: RetryPolicy) -> Result<(), SessionError>
    where
        K: Connector<Client = C>,
    {
        if self.client.is_some() {
            return Ok(());
        }

        self.state = SessionState::Connecting;
        let addr = &self.addr;
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(%addr, attempt, "connecting to daemon");
            match connector.connect(addr) {
                Ok(client) => {
                    info!(%addr, attempt, "connected to daemon");
                    self.client = Some(client);
                    self.state = SessionState::Connected;
                    return Ok(());
                }
                Err(err) if err.is_refused() && attempt < attempts => {
                    warn!(%addr, attempt, attempts, "daemon refused connection, retrying");
                    connector.backoff(policy.delay);
                    attempt += 1;
                }
                Err(err) => {
                    self.state = SessionState::Failed;
                    return Err(err);
                }
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn addr(&self) -> &DaemonAddr {
        &self.addr
    }

    pub fn current_track(&mut self) -> Result<Option<TrackRef>, SessionError> {
        let result = self.client_mut()?.current_track();
        self.track_failure(result)
    }

    pub fn block_until_change(&mut self) -> Result<(), SessionError> {
        let result = self.client_mut()?.block_until_change();
        self.track_failure(result)
    }

    pub fn fetch_embedded_art(&mut self, track: &TrackRef) -> Result<Option<Vec<u8>>, SessionError> {
        let result = self.client_mut()?.fetch_embedded_art(track);
        self.track_failure(result)
    }

    pub fn close(mut self) -> Result<(), SessionError> {
        self.release()
    }

    fn client_mut(&mut self) -> Result<&mut C, SessionError> {
        self.client
            .as_mut()
            .ok_or_else(|| SessionError::request("session", "session already closed"))
    }

    fn track_failure<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    fn release(&mut self) -> Result<(), SessionError> {
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };
        let result = client.disconnect();
        if self.state == SessionState::Connected {
            self.state = SessionState::Disconnected;
        }
        info!(addr = %self.addr, "disconnected from daemon");
        result
    }
}

/// The one daemon request an art resolver may issue.
pub trait EmbeddedArtFetch {
    fn fetch_embedded_art(&mut self, track: &TrackRef) -> Result<Option<Vec<u8>>, SessionError>;
}

impl<C: DaemonClient> EmbeddedArtFetch for Session<C> {
    fn fetch_embedded_art(&mut self, track: &TrackRef) -> Result<Option<Vec<u8>>, SessionError> {
        Session::fetch_embedded_art(self, track)
    }
}

impl<C: DaemonClient> Drop for Session<C> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            debug!(error = %err, "disconnect failed");
        }
    }
}
