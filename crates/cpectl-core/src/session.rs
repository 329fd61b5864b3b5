// ── Remote shell sessions ──
//
// The orchestrator only sees the `ShellSession` capability set. Sessions
// are produced by an injected `SessionFactory` and wrapped in a
// `ScopedSession` guard that disconnects on every exit path. Blocking
// transport calls run on tokio's blocking pool, one at a time.

use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::CoreError;

/// Transport-level shell failure.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authentication rejected for user '{0}'")]
    Auth(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("{0}")]
    Command(String),

    #[error("shell task aborted: {0}")]
    Aborted(String),
}

impl From<ssh2::Error> for ShellError {
    fn from(err: ssh2::Error) -> Self {
        Self::Command(err.to_string())
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        Self::Command(err.to_string())
    }
}

/// Capability set of a device shell connection.
///
/// Implementations are blocking; callers drive them from the blocking pool.
pub trait ShellSession: Send {
    fn connect(&mut self) -> Result<(), ShellError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Run one command and return its standard output.
    fn run_command(&mut self, command: &str) -> Result<String, ShellError>;
}

/// Where and as whom to open a shell.
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub host: String,
    pub port: u16,
    pub credential: Credential,
}

/// Produces unconnected sessions for a target.
pub trait SessionFactory: Send + Sync {
    fn open(&self, target: &SessionTarget) -> Box<dyn ShellSession>;
}

// ── ScopedSession ────────────────────────────────────────────────────

/// A connected session that is disconnected when the scope ends.
pub struct ScopedSession {
    session: Option<Box<dyn ShellSession>>,
    host: String,
    port: u16,
}

impl ScopedSession {
    /// Open and connect a session; fails unless it reports connected.
    pub async fn connect(
        factory: &dyn SessionFactory,
        target: &SessionTarget,
    ) -> Result<Self, CoreError> {
        debug!(host = %target.host, port = target.port, user = %target.credential.username, "opening shell session");
        let mut scoped = Self {
            session: Some(factory.open(target)),
            host: target.host.clone(),
            port: target.port,
        };

        if let Err(e) = scoped.blocking(|session| session.connect()).await {
            return Err(scoped.session_failure(&e.to_string()));
        }
        if !scoped.is_connected() {
            return Err(scoped.session_failure("session did not report connected"));
        }
        Ok(scoped)
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Run one command on the blocking pool.
    pub async fn run(&mut self, command: &str) -> Result<String, CoreError> {
        let owned = command.to_owned();
        self.blocking(move |session| session.run_command(&owned))
            .await
            .map_err(|e| CoreError::RemoteCommandFailure {
                command: command.to_owned(),
                reason: e.to_string(),
            })
    }

    /// Disconnect now instead of at drop.
    pub async fn close(mut self) {
        if let Some(mut session) = self.session.take() {
            let joined = tokio::task::spawn_blocking(move || session.disconnect()).await;
            if let Err(e) = joined {
                warn!(error = %e, "shell disconnect task failed");
            }
        }
    }

    pub(crate) fn session_failure(&self, reason: &str) -> CoreError {
        CoreError::SessionFailure {
            host: self.host.clone(),
            port: self.port,
            reason: reason.to_owned(),
        }
    }

    async fn blocking<T, F>(&mut self, f: F) -> Result<T, ShellError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn ShellSession) -> Result<T, ShellError> + Send + 'static,
    {
        let mut session = self.session.take().ok_or(ShellError::NotConnected)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = f(session.as_mut());
            (session, result)
        })
        .await
        .map_err(|e| ShellError::Aborted(e.to_string()))?;
        self.session = Some(session);
        result
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(host = %self.host, port = self.port, "releasing shell session");
            session.disconnect();
        }
    }
}

// ── ssh2 transport ───────────────────────────────────────────────────

/// Upper bound for the goodbye exchange; drop paths run it inline.
const DISCONNECT_TIMEOUT_MS: u32 = 2_000;

/// Pause between polls when neither stream had data.
const DRAIN_IDLE: Duration = Duration::from_millis(20);

/// Both output streams of one remote command.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Read whatever `stream` has ready into `sink`. `WouldBlock` counts as
/// no progress.
fn read_ready(
    stream: &mut impl Read,
    sink: &mut Vec<u8>,
    buf: &mut [u8],
) -> io::Result<bool> {
    match stream.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

/// Poll stdout and stderr in turn until a pass finds both idle and the
/// remote side has sent EOF. The streams must be non-blocking.
pub(crate) fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    mut at_eof: impl FnMut() -> bool,
) -> io::Result<CommandOutput> {
    let mut output = CommandOutput::default();
    let mut buf = [0u8; 8192];
    loop {
        let progressed = read_ready(stdout, &mut output.stdout, &mut buf)?
            | read_ready(stderr, &mut output.stderr, &mut buf)?;
        if progressed {
            continue;
        }
        if at_eof() {
            return Ok(output);
        }
        std::thread::sleep(DRAIN_IDLE);
    }
}

/// libssh2-backed shell session with password authentication.
pub struct Ssh2Session {
    target: SessionTarget,
    connect_timeout: Duration,
    session: Option<ssh2::Session>,
}

impl Ssh2Session {
    pub fn new(target: SessionTarget, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
            session: None,
        }
    }
}

impl ShellSession for Ssh2Session {
    fn connect(&mut self) -> Result<(), ShellError> {
        let addr = (self.target.host.as_str(), self.target.port)
            .to_socket_addrs()
            .map_err(|e| ShellError::Connect(e.to_string()))?
            .next()
            .ok_or_else(|| ShellError::Connect(format!("cannot resolve {}", self.target.host)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| ShellError::Connect(e.to_string()))?;

        let mut session = ssh2::Session::new().map_err(|e| ShellError::Connect(e.to_string()))?;
        let timeout_ms = u32::try_from(self.connect_timeout.as_millis()).unwrap_or(u32::MAX);
        session.set_timeout(timeout_ms);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| ShellError::Connect(e.to_string()))?;

        let credential = &self.target.credential;
        session
            .userauth_password(&credential.username, credential.password.expose_secret())
            .map_err(|_| ShellError::Auth(credential.username.clone()))?;
        if !session.authenticated() {
            return Err(ShellError::Auth(credential.username.clone()));
        }

        // Init scripts may take a while; only the handshake is bounded.
        session.set_timeout(0);
        self.session = Some(session);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.set_blocking(true);
            session.set_timeout(DISCONNECT_TIMEOUT_MS);
            if let Err(e) = session.disconnect(None, "cpectl session done", None) {
                debug!(error = %e, "ssh disconnect failed");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(ssh2::Session::authenticated)
    }

    fn run_command(&mut self, command: &str) -> Result<String, ShellError> {
        let session = self.session.as_ref().ok_or(ShellError::NotConnected)?;
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        let mut stdout = channel.stream(0);
        let mut stderr = channel.stderr();
        session.set_blocking(false);
        let drained = drain_streams(&mut stdout, &mut stderr, || channel.eof());
        session.set_blocking(true);
        let output = drained?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if exit_status == 0 {
            debug!(command, "remote command finished");
        } else {
            warn!(command, exit_status, stderr = %stderr.trim(), "remote command exited non-zero");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for Ssh2Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Factory for [`Ssh2Session`]s.
#[derive(Debug, Clone)]
pub struct Ssh2Factory {
    connect_timeout: Duration,
}

impl Ssh2Factory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl SessionFactory for Ssh2Factory {
    fn open(&self, target: &SessionTarget) -> Box<dyn ShellSession> {
        Box::new(Ssh2Session::new(target.clone(), self.connect_timeout))
    }
}
