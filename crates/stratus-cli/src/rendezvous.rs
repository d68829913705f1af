//! Rendezvous relay for attached one-off processes.
//!
//! `run` receives a `tcp://` or `tcp+ssl://` URL whose path is a one-time
//! secret. The client connects, sends the secret, waits for the
//! acknowledgement and then shuttles bytes between the local terminal and
//! the remote process until either side closes.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};
use url::Url;

use crate::error::RendezvousError;
use crate::terminal::{ModeGuard, TerminalMode};

/// Deadline for connect, TLS and secret exchange together.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Port used when the rendezvous URL has none.
pub const DEFAULT_PORT: u16 = 5000;

const RELAY_BUFFER: usize = 1000;

/// Byte stream to the rendezvous service.
pub trait RelayStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RelayStream for T {}

/// An established, acknowledged rendezvous connection.
///
/// The reader keeps whatever the service sent past the acknowledgement.
pub type Connection = BufReader<Box<dyn RelayStream>>;

/// Rendezvous transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Plain TCP.
    Tcp,
    /// TCP wrapped in TLS.
    TcpSsl,
}

impl Transport {
    /// Acknowledgement lines the service sends after the secret.
    #[must_use]
    pub const fn ack_lines(self) -> usize {
        match self {
            Self::Tcp => 2,
            Self::TcpSsl => 1,
        }
    }
}

/// A parsed `tcp[+ssl]://host[:port]/<secret>` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct RendezvousUrl {
    /// Transport from the scheme.
    pub transport: Transport,
    /// Service host.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// One-time session secret.
    pub secret: String,
}

impl RendezvousUrl {
    /// Parse a rendezvous URL.
    ///
    /// # Errors
    ///
    /// Returns [`RendezvousError::InvalidUrl`] for an unknown scheme, a
    /// missing host or an empty secret.
    pub fn parse(raw: &str) -> Result<Self, RendezvousError> {
        let url = Url::parse(raw).map_err(|e| RendezvousError::InvalidUrl(format!("{raw}: {e}")))?;

        let transport = match url.scheme() {
            "tcp" => Transport::Tcp,
            "tcp+ssl" => Transport::TcpSsl,
            other => {
                return Err(RendezvousError::InvalidUrl(format!("unsupported scheme `{other}`")));
            }
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RendezvousError::InvalidUrl(format!("{raw}: missing host")))?
            .to_string();

        let secret = url.path().trim_start_matches('/').to_string();
        if secret.is_empty() {
            return Err(RendezvousError::InvalidUrl(format!("{raw}: missing secret")));
        }

        Ok(Self {
            transport,
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            secret,
        })
    }
}

impl std::fmt::Debug for RendezvousUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousUrl")
            .field("transport", &self.transport)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// A single rendezvous session.
#[derive(Debug)]
pub struct Rendezvous {
    url: RendezvousUrl,
    verify_tls: bool,
    connect_timeout: Duration,
}

impl Rendezvous {
    /// Prepare a session. `verify_tls` enables peer verification for
    /// `tcp+ssl`.
    #[must_use]
    pub const fn new(url: RendezvousUrl, verify_tls: bool) -> Self {
        Self {
            url,
            verify_tls,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Override the connect deadline.
    #[must_use]
    pub const fn with_connect_timeout(mut self, deadline: Duration) -> Self {
        self.connect_timeout = deadline;
        self
    }

    /// The session URL.
    #[must_use]
    pub const fn url(&self) -> &RendezvousUrl {
        &self.url
    }

    /// Connect and exchange the secret within the deadline.
    ///
    /// # Errors
    ///
    /// - [`RendezvousError::Timeout`] when the deadline passes
    /// - [`RendezvousError::Connect`] or [`RendezvousError::Tls`] when the
    ///   service cannot be reached or closes during the handshake
    pub async fn connect(&self) -> Result<Connection, RendezvousError> {
        debug!(host = %self.url.host, port = self.url.port, transport = ?self.url.transport, "connecting to rendezvous");
        timeout(self.connect_timeout, self.open())
            .await
            .unwrap_or(Err(RendezvousError::Timeout))
    }

    async fn open(&self) -> Result<Connection, RendezvousError> {
        let tcp = TcpStream::connect((self.url.host.as_str(), self.url.port))
            .await
            .map_err(RendezvousError::Connect)?;
        if let Err(e) = tcp.set_nodelay(true) {
            trace!(error = %e, "could not disable nagle");
        }

        let stream: Box<dyn RelayStream> = match self.url.transport {
            Transport::Tcp => Box::new(tcp),
            Transport::TcpSsl => {
                let connector = tls_connector(self.verify_tls)?;
                let tls = connector
                    .connect(&self.url.host, tcp)
                    .await
                    .map_err(RendezvousError::Tls)?;
                Box::new(tls)
            }
        };

        handshake(stream, &self.url.secret, self.url.transport.ack_lines())
            .await
            .map_err(RendezvousError::Connect)
    }

    /// Connect, switch `mode` to unbuffered, call `on_connect`, and relay
    /// until either side closes or the user presses Ctrl-C.
    ///
    /// # Errors
    ///
    /// See [`Rendezvous::connect`]; relay failures other than a closed or
    /// interrupted stream are [`RendezvousError::Io`].
    pub async fn start<I, O, F>(
        &self,
        input: I,
        output: O,
        mode: &mut dyn TerminalMode,
        on_connect: F,
    ) -> Result<(), RendezvousError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        F: FnOnce(),
    {
        self.run_until(input, output, mode, on_connect, tokio::signal::ctrl_c())
            .await
    }

    /// [`Rendezvous::start`] with an explicit shutdown future in place of
    /// Ctrl-C.
    ///
    /// # Errors
    ///
    /// See [`Rendezvous::start`].
    pub async fn run_until<I, O, F, S>(
        &self,
        input: I,
        output: O,
        mode: &mut dyn TerminalMode,
        on_connect: F,
        shutdown: S,
    ) -> Result<(), RendezvousError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        F: FnOnce(),
        S: Future,
    {
        let connection = self.connect().await?;

        let _guard = ModeGuard::acquire(mode)?;
        on_connect();
        relay(connection, input, output, shutdown).await
    }
}

fn tls_connector(verify: bool) -> Result<tokio_native_tls::TlsConnector, RendezvousError> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(!verify)
        .danger_accept_invalid_hostnames(!verify)
        .build()
        .map_err(RendezvousError::Tls)?;
    Ok(tokio_native_tls::TlsConnector::from(connector))
}

async fn handshake(
    stream: Box<dyn RelayStream>,
    secret: &str,
    ack_lines: usize,
) -> io::Result<Connection> {
    let mut stream = BufReader::new(stream);
    stream.write_all(format!("{secret}\n").as_bytes()).await?;
    stream.flush().await?;

    let mut line = Vec::new();
    for _ in 0..ack_lines {
        line.clear();
        if stream.read_until(b'\n', &mut line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "rendezvous closed before acknowledging",
            ));
        }
        trace!(ack = %String::from_utf8_lossy(&line).trim_end(), "rendezvous acknowledged");
    }
    Ok(stream)
}

/// Whether an I/O error just means the session is over.
fn ends_session(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof
    )
}

async fn forward<W: AsyncWrite + Unpin>(to: &mut W, bytes: &[u8]) -> io::Result<()> {
    to.write_all(bytes).await?;
    to.flush().await
}

async fn relay<R, I, O, S>(
    remote: R,
    mut input: I,
    mut output: O,
    shutdown: S,
) -> Result<(), RendezvousError>
where
    R: AsyncRead + AsyncWrite + Unpin,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    S: Future,
{
    let (mut remote_rx, mut remote_tx) = tokio::io::split(remote);
    let mut local_buf = [0u8; RELAY_BUFFER];
    let mut remote_buf = [0u8; RELAY_BUFFER];
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("relay interrupted");
                return Ok(());
            }
            read = remote_rx.read(&mut remote_buf) => {
                let n = match read {
                    Ok(0) => {
                        debug!("remote process closed the session");
                        return Ok(());
                    }
                    Ok(n) => n,
                    Err(e) if ends_session(&e) => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                match forward(&mut output, &remote_buf[..n]).await {
                    Ok(()) => {}
                    Err(e) if ends_session(&e) => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
            }
            read = input.read(&mut local_buf) => {
                let n = match read {
                    Ok(0) => {
                        debug!("local input closed");
                        return Ok(());
                    }
                    Ok(n) => n,
                    Err(e) if ends_session(&e) => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                match forward(&mut remote_tx, &local_buf[..n]).await {
                    Ok(()) => {}
                    Err(e) if ends_session(&e) => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}
