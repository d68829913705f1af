//! Log streaming and colorization.
//!
//! A log session is opened with one API call that returns a streaming URL;
//! a second long-lived GET on that URL delivers log chunks as they arrive.

use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};

use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::{ApiError, LogError};

/// Colors handed out to process types in order of first appearance.
pub const PALETTE: [u8; 5] = [36, 33, 32, 35, 31];

const RESET: &str = "\x1b[0m";

static LOG_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?\[(\w+)([\d.]+)?\]:)(.*)$").unwrap_or_else(|_| unreachable!())
});

/// Filters for a log session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Keep the session open for new lines.
    pub tail: bool,
    /// Number of past lines to replay.
    pub num: Option<u32>,
    /// Only this process or process type.
    pub ps: Option<String>,
    /// Only this log source.
    pub source: Option<String>,
}

impl LogOptions {
    /// Query parameters for the session request.
    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("logplex", "true".to_string())];
        if self.tail {
            query.push(("tail", "1".to_string()));
        }
        if let Some(num) = self.num {
            query.push(("num", num.to_string()));
        }
        if let Some(ps) = &self.ps {
            query.push(("ps", ps.clone()));
        }
        if let Some(source) = &self.source {
            query.push(("source", source.clone()));
        }
        query
    }
}

/// Assigns a stable color to each process type seen in a stream.
#[derive(Debug, Default)]
pub struct Colorizer {
    assigned: HashMap<String, usize>,
}

impl Colorizer {
    /// ANSI color code for `kind`, assigning the next palette entry on first
    /// sight.
    pub fn color_for(&mut self, kind: &str) -> u8 {
        let next = self.assigned.len();
        let idx = *self.assigned.entry(kind.to_string()).or_insert(next);
        PALETTE[idx % PALETTE.len()]
    }

    /// Colorize the headers of every line in `chunk`. Line breaks, blank
    /// lines included, are kept; lines without a header pass through
    /// unchanged.
    pub fn colorize(&mut self, chunk: &str) -> String {
        chunk
            .split('\n')
            .map(|line| self.colorize_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn colorize_line(&mut self, line: &str) -> String {
        match LOG_HEADER.captures(line) {
            Some(caps) => {
                let code = self.color_for(&caps[2]);
                format!("\x1b[{code}m{}{RESET}{}", &caps[1], &caps[4])
            }
            None => line.to_string(),
        }
    }
}

/// Receives the chunks of a log stream.
pub trait ChunkHandler {
    /// Handle one chunk. Returning `false` ends the stream quietly.
    fn on_chunk(&mut self, chunk: &[u8]) -> io::Result<bool>;

    /// The stream ended normally.
    fn on_end(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// The user interrupted the stream.
    fn on_interrupt(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes log chunks to an output, optionally colorized.
///
/// When colorizing, partial lines are held until their newline arrives so a
/// header split across two chunks is still recognized.
#[derive(Debug)]
pub struct LogSink<W> {
    out: W,
    colorizer: Option<Colorizer>,
    pending: Vec<u8>,
    closed: bool,
}

impl<W: Write> LogSink<W> {
    /// Create a sink over `out`.
    pub fn new(out: W, colorize: bool) -> Self {
        Self {
            out,
            colorizer: colorize.then(Colorizer::default),
            pending: Vec::new(),
            closed: false,
        }
    }

    /// Whether the output was closed by the reader.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Consume the sink, returning the output.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<bool> {
        if self.closed {
            return Ok(false);
        }
        match self.out.write_all(bytes).and_then(|()| self.out.flush()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("log output closed");
                self.closed = true;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn emit_colorized(&mut self, lines: &[u8]) -> io::Result<bool> {
        let Some(colorizer) = self.colorizer.as_mut() else {
            return self.emit(lines);
        };
        let text = colorizer.colorize(&String::from_utf8_lossy(lines));
        if text.is_empty() {
            return Ok(true);
        }
        self.emit(text.as_bytes())
    }
}

impl<W: Write> ChunkHandler for LogSink<W> {
    fn on_chunk(&mut self, chunk: &[u8]) -> io::Result<bool> {
        if self.colorizer.is_none() {
            return self.emit(chunk);
        }
        self.pending.extend_from_slice(chunk);
        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(true);
        };
        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        self.emit_colorized(&complete)
    }

    fn on_end(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rest = std::mem::take(&mut self.pending);
        self.emit_colorized(&rest).map(drop)
    }

    fn on_interrupt(&mut self) -> io::Result<()> {
        if self.colorizer.is_some() {
            self.emit(RESET.as_bytes())?;
        }
        Ok(())
    }
}

/// Feed `chunks` to `handler` until the stream ends, the handler declines
/// more input, or `interrupt` resolves.
///
/// # Errors
///
/// Returns [`LogError::Interrupted`] after `interrupt` fires,
/// [`LogError::Transport`] if the stream fails and [`LogError::Io`] if the
/// handler fails.
pub async fn drain<S, I, H>(chunks: S, interrupt: I, handler: &mut H) -> Result<(), LogError>
where
    S: Stream<Item = Result<Vec<u8>, reqwest::Error>>,
    I: Future,
    H: ChunkHandler + ?Sized,
{
    tokio::pin!(chunks);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                handler.on_interrupt()?;
                return Err(LogError::Interrupted);
            }
            next = chunks.next() => match next {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.len(), "log chunk");
                    if !handler.on_chunk(&chunk)? {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(LogError::Transport(e)),
                None => {
                    handler.on_end()?;
                    return Ok(());
                }
            },
        }
    }
}

/// Opens log sessions for apps.
#[derive(Debug, Clone, Copy)]
pub struct LogStreamer<'a> {
    client: &'a ApiClient,
}

impl<'a> LogStreamer<'a> {
    /// Create a streamer using `client` for the session request.
    #[must_use]
    pub const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Ask the API for a streaming URL.
    ///
    /// # Errors
    ///
    /// Returns the API error, or [`ApiError::InvalidUrl`] if the body is not
    /// a URL.
    pub async fn session_url(&self, app: &str, options: &LogOptions) -> Result<Url, LogError> {
        let response = self
            .client
            .call(&endpoints::LOG_SESSION, &[("app", app)], &options.query(), None)
            .await?;
        let text = response.body.text();
        let url = Url::parse(text.trim())
            .map_err(|e| ApiError::InvalidUrl(format!("log session URL: {e}")))?;
        debug!(%app, "log session opened");
        Ok(url)
    }

    /// Open a log session and return its chunk stream.
    ///
    /// # Errors
    ///
    /// See [`LogStreamer::session_url`]; the streaming GET may also fail.
    pub async fn chunks(
        &self,
        app: &str,
        options: &LogOptions,
    ) -> Result<impl Stream<Item = Result<Vec<u8>, reqwest::Error>> + use<'a>, LogError> {
        let url = self.session_url(app, options).await?;
        self.follow(url).await
    }

    /// Start the streaming GET on a session URL.
    ///
    /// # Errors
    ///
    /// Returns the API error if the stream endpoint rejects the request.
    pub async fn follow(
        &self,
        url: Url,
    ) -> Result<impl Stream<Item = Result<Vec<u8>, reqwest::Error>> + use<'a>, LogError> {
        let response = self.client.open_stream(url).await?;
        Ok(futures::stream::unfold(Some(response), |state| async move {
            let mut response = state?;
            match response.chunk().await {
                Ok(Some(bytes)) => Some((Ok(bytes.to_vec()), Some(response))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        }))
    }

    /// Stream the app's logs into `handler` until the server closes the
    /// stream, the handler stops, or `interrupt` resolves.
    ///
    /// # Errors
    ///
    /// See [`LogStreamer::chunks`] and [`drain`].
    pub async fn stream<I, H>(
        &self,
        app: &str,
        options: &LogOptions,
        interrupt: I,
        handler: &mut H,
    ) -> Result<(), LogError>
    where
        I: Future,
        H: ChunkHandler + ?Sized,
    {
        let chunks = self.chunks(app, options).await?;
        drain(chunks, interrupt, handler).await
    }
}
