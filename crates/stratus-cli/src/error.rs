//! CLI error types.
//!
//! Each component has its own error enum; [`CliError`] wraps them at the
//! command layer and decides the process exit code.

use std::io;

use thiserror::Error;

/// Errors returned by the platform API, classified by response status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401: the credentials were rejected.
    #[error("authentication failure")]
    Unauthorized,

    /// 402: the action needs billing confirmation.
    #[error("payment required: {message}")]
    PaymentRequired {
        /// Server-supplied explanation.
        message: String,
    },

    /// 402 with a `verification_required` error id.
    #[error("account verification required: {message}")]
    VerificationRequired {
        /// Server-supplied explanation.
        message: String,
    },

    /// 403.
    #[error("access denied: {message}")]
    Forbidden {
        /// Server-supplied explanation.
        message: String,
    },

    /// 404.
    #[error("{message}")]
    NotFound {
        /// Server-supplied explanation.
        message: String,
    },

    /// 404 on a path whose app segment was empty.
    #[error("no app specified")]
    NilApp,

    /// 408.
    #[error("API request timed out, please try again")]
    Timeout,

    /// 422 and 5xx.
    #[error("{message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Server-supplied explanation.
        message: String,
    },

    /// 423.
    #[error("resource locked: {message}")]
    Locked {
        /// Server-supplied explanation.
        message: String,
    },

    /// 429.
    #[error("API rate limit exceeded, please try again later")]
    RateLimited,

    /// Any other non-success status.
    #[error("unexpected response ({status}): {message}")]
    Generic {
        /// HTTP status code.
        status: u16,
        /// Server-supplied explanation.
        message: String,
    },

    /// The request could not be built from the given URL or parameters.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Connection, TLS or protocol failure below HTTP.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether this error should trigger a credential re-prompt.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors raised while deciding which app a command targets.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Malformed `--app`/`--remote` usage.
    #[error("{0}")]
    Usage(String),

    /// Several distinct apps among the git remotes and no override.
    #[error("multiple apps in git remotes for this directory ({}); specify one with --app or --remote", .0.join(", "))]
    AmbiguousApp(Vec<String>),

    /// No override and no matching git remote.
    #[error("no app specified; run this command from an app folder or pass --app <app>")]
    NoApp,

    /// `--remote` named a remote that does not point at a stratus app.
    #[error("git remote `{0}` is not a stratus app remote")]
    UnknownRemote(String),

    /// Running `git` failed.
    #[error("git: {0}")]
    Git(#[from] io::Error),
}

/// Errors from a rendezvous session.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// The rendezvous URL could not be parsed.
    #[error("invalid rendezvous URL: {0}")]
    InvalidUrl(String),

    /// Connect and handshake did not finish before the deadline.
    #[error("Timeout awaiting process")]
    Timeout,

    /// The TCP connection was refused or reset.
    #[error("Error connecting to process")]
    Connect(#[source] io::Error),

    /// The TLS handshake failed.
    #[error("Error connecting to process")]
    Tls(#[source] native_tls::Error),

    /// Any other I/O failure during the session.
    #[error("relay I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from a log stream.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log session request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The streaming connection failed.
    #[error("log stream failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The user interrupted the stream.
    #[error("interrupted")]
    Interrupted,

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Credentials were rejected on every attempt.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// A remote API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// App resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A rendezvous session failed.
    #[error(transparent)]
    Rendezvous(#[from] RendezvousError),

    /// A log stream failed.
    #[error(transparent)]
    Logs(#[from] LogError),

    /// Malformed command invocation.
    #[error("{0}")]
    Usage(String),

    /// The user declined a confirmation.
    #[error("{0}")]
    Cancelled(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_)
            | Self::Resolve(
                ResolveError::Usage(_)
                | ResolveError::AmbiguousApp(_)
                | ResolveError::NoApp
                | ResolveError::UnknownRemote(_),
            ) => 2,
            _ => 1,
        }
    }
}
