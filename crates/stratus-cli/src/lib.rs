//! # stratus-cli
//!
//! Command-line client for the Stratus application platform.
//!
//! Provides commands for:
//! - Logging in and managing stored credentials
//! - Creating, renaming and destroying apps
//! - Config vars and process restarts
//! - Attached one-off processes
//! - Log streaming
//!
//! # Architecture
//!
//! Commands talk to the platform's HTTP API through a [`session::Session`],
//! which owns the credentials and re-prompts when the API rejects them. The
//! target app is resolved from `--app`, `--remote` or the working
//! directory's git remotes. Attached processes are relayed over a separate
//! TCP (optionally TLS) rendezvous connection.
//!
//! ```text
//! ┌─────────┐   HTTPS (JSON)    ┌──────────────┐
//! │ stratus │◄─────────────────►│  API server  │
//! │         │   TCP / TLS       ├──────────────┤
//! │         │◄─────────────────►│  rendezvous  │
//! └─────────┘                   └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod logs;
pub mod output;
pub mod remotes;
pub mod rendezvous;
pub mod session;
pub mod terminal;

pub use cli::{Cli, Commands, Format, LogsArgs, RunArgs};
pub use client::ApiClient;
pub use config::Config;
pub use error::CliError;
pub use output::OutputFormat;
