//! CLI command implementations.
//!
//! Each submodule implements one command group:
//! - [`auth`] - Login, logout and identity
//! - [`apps`] - App lifecycle and git remote bookkeeping
//! - [`config`] - Config vars
//! - [`ps`] - Process listing and restarts
//! - [`run`] - Attached one-off processes
//! - [`logs`] - Log streaming

pub mod apps;
pub mod auth;
pub mod config;
pub mod logs;
pub mod ps;
pub mod run;

pub use apps::AppsCommand;
pub use auth::AuthCommand;
pub use config::ConfigCommand;
pub use logs::LogsCommand;
pub use ps::PsCommand;
pub use run::RunCommand;

use crate::error::{CliError, ResolveError};
use crate::remotes::{AppOverrides, AppResolver, AppSelection, GitRemotes};
use crate::session::Session;
use crate::terminal::Prompt;

/// Everything a command needs: the API session, the app resolver, and the
/// app flags pulled from the command line.
#[derive(Debug)]
pub struct Context<P, G> {
    /// Authenticated API access.
    pub session: Session<P>,
    /// App resolution over the working directory's git remotes.
    pub resolver: AppResolver<G>,
    /// `--app` / `--remote` values.
    pub overrides: AppOverrides,
}

impl<P: Prompt, G: GitRemotes> Context<P, G> {
    /// Bundle a session, resolver and overrides.
    pub const fn new(session: Session<P>, resolver: AppResolver<G>, overrides: AppOverrides) -> Self {
        Self {
            session,
            resolver,
            overrides,
        }
    }

    /// The app this command targets; an app is required.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when no single app can be chosen.
    pub fn app(&mut self) -> Result<AppSelection, CliError> {
        self.resolver
            .resolve(&self.overrides, true)?
            .ok_or_else(|| ResolveError::NoApp.into())
    }
}
