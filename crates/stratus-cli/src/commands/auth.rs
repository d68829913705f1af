//! Authentication command implementation.
//!
//! Handles login, logout, whoami, and token display.

use std::io::Write;

use serde::Serialize;

use super::Context;
use crate::cli::AuthCommands;
use crate::endpoints;
use crate::error::CliError;
use crate::output::{Account, Message, OutputFormat, TableDisplay};
use crate::remotes::GitRemotes;
use crate::terminal::Prompt;

/// Handler for auth subcommands.
pub struct AuthCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> AuthCommand<'a, P, G> {
    /// Creates a new auth command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Executes the auth subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        command: &AuthCommands,
    ) -> Result<(), CliError> {
        match command {
            AuthCommands::Login => self.login(out, format).await,
            AuthCommands::Logout => self.logout(out, format),
            AuthCommands::Whoami => self.whoami(out, format).await,
            AuthCommands::Token => self.token(out, format),
        }
    }

    async fn login<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let body = self.ctx.session.login().await?;
        let account: Account = serde_json::from_value(body).unwrap_or_default();
        let identity = if account.email.is_empty() {
            self.ctx.session.credentials()?.identity
        } else {
            account.email
        };
        format.write(out, &Message::success(format!("Logged in as {identity}")))
    }

    fn logout<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        self.ctx.session.logout()?;
        format.write(out, &Message::success("Local credentials cleared"))
    }

    async fn whoami<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        self.require_login()?;
        let response = self
            .ctx
            .session
            .call(&endpoints::ACCOUNT, &[], &[], None)
            .await?;
        let account: Account = response.json()?;
        format.write(out, &account)
    }

    fn token<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        self.require_login()?;
        let token = Token {
            token: self.ctx.session.credentials()?.secret,
        };
        format.write(out, &token)
    }

    fn require_login(&self) -> Result<(), CliError> {
        let session = &self.ctx.session;
        if session.config().api_key.is_some() || session.store().read()?.is_some() {
            return Ok(());
        }
        Err(CliError::Config(
            "not logged in; run `stratus auth login` first".into(),
        ))
    }
}

/// API token output.
#[derive(Debug, Clone, Serialize)]
struct Token {
    token: String,
}

impl TableDisplay for Token {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.token)?;
        Ok(())
    }
}
