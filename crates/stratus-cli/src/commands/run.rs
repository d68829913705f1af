//! Attached one-off process command.
//!
//! Starts a process with `attach`, then relays the terminal to it over the
//! rendezvous URL the API returns.

use std::future::Future;
use std::io::{self, IsTerminal, Write};

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Context;
use crate::cli::RunArgs;
use crate::endpoints;
use crate::error::{ApiError, CliError};
use crate::rendezvous::{Rendezvous, RendezvousUrl};
use crate::remotes::GitRemotes;
use crate::terminal::{Console, Prompt, TerminalMode};

/// Response to an attached process start.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachedProcess {
    /// Where to connect for the process's terminal.
    pub rendezvous_url: String,
    /// Process name, such as `run.1`.
    #[serde(default)]
    pub process: String,
}

/// Handler for the run command.
pub struct RunCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> RunCommand<'a, P, G> {
    /// Creates a new run command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Start the process and relay stdin/stdout to it until it exits.
    ///
    /// # Errors
    ///
    /// Returns error if the process cannot be started or the relay fails.
    pub async fn execute<W: Write>(&mut self, out: &mut W, args: &RunArgs) -> Result<(), CliError> {
        let process = self.start(out, args, &local_ps_env()).await?;
        self.attach(
            out,
            &process,
            tokio::io::stdin(),
            tokio::io::stdout(),
            &mut Console::new(),
            tokio::signal::ctrl_c(),
        )
        .await
    }

    /// Connect to the started process and relay until it exits or
    /// `shutdown` resolves.
    async fn attach<W, I, O, S>(
        &self,
        out: &mut W,
        process: &AttachedProcess,
        input: I,
        output: O,
        mode: &mut dyn TerminalMode,
        shutdown: S,
    ) -> Result<(), CliError>
    where
        W: Write,
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
        S: Future,
    {
        let url = RendezvousUrl::parse(&process.rendezvous_url)?;
        let verify = self.ctx.session.config().verify_rendezvous_tls(&url.host);
        debug!(process = %process.process, verify_tls = verify, "attaching");

        Rendezvous::new(url, verify)
            .run_until(
                input,
                output,
                mode,
                || {
                    // Raw mode is on by now, so end the line explicitly.
                    let announced = write!(out, "up, {}\r\n", process.process)
                        .and_then(|()| out.flush());
                    if let Err(e) = announced {
                        debug!(error = %e, "could not announce attached process");
                    }
                },
                shutdown,
            )
            .await?;
        Ok(())
    }

    /// Ask the API to start `args.command` attached, announcing it on `out`.
    async fn start<W: Write>(
        &mut self,
        out: &mut W,
        args: &RunArgs,
        ps_env: &Map<String, Value>,
    ) -> Result<AttachedProcess, CliError> {
        let command = args.command.join(" ");
        let app = self.ctx.app()?;

        write!(out, "Running `{command}` attached to terminal... ")?;
        out.flush()?;

        let body = json!({
            "command": command,
            "attach": true,
            "ps_env": ps_env,
        });
        let response = self
            .ctx
            .session
            .call_billable(&endpoints::PS_RUN, &[("app", &app.name)], &[], Some(&body))
            .await?;

        let process: AttachedProcess = response.json()?;
        if process.rendezvous_url.is_empty() {
            return Err(ApiError::Decode("response has no rendezvous URL".into()).into());
        }
        Ok(process)
    }
}

/// Terminal settings passed to the remote process.
fn local_ps_env() -> Map<String, Value> {
    let mut env = Map::new();
    if let Ok(term) = std::env::var("TERM") {
        env.insert("TERM".into(), Value::String(term));
    }
    if io::stdout().is_terminal() {
        if let Ok((cols, rows)) = crossterm::terminal::size() {
            env.insert("COLUMNS".into(), Value::String(cols.to_string()));
            env.insert("LINES".into(), Value::String(rows.to_string()));
        }
    }
    env
}
