//! Process commands.

use std::io::Write;

use serde_json::json;

use super::Context;
use crate::cli::PsCommands;
use crate::endpoints;
use crate::error::CliError;
use crate::output::{Message, OutputFormat, Process, ProcessList};
use crate::remotes::GitRemotes;
use crate::terminal::Prompt;

/// Handler for ps subcommands.
pub struct PsCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> PsCommand<'a, P, G> {
    /// Creates a new ps command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Executes the ps subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        command: &PsCommands,
    ) -> Result<(), CliError> {
        match command {
            PsCommands::List => self.list(out, format).await,
            PsCommands::Restart { process } => self.restart(out, format, process.as_deref()).await,
        }
    }

    async fn list<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        let response = self
            .ctx
            .session
            .call(&endpoints::PS_LIST, &[("app", &app.name)], &[], None)
            .await?;
        let processes: Vec<Process> = response.json()?;
        format.write(out, &ProcessList { processes })
    }

    async fn restart<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        process: Option<&str>,
    ) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        // `web.1` names one process, `web` a whole type.
        let body = match process {
            Some(name) if name.contains('.') => json!({ "ps": name }),
            Some(kind) => json!({ "type": kind }),
            None => json!({}),
        };
        self.ctx
            .session
            .call_billable(&endpoints::PS_RESTART, &[("app", &app.name)], &[], Some(&body))
            .await?;

        let target = process.unwrap_or("processes");
        format.write(
            out,
            &Message::success(format!("Restarting {target} on {}... done", app.name)),
        )
    }
}
