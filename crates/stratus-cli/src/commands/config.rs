//! Config var commands.

use std::collections::BTreeMap;
use std::io::Write;

use serde_json::{Map, Value};

use super::Context;
use crate::cli::ConfigCommands;
use crate::endpoints;
use crate::error::CliError;
use crate::output::{ConfigVars, Message, OutputFormat};
use crate::remotes::GitRemotes;
use crate::terminal::Prompt;

/// Handler for config subcommands.
pub struct ConfigCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> ConfigCommand<'a, P, G> {
    /// Creates a new config command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Executes the config subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        command: &ConfigCommands,
    ) -> Result<(), CliError> {
        match command {
            ConfigCommands::List => self.list(out, format).await,
            ConfigCommands::Set { vars } => self.set(out, format, vars).await,
            ConfigCommands::Unset { keys } => self.unset(out, format, keys).await,
        }
    }

    async fn list<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        let response = self
            .ctx
            .session
            .call(&endpoints::CONFIG_VARS, &[("app", &app.name)], &[], None)
            .await?;
        let vars: Map<String, Value> = response.json()?;
        let vars = ConfigVars {
            app: app.name,
            vars: vars.into_iter().map(|(k, v)| (k, display_value(v))).collect(),
        };
        format.write(out, &vars)
    }

    async fn set<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        pairs: &[String],
    ) -> Result<(), CliError> {
        let vars = parse_assignments(pairs)?;
        let app = self.ctx.app()?;

        let body = Value::Object(
            vars.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        self.ctx
            .session
            .call_billable(&endpoints::CONFIG_SET, &[("app", &app.name)], &[], Some(&body))
            .await?;

        format.write(out, &ConfigVars { app: app.name, vars })
    }

    async fn unset<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        keys: &[String],
    ) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        for key in keys {
            self.ctx
                .session
                .call(
                    &endpoints::CONFIG_UNSET,
                    &[("app", &app.name), ("key", key)],
                    &[],
                    None,
                )
                .await?;
        }
        format.write(
            out,
            &Message::success(format!("Unset {} and restarted {}", keys.join(", "), app.name)),
        )
    }
}

/// Parse `KEY=value` arguments. Values may contain `=`.
fn parse_assignments(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::Usage(format!(
                "{pair} is invalid. Must be in the format FOO=bar."
            ))),
        })
        .collect()
}

fn display_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
