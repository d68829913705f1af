//! Log streaming command.

use std::future::Future;
use std::io::{self, IsTerminal, Write};

use super::Context;
use crate::cli::LogsArgs;
use crate::error::CliError;
use crate::logs::{LogOptions, LogSink, LogStreamer, drain};
use crate::remotes::GitRemotes;
use crate::terminal::Prompt;

/// Handler for the logs command.
pub struct LogsCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> LogsCommand<'a, P, G> {
    /// Creates a new logs command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Stream the app's logs to `out` until the server ends the session or
    /// the user presses Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be opened or the stream fails.
    pub async fn execute<W: Write>(&mut self, out: &mut W, args: &LogsArgs) -> Result<(), CliError> {
        let colorize =
            !args.no_color && io::stdout().is_terminal() && std::env::var_os("TERM").is_some();
        self.follow(out, args, colorize, tokio::signal::ctrl_c()).await
    }

    async fn follow<W, I>(
        &mut self,
        out: &mut W,
        args: &LogsArgs,
        colorize: bool,
        interrupt: I,
    ) -> Result<(), CliError>
    where
        W: Write,
        I: Future,
    {
        let app = self.ctx.app()?;
        let options = LogOptions {
            tail: args.tail,
            num: args.num,
            ps: args.ps.clone(),
            source: args.source.clone(),
        };

        let (name, opts) = (app.name.as_str(), &options);
        let url = self
            .ctx
            .session
            .with_auth(move |client| async move {
                LogStreamer::new(&client).session_url(name, opts).await
            })
            .await?;

        let client = self.ctx.session.client()?;
        let chunks = LogStreamer::new(client).follow(url).await?;
        let mut sink = LogSink::new(out, colorize);
        drain(chunks, interrupt, &mut sink).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use httpmock::prelude::*;

    use super::*;
    use crate::commands::testing::{Harness, app_flag};
    use crate::error::{ApiError, LogError};

    fn args() -> LogsArgs {
        LogsArgs {
            tail: false,
            num: Some(20),
            ps: Some("web".into()),
            source: None,
            no_color: false,
        }
    }

    #[tokio::test]
    async fn streams_session_output() {
        let harness = Harness::new().await;
        let session = harness.server.mock(|when, then| {
            when.method(GET)
                .path("/apps/demo/logs")
                .query_param("logplex", "true")
                .query_param("num", "20")
                .query_param("ps", "web");
            then.status(200)
                .header("content-type", "text/plain")
                .body(harness.server.url("/streams/abc"));
        });
        let stream = harness.server.mock(|when, then| {
            when.method(GET).path("/streams/abc");
            then.status(200)
                .body("2026-10-19T10:00:00 app[web.1]: started\n2026-10-19T10:00:01 app[web.1]: ok\n");
        });

        let mut ctx = harness.context(&[], app_flag("demo"), &[]);
        let mut out = Vec::new();
        LogsCommand::new(&mut ctx)
            .follow(&mut out, &args(), true, pending::<()>())
            .await
            .expect("logs");

        session.assert();
        stream.assert();
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "\x1b[36m2026-10-19T10:00:00 app[web.1]:\x1b[0m started\n\
             \x1b[36m2026-10-19T10:00:01 app[web.1]:\x1b[0m ok\n"
        );
    }

    #[tokio::test]
    async fn uncolored_output_is_passed_through() {
        let harness = Harness::new().await;
        harness.server.mock(|when, then| {
            when.method(GET).path("/apps/demo/logs");
            then.status(200)
                .header("content-type", "text/plain")
                .body(harness.server.url("/streams/abc"));
        });
        harness.server.mock(|when, then| {
            when.method(GET).path("/streams/abc");
            then.status(200).body("app[web.1]: partial");
        });

        let mut ctx = harness.context(&[], app_flag("demo"), &[]);
        let mut out = Vec::new();
        LogsCommand::new(&mut ctx)
            .follow(&mut out, &args(), false, pending::<()>())
            .await
            .expect("logs");

        assert_eq!(out, b"app[web.1]: partial");
    }

    #[tokio::test]
    async fn missing_app_surfaces_not_found() {
        let harness = Harness::new().await;
        harness.server.mock(|when, then| {
            when.method(GET).path("/apps/gone/logs");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"error": "App not found."}));
        });

        let mut ctx = harness.context(&[], app_flag("gone"), &[]);
        let err = LogsCommand::new(&mut ctx)
            .follow(&mut Vec::new(), &args(), false, pending::<()>())
            .await
            .expect_err("not found");

        assert!(matches!(
            err,
            CliError::Logs(LogError::Api(ApiError::NotFound { .. }))
        ));
        assert_eq!(err.to_string(), "App not found.");
    }
}
