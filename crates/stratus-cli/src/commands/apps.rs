//! App lifecycle commands.
//!
//! `create`, `rename` and `destroy` keep the working directory's git remotes
//! in step with the platform.

use std::io::Write;

use serde_json::json;
use tracing::debug;

use super::Context;
use crate::cli::AppsCommands;
use crate::endpoints;
use crate::error::CliError;
use crate::output::{AppDetail, AppList, AppSummary, Message, OutputFormat};
use crate::remotes::{AppSelection, AppSource, DEFAULT_REMOTE_NAME, GitRemotes};
use crate::terminal::Prompt;

/// Handler for apps subcommands.
pub struct AppsCommand<'a, P, G> {
    ctx: &'a mut Context<P, G>,
}

impl<'a, P: Prompt, G: GitRemotes> AppsCommand<'a, P, G> {
    /// Creates a new apps command handler.
    pub const fn new(ctx: &'a mut Context<P, G>) -> Self {
        Self { ctx }
    }

    /// Executes the apps subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub async fn execute<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        command: &AppsCommands,
    ) -> Result<(), CliError> {
        match command {
            AppsCommands::List => self.list(out, format).await,
            AppsCommands::Info => self.info(out, format).await,
            AppsCommands::Create { name } => self.create(out, format, name.as_deref()).await,
            AppsCommands::Rename { new_name } => self.rename(out, format, new_name).await,
            AppsCommands::Destroy { confirm } => {
                self.destroy(out, format, confirm.as_deref()).await
            }
        }
    }

    async fn list<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let response = self
            .ctx
            .session
            .call(&endpoints::APP_LIST, &[], &[], None)
            .await?;
        let apps: Vec<AppSummary> = response.json()?;
        let viewer = self.ctx.session.credentials()?.identity;
        format.write(out, &AppList { viewer, apps })
    }

    async fn info<W: Write>(&mut self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        let response = self
            .ctx
            .session
            .call(&endpoints::APP_INFO, &[("app", &app.name)], &[], None)
            .await?;
        let detail: AppDetail = response.json()?;
        format.write(out, &detail)
    }

    async fn create<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        name: Option<&str>,
    ) -> Result<(), CliError> {
        let body = match name {
            Some(name) => json!({ "app": { "name": name } }),
            None => json!({ "app": {} }),
        };
        let response = self
            .ctx
            .session
            .call_billable(&endpoints::APP_CREATE, &[], &[], Some(&body))
            .await?;
        let detail: AppDetail = response.json()?;

        let mut summary = format!("Created {}", detail.name);
        for url in [&detail.web_url, &detail.git_url].into_iter().flatten() {
            summary.push_str(" | ");
            summary.push_str(url);
        }

        let remote = self
            .ctx
            .overrides
            .remote
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_NAME.to_string());
        if self.add_remote_if_missing(&remote, &detail.name)? {
            summary.push_str(&format!("\nGit remote {remote} added"));
        }

        format.write(out, &Message::success(summary))
    }

    fn add_remote_if_missing(&self, remote: &str, app: &str) -> Result<bool, CliError> {
        let git = self.ctx.resolver.git();
        if !git.is_repository() {
            debug!("not in a git repository; no remote added");
            return Ok(false);
        }
        let exists = git
            .remote_urls()
            .map_err(crate::error::ResolveError::from)?
            .iter()
            .any(|(name, _)| name == remote);
        if exists {
            debug!(%remote, "git remote already exists");
            return Ok(false);
        }
        self.ctx.resolver.add_app_remote(remote, app)?;
        Ok(true)
    }

    async fn rename<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        new_name: &str,
    ) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        let body = json!({ "app": { "name": new_name } });
        self.ctx
            .session
            .call(&endpoints::APP_RENAME, &[("app", &app.name)], &[], Some(&body))
            .await?;

        let mut summary = format!("Renamed {} to {new_name}", app.name);
        for remote in self.ctx.resolver.rename_app_remotes(&app.name, new_name)? {
            summary.push_str(&format!("\nGit remote {remote} updated"));
        }
        format.write(out, &Message::success(summary))
    }

    async fn destroy<W: Write>(
        &mut self,
        out: &mut W,
        format: &OutputFormat,
        confirm: Option<&str>,
    ) -> Result<(), CliError> {
        let app = self.ctx.app()?;
        self.confirm_destroy(&app, confirm)?;

        self.ctx
            .session
            .call(&endpoints::APP_DESTROY, &[("app", &app.name)], &[], None)
            .await?;

        let mut summary = format!("Destroyed {}", app.name);
        for remote in self.ctx.resolver.remove_app_remotes(&app.name)? {
            summary.push_str(&format!("\nGit remote {remote} removed"));
        }
        format.write(out, &Message::success(summary))
    }

    fn confirm_destroy(&mut self, app: &AppSelection, confirm: Option<&str>) -> Result<(), CliError> {
        let aborted = || CliError::Cancelled(format!("Confirmation did not match {}. Aborted.", app.name));

        if let Some(confirm) = confirm {
            return if confirm == app.name { Ok(()) } else { Err(aborted()) };
        }

        let origin = match &app.source {
            AppSource::Detected(remote) => format!(" (detected from git remote {remote})"),
            AppSource::Remote(remote) => format!(" (from git remote {remote})"),
            AppSource::Explicit => String::new(),
        };
        let question = format!(
            " !    WARNING: Potentially Destructive Action\n \
             !    This command will destroy {name}{origin} including all add-ons.\n \
             !    To proceed, type \"{name}\" or re-run this command with --confirm {name}\n\n> ",
            name = app.name
        );
        let answer = self.ctx.session.prompt().ask(&question)?;
        if answer.trim() == app.name {
            Ok(())
        } else {
            Err(aborted())
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::commands::testing::{Harness, app_flag};
    use crate::remotes::AppOverrides;

    const DEMO_REMOTE: (&str, &str) = ("stratus", "git@stratusapp.com:demo.git");

    async fn run(ctx: &mut crate::commands::testing::TestContext, command: AppsCommands) -> Result<String, CliError> {
        let mut out = Vec::new();
        AppsCommand::new(ctx)
            .execute(&mut out, &OutputFormat::default(), &command)
            .await?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    #[tokio::test]
    async fn list_separates_collaborated_apps() {
        let harness = Harness::new().await;
        harness.server.mock(|when, then| {
            when.method(GET)
                .path("/apps")
                .header("x-stratus-api-version", "2");
            then.status(200).json_body(json!([
                {"name": "mine", "owner_email": "u@x"},
                {"name": "theirs", "owner_email": "team@x"}
            ]));
        });

        let mut ctx = harness.context(&[], AppOverrides::default(), &[]);
        let out = run(&mut ctx, AppsCommands::List).await.expect("list");
        assert!(out.starts_with("=== My Apps\nmine\n"));
        assert!(out.contains("theirs  team@x"));
    }

    #[tokio::test]
    async fn info_uses_detected_app() {
        let harness = Harness::new().await;
        let info = harness.server.mock(|when, then| {
            when.method(GET).path("/apps/demo");
            then.status(200)
                .json_body(json!({"name": "demo", "stack": "cedar", "owner_email": "u@x"}));
        });

        let mut ctx = harness.context(&[DEMO_REMOTE], AppOverrides::default(), &[]);
        let out = run(&mut ctx, AppsCommands::Info).await.expect("info");
        info.assert();
        assert!(out.contains("=== demo"));
        assert!(out.contains("Stack:       cedar"));
    }

    #[tokio::test]
    async fn info_with_ambiguous_remotes_is_usage_error() {
        let harness = Harness::new().await;
        let mut ctx = harness.context(
            &[DEMO_REMOTE, ("staging", "git@stratusapp.com:demo-staging.git")],
            AppOverrides::default(),
            &[],
        );
        let err = run(&mut ctx, AppsCommands::Info).await.expect_err("ambiguous");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn create_adds_git_remote() {
        let harness = Harness::new().await;
        let create = harness.server.mock(|when, then| {
            when.method(POST)
                .path("/apps")
                .json_body(json!({"app": {"name": "fresh"}}));
            then.status(202).json_body(json!({
                "name": "fresh",
                "web_url": "https://fresh.stratusapp.com/",
                "git_url": "git@stratusapp.com:fresh.git"
            }));
        });

        let mut ctx = harness.context(&[], AppOverrides::default(), &[]);
        let out = run(&mut ctx, AppsCommands::Create { name: Some("fresh".into()) })
            .await
            .expect("create");

        create.assert();
        assert_eq!(
            out,
            "✓ Created fresh | https://fresh.stratusapp.com/ | git@stratusapp.com:fresh.git\n\
             Git remote stratus added\n"
        );
        assert_eq!(
            ctx.resolver.git().remotes.borrow()[0],
            ("stratus".to_string(), "git@stratusapp.com:fresh.git".to_string())
        );
    }

    #[tokio::test]
    async fn create_outside_repository_skips_remote() {
        let harness = Harness::new().await;
        harness.server.mock(|when, then| {
            when.method(POST).path("/apps");
            then.status(202).json_body(json!({"name": "sky-42"}));
        });

        let mut ctx = harness.context(&[], AppOverrides::default(), &[]);
        ctx.resolver = crate::remotes::AppResolver::new(
            crate::remotes::testing::FakeGit {
                repository: false,
                ..Default::default()
            },
            "stratusapp.com",
        );
        let out = run(&mut ctx, AppsCommands::Create { name: None }).await.expect("create");
        assert_eq!(out, "✓ Created sky-42\n");
    }

    #[tokio::test]
    async fn rename_rewrites_remotes() {
        let harness = Harness::new().await;
        let rename = harness.server.mock(|when, then| {
            when.method(PUT)
                .path("/apps/demo")
                .json_body(json!({"app": {"name": "shiny"}}));
            then.status(200).json_body(json!({"name": "shiny"}));
        });

        let mut ctx = harness.context(&[DEMO_REMOTE], AppOverrides::default(), &[]);
        let out = run(&mut ctx, AppsCommands::Rename { new_name: "shiny".into() })
            .await
            .expect("rename");

        rename.assert();
        assert_eq!(out, "✓ Renamed demo to shiny\nGit remote stratus updated\n");
        assert_eq!(
            ctx.resolver.git().remotes.borrow()[0].1,
            "git@stratusapp.com:shiny.git"
        );
    }

    #[tokio::test]
    async fn destroy_requires_typed_confirmation() {
        let harness = Harness::new().await;
        let destroy = harness.server.mock(|when, then| {
            when.method(DELETE).path("/apps/demo");
            then.status(200).body("{}");
        });

        let mut ctx = harness.context(&[DEMO_REMOTE], AppOverrides::default(), &["nope"]);
        let err = run(&mut ctx, AppsCommands::Destroy { confirm: None })
            .await
            .expect_err("aborted");

        assert!(matches!(err, CliError::Cancelled(_)));
        assert!(ctx.session.prompt().asked[0].contains("detected from git remote stratus"));
        destroy.assert_calls(0);
    }

    #[tokio::test]
    async fn destroy_with_confirm_flag_removes_remotes() {
        let harness = Harness::new().await;
        let destroy = harness.server.mock(|when, then| {
            when.method(DELETE).path("/apps/demo");
            then.status(200).body("{}");
        });

        let mut ctx = harness.context(&[DEMO_REMOTE], app_flag("demo"), &[]);
        let out = run(&mut ctx, AppsCommands::Destroy { confirm: Some("demo".into()) })
            .await
            .expect("destroy");

        destroy.assert();
        assert_eq!(out, "✓ Destroyed demo\nGit remote stratus removed\n");
        assert!(ctx.resolver.git().remotes.borrow().is_empty());
    }

    #[tokio::test]
    async fn destroy_with_wrong_confirm_flag_is_refused() {
        let harness = Harness::new().await;
        let mut ctx = harness.context(&[], app_flag("demo"), &[]);
        let err = run(&mut ctx, AppsCommands::Destroy { confirm: Some("other".into()) })
            .await
            .expect_err("mismatch");
        assert_eq!(err.to_string(), "Confirmation did not match demo. Aborted.");
    }
}
