//! Stratus CLI binary entrypoint.
//!
//! This is the main entry point for the `stratus` command-line tool.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stratus_cli::cli::{Cli, Commands};
use stratus_cli::commands::{
    AppsCommand, AuthCommand, ConfigCommand, Context, LogsCommand, PsCommand, RunCommand,
};
use stratus_cli::config::Config;
use stratus_cli::output::OutputFormat;
use stratus_cli::remotes::{AppOverrides, AppResolver, GitCli};
use stratus_cli::session::Session;
use stratus_cli::terminal::TerminalPrompt;
use stratus_cli::CliError;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // App flags may appear anywhere, so they are pulled out before clap runs.
    let mut args: Vec<String> = std::env::args().collect();
    let overrides = match AppOverrides::take_from(&mut args) {
        Ok(overrides) => overrides,
        Err(e) => return fail(&e.into()),
    };
    let cli = Cli::parse_from(args);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli, overrides));
    // A blocking stdin read left behind by a relay must not hold the exit.
    runtime.shutdown_timeout(Duration::from_millis(100));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(e: &CliError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(e.exit_code())
}

async fn run(cli: Cli, overrides: AppOverrides) -> Result<(), CliError> {
    let config = Config::from_env(cli.host.as_deref())?;
    let dir = std::env::current_dir()?;

    let resolver = AppResolver::new(GitCli::new(dir), config.host.clone());
    let session = Session::new(config, TerminalPrompt::new());
    let overrides = overrides.or(cli.app.clone(), cli.remote.clone());
    let mut ctx = Context::new(session, resolver, overrides);

    let format = OutputFormat::new(cli.format);
    // Unlocked: the run relay writes to stdout through tokio as well.
    let mut stdout = io::stdout();

    match cli.command {
        Commands::Auth { command } => {
            AuthCommand::new(&mut ctx)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Apps { command } => {
            AppsCommand::new(&mut ctx)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Config { command } => {
            ConfigCommand::new(&mut ctx)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Ps { command } => {
            PsCommand::new(&mut ctx)
                .execute(&mut stdout, &format, &command)
                .await?;
        }
        Commands::Run(args) => {
            RunCommand::new(&mut ctx).execute(&mut stdout, &args).await?;
        }
        Commands::Logs(args) => {
            LogsCommand::new(&mut ctx).execute(&mut stdout, &args).await?;
        }
    }

    Ok(())
}
