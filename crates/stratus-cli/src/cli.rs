//! Command-line argument parsing with clap.
//!
//! `--app`/`-a` and `--remote`/`-r` are accepted anywhere on the command line
//! and are pulled out of argv before clap sees it; they are declared here so
//! they show up in `--help`.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Stratus CLI - deploy and manage apps on the Stratus platform.
#[derive(Parser, Debug, Clone)]
#[command(name = "stratus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Platform host.
    #[arg(long, env = "STRATUS_HOST", global = true)]
    pub host: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// App to run the command against.
    #[arg(short = 'a', long, value_name = "APP", global = true)]
    pub app: Option<String>,

    /// Git remote of the app to run the command against.
    #[arg(short = 'r', long, value_name = "REMOTE", global = true)]
    pub remote: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in, log out, and show the current identity.
    Auth {
        /// Auth subcommand to execute.
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Create, inspect, rename and destroy apps.
    Apps {
        /// Apps subcommand to execute.
        #[command(subcommand)]
        command: AppsCommands,
    },

    /// Manage config vars.
    Config {
        /// Config subcommand to execute.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List and restart processes.
    Ps {
        /// Ps subcommand to execute.
        #[command(subcommand)]
        command: PsCommands,
    },

    /// Run a one-off process attached to the terminal.
    Run(RunArgs),

    /// Display recent log output.
    Logs(LogsArgs),
}

/// Auth subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommands {
    /// Prompt for and store credentials.
    Login,
    /// Clear stored credentials.
    Logout,
    /// Show the logged-in identity.
    Whoami,
    /// Show the API token.
    Token,
}

/// Apps subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum AppsCommands {
    /// List your apps.
    List,

    /// Show detailed app information.
    Info,

    /// Create a new app.
    Create {
        /// App name; generated by the platform when omitted.
        name: Option<String>,
    },

    /// Rename the app.
    Rename {
        /// New app name.
        new_name: String,
    },

    /// Permanently destroy the app.
    Destroy {
        /// Skip the interactive confirmation by naming the app.
        #[arg(long, value_name = "APP")]
        confirm: Option<String>,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Show config vars.
    List,

    /// Set one or more config vars.
    Set {
        /// Variables to set.
        #[arg(required = true, value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Remove one or more config vars.
    Unset {
        /// Variable names.
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },
}

/// Ps subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum PsCommands {
    /// List processes.
    List,

    /// Restart all processes, one process type, or one process.
    Restart {
        /// Process (`web.1`) or process type (`web`).
        process: Option<String>,
    },
}

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Command to run.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Arguments for the logs command.
#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Continually stream logs.
    #[arg(short, long)]
    pub tail: bool,

    /// Number of lines to display.
    #[arg(short, long)]
    pub num: Option<u32>,

    /// Only show output from this process or process type.
    #[arg(short, long)]
    pub ps: Option<String>,

    /// Only show output from this source.
    #[arg(short, long)]
    pub source: Option<String>,

    /// Disable colorized output.
    #[arg(long)]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_subcommand() {
        let cli = Cli::parse_from(["stratus", "apps", "destroy", "--confirm", "demo"]);
        match cli.command {
            Commands::Apps {
                command: AppsCommands::Destroy { confirm },
            } => assert_eq!(confirm.as_deref(), Some("demo")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn format_flag_is_global() {
        let cli = Cli::parse_from(["stratus", "ps", "list", "--format", "json"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn run_keeps_hyphenated_arguments() {
        let cli = Cli::parse_from(["stratus", "run", "rake", "db:migrate", "--trace"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.command, ["rake", "db:migrate", "--trace"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn logs_options() {
        let cli = Cli::parse_from(["stratus", "logs", "-t", "-n", "200", "-p", "web", "--no-color"]);
        match cli.command {
            Commands::Logs(args) => {
                assert!(args.tail);
                assert_eq!(args.num, Some(200));
                assert_eq!(args.ps.as_deref(), Some("web"));
                assert!(args.source.is_none());
                assert!(args.no_color);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_set_requires_values() {
        assert!(Cli::try_parse_from(["stratus", "config", "set"]).is_err());
    }
}
