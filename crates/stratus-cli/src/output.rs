//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// The authenticated account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    /// Account email.
    #[serde(default)]
    pub email: String,
    /// Account id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the account has confirmed billing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl TableDisplay for Account {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.email)?;
        Ok(())
    }
}

/// One app in a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    /// App name.
    pub name: String,
    /// Owner email.
    #[serde(default)]
    pub owner_email: String,
}

/// Apps visible to the account.
#[derive(Debug, Clone, Serialize)]
pub struct AppList {
    /// The identity the listing was made for.
    #[serde(skip)]
    pub viewer: String,
    /// Apps in server order.
    pub apps: Vec<AppSummary>,
}

impl TableDisplay for AppList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.apps.is_empty() {
            writeln!(writer, "You have no apps.")?;
            return Ok(());
        }

        let (mine, shared): (Vec<_>, Vec<_>) = self
            .apps
            .iter()
            .partition(|app| self.viewer.is_empty() || app.owner_email == self.viewer);

        if !mine.is_empty() {
            writeln!(writer, "=== My Apps")?;
            for app in &mine {
                writeln!(writer, "{}", app.name)?;
            }
        }
        if !shared.is_empty() {
            if !mine.is_empty() {
                writeln!(writer)?;
            }
            writeln!(writer, "=== Collaborated Apps")?;
            let width = shared.iter().map(|a| a.name.len()).max().unwrap_or(0);
            for app in &shared {
                writeln!(writer, "{:<width$}  {}", app.name, app.owner_email)?;
            }
        }
        Ok(())
    }
}

/// Details of one app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDetail {
    /// App name.
    pub name: String,
    /// Owner email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    /// Public URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Git URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    /// Runtime stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Repository size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_size: Option<u64>,
    /// Slug size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug_size: Option<u64>,
    /// Creation status, `complete` once provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_status: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TableDisplay for AppDetail {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "=== {}", self.name)?;
        let rows = [
            ("Git URL", self.git_url.clone()),
            ("Owner Email", self.owner_email.clone()),
            ("Region", self.region.clone()),
            ("Repo Size", self.repo_size.map(format_size)),
            ("Slug Size", self.slug_size.map(format_size)),
            ("Stack", self.stack.clone()),
            ("Web URL", self.web_url.clone()),
            ("Created", self.created_at.clone()),
        ];
        write_pairs(
            writer,
            rows.iter()
                .filter_map(|(label, value)| value.as_deref().map(|v| (*label, v))),
        )
    }
}

/// Config vars of an app.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigVars {
    /// App name.
    #[serde(skip)]
    pub app: String,
    /// Variables, sorted by name.
    #[serde(flatten)]
    pub vars: BTreeMap<String, String>,
}

impl TableDisplay for ConfigVars {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.vars.is_empty() {
            writeln!(writer, "{} has no config vars.", self.app)?;
            return Ok(());
        }
        writeln!(writer, "=== {} Config Vars", self.app)?;
        write_pairs(writer, self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// One running process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    /// Process name, such as `web.1`.
    pub process: String,
    /// State, such as `up` or `crashed`.
    #[serde(default)]
    pub state: String,
    /// Command line.
    #[serde(default)]
    pub command: String,
    /// Human-readable state with age.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty_state: Option<String>,
}

impl Process {
    /// Process type: the name without its index.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.process
            .split_once('.')
            .map_or(self.process.as_str(), |(kind, _)| kind)
    }
}

/// Processes of an app.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessList {
    /// Processes in server order.
    pub processes: Vec<Process>,
}

impl TableDisplay for ProcessList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.processes.is_empty() {
            writeln!(writer, "No processes running")?;
            return Ok(());
        }

        let mut by_kind: BTreeMap<&str, Vec<&Process>> = BTreeMap::new();
        for process in &self.processes {
            by_kind.entry(process.kind()).or_default().push(process);
        }

        for (idx, (kind, processes)) in by_kind.iter().enumerate() {
            if idx > 0 {
                writeln!(writer)?;
            }
            let command = processes.first().map_or("", |p| p.command.as_str());
            writeln!(writer, "=== {kind}: `{}`", truncate(command, 60))?;
            for process in processes {
                let state = process.pretty_state.as_deref().unwrap_or(&process.state);
                writeln!(writer, "{}: {state}", process.process)?;
            }
        }
        Ok(())
    }
}

/// Simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    /// Create an informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}

/// Write `label: value` rows with the values aligned.
fn write_pairs<'a, W, I>(writer: &mut W, rows: I) -> Result<(), CliError>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let rows: Vec<_> = rows.into_iter().collect();
    let width = rows.iter().map(|(label, _)| label.len() + 1).max().unwrap_or(0);
    for (label, value) in rows {
        writeln!(writer, "{:<width$} {value}", format!("{label}:"))?;
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{} MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Truncate a string to a maximum number of characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}
