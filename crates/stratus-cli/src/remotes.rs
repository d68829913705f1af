//! App resolution from git remotes.
//!
//! A command targets an app named explicitly with `--app`, reached through a
//! named git remote with `--remote`, or detected from the working directory's
//! git remotes when they all point at the same app. Git is reached through
//! the [`GitRemotes`] trait; [`GitCli`] shells out to the `git` binary.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Output};

use clap::CommandFactory;
use regex::Regex;
use tracing::{debug, trace};

use crate::cli::Cli;
use crate::error::ResolveError;

/// Git config key naming the default remote for app resolution.
pub const DEFAULT_REMOTE_KEY: &str = "stratus.remote";

/// Remote name used when `apps create` adds a remote.
pub const DEFAULT_REMOTE_NAME: &str = "stratus";

const APP_FLAGS: (&str, &str) = ("--app", "-a");
const REMOTE_FLAGS: (&str, &str) = ("--remote", "-r");

/// Top-level flags that take their value as a separate argument.
const VALUE_FLAGS: [&str; 3] = ["--format", "-f", "--host"];

/// Subcommand whose trailing arguments belong to the remote process.
const PASSTHROUGH_COMMAND: &str = "run";

/// Read and write access to the git remotes of a working directory.
pub trait GitRemotes {
    /// Whether the working directory is inside a git repository.
    fn is_repository(&self) -> bool;

    /// `(name, url)` of every remote's fetch URL, in listing order.
    fn remote_urls(&self) -> io::Result<Vec<(String, String)>>;

    /// Value of a git config key, `None` when unset.
    fn config_value(&self, key: &str) -> io::Result<Option<String>>;

    /// Add a remote.
    fn add_remote(&self, name: &str, url: &str) -> io::Result<()>;

    /// Point an existing remote at a new URL.
    fn set_remote_url(&self, name: &str, url: &str) -> io::Result<()>;

    /// Delete a remote.
    fn remove_remote(&self, name: &str) -> io::Result<()>;
}

/// [`GitRemotes`] backed by the `git` command in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    /// Run git in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn git(&self, args: &[&str]) -> io::Result<Output> {
        trace!(?args, dir = %self.dir.display(), "running git");
        Command::new("git").args(args).current_dir(&self.dir).output()
    }

    fn git_checked(&self, args: &[&str]) -> io::Result<()> {
        let output = self.git(args)?;
        if output.status.success() {
            return Ok(());
        }
        Err(io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

impl GitRemotes for GitCli {
    fn is_repository(&self) -> bool {
        self.git(&["rev-parse", "--git-dir"])
            .is_ok_and(|output| output.status.success())
    }

    fn remote_urls(&self) -> io::Result<Vec<(String, String)>> {
        let output = match self.git(&["remote", "-v"]) {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("git is not installed; no remotes");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        if !output.status.success() {
            debug!(dir = %self.dir.display(), "not a git repository; no remotes");
            return Ok(Vec::new());
        }
        Ok(parse_remote_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn config_value(&self, key: &str) -> io::Result<Option<String>> {
        let output = match self.git(&["config", "--get", key]) {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((output.status.success() && !value.is_empty()).then_some(value))
    }

    fn add_remote(&self, name: &str, url: &str) -> io::Result<()> {
        self.git_checked(&["remote", "add", name, url])
    }

    fn set_remote_url(&self, name: &str, url: &str) -> io::Result<()> {
        self.git_checked(&["remote", "set-url", name, url])
    }

    fn remove_remote(&self, name: &str) -> io::Result<()> {
        self.git_checked(&["remote", "rm", name])
    }
}

/// Parse `git remote -v` output into `(name, url)` pairs, keeping fetch
/// URLs only.
#[must_use]
pub fn parse_remote_listing(listing: &str) -> Vec<(String, String)> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let url = fields.next()?;
            match fields.next() {
                None | Some("(fetch)") => Some((name.to_string(), url.to_string())),
                Some(_) => None,
            }
        })
        .collect()
}

/// One git remote that points at an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Local remote name.
    pub remote: String,
    /// App name.
    pub app: String,
    /// Remote URL as configured.
    pub url: String,
}

/// Ordered mapping of git remote names to apps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMap {
    entries: Vec<RemoteEntry>,
}

impl RemoteMap {
    /// Build the mapping from remote URLs, keeping those on `host`.
    #[must_use]
    pub fn from_urls(urls: &[(String, String)], host: &str) -> Self {
        let patterns = remote_patterns(host);
        let mut entries: Vec<RemoteEntry> = Vec::new();

        for (remote, url) in urls {
            if entries.iter().any(|e| &e.remote == remote) {
                continue;
            }
            let app = patterns
                .iter()
                .find_map(|re| re.captures(url).map(|caps| caps[1].to_string()));
            if let Some(app) = app {
                entries.push(RemoteEntry {
                    remote: remote.clone(),
                    app,
                    url: url.clone(),
                });
            }
        }

        Self { entries }
    }

    /// App behind `remote`.
    #[must_use]
    pub fn app_for(&self, remote: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.remote == remote)
            .map(|e| e.app.as_str())
    }

    /// Remotes pointing at `app`.
    #[must_use]
    pub fn remotes_for(&self, app: &str) -> Vec<&RemoteEntry> {
        self.entries.iter().filter(|e| e.app == app).collect()
    }

    /// Distinct apps in first-seen order.
    #[must_use]
    pub fn distinct_apps(&self) -> Vec<&str> {
        let mut apps: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !apps.contains(&entry.app.as_str()) {
                apps.push(&entry.app);
            }
        }
        apps
    }

    /// Whether no remote points at an app.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntry> {
        self.entries.iter()
    }
}

fn remote_patterns(host: &str) -> Vec<Regex> {
    let host = regex::escape(host);
    [
        format!(r"^git@{host}:([\w-]+)\.git$"),
        format!(r"^ssh://git@{host}/([\w-]+)\.git$"),
        format!(r"^https://git\.{host}/([\w-]+)\.git$"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
}

/// How the target app was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppSource {
    /// Named with `--app`.
    Explicit,
    /// Reached through a named remote (`--remote` or the configured default).
    Remote(String),
    /// The only app among the git remotes.
    Detected(String),
}

/// The app a command targets and how it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSelection {
    /// App name.
    pub name: String,
    /// How the name was obtained.
    pub source: AppSource,
}

impl AppSelection {
    /// Whether the user named the app or a remote on the command line.
    #[must_use]
    pub const fn is_explicit(&self) -> bool {
        !matches!(self.source, AppSource::Detected(_))
    }
}

/// App-selection flags pulled out of a raw argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppOverrides {
    /// `--app` value.
    pub app: Option<String>,
    /// `--remote` value.
    pub remote: Option<String>,
}

impl AppOverrides {
    /// Remove `--app`/`-a` and `--remote`/`-r` (with their values) from
    /// `args`.
    ///
    /// Scanning stops at `--` and, for `run`, at the first argument of the
    /// remote command, so `stratus run ls -al` keeps its `-al`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Usage`] when a flag has no usable value.
    pub fn take_from(args: &mut Vec<String>) -> Result<Self, ResolveError> {
        let commands: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect();

        let mut overrides = Self::default();
        let mut subcommand: Option<String> = None;
        let mut after_value_flag = false;
        let mut idx = 0usize;

        while idx < args.len() {
            let arg = args[idx].as_str();
            if arg == "--" {
                break;
            }

            let Some((flag, inline)) = match_flag(arg) else {
                if subcommand.as_deref() == Some(PASSTHROUGH_COMMAND) {
                    trace!(at = idx, "remote command starts; app flag scan stopped");
                    break;
                }
                if subcommand.is_none() && !after_value_flag && commands.iter().any(|c| c == arg) {
                    subcommand = Some(arg.to_string());
                }
                after_value_flag = subcommand.is_none() && VALUE_FLAGS.contains(&arg);
                idx += 1;
                continue;
            };
            after_value_flag = false;

            args.remove(idx);
            let value = match inline {
                Some(value) => value,
                None if idx < args.len() => args.remove(idx),
                None => String::new(),
            };

            let value = value.trim().to_string();
            if value.is_empty() || value.starts_with('-') {
                return Err(ResolveError::Usage(format!("missing value for {flag}")));
            }

            if flag == APP_FLAGS.0 {
                overrides.app = Some(value);
            } else {
                overrides.remote = Some(value);
            }
        }

        Ok(overrides)
    }

    /// Fill unset values from flags clap parsed itself.
    #[must_use]
    pub fn or(self, app: Option<String>, remote: Option<String>) -> Self {
        Self {
            app: self.app.or(app),
            remote: self.remote.or(remote),
        }
    }
}

/// Identify an app/remote flag, returning its long name and any inline
/// value (`--app=x`). Short flags take their value as the next argument.
fn match_flag(arg: &str) -> Option<(&'static str, Option<String>)> {
    for (long, short) in [APP_FLAGS, REMOTE_FLAGS] {
        if arg == long || arg == short {
            return Some((long, None));
        }
        if let Some(value) = arg.strip_prefix(long).and_then(|rest| rest.strip_prefix('=')) {
            return Some((long, Some(value.to_string())));
        }
    }
    None
}

/// Resolves which app a command targets.
#[derive(Debug)]
pub struct AppResolver<G> {
    git: G,
    host: String,
    selection: Option<AppSelection>,
}

impl<G: GitRemotes> AppResolver<G> {
    /// Create a resolver for remotes on `host`.
    pub fn new(git: G, host: impl Into<String>) -> Self {
        Self {
            git,
            host: host.into(),
            selection: None,
        }
    }

    /// Compute the remote mapping for the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Git`] if git cannot be run.
    pub fn resolve_remotes(&self) -> Result<RemoteMap, ResolveError> {
        let urls = self.git.remote_urls()?;
        let map = RemoteMap::from_urls(&urls, &self.host);
        debug!(remotes = urls.len(), app_remotes = map.entries.len(), "remote mapping computed");
        Ok(map)
    }

    /// Pull app flags out of `args` and resolve the target app.
    ///
    /// # Errors
    ///
    /// See [`AppResolver::resolve`]; flag errors are [`ResolveError::Usage`].
    pub fn extract_app(
        &mut self,
        args: &mut Vec<String>,
        force: bool,
    ) -> Result<Option<AppSelection>, ResolveError> {
        let overrides = AppOverrides::take_from(args)?;
        self.resolve(&overrides, force)
    }

    /// Resolve the target app from already-extracted overrides.
    ///
    /// Returns `Ok(None)` when nothing identifies an app and `force` is
    /// false.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::UnknownRemote`] when `--remote` names no app remote
    /// - [`ResolveError::AmbiguousApp`] when `force` and several apps exist
    /// - [`ResolveError::NoApp`] when `force` and no app exists
    pub fn resolve(
        &mut self,
        overrides: &AppOverrides,
        force: bool,
    ) -> Result<Option<AppSelection>, ResolveError> {
        if let Some(selection) = &self.selection {
            return Ok(Some(selection.clone()));
        }

        let selection = self.select(overrides)?;
        match selection {
            Some(selection) => {
                debug!(app = %selection.name, source = ?selection.source, "app resolved");
                self.selection = Some(selection.clone());
                Ok(Some(selection))
            }
            None if force => {
                let map = self.resolve_remotes()?;
                let apps = map.distinct_apps();
                if apps.len() > 1 {
                    Err(ResolveError::AmbiguousApp(
                        apps.into_iter().map(str::to_string).collect(),
                    ))
                } else {
                    Err(ResolveError::NoApp)
                }
            }
            None => Ok(None),
        }
    }

    fn select(&self, overrides: &AppOverrides) -> Result<Option<AppSelection>, ResolveError> {
        if let Some(app) = &overrides.app {
            return Ok(Some(AppSelection {
                name: app.clone(),
                source: AppSource::Explicit,
            }));
        }

        let map = self.resolve_remotes()?;

        if let Some(remote) = &overrides.remote {
            let app = map
                .app_for(remote)
                .ok_or_else(|| ResolveError::UnknownRemote(remote.clone()))?;
            return Ok(Some(AppSelection {
                name: app.to_string(),
                source: AppSource::Remote(remote.clone()),
            }));
        }

        if let Some(remote) = self.git.config_value(DEFAULT_REMOTE_KEY)? {
            if let Some(app) = map.app_for(&remote) {
                return Ok(Some(AppSelection {
                    name: app.to_string(),
                    source: AppSource::Remote(remote),
                }));
            }
            debug!(%remote, "configured default remote is not an app remote");
        }

        match map.distinct_apps().as_slice() {
            [app] => {
                let remote = map
                    .remotes_for(app)
                    .first()
                    .map(|e| e.remote.clone())
                    .unwrap_or_default();
                Ok(Some(AppSelection {
                    name: (*app).to_string(),
                    source: AppSource::Detected(remote),
                }))
            }
            _ => Ok(None),
        }
    }

    /// The git seam this resolver reads.
    #[must_use]
    pub const fn git(&self) -> &G {
        &self.git
    }

    /// The selection made by the last successful resolution.
    #[must_use]
    pub const fn selection(&self) -> Option<&AppSelection> {
        self.selection.as_ref()
    }

    /// SSH git URL for `app`.
    #[must_use]
    pub fn git_url(&self, app: &str) -> String {
        format!("git@{}:{app}.git", self.host)
    }

    /// Add a remote named `remote` pointing at `app`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Git`] if git rejects the change.
    pub fn add_app_remote(&self, remote: &str, app: &str) -> Result<(), ResolveError> {
        self.git.add_remote(remote, &self.git_url(app))?;
        Ok(())
    }

    /// Repoint every remote of app `old` at app `new`, returning the
    /// updated remote names.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Git`] if git rejects a change.
    pub fn rename_app_remotes(&self, old: &str, new: &str) -> Result<Vec<String>, ResolveError> {
        let map = self.resolve_remotes()?;
        let mut updated = Vec::new();
        for entry in map.remotes_for(old) {
            let url = rewrite_app_url(&entry.url, old, new).unwrap_or_else(|| self.git_url(new));
            self.git.set_remote_url(&entry.remote, &url)?;
            updated.push(entry.remote.clone());
        }
        Ok(updated)
    }

    /// Remove every remote of `app`, returning the removed remote names.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Git`] if git rejects a change.
    pub fn remove_app_remotes(&self, app: &str) -> Result<Vec<String>, ResolveError> {
        let map = self.resolve_remotes()?;
        let mut removed = Vec::new();
        for entry in map.remotes_for(app) {
            self.git.remove_remote(&entry.remote)?;
            removed.push(entry.remote.clone());
        }
        Ok(removed)
    }
}

/// Swap the app name at the end of a remote URL, keeping its scheme.
fn rewrite_app_url(url: &str, old: &str, new: &str) -> Option<String> {
    let tail = format!("{old}.git");
    let head = url.strip_suffix(&tail)?;
    head.ends_with([':', '/']).then(|| format!("{head}{new}.git"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-in for git.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io;

    use super::GitRemotes;

    /// In-memory git remotes.
    #[derive(Debug)]
    pub(crate) struct FakeGit {
        pub(crate) repository: bool,
        pub(crate) remotes: RefCell<Vec<(String, String)>>,
        pub(crate) config: HashMap<String, String>,
    }

    impl Default for FakeGit {
        fn default() -> Self {
            Self::with(&[])
        }
    }

    impl FakeGit {
        pub(crate) fn with(remotes: &[(&str, &str)]) -> Self {
            Self {
                remotes: RefCell::new(
                    remotes
                        .iter()
                        .map(|(n, u)| ((*n).to_string(), (*u).to_string()))
                        .collect(),
                ),
                config: HashMap::new(),
                repository: true,
            }
        }
    }

    impl GitRemotes for FakeGit {
        fn is_repository(&self) -> bool {
            self.repository
        }

        fn remote_urls(&self) -> io::Result<Vec<(String, String)>> {
            Ok(self.remotes.borrow().clone())
        }

        fn config_value(&self, key: &str) -> io::Result<Option<String>> {
            Ok(self.config.get(key).cloned())
        }

        fn add_remote(&self, name: &str, url: &str) -> io::Result<()> {
            self.remotes.borrow_mut().push((name.into(), url.into()));
            Ok(())
        }

        fn set_remote_url(&self, name: &str, url: &str) -> io::Result<()> {
            for entry in self.remotes.borrow_mut().iter_mut() {
                if entry.0 == name {
                    entry.1 = url.to_string();
                }
            }
            Ok(())
        }

        fn remove_remote(&self, name: &str) -> io::Result<()> {
            self.remotes.borrow_mut().retain(|(n, _)| n != name);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::testing::FakeGit;
    use super::*;

    const HOST: &str = "stratusapp.com";

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parse_listing_keeps_fetch_urls() {
        let listing = "origin\tgit@github.com:me/demo.git (fetch)\n\
                       origin\tgit@github.com:me/demo.git (push)\n\
                       stratus\tgit@stratusapp.com:demo.git (fetch)\n\
                       stratus\tgit@stratusapp.com:demo.git (push)\n";
        let remotes = parse_remote_listing(listing);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes[1], ("stratus".into(), "git@stratusapp.com:demo.git".into()));
    }

    #[test]
    fn map_filters_by_host_and_extracts_app() {
        let urls = vec![
            ("origin".to_string(), "git@github.com:me/demo.git".to_string()),
            ("stratus".to_string(), "git@stratusapp.com:demo.git".to_string()),
            ("staging".to_string(), "https://git.stratusapp.com/demo-staging.git".to_string()),
            ("other".to_string(), "git@stratusapp.com.evil.net:x.git".to_string()),
        ];
        let map = RemoteMap::from_urls(&urls, HOST);
        assert_eq!(map.app_for("stratus"), Some("demo"));
        assert_eq!(map.app_for("staging"), Some("demo-staging"));
        assert_eq!(map.app_for("origin"), None);
        assert_eq!(map.app_for("other"), None);
        assert_eq!(map.distinct_apps(), ["demo", "demo-staging"]);
    }

    #[test]
    fn single_app_is_detected_without_flags() {
        let git = FakeGit::with(&[("stratus", "git@stratusapp.com:demo.git")]);
        let mut resolver = AppResolver::new(git, HOST);

        let selection = resolver
            .extract_app(&mut args(&["ps"]), true)
            .expect("resolve")
            .expect("app");
        assert_eq!(selection.name, "demo");
        assert_eq!(selection.source, AppSource::Detected("stratus".into()));
        assert!(!selection.is_explicit());
    }

    #[test]
    fn many_remotes_one_app_is_not_ambiguous() {
        let git = FakeGit::with(&[
            ("stratus", "git@stratusapp.com:demo.git"),
            ("backup", "https://git.stratusapp.com/demo.git"),
        ]);
        let mut resolver = AppResolver::new(git, HOST);
        let selection = resolver.extract_app(&mut Vec::new(), true).expect("resolve");
        assert_eq!(selection.map(|s| s.name).as_deref(), Some("demo"));
    }

    #[test]
    fn two_apps_without_override_fail_when_forced() {
        let git = FakeGit::with(&[
            ("production", "git@stratusapp.com:demo.git"),
            ("staging", "git@stratusapp.com:demo-staging.git"),
        ]);
        let mut resolver = AppResolver::new(git, HOST);

        let err = resolver.extract_app(&mut Vec::new(), true).expect_err("ambiguous");
        assert!(matches!(err, ResolveError::AmbiguousApp(ref apps) if apps.len() == 2));
    }

    #[test]
    fn two_apps_without_override_are_unresolved_when_not_forced() {
        let git = FakeGit::with(&[
            ("production", "git@stratusapp.com:demo.git"),
            ("staging", "git@stratusapp.com:demo-staging.git"),
        ]);
        let mut resolver = AppResolver::new(git, HOST);
        assert_eq!(resolver.extract_app(&mut Vec::new(), false).expect("resolve"), None);
        assert!(resolver.selection().is_none());
    }

    #[test]
    fn no_remotes_forced_is_no_app() {
        let mut resolver = AppResolver::new(FakeGit::default(), HOST);
        let err = resolver.extract_app(&mut Vec::new(), true).expect_err("no app");
        assert!(matches!(err, ResolveError::NoApp));
    }

    #[test]
    fn explicit_app_flag_is_removed_from_args() {
        let mut resolver = AppResolver::new(FakeGit::default(), HOST);
        let mut argv = args(&["config", "--app", "billing", "set", "A=1"]);

        let selection = resolver.extract_app(&mut argv, true).expect("resolve").expect("app");
        assert_eq!(selection.name, "billing");
        assert_eq!(selection.source, AppSource::Explicit);
        assert_eq!(argv, args(&["config", "set", "A=1"]));
    }

    #[test]
    fn inline_flag_forms() {
        let mut argv = args(&["ps", "--app=one", "--remote=staging"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides.app.as_deref(), Some("one"));
        assert_eq!(overrides.remote.as_deref(), Some("staging"));
        assert_eq!(argv, args(&["ps"]));
    }

    #[test]
    fn short_flags_never_take_attached_values() {
        let mut argv = args(&["stratus", "logs", "-ademo", "-rstaging"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides, AppOverrides::default());
        assert_eq!(argv, args(&["stratus", "logs", "-ademo", "-rstaging"]));
    }

    #[test_case(&["stratus", "run", "ls", "-al"] ; "ls long listing")]
    #[test_case(&["stratus", "run", "rm", "-rf", "tmp"] ; "recursive remove")]
    #[test_case(&["stratus", "run", "bash", "-c", "echo -a demo"] ; "shell string")]
    fn remote_command_arguments_are_left_alone(argv: &[&str]) {
        let mut scanned = args(argv);
        let overrides = AppOverrides::take_from(&mut scanned).expect("flags");
        assert_eq!(overrides, AppOverrides::default());
        assert_eq!(scanned, args(argv));
    }

    #[test]
    fn run_flags_before_the_command_are_taken() {
        let mut argv = args(&["stratus", "run", "-a", "demo", "--remote=prod", "rake", "-a", "x"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides.app.as_deref(), Some("demo"));
        assert_eq!(overrides.remote.as_deref(), Some("prod"));
        assert_eq!(argv, args(&["stratus", "run", "rake", "-a", "x"]));
    }

    #[test]
    fn flags_before_run_and_global_values_are_handled() {
        let mut argv = args(&["stratus", "--host", "run", "ps", "-a", "demo", "list"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides.app.as_deref(), Some("demo"));
        assert_eq!(argv, args(&["stratus", "--host", "run", "ps", "list"]));

        let mut argv = args(&["stratus", "-a", "demo", "run", "ls", "-a"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides.app.as_deref(), Some("demo"));
        assert_eq!(argv, args(&["stratus", "run", "ls", "-a"]));
    }

    #[test]
    fn parsed_flags_fill_gaps() {
        let overrides = AppOverrides {
            app: None,
            remote: Some("prod".into()),
        }
        .or(Some("demo".into()), Some("staging".into()));
        assert_eq!(overrides.app.as_deref(), Some("demo"));
        assert_eq!(overrides.remote.as_deref(), Some("prod"));
    }

    #[test]
    fn flag_without_value_is_usage_error() {
        for argv in [vec!["ps", "--app"], vec!["ps", "-a", "--tail"], vec!["ps", "--remote="]] {
            let mut argv = args(&argv);
            let err = AppOverrides::take_from(&mut argv).expect_err("usage");
            assert!(matches!(err, ResolveError::Usage(_)), "{argv:?}");
        }
    }

    #[test]
    fn flags_after_double_dash_are_left_alone() {
        let mut argv = args(&["run", "--", "ls", "-a"]);
        let overrides = AppOverrides::take_from(&mut argv).expect("flags");
        assert_eq!(overrides, AppOverrides::default());
        assert_eq!(argv, args(&["run", "--", "ls", "-a"]));
    }

    #[test]
    fn remote_flag_selects_that_remote() {
        let git = FakeGit::with(&[
            ("production", "git@stratusapp.com:demo.git"),
            ("staging", "git@stratusapp.com:demo-staging.git"),
        ]);
        let mut resolver = AppResolver::new(git, HOST);
        let selection = resolver
            .extract_app(&mut args(&["-r", "staging"]), true)
            .expect("resolve")
            .expect("app");
        assert_eq!(selection.name, "demo-staging");
        assert!(selection.is_explicit());
    }

    #[test]
    fn unknown_remote_is_rejected() {
        let git = FakeGit::with(&[("production", "git@stratusapp.com:demo.git")]);
        let mut resolver = AppResolver::new(git, HOST);
        let err = resolver
            .extract_app(&mut args(&["--remote", "origin"]), false)
            .expect_err("unknown remote");
        assert!(matches!(err, ResolveError::UnknownRemote(ref r) if r == "origin"));
    }

    #[test]
    fn configured_default_remote_breaks_ties() {
        let mut git = FakeGit::with(&[
            ("production", "git@stratusapp.com:demo.git"),
            ("staging", "git@stratusapp.com:demo-staging.git"),
        ]);
        git.config.insert(DEFAULT_REMOTE_KEY.into(), "staging".into());
        let mut resolver = AppResolver::new(git, HOST);

        let selection = resolver.extract_app(&mut Vec::new(), true).expect("resolve").expect("app");
        assert_eq!(selection.name, "demo-staging");
        assert_eq!(selection.source, AppSource::Remote("staging".into()));
    }

    #[test]
    fn selection_is_memoized_for_the_command() {
        let git = FakeGit::with(&[("stratus", "git@stratusapp.com:demo.git")]);
        let mut resolver = AppResolver::new(git, HOST);
        resolver.extract_app(&mut Vec::new(), true).expect("first");

        resolver.git.remotes.borrow_mut().clear();
        let again = resolver.resolve(&AppOverrides::default(), true).expect("memo");
        assert_eq!(again.map(|s| s.name).as_deref(), Some("demo"));
    }

    #[test]
    fn rename_rewrites_matching_remotes_only() {
        let git = FakeGit::with(&[
            ("stratus", "git@stratusapp.com:demo.git"),
            ("mirror", "https://git.stratusapp.com/demo.git"),
            ("staging", "git@stratusapp.com:demo-staging.git"),
        ]);
        let resolver = AppResolver::new(git, HOST);

        let updated = resolver.rename_app_remotes("demo", "shiny").expect("rename");
        assert_eq!(updated, ["stratus", "mirror"]);

        let remotes = resolver.git.remotes.borrow();
        assert_eq!(remotes[0].1, "git@stratusapp.com:shiny.git");
        assert_eq!(remotes[1].1, "https://git.stratusapp.com/shiny.git");
        assert_eq!(remotes[2].1, "git@stratusapp.com:demo-staging.git");
    }

    #[test]
    fn destroy_removes_app_remotes() {
        let git = FakeGit::with(&[
            ("origin", "git@github.com:me/demo.git"),
            ("stratus", "git@stratusapp.com:demo.git"),
        ]);
        let resolver = AppResolver::new(git, HOST);
        let removed = resolver.remove_app_remotes("demo").expect("remove");
        assert_eq!(removed, ["stratus"]);
        assert_eq!(resolver.git.remotes.borrow().len(), 1);
    }

    #[test]
    fn create_adds_ssh_remote() {
        let resolver = AppResolver::new(FakeGit::default(), HOST);
        resolver.add_app_remote(DEFAULT_REMOTE_NAME, "fresh").expect("add");
        assert_eq!(
            resolver.git.remotes.borrow()[0],
            ("stratus".to_string(), "git@stratusapp.com:fresh.git".to_string())
        );
    }
}
