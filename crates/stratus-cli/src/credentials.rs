//! Local credential storage.
//!
//! The credentials file holds two lines, the account identity and the API
//! secret. It is created with mode `0600` inside a `0700` directory.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::terminal::Prompt;

const IDENTITY_LABEL: &str = "Email: ";
const SECRET_LABEL: &str = "Password (typing will be hidden): ";

/// An identity and its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account identity (email).
    pub identity: String,
    /// API secret or password.
    pub secret: String,
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credentials file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored pair without prompting.
    ///
    /// Returns `None` when the file is absent or does not hold exactly two
    /// lines.
    pub fn read(&self) -> io::Result<Option<Credentials>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let lines: Vec<&str> = contents.lines().collect();
        match lines.as_slice() {
            [identity, secret] => Ok(Some(Credentials::new(*identity, *secret))),
            _ => {
                warn!(path = %self.path.display(), lines = lines.len(), "ignoring malformed credentials file");
                Ok(None)
            }
        }
    }

    /// Return the stored pair, prompting for a new one when none is stored.
    pub fn load(&self, prompt: &mut dyn Prompt) -> io::Result<Credentials> {
        match self.read()? {
            Some(credentials) => {
                debug!(identity = %credentials.identity, "using stored credentials");
                Ok(credentials)
            }
            None => self.prompt_and_save(prompt),
        }
    }

    /// Ask for identity and secret, persist them, and return them.
    pub fn prompt_and_save(&self, prompt: &mut dyn Prompt) -> io::Result<Credentials> {
        let identity = prompt.ask(IDENTITY_LABEL)?.trim().to_string();
        let secret = prompt.ask_secret(SECRET_LABEL)?;
        let credentials = Credentials::new(identity, secret);
        self.save(&credentials)?;
        Ok(credentials)
    }

    /// Write `credentials` to disk with owner-only permissions.
    pub fn save(&self, credentials: &Credentials) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
            restrict(dir, 0o700)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(format!("{}\n{}\n", credentials.identity, credentials.secret).as_bytes())?;
        restrict(&self.path, 0o600)?;

        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Delete the credentials file. A missing file is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
