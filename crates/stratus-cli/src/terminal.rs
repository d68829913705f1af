//! Terminal mode control and interactive prompts.
//!
//! Raw mode is always held through [`ModeGuard`], which restores the previous
//! mode when dropped, so an early return, an error or a Ctrl-C never leaves
//! the user's terminal without echo.

use std::io::{self, BufRead, IsTerminal, Read, Write};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{trace, warn};

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Switches local input between line-buffered and unbuffered mode.
pub trait TerminalMode {
    /// Disable line buffering and local echo.
    fn enter_unbuffered(&mut self) -> io::Result<()>;

    /// Restore line buffering and echo.
    fn restore(&mut self) -> io::Result<()>;
}

/// The process's controlling terminal, driven through crossterm.
///
/// When stdin is not a terminal (pipes, CI), both operations are no-ops.
#[derive(Debug, Default)]
pub struct Console {
    raw: bool,
}

impl Console {
    /// Create a handle for the controlling terminal.
    #[must_use]
    pub const fn new() -> Self {
        Self { raw: false }
    }

    /// Whether raw mode is currently held by this handle.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.raw
    }
}

impl TerminalMode for Console {
    fn enter_unbuffered(&mut self) -> io::Result<()> {
        if self.raw || !io::stdin().is_terminal() {
            return Ok(());
        }
        enable_raw_mode()?;
        self.raw = true;
        trace!("terminal switched to raw mode");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.raw {
            return Ok(());
        }
        disable_raw_mode()?;
        self.raw = false;
        trace!("terminal restored");
        Ok(())
    }
}

/// Holds a terminal in unbuffered mode until dropped.
pub struct ModeGuard<'a> {
    mode: &'a mut dyn TerminalMode,
}

impl<'a> ModeGuard<'a> {
    /// Switch `mode` to unbuffered and return the guard that undoes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode switch fails; nothing needs restoring then.
    pub fn acquire(mode: &'a mut dyn TerminalMode) -> io::Result<Self> {
        mode.enter_unbuffered()?;
        Ok(Self { mode })
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mode.restore() {
            warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

impl std::fmt::Debug for ModeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeGuard").finish_non_exhaustive()
    }
}

/// Source of interactive answers.
pub trait Prompt {
    /// Ask for a line of input, echoed.
    fn ask(&mut self, label: &str) -> io::Result<String>;

    /// Ask for a secret with echo suppressed.
    fn ask_secret(&mut self, label: &str) -> io::Result<String>;

    /// Ask a yes/no question. Anything but `y`/`yes` is a no.
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{question} (y/n) "))?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// Prompts on stderr and reads from stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    console: Console,
}

impl TerminalPrompt {
    /// Create a prompt bound to the process's terminal.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            console: Console::new(),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn ask(&mut self, label: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{label}")?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn ask_secret(&mut self, label: &str) -> io::Result<String> {
        if !io::stdin().is_terminal() {
            return self.ask(label);
        }

        let mut stderr = io::stderr();
        write!(stderr, "{label}")?;
        stderr.flush()?;

        let secret = {
            let _guard = ModeGuard::acquire(&mut self.console)?;
            read_secret(&mut io::stdin().lock())
        };
        writeln!(stderr)?;
        secret
    }
}

/// Read keystrokes up to Enter from a raw-mode terminal.
fn read_secret<R: Read>(input: &mut R) -> io::Result<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if input.read(&mut byte)? == 0 {
            break;
        }
        match byte[0] {
            b'\r' | b'\n' => break,
            CTRL_C => return Err(io::ErrorKind::Interrupted.into()),
            CTRL_D if bytes.is_empty() => return Err(io::ErrorKind::UnexpectedEof.into()),
            BACKSPACE | DELETE => {
                bytes.pop();
            }
            b => bytes.push(b),
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::testing::{RecordingMode, ScriptedPrompt};
    use super::*;

    #[test]
    fn guard_restores_on_drop() {
        let mut mode = RecordingMode::default();
        {
            let _guard = ModeGuard::acquire(&mut mode).expect("acquire");
        }
        assert!(!mode.unbuffered);
        assert_eq!(mode.switches, 1);
        assert_eq!(mode.restores, 1);
    }

    #[test]
    fn guard_restores_on_early_error_return() {
        fn failing(mode: &mut dyn TerminalMode) -> io::Result<()> {
            let _guard = ModeGuard::acquire(mode)?;
            Err(io::ErrorKind::Interrupted.into())
        }

        let mut mode = RecordingMode::default();
        assert!(failing(&mut mode).is_err());
        assert!(!mode.unbuffered);
        assert_eq!(mode.restores, 1);
    }

    #[test]
    fn console_is_idle_until_used() {
        let mut console = Console::new();
        assert!(!console.is_raw());
        console.restore().expect("restore is a no-op");
    }

    #[test]
    fn read_secret_stops_at_enter() {
        let mut input = Cursor::new(b"hunter2\rignored".to_vec());
        assert_eq!(read_secret(&mut input).expect("secret"), "hunter2");
    }

    #[test]
    fn read_secret_handles_backspace() {
        let mut input = Cursor::new(b"pass\x7fs\x08x\n".to_vec());
        assert_eq!(read_secret(&mut input).expect("secret"), "pasx");
    }

    #[test]
    fn read_secret_ctrl_c_is_interrupt() {
        let mut input = Cursor::new(b"ab\x03cd\n".to_vec());
        let err = read_secret(&mut input).expect_err("interrupted");
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn read_secret_ctrl_d_on_empty_is_eof() {
        let mut input = Cursor::new(b"\x04".to_vec());
        let err = read_secret(&mut input).expect_err("eof");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn confirm_accepts_yes_variants() {
        let mut prompt = ScriptedPrompt::new(["y", "YES", "no", ""]);
        assert!(prompt.confirm("proceed?").expect("answer"));
        assert!(prompt.confirm("proceed?").expect("answer"));
        assert!(!prompt.confirm("proceed?").expect("answer"));
        assert!(!prompt.confirm("proceed?").expect("answer"));
        assert_eq!(prompt.asked[0], "proceed? (y/n) ");
    }
}
