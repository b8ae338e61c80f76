//! Prompt/print plumbing for the interactive shell.
//!
//! Generic over the reader and writer so the menu can be driven from a script in tests.

use crate::errors::WalletError;
use eyre::Context as _;
use std::io::{BufRead, IsTerminal as _, Write};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub struct Console<R, W> {
    input: R,
    output: W,
    interactive: bool,
}

pub type StdConsole = Console<std::io::StdinLock<'static>, std::io::Stdout>;

/// Console on the process stdin/stdout. Screen clearing and pauses only apply when stdout is a
/// terminal.
pub fn stdio() -> StdConsole {
    let interactive = std::io::stdout().is_terminal();
    Console::new(std::io::stdin().lock(), std::io::stdout(), interactive)
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub const fn new(input: R, output: W, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }

    pub const fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn say(&mut self, line: &str) -> eyre::Result<()> {
        self.output
            .write_all(line.as_bytes())
            .and_then(|()| self.output.write_all(b"\n"))
            .and_then(|()| self.output.flush())
            .context("write to stdout")
    }

    pub fn blank(&mut self) -> eyre::Result<()> {
        self.say("")
    }

    /// Print `prompt` and read one line, trimmed. EOF is reported as
    /// [`WalletError::InputClosed`].
    pub fn ask(&mut self, prompt: &str) -> eyre::Result<String> {
        Ok(self.ask_raw(prompt)?.trim().to_owned())
    }

    /// Like [`Console::ask`] but only the line terminator is stripped.
    ///
    /// Bytes that are not UTF-8 are replaced rather than rejected, so a stray byte on stdin
    /// is just another unrecognised answer.
    pub fn ask_raw(&mut self, prompt: &str) -> eyre::Result<String> {
        self.output
            .write_all(prompt.as_bytes())
            .and_then(|()| self.output.flush())
            .context("write prompt")?;
        let mut buf = Vec::new();
        let n = self.input.read_until(b'\n', &mut buf).context("read stdin")?;
        if n == 0 {
            return Err(WalletError::InputClosed.into());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.strip_suffix('\n').unwrap_or(&line);
        Ok(line.strip_suffix('\r').unwrap_or(line).to_owned())
    }

    pub fn clear_screen(&mut self) -> eyre::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        self.output
            .write_all(CLEAR_SCREEN.as_bytes())
            .and_then(|()| self.output.flush())
            .context("clear screen")
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}
