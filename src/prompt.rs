//! Interactive password entry with terminal echo turned off.

use crate::error::{Result, SedError};
use crate::ioctl::OPAL_KEY_MAX;
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use std::io::{self, BufRead, Write};
use std::os::fd::AsFd;
use tracing::{debug, warn};
use zeroize::Zeroizing;

fn hidden_flags() -> LocalFlags {
    LocalFlags::ECHO | LocalFlags::ECHONL | LocalFlags::ICANON
}

/// Puts the saved terminal mode back when dropped.
struct EchoGuard {
    saved: Termios,
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.saved) {
            warn!("failed to restore terminal mode: {}", e);
        }
        // the user's Enter was not echoed
        println!();
    }
}

/// Switch stdin to no-echo, non-canonical mode.
///
/// Returns `None` when stdin is not a terminal; the caller then reads
/// without prompting.
fn hide_input() -> Result<Option<EchoGuard>> {
    let stdin = io::stdin();
    let saved = match termios::tcgetattr(stdin.as_fd()) {
        Ok(t) => t,
        Err(e) => {
            debug!("stdin is not a terminal ({}), reading password directly", e);
            return Ok(None);
        }
    };

    let mut hidden = saved.clone();
    hidden.local_flags.remove(hidden_flags());
    hidden.local_flags.insert(LocalFlags::IEXTEN);

    let guard = EchoGuard { saved };
    termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &hidden)
        .map_err(|e| SedError::Prompt(e.into()))?;

    // tcsetattr succeeds if any change was applied, so check all of them took.
    let applied = termios::tcgetattr(stdin.as_fd()).map_err(|e| SedError::Prompt(e.into()))?;
    if applied.local_flags.intersects(hidden_flags())
        || !applied.local_flags.contains(LocalFlags::IEXTEN)
    {
        return Err(SedError::Prompt(io::Error::new(
            io::ErrorKind::Other,
            "terminal echo could not be disabled",
        )));
    }
    Ok(Some(guard))
}

/// Room for the longest key plus a line ending, so typical input never reallocates.
const LINE_CAPACITY: usize = 2 * OPAL_KEY_MAX;

/// Drop one trailing line ending (`\n` or `\r\n`).
pub(crate) fn strip_line_ending(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

/// Read one line of raw bytes from `reader`. `None` at end of input.
pub(crate) fn read_line_bytes(reader: &mut impl BufRead) -> io::Result<Option<Zeroizing<Vec<u8>>>> {
    let mut line = Zeroizing::new(Vec::with_capacity(LINE_CAPACITY));
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    strip_line_ending(&mut line);
    Ok(Some(line))
}

/// Read one password line from stdin, prompting when it is a terminal.
pub fn read_password() -> Result<Option<Zeroizing<Vec<u8>>>> {
    let guard = hide_input()?;
    if guard.is_some() {
        print!("Password: ");
        io::stdout().flush().map_err(SedError::Prompt)?;
    }

    let line = read_line_bytes(&mut io::stdin().lock()).map_err(SedError::Prompt)?;
    drop(guard);

    if let Some(pw) = &line {
        debug!("read a {} byte password", pw.len());
    }
    Ok(line)
}
