//! Outbound protocol lines.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Write};

/// A single line written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `VERSION n`
    Version(String),

    /// `OK`
    Ok,

    /// `ERROR msg`
    Error(String),

    /// `CHANGES hash`, the unsolicited push while armed.
    Changes(String),

    /// `RECURSIVE path`, relative to the replica root.
    Recursive(OsString),

    /// `DONE`
    Done,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(version) => write!(f, "VERSION {version}"),
            Self::Ok => f.write_str("OK"),
            Self::Error(message) => write!(f, "ERROR {message}"),
            Self::Changes(hash) => write!(f, "CHANGES {hash}"),
            Self::Recursive(path) => write!(f, "RECURSIVE {}", escape_path(path)),
            Self::Done => f.write_str("DONE"),
        }
    }
}

/// Escape what would break line framing or decoding.
///
/// `%`, LF and CR are percent-encoded, as is every byte that is not part of
/// valid UTF-8, so the client can decode the exact name back.
fn escape_path(path: &OsStr) -> String {
    let bytes = path_bytes(path);
    let mut escaped = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '%' => escaped.push_str("%25"),
                '\n' => escaped.push_str("%0A"),
                '\r' => escaped.push_str("%0D"),
                _ => escaped.push(c),
            }
        }
        for byte in chunk.invalid() {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

#[cfg(unix)]
fn path_bytes(path: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;

    Cow::Borrowed(path.as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &OsStr) -> Cow<'_, [u8]> {
    match path.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Writes whole response lines to the client.
///
/// Not synchronized on its own; the monitor keeps it behind its state lock so
/// a write and the state check that caused it happen together.
pub struct ResponseWriter<W> {
    out: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wrap an output stream.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write one response line and flush it.
    pub fn send(&mut self, response: &Response) -> io::Result<()> {
        writeln!(self.out, "{response}")?;
        self.out.flush()
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}
