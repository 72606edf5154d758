//! Parsing of protocol input lines.

use std::borrow::Cow;
use std::path::PathBuf;

/// A single line of client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `VERSION n`
    Version(String),

    /// `START hash fspath [path]`
    Start {
        hash: String,
        fspath: PathBuf,
        path: Option<String>,
    },

    /// `DIR [path]`, only valid while scanning.
    Dir(Option<String>),

    /// `LINK path`, only valid while scanning.
    Link(String),

    /// `DONE`, ends a scan.
    Done,

    /// `CHANGES hash`
    Changes(String),

    /// `WAIT hash`
    Wait(String),

    /// `RESET hash`
    Reset(String),

    /// `DEBUG`
    Debug,

    /// Anything else, carrying the line as received.
    Unknown(String),
}

impl Command {
    /// Parse one input line, without its terminator.
    ///
    /// Keywords are case-sensitive and arity is part of the grammar: a known
    /// keyword with the wrong number of arguments is [`Command::Unknown`].
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split_ascii_whitespace();
        let Some(keyword) = tokens.next() else {
            return Self::Unknown(line.to_string());
        };
        let raw: Vec<&str> = tokens.collect();
        let args: Vec<String> = raw.iter().map(|token| decode(token)).collect();

        match (keyword, args.as_slice()) {
            ("VERSION", [version]) => Self::Version(version.clone()),
            ("START", [hash, _]) => Self::Start {
                hash: hash.clone(),
                fspath: decode_path(raw[1]),
                path: None,
            },
            ("START", [hash, _, path]) => Self::Start {
                hash: hash.clone(),
                fspath: decode_path(raw[1]),
                path: Some(path.clone()),
            },
            ("DIR", []) => Self::Dir(None),
            ("DIR", [path]) => Self::Dir(Some(path.clone())),
            ("LINK", [path]) => Self::Link(path.clone()),
            ("DONE", []) => Self::Done,
            ("CHANGES", [hash]) => Self::Changes(hash.clone()),
            ("WAIT", [hash]) => Self::Wait(hash.clone()),
            ("RESET", [hash]) => Self::Reset(hash.clone()),
            ("DEBUG", []) => Self::Debug,
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Whether this is a `WAIT`, the only command that keeps the session armed.
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait(_))
    }
}

/// Percent-decode an argument, falling back to the raw token.
fn decode(token: &str) -> String {
    urlencoding::decode(token)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| token.to_string())
}

/// Percent-decode a filesystem path byte for byte.
#[cfg(unix)]
fn decode_path(token: &str) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let bytes = urlencoding::decode_binary(token.as_bytes());
    PathBuf::from(OsStr::from_bytes(&bytes))
}

/// Percent-decode a filesystem path. Non-unix paths must be Unicode.
#[cfg(not(unix))]
fn decode_path(token: &str) -> PathBuf {
    PathBuf::from(decode(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_top_level_commands() {
        assert_eq!(Command::parse("VERSION 1"), Command::Version("1".to_string()));
        assert_eq!(
            Command::parse("CHANGES abc"),
            Command::Changes("abc".to_string())
        );
        assert_eq!(Command::parse("WAIT abc"), Command::Wait("abc".to_string()));
        assert_eq!(Command::parse("RESET abc"), Command::Reset("abc".to_string()));
        assert_eq!(Command::parse("DEBUG"), Command::Debug);
    }

    #[test]
    fn test_parse_start() {
        assert_eq!(
            Command::parse("START h /tmp/x"),
            Command::Start {
                hash: "h".to_string(),
                fspath: PathBuf::from("/tmp/x"),
                path: None,
            }
        );
        assert_eq!(
            Command::parse("START h /tmp/x sub/dir"),
            Command::Start {
                hash: "h".to_string(),
                fspath: PathBuf::from("/tmp/x"),
                path: Some("sub/dir".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_scan_lines() {
        assert_eq!(Command::parse("DIR"), Command::Dir(None));
        assert_eq!(Command::parse("DIR sub"), Command::Dir(Some("sub".to_string())));
        assert_eq!(
            Command::parse("LINK sub/l"),
            Command::Link("sub/l".to_string())
        );
        assert_eq!(Command::parse("DONE"), Command::Done);
    }

    #[test]
    fn test_arguments_are_percent_decoded() {
        assert_eq!(
            Command::parse("START h /tmp/my%20docs"),
            Command::Start {
                hash: "h".to_string(),
                fspath: PathBuf::from("/tmp/my docs"),
                path: None,
            }
        );
        // Invalid UTF-8 after decoding keeps the raw token.
        assert_eq!(Command::parse("DIR %FF"), Command::Dir(Some("%FF".to_string())));
    }

    #[cfg(unix)]
    #[test]
    fn test_start_root_keeps_raw_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use std::path::Path;

        let Command::Start { fspath, .. } = Command::parse("START h /tmp/caf%E9") else {
            panic!("expected START");
        };
        assert_eq!(fspath, Path::new(OsStr::from_bytes(b"/tmp/caf\xe9")));
    }

    #[test]
    fn test_wrong_arity_is_unknown() {
        assert_eq!(
            Command::parse("VERSION"),
            Command::Unknown("VERSION".to_string())
        );
        assert_eq!(
            Command::parse("START h"),
            Command::Unknown("START h".to_string())
        );
        assert_eq!(
            Command::parse("WAIT a b"),
            Command::Unknown("WAIT a b".to_string())
        );
        assert_eq!(
            Command::parse("DONE now"),
            Command::Unknown("DONE now".to_string())
        );
    }

    #[test]
    fn test_unknown_lines() {
        assert_eq!(Command::parse("FOO"), Command::Unknown("FOO".to_string()));
        assert_eq!(Command::parse("wait h"), Command::Unknown("wait h".to_string()));
        assert_eq!(Command::parse(""), Command::Unknown(String::new()));
    }

    #[test]
    fn test_is_wait() {
        assert!(Command::parse("WAIT h").is_wait());
        assert!(!Command::parse("CHANGES h").is_wait());
        assert!(!Command::parse("WAIT").is_wait());
    }
}
