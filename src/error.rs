use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;

/// A set of errors that can occur while tokenizing a MIME stream.
///
/// The first three variants correspond to the structural conditions that a
/// [`Monitor`](crate::Monitor) receives; they are only raised as errors when
/// [`strict parsing`](crate::MimeConfig::strict_parsing) is enabled.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// A header line had an illegal field name or no `:` separator.
    #[display(fmt = "invalid header field at line {}: {:?}", line, raw)]
    InvalidHeaderField { line: usize, raw: String },

    /// The header section ended without a blank line.
    #[display(fmt = "unexpected end of headers at line {}", line)]
    HeadersPrematureEnd { line: usize },

    /// A body part reached the end of its input without a closing boundary.
    #[display(fmt = "body part ended prematurely at line {}", line)]
    MimeBodyPrematureEnd { line: usize },

    /// A field value could not be tokenized in strict mode.
    #[display(fmt = "invalid parameter syntax ({}): {:?}", reason, value)]
    InvalidParameter { value: String, reason: &'static str },

    /// A physical header line exceeded the configured maximum.
    #[display(fmt = "maximum line length limit exceeded: {} bytes", limit)]
    MaxLineLengthExceeded { limit: usize },

    /// An entity carried more header fields than allowed.
    #[display(fmt = "maximum header count limit exceeded: {} fields", limit)]
    MaxHeaderCountExceeded { limit: usize },

    /// An unfolded header field exceeded the configured maximum.
    #[display(fmt = "maximum header length limit exceeded: {} bytes", limit)]
    MaxHeaderLengthExceeded { limit: usize },

    /// Reading from the underlying byte source failed.
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(std::io::Error),
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StreamReadFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::StreamReadFailed(err) => err,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}
