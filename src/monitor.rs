use crate::Error;
use std::fmt;

/// The structural problems a [`Monitor`] is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    InvalidHeaderField,
    HeadersPrematureEnd,
    MimeBodyPrematureEnd,
}

impl ConditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::InvalidHeaderField => "invalid header field",
            ConditionKind::HeadersPrematureEnd => "unexpected end of headers",
            ConditionKind::MimeBodyPrematureEnd => "body part ended prematurely",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable problem found in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    kind: ConditionKind,
    line: usize,
    raw: Option<String>,
}

impl Condition {
    pub(crate) fn new(kind: ConditionKind, line: usize) -> Condition {
        Condition { kind, line, raw: None }
    }

    pub(crate) fn with_raw(mut self, raw: String) -> Condition {
        self.raw = Some(raw);
        self
    }

    pub fn kind(&self) -> ConditionKind {
        self.kind
    }

    /// The 1-based line in the root input where the condition was found.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The offending input, when there is a single line or field to blame.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub(crate) fn into_error(self) -> Error {
        match self.kind {
            ConditionKind::InvalidHeaderField => Error::InvalidHeaderField {
                line: self.line,
                raw: self.raw.unwrap_or_default(),
            },
            ConditionKind::HeadersPrematureEnd => Error::HeadersPrematureEnd { line: self.line },
            ConditionKind::MimeBodyPrematureEnd => Error::MimeBodyPrematureEnd { line: self.line },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)?;
        if let Some(raw) = &self.raw {
            write!(f, ": {:?}", raw)?;
        }
        Ok(())
    }
}

/// Receives the conditions found while tokenizing.
///
/// In strict mode a condition is also returned as an error right after the
/// monitor has seen it. Closures taking a `&Condition` can be used directly.
pub trait Monitor {
    fn warn(&mut self, condition: &Condition);
}

impl<F> Monitor for F
where
    F: FnMut(&Condition),
{
    fn warn(&mut self, condition: &Condition) {
        self(condition)
    }
}

/// Ignores every condition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn warn(&mut self, _condition: &Condition) {}
}

/// Forwards every condition to the `log` facade at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMonitor;

impl Monitor for LogMonitor {
    fn warn(&mut self, condition: &Condition) {
        log::warn!("{}", condition);
    }
}
