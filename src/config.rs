use crate::constants;

/// Tokenizer settings.
///
/// The limits guard against inputs that would otherwise make the tokenizer
/// buffer without bound. Set a limit to `usize::MAX` to disable it.
///
/// # Examples
///
/// ```
/// use mime_tokens::MimeConfig;
///
/// let config = MimeConfig::new()
///     .strict_parsing(true)
///     .max_line_len(998)
///     .max_header_count(200);
/// assert!(config.is_strict());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeConfig {
    pub(crate) strict_parsing: bool,
    pub(crate) max_line_len: usize,
    pub(crate) max_header_count: usize,
    pub(crate) max_header_len: usize,
    pub(crate) malformed_header_starts_body: bool,
    pub(crate) headless_content_type: Option<String>,
}

impl MimeConfig {
    pub fn new() -> MimeConfig {
        MimeConfig::default()
    }

    /// Turns the conditions reported to the monitor into errors and rejects
    /// malformed structured field values.
    pub fn strict_parsing(mut self, strict: bool) -> MimeConfig {
        self.strict_parsing = strict;
        self
    }

    /// Maximum length of one physical header line, terminator included.
    pub fn max_line_len(mut self, limit: usize) -> MimeConfig {
        self.max_line_len = limit;
        self
    }

    /// Maximum number of header fields per entity.
    pub fn max_header_count(mut self, limit: usize) -> MimeConfig {
        self.max_header_count = limit;
        self
    }

    /// Maximum length of one header field with its continuation lines.
    pub fn max_header_len(mut self, limit: usize) -> MimeConfig {
        self.max_header_len = limit;
        self
    }

    /// When set, the first malformed header line ends the header section and
    /// becomes the start of the body instead of being dropped.
    pub fn malformed_header_starts_body(mut self, enabled: bool) -> MimeConfig {
        self.malformed_header_starts_body = enabled;
        self
    }

    /// Makes [`TokenStream::parse`](crate::TokenStream::parse) treat its input
    /// as a body without headers, of the given content type.
    pub fn headless_parsing<T: Into<String>>(mut self, content_type: T) -> MimeConfig {
        self.headless_content_type = Some(content_type.into());
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict_parsing
    }

    pub fn headless_content_type(&self) -> Option<&str> {
        self.headless_content_type.as_deref()
    }
}

impl Default for MimeConfig {
    fn default() -> Self {
        MimeConfig {
            strict_parsing: false,
            max_line_len: constants::DEFAULT_MAX_LINE_LEN,
            max_header_count: constants::DEFAULT_MAX_HEADER_COUNT,
            max_header_len: constants::DEFAULT_MAX_HEADER_LEN,
            malformed_header_starts_body: false,
            headless_content_type: None,
        }
    }
}
