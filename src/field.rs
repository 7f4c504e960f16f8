use crate::constants::{self, CR, LF};
use bytes::Bytes;
use encoding_rs::{UTF_8, WINDOWS_1252};

/// One raw header field as it appeared in the header section.
///
/// The name and the unfolded value are decoded to text; the original bytes,
/// line folding included, stay available through [`raw`](Field::raw).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    name: String,
    value: String,
    raw: Bytes,
    line: usize,
}

impl Field {
    /// Builds a field that did not come from an input stream.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Field {
        let name = name.into();
        let value = value.into();
        let raw = Bytes::from(format!("{}: {}", name, value));

        Field {
            name,
            value,
            raw,
            line: 0,
        }
    }

    /// Splits one unfolded header field at its first `:`.
    ///
    /// Whitespace between the name and the colon is tolerated. A missing colon
    /// or a name with characters outside printable ASCII yields
    /// [`Error::InvalidHeaderField`](crate::Error::InvalidHeaderField).
    pub fn parse(raw: Bytes, line: usize) -> crate::Result<Field> {
        let invalid = || crate::Error::InvalidHeaderField {
            line,
            raw: decode_header_bytes(&raw),
        };

        let content = strip_line_terminator(&raw);

        let colon = match memchr::memchr(b':', content) {
            Some(idx) => idx,
            None => return Err(invalid()),
        };

        let mut name = &content[..colon];
        while let Some((&last, rest)) = name.split_last() {
            if !constants::is_wsp(last) {
                break;
            }
            name = rest;
        }

        if name.is_empty() || !name.iter().all(|&b| constants::is_field_name_char(b)) {
            return Err(invalid());
        }

        let mut value = &content[colon + 1..];
        if let Some((&first, rest)) = value.split_first() {
            if constants::is_wsp(first) {
                value = rest;
            }
        }

        let unfolded: Vec<u8> = value.iter().copied().filter(|&b| b != CR && b != LF).collect();

        Ok(Field {
            name: decode_header_bytes(name),
            value: decode_header_bytes(&unfolded),
            raw,
            line,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field body after the colon, unfolded, with one leading blank removed.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The 1-based line the field starts on, or `0` for synthesized fields.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    if end > 0 && line[end - 1] == LF {
        end -= 1;
    }
    if end > 0 && line[end - 1] == CR {
        end -= 1;
    }
    &line[..end]
}

/// Header bytes are taken as UTF-8 when valid and as Windows-1252 otherwise.
pub(crate) fn decode_header_bytes(bytes: &[u8]) -> String {
    match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned(),
    }
}
