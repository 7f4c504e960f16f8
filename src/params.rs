use crate::constants::{self, CR, HT, LF, SP};
use crate::Error;
use encoding_rs::{Encoding, UTF_8};
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write};

const SEMICOLON: &[u8] = b";";
const EQUAL_OR_SEMICOLON: &[u8] = b"=;";
const COMMA: &[u8] = b",";

/// One `name[=value]` pair exactly as it was tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: Option<String>,
    quoted: bool,
}

impl Parameter {
    pub fn new<N: Into<String>>(name: N, value: Option<String>, quoted: bool) -> Parameter {
        Parameter {
            name: name.into(),
            value,
            quoted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value with quotes and escapes removed. `None` for a bare name.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether the value was written as a quoted string.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        match &self.value {
            None => Ok(()),
            Some(value) if self.quoted => {
                f.write_str("=\"")?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
            Some(value) => write!(f, "={}", value),
        }
    }
}

/// A structured field value: the leading value followed by its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBody {
    value: String,
    params: Vec<Parameter>,
}

impl RawBody {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parameters in input order, before any RFC 2231 processing.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Parameters with RFC 2231 continuations and charsets resolved.
    pub fn parameters(&self) -> Parameters {
        Parameters::from_raw(&self.params)
    }
}

/// Tokenizes structured header values such as `Content-Type` and
/// `Content-Disposition`.
///
/// Comments are skipped wherever they appear. In lenient mode the tokenizer
/// never fails: malformed input degrades to the closest literal reading. In
/// strict mode malformed names and values are rejected with
/// [`Error::InvalidParameter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldParser {
    strict: bool,
}

impl FieldParser {
    pub fn new(strict: bool) -> FieldParser {
        FieldParser { strict }
    }

    pub fn lenient() -> FieldParser {
        FieldParser::new(false)
    }

    pub fn strict() -> FieldParser {
        FieldParser::new(true)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Splits `value; name=value; ...` into its leading value and parameters.
    pub fn parse_body(&self, input: &str) -> crate::Result<RawBody> {
        let mut tokenizer = Tokenizer::new(input, self.strict);
        let value = tokenizer.segment(SEMICOLON)?;

        let mut params = Vec::new();
        while !tokenizer.at_end() {
            tokenizer.bump();
            if let Some(param) = self.parameter(&mut tokenizer)? {
                params.push(param);
            }
        }

        Ok(RawBody {
            value: value.text,
            params,
        })
    }

    /// Splits a comma separated list, dropping empty elements and comments.
    pub fn parse_list(&self, input: &str) -> crate::Result<Vec<String>> {
        let mut tokenizer = Tokenizer::new(input, self.strict);
        let mut items = Vec::new();

        loop {
            let item = tokenizer.segment(COMMA)?;
            if !item.text.is_empty() {
                items.push(item.text);
            }
            if tokenizer.at_end() {
                break;
            }
            tokenizer.bump();
        }

        Ok(items)
    }

    fn parameter(&self, tokenizer: &mut Tokenizer<'_>) -> crate::Result<Option<Parameter>> {
        let name = tokenizer.segment(EQUAL_OR_SEMICOLON)?;

        let has_value = tokenizer.peek() == Some(b'=');
        if has_value {
            tokenizer.bump();
        }

        if name.text.is_empty() {
            if !has_value {
                return Ok(None);
            }
            if self.strict {
                return Err(tokenizer.invalid("missing parameter name"));
            }
            tokenizer.segment(SEMICOLON)?;
            return Ok(None);
        }

        if self.strict && (name.quoted || name.pieces > 1 || !name.text.bytes().all(constants::is_token_char)) {
            return Err(tokenizer.invalid("invalid parameter name"));
        }

        if !has_value {
            return Ok(Some(Parameter::new(name.text, None, false)));
        }

        let value = tokenizer.segment(SEMICOLON)?;
        if self.strict {
            if value.pieces == 0 {
                return Err(tokenizer.invalid("missing parameter value"));
            }
            if value.pieces > 1 || (!value.quoted && !value.text.bytes().all(constants::is_token_char)) {
                return Err(tokenizer.invalid("invalid parameter value"));
            }
        }

        Ok(Some(Parameter::new(name.text, Some(value.text), value.quoted)))
    }
}

struct Segment {
    text: String,
    quoted: bool,
    pieces: usize,
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    strict: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str, strict: bool) -> Self {
        Tokenizer { input, pos: 0, strict }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn invalid(&self, reason: &'static str) -> Error {
        Error::InvalidParameter {
            value: self.input.to_owned(),
            reason,
        }
    }

    /// Reads tokens and quoted strings up to one of `delims`. Pieces separated by
    /// whitespace are joined with a single space; comments vanish.
    fn segment(&mut self, delims: &[u8]) -> crate::Result<Segment> {
        let mut out = Vec::new();
        let mut quoted = false;
        let mut pieces = 0;
        let mut whitespace = false;

        while let Some(b) = self.peek() {
            if delims.contains(&b) {
                break;
            }

            if is_space(b) {
                self.skip_whitespace();
                whitespace = true;
            } else if b == b'(' {
                self.skip_comment()?;
            } else {
                if whitespace && !out.is_empty() {
                    out.push(SP);
                }
                whitespace = false;
                pieces += 1;

                if b == b'"' {
                    quoted = true;
                    self.quoted_content(&mut out)?;
                } else {
                    self.unquoted_content(delims, &mut out);
                }
            }
        }

        Ok(Segment {
            text: String::from_utf8_lossy(&out).into_owned(),
            quoted,
            pieces,
        })
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if is_space(b)) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) -> crate::Result<()> {
        let mut depth = 0usize;

        while let Some(b) = self.peek() {
            self.bump();
            match b {
                b'\\' => self.bump(),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        if self.strict {
            return Err(self.invalid("unterminated comment"));
        }
        Ok(())
    }

    fn quoted_content(&mut self, out: &mut Vec<u8>) -> crate::Result<()> {
        self.bump();

        while let Some(b) = self.peek() {
            self.bump();
            match b {
                b'"' => return Ok(()),
                b'\\' => match self.peek() {
                    Some(escaped) => {
                        if escaped != b'"' && escaped != b'\\' {
                            out.push(b'\\');
                        }
                        out.push(escaped);
                        self.bump();
                    }
                    None => out.push(b'\\'),
                },
                CR | LF => {}
                _ => out.push(b),
            }
        }

        if self.strict {
            return Err(self.invalid("unterminated quoted string"));
        }
        Ok(())
    }

    fn unquoted_content(&mut self, delims: &[u8], out: &mut Vec<u8>) {
        while let Some(b) = self.peek() {
            if delims.contains(&b) || is_space(b) || b == b'(' || b == b'"' {
                break;
            }
            out.push(b);
            self.bump();
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, SP | HT | CR | LF)
}

/// Parameters after RFC 2231 processing, in order of first appearance.
///
/// Lookups ignore ASCII case. Names that look like RFC 2231 extensions but do
/// not follow its grammar (`name*+0`, `name**`, an index that overflows) are
/// kept verbatim, name and value alike.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameters {
    entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    param: Parameter,
    extended: bool,
}

enum ParamName<'a> {
    Plain(&'a str),
    Extended(&'a str),
    Section { base: &'a str, index: u32, encoded: bool },
    Literal,
}

fn classify(name: &str) -> ParamName<'_> {
    let star = match name.find('*') {
        Some(idx) => idx,
        None => return ParamName::Plain(name),
    };

    let base = &name[..star];
    let rest = &name[star + 1..];
    if base.is_empty() {
        return ParamName::Literal;
    }
    if rest.is_empty() {
        return ParamName::Extended(base);
    }

    let (digits, encoded) = match rest.strip_suffix('*') {
        Some(digits) => (digits, true),
        None => (rest, false),
    };

    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return ParamName::Literal;
    }

    match digits.parse::<u32>() {
        Ok(index) => ParamName::Section { base, index, encoded },
        Err(_) => ParamName::Literal,
    }
}

/// Splits `charset'language'text`. Both quotes are required.
fn split_charset(value: &str) -> Option<(&str, &str)> {
    let first = value.find('\'')?;
    let rest = &value[first + 1..];
    let second = rest.find('\'')?;
    Some((&value[..first], &rest[second + 1..]))
}

fn decode_charset(charset: &str, bytes: &[u8]) -> Option<String> {
    let encoding = if charset.is_empty() {
        UTF_8
    } else {
        Encoding::for_label(charset.trim().as_bytes())?
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Percent-decodes `text` and interprets it in `charset`, keeping `text`
/// untouched when the charset is unknown or the bytes do not fit it.
fn decode_extended_text(charset: &str, text: &str) -> String {
    let bytes: Vec<u8> = percent_decode_str(text).collect();
    match decode_charset(charset, &bytes) {
        Some(decoded) => decoded,
        None => {
            log::debug!("could not decode {:?} as {:?}, keeping it encoded", text, charset);
            text.to_owned()
        }
    }
}

fn decode_extended(value: &str) -> String {
    match split_charset(value) {
        Some((charset, text)) => decode_extended_text(charset, text),
        None => value.to_owned(),
    }
}

type Sections<'a> = BTreeMap<u32, (&'a str, bool)>;

fn assemble(sections: &Sections<'_>) -> String {
    let mut out = String::new();
    let mut charset = "";
    let mut pending = String::new();

    for (&index, &(value, encoded)) in sections {
        if encoded {
            let text = match split_charset(value) {
                Some((cs, text)) if index == 0 => {
                    charset = cs;
                    text
                }
                _ => value,
            };
            pending.push_str(text);
        } else {
            if !pending.is_empty() {
                out.push_str(&decode_extended_text(charset, &pending));
                pending.clear();
            }
            out.push_str(value);
        }
    }

    if !pending.is_empty() {
        out.push_str(&decode_extended_text(charset, &pending));
    }
    out
}

impl Parameters {
    /// Resolves RFC 2231 sections, charsets and duplicates.
    ///
    /// The first plain value for a name wins over later plain values. An
    /// extended value replaces a plain one and is appended to an earlier
    /// extended one. Section chains are only assembled when section `0` is
    /// present; otherwise their parameters are kept as they were written.
    pub fn from_raw(params: &[Parameter]) -> Parameters {
        let mut chains: HashMap<String, Sections<'_>> = HashMap::new();
        for param in params {
            if let ParamName::Section { base, index, encoded } = classify(&param.name) {
                chains
                    .entry(base.to_ascii_lowercase())
                    .or_default()
                    .entry(index)
                    .or_insert((param.value().unwrap_or(""), encoded));
            }
        }

        let mut resolved = Parameters::default();
        let mut assembled = HashSet::new();

        for param in params {
            match classify(&param.name) {
                ParamName::Plain(name) => {
                    resolved.apply_plain(name.to_ascii_lowercase(), param.value.clone(), param.quoted);
                }
                ParamName::Extended(base) => {
                    let value = decode_extended(param.value().unwrap_or(""));
                    resolved.apply_extended(base.to_ascii_lowercase(), value, param.quoted);
                }
                ParamName::Section { base, .. } => {
                    let key = base.to_ascii_lowercase();
                    match chains.get(&key) {
                        Some(chain) if chain.contains_key(&0) => {
                            if assembled.insert(key.clone()) {
                                resolved.apply_extended(key, assemble(chain), param.quoted);
                            }
                        }
                        _ => resolved.apply_plain(param.name.clone(), param.value.clone(), param.quoted),
                    }
                }
                ParamName::Literal => {
                    resolved.apply_plain(param.name.clone(), param.value.clone(), param.quoted);
                }
            }
        }

        resolved
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.param.name.eq_ignore_ascii_case(name))
    }

    fn apply_plain(&mut self, name: String, value: Option<String>, quoted: bool) {
        if self.position(&name).is_none() {
            self.entries.push(Entry {
                param: Parameter { name, value, quoted },
                extended: false,
            });
        }
    }

    fn apply_extended(&mut self, name: String, value: String, quoted: bool) {
        match self.position(&name) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                if entry.extended {
                    entry.param.value.get_or_insert_with(String::new).push_str(&value);
                } else {
                    entry.param.value = Some(value);
                    entry.param.quoted = quoted;
                    entry.extended = true;
                }
            }
            None => self.entries.push(Entry {
                param: Parameter {
                    name,
                    value: Some(value),
                    quoted,
                },
                extended: true,
            }),
        }
    }

    /// The value for `name`; a bare name without `=` yields an empty string.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .map(|idx| self.entries[idx].param.value().unwrap_or(""))
    }

    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        self.position(name).map(|idx| &self.entries[idx].param)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter().map(|entry| &entry.param)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
