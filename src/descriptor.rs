use crate::constants::{self, SP};
use crate::field::Field;
use crate::params::{FieldParser, Parameters};
use std::rc::Rc;

/// What the headers of an entity say about its body.
///
/// Only the first `Content-Type`, `Content-Transfer-Encoding` and
/// `Content-Length` fields count. A multipart type without a usable boundary
/// is treated as if no type had been given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyDescriptor {
    parent: Option<Rc<BodyDescriptor>>,
    mime_type: Option<String>,
    params: Parameters,
    boundary: Option<String>,
    charset: Option<String>,
    transfer_encoding: Option<String>,
    content_length: Option<u64>,
    disposition_type: Option<String>,
    disposition_params: Parameters,
    content_id: Option<String>,
    content_description: Option<String>,
    mime_version: Option<String>,
    content_language: Vec<String>,
    seen_content_type: bool,
    seen_transfer_encoding: bool,
    seen_content_length: bool,
    seen_disposition: bool,
}

impl BodyDescriptor {
    pub fn new() -> BodyDescriptor {
        BodyDescriptor::default()
    }

    /// A descriptor for an entity nested inside `parent`.
    pub fn with_parent(parent: Rc<BodyDescriptor>) -> BodyDescriptor {
        BodyDescriptor {
            parent: Some(parent),
            ..BodyDescriptor::default()
        }
    }

    /// Records what a header field says about the body. Fields that do not
    /// describe the body are ignored.
    pub fn add_field(&mut self, field: &Field, parser: &FieldParser) -> crate::Result<()> {
        let name = field.name().to_ascii_lowercase();

        match name.as_str() {
            constants::CONTENT_TYPE if !self.seen_content_type => {
                self.seen_content_type = true;
                self.set_content_type(field.value(), parser)?;
            }
            constants::CONTENT_TRANSFER_ENCODING if !self.seen_transfer_encoding => {
                self.seen_transfer_encoding = true;
                let value = field.value().trim().to_ascii_lowercase();
                if !value.is_empty() {
                    self.transfer_encoding = Some(value);
                }
            }
            constants::CONTENT_LENGTH if !self.seen_content_length => {
                self.seen_content_length = true;
                match field.value().trim().parse::<u64>() {
                    Ok(len) => self.content_length = Some(len),
                    Err(_) => log::debug!("ignoring invalid content length {:?}", field.value()),
                }
            }
            constants::CONTENT_DISPOSITION if !self.seen_disposition => {
                self.seen_disposition = true;
                let body = parser.parse_body(field.value())?;
                let disposition = body.value().trim().to_ascii_lowercase();
                if !disposition.is_empty() {
                    self.disposition_type = Some(disposition);
                }
                self.disposition_params = body.parameters();
            }
            constants::CONTENT_ID if self.content_id.is_none() => {
                self.content_id = non_empty(field.value());
            }
            constants::CONTENT_DESCRIPTION if self.content_description.is_none() => {
                self.content_description = non_empty(field.value());
            }
            constants::MIME_VERSION if self.mime_version.is_none() => {
                self.mime_version = non_empty(field.value());
            }
            constants::CONTENT_LANGUAGE => {
                self.content_language.extend(parser.parse_list(field.value())?);
            }
            _ => {}
        }

        Ok(())
    }

    fn set_content_type(&mut self, value: &str, parser: &FieldParser) -> crate::Result<()> {
        let body = parser.parse_body(value)?;
        let params = body.parameters();

        let mime_type = match body.value().split_once('/') {
            Some((media, sub)) => {
                let media = media.trim();
                let sub = sub.trim();
                if is_token(media) && is_token(sub) {
                    Some(format!("{}/{}", media, sub).to_ascii_lowercase())
                } else {
                    None
                }
            }
            None => None,
        };

        if let Some(charset) = params.get("charset").map(str::trim).filter(|c| !c.is_empty()) {
            self.charset = Some(charset.to_owned());
        }

        match mime_type {
            Some(mime_type) if mime_type.starts_with("multipart/") => {
                let boundary = params
                    .get_param("boundary")
                    .and_then(|param| param.value().map(|value| (value, param.is_quoted())))
                    .filter(|&(value, quoted)| is_valid_boundary(value, quoted));

                match boundary {
                    Some((boundary, _)) => {
                        self.boundary = Some(boundary.to_owned());
                        self.mime_type = Some(mime_type);
                    }
                    None => log::debug!("multipart type {:?} without a usable boundary", mime_type),
                }
            }
            Some(mime_type) => self.mime_type = Some(mime_type),
            None => log::debug!("ignoring invalid content type {:?}", value),
        }

        self.params = params;
        Ok(())
    }

    /// The lower-cased `type/subtype`, defaulted from the parent when absent.
    pub fn mime_type(&self) -> &str {
        match &self.mime_type {
            Some(mime_type) => mime_type,
            None => match &self.parent {
                Some(parent) if parent.mime_type() == constants::MULTIPART_DIGEST => constants::MESSAGE_RFC822,
                _ => constants::TEXT_PLAIN,
            },
        }
    }

    pub fn media_type(&self) -> &str {
        let mime_type = self.mime_type();
        mime_type.split('/').next().unwrap_or(mime_type)
    }

    pub fn sub_type(&self) -> &str {
        let mime_type = self.mime_type();
        mime_type.split_once('/').map(|(_, sub)| sub).unwrap_or("")
    }

    /// The effective media type as a [`mime::Mime`], parameters included.
    pub fn content_type(&self) -> Option<mime::Mime> {
        let mut repr = self.mime_type().to_owned();
        for param in self.params.iter() {
            if let Some(value) = param.value() {
                repr.push_str("; ");
                repr.push_str(&quote_param(param.name(), value));
            }
        }

        repr.parse::<mime::Mime>()
            .or_else(|_| self.mime_type().parse::<mime::Mime>())
            .ok()
    }

    /// The declared charset, or `us-ascii` for `text/*` bodies that declare none.
    pub fn charset(&self) -> Option<&str> {
        match &self.charset {
            Some(charset) => Some(charset),
            None if self.media_type() == "text" => Some(constants::US_ASCII),
            None => None,
        }
    }

    /// The lower-cased transfer encoding, `7bit` when none is declared.
    pub fn transfer_encoding(&self) -> &str {
        self.transfer_encoding
            .as_deref()
            .unwrap_or(constants::DEFAULT_TRANSFER_ENCODING)
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// `Content-Type` parameters after RFC 2231 processing.
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn disposition_type(&self) -> Option<&str> {
        self.disposition_type.as_deref()
    }

    pub fn disposition_parameters(&self) -> &Parameters {
        &self.disposition_params
    }

    /// The file name from `Content-Disposition`, or the `name` parameter of
    /// `Content-Type` as a fallback.
    pub fn filename(&self) -> Option<&str> {
        self.disposition_params
            .get("filename")
            .or_else(|| self.params.get("name"))
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn content_description(&self) -> Option<&str> {
        self.content_description.as_deref()
    }

    pub fn mime_version(&self) -> Option<&str> {
        self.mime_version.as_deref()
    }

    pub fn content_language(&self) -> &[String] {
        &self.content_language
    }

    pub fn parent(&self) -> Option<&BodyDescriptor> {
        self.parent.as_deref()
    }

    /// Multipart with a valid boundary.
    pub fn is_multipart(&self) -> bool {
        self.boundary.is_some() && self.media_type() == "multipart"
    }

    /// Whether the body is an encapsulated message the tokenizer can descend into.
    pub fn is_message(&self) -> bool {
        let mime_type = self.mime_type();
        mime_type == constants::MESSAGE_RFC822 || mime_type == constants::MESSAGE_GLOBAL
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(constants::is_token_char)
}

fn quote_param(name: &str, value: &str) -> String {
    if is_token(value) {
        format!("{}={}", name, value)
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{}=\"{}\"", name, escaped)
    }
}

/// RFC 2046 boundaries: bchars only, no trailing space, and spaces only when quoted.
pub(crate) fn is_valid_boundary(boundary: &str, quoted: bool) -> bool {
    let bytes = boundary.as_bytes();

    match bytes.last() {
        None | Some(&SP) => false,
        Some(_) => bytes.iter().all(|&b| constants::is_boundary_char(b)) && (quoted || !bytes.contains(&SP)),
    }
}
