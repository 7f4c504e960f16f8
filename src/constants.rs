pub(crate) const DEFAULT_BUFFER_SIZE: usize = 4096;
pub(crate) const MIN_READ_SIZE: usize = 1024;

pub(crate) const DEFAULT_MAX_LINE_LEN: usize = 1000;
pub(crate) const DEFAULT_MAX_HEADER_COUNT: usize = 1000;
pub(crate) const DEFAULT_MAX_HEADER_LEN: usize = 10000;

pub(crate) const BOUNDARY_EXT: &str = "--";
pub(crate) const CR: u8 = b'\r';
pub(crate) const LF: u8 = b'\n';
pub(crate) const SP: u8 = b' ';
pub(crate) const HT: u8 = b'\t';

pub(crate) const CONTENT_TYPE: &str = "content-type";
pub(crate) const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
pub(crate) const CONTENT_LENGTH: &str = "content-length";
pub(crate) const CONTENT_DISPOSITION: &str = "content-disposition";
pub(crate) const CONTENT_LANGUAGE: &str = "content-language";
pub(crate) const CONTENT_ID: &str = "content-id";
pub(crate) const CONTENT_DESCRIPTION: &str = "content-description";
pub(crate) const MIME_VERSION: &str = "mime-version";

pub(crate) const TEXT_PLAIN: &str = "text/plain";
pub(crate) const MESSAGE_RFC822: &str = "message/rfc822";
pub(crate) const MESSAGE_GLOBAL: &str = "message/global";
pub(crate) const MULTIPART_DIGEST: &str = "multipart/digest";
pub(crate) const US_ASCII: &str = "us-ascii";
pub(crate) const DEFAULT_TRANSFER_ENCODING: &str = "7bit";
pub(crate) const BASE64: &str = "base64";
pub(crate) const QUOTED_PRINTABLE: &str = "quoted-printable";

/// Checks whether a byte may appear in a header field name (printable ASCII except `:`).
#[inline]
pub(crate) fn is_field_name_char(b: u8) -> bool {
    matches!(b, 33..=57 | 59..=126)
}

/// Checks whether a byte is an RFC 2045 token character.
#[inline]
pub(crate) fn is_token_char(b: u8) -> bool {
    matches!(b,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~'
    )
}

/// Checks whether a byte may appear in a multipart boundary (RFC 2046 `bchars`).
#[inline]
pub(crate) fn is_boundary_char(b: u8) -> bool {
    matches!(b,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?' | b' '
    )
}

#[inline]
pub(crate) fn is_wsp(b: u8) -> bool {
    b == SP || b == HT
}
