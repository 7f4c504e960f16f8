use crate::constants;
use std::io::Read;

/// Turns a transfer-encoded byte stream back into the original content.
///
/// The tokenizer only asks for decoding when the declared encoding is
/// `base64` or `quoted-printable`; every other encoding is passed through.
/// Functions and closures of the right shape are decoders too.
pub trait TransferDecoder {
    fn decode(&self, encoding: &str, input: Box<dyn Read>) -> Box<dyn Read>;
}

impl<F> TransferDecoder for F
where
    F: Fn(&str, Box<dyn Read>) -> Box<dyn Read>,
{
    fn decode(&self, encoding: &str, input: Box<dyn Read>) -> Box<dyn Read> {
        self(encoding, input)
    }
}

/// Hands the encoded bytes back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDecoder;

impl TransferDecoder for IdentityDecoder {
    fn decode(&self, _encoding: &str, input: Box<dyn Read>) -> Box<dyn Read> {
        input
    }
}

pub(crate) fn is_encoded(encoding: &str) -> bool {
    encoding.eq_ignore_ascii_case(constants::BASE64) || encoding.eq_ignore_ascii_case(constants::QUOTED_PRINTABLE)
}
