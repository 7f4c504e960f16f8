#![no_main]

use std::io::{self, Cursor};

use libfuzzer_sys::fuzz_target;
use mime_tokens::{EntityState, MimeConfig, RecursionMode, TokenStream};

const MODES: [RecursionMode; 4] = [
    RecursionMode::Recurse,
    RecursionMode::NoRecurse,
    RecursionMode::Flat,
    RecursionMode::Raw,
];

fuzz_target!(|data: &[u8]| {
    for mode in MODES.iter() {
        let mut stream = TokenStream::with_config(MimeConfig::new().malformed_header_starts_body(data.len() % 2 == 0));
        stream.set_recursion_mode(*mode);
        if stream.parse(Cursor::new(data.to_vec())).is_err() {
            continue;
        }

        loop {
            match stream.next() {
                Err(_) | Ok(EntityState::EndOfStream) => break,
                Ok(_) => {
                    if let Some(mut content) = stream.input_stream() {
                        let _ = io::copy(&mut content, &mut io::sink());
                    }
                }
            }
        }
    }
});
