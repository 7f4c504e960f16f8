use base64::Engine as _;
use mime_tokens::EntityState as S;
use mime_tokens::{Condition, ConditionKind, Error, FieldOrBody, MimeConfig, RecursionMode, TokenStream};
use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

const SIMPLE: &str = "Subject: hello\r\nFrom: a@example.org\r\n\r\nHello, world!\r\n";

const MULTIPART: &str = "From: a@example.org\r\n\
                         Content-Type: multipart/mixed; boundary=\"==sep==\"\r\n\
                         \r\n\
                         This is the preamble.\r\n\
                         --==sep==\r\n\
                         Content-Type: text/plain\r\n\
                         \r\n\
                         first part\r\n\
                         --==sep==\r\n\
                         \r\n\
                         second part\r\n\
                         --==sep==--\r\n\
                         This is the epilogue.\r\n";

const NESTED: &str = "Content-Type: multipart/mixed; boundary=outer\r\n\
                      \r\n\
                      --outer\r\n\
                      Content-Type: message/rfc822\r\n\
                      \r\n\
                      Subject: inner\r\n\
                      \r\n\
                      inner body\r\n\
                      --outer--\r\n";

/// Hands out one byte per `read` call.
struct OneByteReader {
    data: Vec<u8>,
    pos: usize,
}

impl Read for OneByteReader {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() || dst.is_empty() {
            return Ok(0);
        }
        dst[0] = self.data[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

fn one_byte(data: &str) -> OneByteReader {
    OneByteReader {
        data: data.as_bytes().to_vec(),
        pos: 0,
    }
}

fn collect(stream: &mut TokenStream) -> Vec<S> {
    let mut states = vec![stream.state()];
    loop {
        let state = stream.next().unwrap();
        if state == S::EndOfStream {
            return states;
        }
        states.push(state);
    }
}

fn tokenize(data: &str, mode: RecursionMode) -> Vec<S> {
    let mut stream = TokenStream::new();
    stream.set_recursion_mode(mode);
    stream.parse(one_byte(data)).unwrap();
    collect(&mut stream)
}

fn contents(data: &str, mode: RecursionMode) -> Vec<(S, String)> {
    let mut stream = TokenStream::new();
    stream.set_recursion_mode(mode);
    stream.parse(one_byte(data)).unwrap();

    let mut out = Vec::new();
    loop {
        let state = stream.next().unwrap();
        if state == S::EndOfStream {
            return out;
        }
        if let Some(mut content) = stream.input_stream() {
            let mut text = String::new();
            content.read_to_string(&mut text).unwrap();
            out.push((state, text));
        }
    }
}

fn recording(config: MimeConfig) -> (TokenStream, Rc<RefCell<Vec<Condition>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let stream = TokenStream::with_config(config)
        .with_monitor(move |condition: &Condition| sink.borrow_mut().push(condition.clone()));
    (stream, seen)
}

fn next_error(stream: &mut TokenStream) -> Error {
    loop {
        match stream.next() {
            Ok(S::EndOfStream) => panic!("expected an error"),
            Ok(_) => continue,
            Err(err) => return err,
        }
    }
}

fn base64_decoder(_encoding: &str, mut input: Box<dyn Read>) -> Box<dyn Read> {
    let mut encoded = Vec::new();
    input.read_to_end(&mut encoded).unwrap();
    encoded.retain(|b| !b.is_ascii_whitespace());
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
    Box::new(io::Cursor::new(decoded))
}

#[test]
fn test_simple_message() {
    assert_eq!(
        tokenize(SIMPLE, RecursionMode::Recurse),
        vec![S::StartMessage, S::StartHeader, S::Field, S::Field, S::EndHeader, S::Body, S::EndMessage]
    );
    assert_eq!(
        contents(SIMPLE, RecursionMode::Recurse),
        vec![(S::Body, "Hello, world!\r\n".to_owned())]
    );
}

#[test]
fn test_multipart_tokens() {
    assert_eq!(
        tokenize(MULTIPART, RecursionMode::Recurse),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::StartBodyPart,
            S::StartHeader,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );
}

#[test]
fn test_multipart_contents() {
    assert_eq!(
        contents(MULTIPART, RecursionMode::Recurse),
        vec![
            (S::Preamble, "This is the preamble.".to_owned()),
            (S::Body, "first part".to_owned()),
            (S::Body, "second part".to_owned()),
            (S::Epilogue, "This is the epilogue.\r\n".to_owned()),
        ]
    );
}

#[test]
fn test_empty_preamble_and_epilogue_are_emitted() {
    let data = "Content-Type: multipart/mixed; boundary=b\r\n\r\n--b\r\n\r\nonly\r\n--b--";
    assert_eq!(
        contents(data, RecursionMode::Recurse),
        vec![
            (S::Preamble, String::new()),
            (S::Body, "only".to_owned()),
            (S::Epilogue, String::new()),
        ]
    );
}

#[test]
fn test_unread_content_is_skipped() {
    let mut stream = TokenStream::new();
    stream.parse(one_byte(MULTIPART)).unwrap();

    let mut bodies = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::Body if bodies.is_empty() => {
                let mut partial = [0u8; 3];
                stream.input_stream().unwrap().read_exact(&mut partial).unwrap();
                bodies.push(String::from_utf8(partial.to_vec()).unwrap());
            }
            S::Body => {
                let content = stream.input_stream().unwrap().into_vec().unwrap();
                bodies.push(String::from_utf8(content).unwrap());
            }
            S::EndOfStream => break,
            _ => {}
        }
    }

    assert_eq!(bodies, vec!["fir".to_owned(), "second part".to_owned()]);
}

#[test]
fn test_nested_message_recursion_modes() {
    assert_eq!(
        tokenize(NESTED, RecursionMode::Recurse),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndMessage,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );

    assert_eq!(
        tokenize(NESTED, RecursionMode::NoRecurse),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );

    assert_eq!(
        tokenize(NESTED, RecursionMode::Flat),
        vec![S::StartMessage, S::StartHeader, S::Field, S::EndHeader, S::Body, S::EndMessage]
    );

    assert_eq!(
        tokenize(NESTED, RecursionMode::Raw),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::RawEntity,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );
}

#[test]
fn test_nested_message_contents() {
    assert_eq!(
        contents(NESTED, RecursionMode::NoRecurse)[1],
        (S::Body, "Subject: inner\r\n\r\ninner body".to_owned())
    );

    assert_eq!(
        contents(NESTED, RecursionMode::Raw)[1],
        (
            S::RawEntity,
            "Content-Type: message/rfc822\r\n\r\nSubject: inner\r\n\r\ninner body".to_owned()
        )
    );

    let flat = contents(NESTED, RecursionMode::Flat);
    assert_eq!(flat.len(), 1);
    assert!(flat[0].1.starts_with("--outer\r\n"));
    assert!(flat[0].1.ends_with("--outer--\r\n"));
}

#[test]
fn test_raw_entity_has_no_descriptor() {
    let mut stream = TokenStream::new();
    stream.set_recursion_mode(RecursionMode::Raw);
    assert!(stream.is_raw());
    stream.parse(one_byte(NESTED)).unwrap();

    while stream.next().unwrap() != S::RawEntity {}
    assert!(stream.body_descriptor().is_none());
    assert!(stream.field().is_none());
}

#[test]
fn test_root_encapsulated_message() {
    let data = "Content-Type: message/rfc822\r\n\r\nSubject: inner\r\n\r\ninner body";

    assert_eq!(
        tokenize(data, RecursionMode::Recurse),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndMessage,
            S::EndMessage,
        ]
    );

    assert_eq!(
        tokenize(data, RecursionMode::Raw),
        vec![S::StartMessage, S::StartHeader, S::Field, S::EndHeader, S::RawEntity, S::EndMessage]
    );
    assert_eq!(
        contents(data, RecursionMode::Raw),
        vec![(S::RawEntity, "Subject: inner\r\n\r\ninner body".to_owned())]
    );

    let global = data.replace("message/rfc822", "message/global");
    assert_eq!(tokenize(&global, RecursionMode::Recurse).len(), 11);
}

#[test]
fn test_digest_parts_are_messages() {
    let data = "Content-Type: multipart/digest; boundary=d\r\n\
                \r\n\
                --d\r\n\
                \r\n\
                Subject: first\r\n\
                \r\n\
                one\r\n\
                --d\r\n\
                Content-Type: text/plain\r\n\
                \r\n\
                two\r\n\
                --d--\r\n";

    assert_eq!(
        tokenize(data, RecursionMode::Recurse),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::EndHeader,
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndMessage,
            S::EndBodyPart,
            S::StartBodyPart,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );
}

#[test]
fn test_premature_boundary_is_reported() {
    let data = "Content-Type: multipart/mixed; boundary=sep\r\n\r\n--sep\r\n\r\nunterminated part";

    let (mut stream, seen) = recording(MimeConfig::default());
    stream.parse(one_byte(data)).unwrap();
    assert_eq!(
        collect(&mut stream),
        vec![
            S::StartMessage,
            S::StartHeader,
            S::Field,
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), ConditionKind::MimeBodyPrematureEnd);
    assert_eq!(seen[0].line(), 5);

    let mut stream = TokenStream::with_config(MimeConfig::new().strict_parsing(true));
    stream.parse(one_byte(data)).unwrap();
    assert_eq!(next_error(&mut stream), Error::MimeBodyPrematureEnd { line: 5 });
}

#[test]
fn test_headers_premature_end() {
    let (mut stream, seen) = recording(MimeConfig::default());
    stream.parse(one_byte("Subject: no blank line")).unwrap();
    assert_eq!(
        collect(&mut stream),
        vec![S::StartMessage, S::StartHeader, S::Field, S::EndHeader, S::Body, S::EndMessage]
    );

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), ConditionKind::HeadersPrematureEnd);
    assert_eq!(seen[0].line(), 1);
}

#[test]
fn test_invalid_header_field() {
    let data = "Subject: ok\r\nthis is not a header\r\nFrom: x\r\n\r\nbody";

    let (mut stream, seen) = recording(MimeConfig::default());
    stream.parse(one_byte(data)).unwrap();

    let mut names = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::Field => names.push(stream.field().unwrap().name().to_owned()),
            S::EndOfStream => break,
            _ => {}
        }
    }
    assert_eq!(names, vec!["Subject".to_owned(), "From".to_owned()]);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), ConditionKind::InvalidHeaderField);
    assert_eq!(seen[0].line(), 2);
    assert_eq!(seen[0].raw(), Some("this is not a header\r\n"));

    let mut stream = TokenStream::with_config(MimeConfig::new().strict_parsing(true));
    stream.parse(one_byte(data)).unwrap();
    assert_eq!(
        next_error(&mut stream),
        Error::InvalidHeaderField {
            line: 2,
            raw: "this is not a header\r\n".to_owned()
        }
    );
}

#[test]
fn test_malformed_header_starts_body() {
    let data = "Subject: ok\r\nthis is not a header\r\n\r\nbody";
    let mut stream = TokenStream::with_config(MimeConfig::new().malformed_header_starts_body(true));
    stream.parse(one_byte(data)).unwrap();

    loop {
        match stream.next().unwrap() {
            S::Body => break,
            S::EndOfStream => panic!("no body"),
            _ => {}
        }
    }

    let body = stream.input_stream().unwrap().into_vec().unwrap();
    assert_eq!(body, b"this is not a header\r\n\r\nbody");
}

#[test]
fn test_stop_unwinds() {
    let (mut stream, seen) = recording(MimeConfig::new().strict_parsing(true));
    stream.parse(one_byte(MULTIPART)).unwrap();

    while stream.next().unwrap() != S::StartBodyPart {}
    assert_eq!(stream.next().unwrap(), S::StartHeader);

    stream.stop();
    let mut rest = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::EndOfStream => break,
            state => rest.push(state),
        }
    }

    assert_eq!(rest, vec![S::EndHeader, S::EndBodyPart, S::EndMultipart, S::EndMessage]);
    assert!(seen.borrow().is_empty());
    assert_eq!(stream.next().unwrap(), S::EndOfStream);
}

#[test]
fn test_end_of_stream_repeats() {
    let mut stream = TokenStream::new();
    assert_eq!(stream.next().unwrap(), S::EndOfStream);

    stream.parse(one_byte(SIMPLE)).unwrap();
    collect(&mut stream);
    assert_eq!(stream.next().unwrap(), S::EndOfStream);
    assert_eq!(stream.state(), S::EndOfStream);
}

#[test]
fn test_parse_resets_the_stream() {
    let mut stream = TokenStream::new();
    stream.parse(one_byte(MULTIPART)).unwrap();
    for _ in 0..8 {
        stream.next().unwrap();
    }

    stream.parse(one_byte(SIMPLE)).unwrap();
    assert_eq!(
        collect(&mut stream),
        vec![S::StartMessage, S::StartHeader, S::Field, S::Field, S::EndHeader, S::Body, S::EndMessage]
    );
}

#[test]
fn test_charset_defaults() {
    let data = "Content-Type: multipart/mixed; boundary=b\r\n\r\n\
                --b\r\n\r\nplain\r\n\
                --b\r\nContent-Type: text/html\r\n\r\nhtml\r\n\
                --b\r\nContent-Type: image/png\r\n\r\npng\r\n\
                --b\r\nContent-Type: text/plain; charset=ISO-8859-1\r\n\r\nlatin\r\n\
                --b--\r\n";

    let mut stream = TokenStream::new();
    stream.parse(one_byte(data)).unwrap();

    let mut charsets = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::Body => {
                let descriptor = stream.body_descriptor().unwrap();
                charsets.push((descriptor.mime_type().to_owned(), descriptor.charset().map(str::to_owned)));
            }
            S::EndOfStream => break,
            _ => {}
        }
    }

    assert_eq!(
        charsets,
        vec![
            ("text/plain".to_owned(), Some("us-ascii".to_owned())),
            ("text/html".to_owned(), Some("us-ascii".to_owned())),
            ("image/png".to_owned(), None),
            ("text/plain".to_owned(), Some("ISO-8859-1".to_owned())),
        ]
    );
}

#[test]
fn test_rfc2231_filenames() {
    let data = "Content-Type: multipart/mixed; boundary=b\r\n\r\n\
                --b\r\nContent-Disposition: attachment; filename*=\"foo\"; filename=\"bar2.rtf\"; filename*=\"bar3.rtf\"\r\n\r\n1\r\n\
                --b\r\nContent-Disposition: attachment; filename*=\"foo\"; filename*=\"bar2.rtf\"; filename=\"bar3.rtf\"\r\n\r\n2\r\n\
                --b\r\nContent-Disposition: attachment; filename*0=\"foo\"; filename*1=\"bar3.rtf\"\r\n\r\n3\r\n\
                --b\r\nContent-Type: application/octet-stream; name*=iso-8859-1'de'Gr%FC%DFe.txt\r\n\r\n4\r\n\
                --b\r\nContent-Disposition: attachment; name*+0=filename\r\n\r\n5\r\n\
                --b--\r\n";

    let mut stream = TokenStream::new();
    stream.parse(one_byte(data)).unwrap();

    let mut filenames = Vec::new();
    let mut literal = None;
    loop {
        match stream.next().unwrap() {
            S::Body => {
                let descriptor = stream.body_descriptor().unwrap();
                filenames.push(descriptor.filename().map(str::to_owned));
                if let Some(param) = descriptor.disposition_parameters().get_param("name*+0") {
                    literal = Some(param.to_string());
                }
            }
            S::EndOfStream => break,
            _ => {}
        }
    }

    assert_eq!(
        filenames,
        vec![
            Some("foobar3.rtf".to_owned()),
            Some("foobar2.rtf".to_owned()),
            Some("foobar3.rtf".to_owned()),
            Some("Gr\u{fc}\u{df}e.txt".to_owned()),
            None,
        ]
    );
    assert_eq!(literal, Some("name*+0=filename".to_owned()));
}

#[test]
fn test_transfer_decoding() {
    let data = "Content-Type: multipart/mixed; boundary=b\r\n\r\n\
                --b\r\nContent-Transfer-Encoding: base64\r\n\r\naGVsbG8gd29ybGQ=\r\n\
                --b\r\nContent-Type: message/rfc822\r\nContent-Transfer-Encoding: BASE64\r\n\r\n\
                U3ViamVjdDogaW5uZXINCkNvbnRlbnQtVHlwZTogdGV4dC9wbGFpbg0KDQppbm5lciBib2R5\r\n\
                --b--\r\n";

    let mut stream = TokenStream::new().with_decoder(base64_decoder);
    stream.parse(one_byte(data)).unwrap();

    let mut bodies = Vec::new();
    let mut subjects = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::Field => {
                let field = stream.field().unwrap();
                if field.is("subject") {
                    subjects.push(field.value().to_owned());
                }
            }
            S::Body => {
                let body = stream.decoded_input_stream().unwrap().into_vec().unwrap();
                bodies.push(String::from_utf8(body).unwrap());
            }
            S::EndOfStream => break,
            _ => {}
        }
    }

    assert_eq!(bodies, vec!["hello world".to_owned(), "inner body".to_owned()]);
    assert_eq!(subjects, vec!["inner".to_owned()]);

    let mut stream = TokenStream::new();
    stream.parse(one_byte(data)).unwrap();
    while stream.next().unwrap() != S::Body {}
    assert_eq!(stream.body_descriptor().unwrap().transfer_encoding(), "base64");
    let raw = stream.decoded_input_stream().unwrap().into_vec().unwrap();
    assert_eq!(raw, b"aGVsbG8gd29ybGQ=");
}

#[test]
fn test_headless_parsing() {
    let data = "--sep\r\n\r\nbody\r\n--sep--";

    let mut stream = TokenStream::new();
    stream.parse_headless(one_byte(data), "multipart/mixed; boundary=sep").unwrap();
    assert_eq!(
        collect(&mut stream),
        vec![
            S::EndHeader,
            S::StartMultipart,
            S::Preamble,
            S::StartBodyPart,
            S::StartHeader,
            S::EndHeader,
            S::Body,
            S::EndBodyPart,
            S::Epilogue,
            S::EndMultipart,
            S::EndMessage,
        ]
    );

    let mut stream = TokenStream::with_config(MimeConfig::new().headless_parsing("text/plain; charset=utf-8"));
    stream.parse(one_byte("just a body")).unwrap();
    assert_eq!(stream.state(), S::EndHeader);
    assert_eq!(stream.next().unwrap(), S::Body);
    assert_eq!(stream.body_descriptor().unwrap().charset(), Some("utf-8"));
    assert_eq!(stream.input_stream().unwrap().into_vec().unwrap(), b"just a body");
    assert_eq!(stream.next().unwrap(), S::EndMessage);
}

#[test]
fn test_field_line_numbers() {
    let mut stream = TokenStream::new();
    stream.parse(one_byte(MULTIPART)).unwrap();

    let mut lines = Vec::new();
    loop {
        match stream.next().unwrap() {
            S::Field => {
                let field = stream.field().unwrap();
                lines.push((field.name().to_owned(), field.line()));
            }
            S::EndOfStream => break,
            _ => {}
        }
    }
    assert_eq!(
        lines,
        vec![
            ("From".to_owned(), 1),
            ("Content-Type".to_owned(), 2),
            ("Content-Type".to_owned(), 6),
        ]
    );

    let mut stream = TokenStream::new();
    stream.parse(one_byte(NESTED)).unwrap();
    let mut inner = None;
    loop {
        match stream.next().unwrap() {
            S::Field if stream.field().unwrap().is("subject") => inner = stream.field().map(|f| f.line()),
            S::EndOfStream => break,
            _ => {}
        }
    }
    assert_eq!(inner, Some(6));
}

#[test]
fn test_field_or_body() {
    let mut stream = TokenStream::new();
    stream.parse(one_byte(SIMPLE)).unwrap();
    assert!(stream.field_or_body().is_none());

    stream.next().unwrap();
    stream.next().unwrap();
    match stream.field_or_body() {
        Some(FieldOrBody::Field(field)) => assert_eq!(field.value(), "hello"),
        other => panic!("unexpected: {:?}", other),
    }

    while stream.next().unwrap() != S::Body {}
    match stream.field_or_body() {
        Some(FieldOrBody::Body(descriptor)) => assert_eq!(descriptor.mime_type(), "text/plain"),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_line_length_limit() {
    let mut stream = TokenStream::with_config(MimeConfig::new().max_line_len(10));
    stream.parse(one_byte("Subject: this line is too long\r\n\r\n")).unwrap();
    assert_eq!(next_error(&mut stream), Error::MaxLineLengthExceeded { limit: 10 });
}
