//! A streaming, pull-based MIME tokenizer.
//!
//! [`TokenStream`] reads an RFC 822/2045 message from any blocking
//! [`Read`](std::io::Read) source and reports its structure one token at a
//! time: headers and their fields, multipart preambles, body parts and
//! epilogues, nested `message/rfc822` entities and leaf bodies. Nothing is
//! buffered beyond what is needed to find the next token, so arbitrarily
//! large messages can be processed in constant memory.
//!
//! Malformed input is tolerated by default. Structural problems are handed
//! to a [`Monitor`] and parsing carries on; with
//! [`MimeConfig::strict_parsing`] they become errors instead.
//!
//! # Examples
//!
//! ```
//! use mime_tokens::{EntityState, TokenStream};
//! use std::io::Read;
//!
//! # fn run() -> mime_tokens::Result<()> {
//! let message = "Content-Type: multipart/mixed; boundary=sep\r\n\
//!                \r\n\
//!                --sep\r\n\
//!                Content-Type: text/plain\r\n\
//!                \r\n\
//!                first\r\n\
//!                --sep\r\n\
//!                Content-Disposition: attachment; filename*=UTF-8''na%C3%AFve.txt\r\n\
//!                \r\n\
//!                second\r\n\
//!                --sep--\r\n";
//!
//! let mut stream = TokenStream::new();
//! stream.parse(message.as_bytes())?;
//!
//! let mut bodies = Vec::new();
//! loop {
//!     match stream.next()? {
//!         EntityState::Body => {
//!             let filename = stream.body_descriptor().and_then(|d| d.filename()).map(str::to_owned);
//!             let mut body = String::new();
//!             stream.input_stream().unwrap().read_to_string(&mut body).unwrap();
//!             bodies.push((filename, body));
//!         }
//!         EntityState::EndOfStream => break,
//!         _ => {}
//!     }
//! }
//!
//! assert_eq!(bodies[0], (None, "first".to_owned()));
//! assert_eq!(bodies[1], (Some("na\u{ef}ve.txt".to_owned()), "second".to_owned()));
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```
//!
//! ## Recursion modes
//!
//! [`RecursionMode`] controls how deep the tokenizer goes. The default
//! descends into multiparts and encapsulated messages; it can be told to
//! stop at encapsulated messages, to treat every body as opaque, or to hand
//! out each body part undivided as an [`EntityState::RawEntity`].

pub use config::MimeConfig;
pub use decoder::{IdentityDecoder, TransferDecoder};
pub use descriptor::BodyDescriptor;
pub use error::Error;
pub use field::Field;
pub use monitor::{Condition, ConditionKind, LogMonitor, Monitor, NullMonitor};
pub use params::{FieldParser, Parameter, Parameters, RawBody};
pub use state::{EntityState, RecursionMode};
pub use stream::{ContentStream, FieldOrBody, TokenStream};

mod boundary;
mod buffer;
mod config;
mod constants;
mod decoder;
mod descriptor;
mod entity;
mod error;
mod field;
mod monitor;
mod params;
mod state;
mod stream;

/// A Result type often returned from methods that can have `mime-tokens` errors.
pub type Result<T> = std::result::Result<T, Error>;
