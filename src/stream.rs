use crate::buffer::{CursorBuffer, SharedBuffer};
use crate::config::MimeConfig;
use crate::decoder::TransferDecoder;
use crate::descriptor::BodyDescriptor;
use crate::entity::{Machine, MimeEntity, ParseContext};
use crate::field::Field;
use crate::monitor::Monitor;
use crate::state::{EntityState, RecursionMode};
use std::io::{self, Read};
use std::marker::PhantomData;

/// A pull tokenizer for MIME messages.
///
/// Each call to [`next`](TokenStream::next) moves to the next structural
/// token. Header fields, body descriptors and content are available through
/// the accessors while the stream is positioned on the matching state.
///
/// # Examples
///
/// ```
/// use mime_tokens::{EntityState, TokenStream};
/// use std::io::Read;
///
/// # fn run() -> mime_tokens::Result<()> {
/// let message = "Subject: greetings\r\nContent-Type: text/plain\r\n\r\nhello";
///
/// let mut stream = TokenStream::new();
/// stream.parse(message.as_bytes())?;
///
/// loop {
///     match stream.next()? {
///         EntityState::Field => {
///             let field = stream.field().unwrap();
///             println!("{}: {}", field.name(), field.value());
///         }
///         EntityState::Body => {
///             let mut body = String::new();
///             stream.input_stream().unwrap().read_to_string(&mut body).unwrap();
///             assert_eq!(body, "hello");
///         }
///         EntityState::EndOfStream => break,
///         _ => {}
///     }
/// }
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
pub struct TokenStream {
    ctx: ParseContext,
    entities: Vec<Machine>,
    state: EntityState,
}

impl TokenStream {
    pub fn new() -> TokenStream {
        TokenStream::with_config(MimeConfig::default())
    }

    pub fn with_config(config: MimeConfig) -> TokenStream {
        TokenStream {
            ctx: ParseContext::new(config),
            entities: Vec::new(),
            state: EntityState::EndOfStream,
        }
    }

    /// Sets the monitor that receives every recoverable condition.
    pub fn with_monitor<M: Monitor + 'static>(mut self, monitor: M) -> TokenStream {
        self.ctx.monitor = Box::new(monitor);
        self
    }

    /// Sets the decoder used by [`decoded_input_stream`](TokenStream::decoded_input_stream)
    /// and for encoded `message/rfc822` bodies.
    pub fn with_decoder<D: TransferDecoder + 'static>(mut self, decoder: D) -> TokenStream {
        self.ctx.decoder = Box::new(decoder);
        self
    }

    pub fn config(&self) -> &MimeConfig {
        &self.ctx.config
    }

    /// Starts tokenizing `reader`, dropping whatever was being parsed before.
    ///
    /// When the configuration asks for headless parsing this is the same as
    /// [`parse_headless`](TokenStream::parse_headless).
    pub fn parse<R: Read + 'static>(&mut self, reader: R) -> crate::Result<()> {
        if let Some(content_type) = self.ctx.config.headless_content_type.clone() {
            return self.parse_headless(reader, &content_type);
        }

        let source = self.reset(reader);
        self.push(Machine::Entity(MimeEntity::message(source, None, 0)));
        Ok(())
    }

    /// Starts tokenizing `reader` as the body of an entity with the given
    /// content type. The first token is [`EntityState::EndHeader`].
    pub fn parse_headless<R: Read + 'static>(&mut self, reader: R, content_type: &str) -> crate::Result<()> {
        let source = self.reset(reader);
        let entity = MimeEntity::headless(source, content_type, &self.ctx.parser)?;
        self.push(Machine::Entity(entity));
        Ok(())
    }

    fn reset<R: Read + 'static>(&mut self, reader: R) -> SharedBuffer {
        self.entities.clear();
        self.ctx.stopped = false;
        CursorBuffer::new(Box::new(reader)).shared()
    }

    fn push(&mut self, machine: Machine) {
        if let Some(state) = machine.stage().visible() {
            self.state = state;
        }
        self.entities.push(machine);
    }

    /// Moves to the next token. Content of the current state that was not
    /// read is skipped. Once the input is exhausted every call returns
    /// [`EntityState::EndOfStream`].
    pub fn next(&mut self) -> crate::Result<EntityState> {
        while let Some(top) = self.entities.last_mut() {
            if let Some(child) = top.advance(&mut self.ctx)? {
                log::debug!("entering nested entity at depth {}", self.entities.len());
                self.entities.push(child);
            }

            let stage = match self.entities.last() {
                Some(machine) => machine.stage(),
                None => break,
            };

            match stage.visible() {
                Some(EntityState::EndOfStream) => {
                    self.entities.pop();
                    log::debug!("leaving nested entity, depth now {}", self.entities.len());
                }
                Some(state) => {
                    log::trace!("{}", state);
                    self.state = state;
                    return Ok(state);
                }
                None => {}
            }
        }

        self.state = EntityState::EndOfStream;
        Ok(self.state)
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    /// The current field, in [`EntityState::Field`].
    pub fn field(&self) -> Option<&Field> {
        self.entities.last().and_then(Machine::field)
    }

    /// The descriptor of the current entity. It is complete from
    /// [`EntityState::EndHeader`] on, and absent for raw entities.
    pub fn body_descriptor(&self) -> Option<&BodyDescriptor> {
        self.entities.last().and_then(Machine::descriptor)
    }

    /// The field in [`EntityState::Field`] or the descriptor in [`EntityState::Body`].
    pub fn field_or_body(&self) -> Option<FieldOrBody<'_>> {
        match self.state {
            EntityState::Field => self.field().map(FieldOrBody::Field),
            EntityState::Body => self.body_descriptor().map(FieldOrBody::Body),
            _ => None,
        }
    }

    /// The undecoded content of the current preamble, body, epilogue or raw entity.
    pub fn input_stream(&mut self) -> Option<ContentStream<'_>> {
        let content = self.entities.last().and_then(Machine::content)?;
        Some(ContentStream::new(content))
    }

    /// Like [`input_stream`](TokenStream::input_stream), with the transfer
    /// encoding of a body undone by the configured decoder.
    pub fn decoded_input_stream(&mut self) -> Option<ContentStream<'_>> {
        let top = self.entities.last()?;
        let content = top.content()?;

        let content = match (self.state, top.descriptor()) {
            (EntityState::Body, Some(descriptor)) => self.ctx.decode(descriptor.transfer_encoding(), content),
            _ => content,
        };

        Some(ContentStream::new(content))
    }

    /// Stops tokenizing. Buffered input is discarded and the remaining calls
    /// to [`next`](TokenStream::next) only close the open entities.
    pub fn stop(&mut self) {
        log::debug!("stopping at {}", self.state);
        self.ctx.stopped = true;
        for machine in &self.entities {
            machine.truncate();
        }
    }

    pub fn set_recursion_mode(&mut self, mode: RecursionMode) {
        self.ctx.recursion_mode = mode;
    }

    pub fn recursion_mode(&self) -> RecursionMode {
        self.ctx.recursion_mode
    }

    pub fn is_raw(&self) -> bool {
        self.ctx.recursion_mode == RecursionMode::Raw
    }
}

impl Default for TokenStream {
    fn default() -> Self {
        TokenStream::new()
    }
}

/// Either side of [`TokenStream::field_or_body`].
#[derive(Debug, Clone, Copy)]
pub enum FieldOrBody<'a> {
    Field(&'a Field),
    Body(&'a BodyDescriptor),
}

/// Content of the current token. It borrows the [`TokenStream`], so the
/// stream cannot move on while the content is being read.
pub struct ContentStream<'a> {
    inner: Box<dyn Read>,
    _stream: PhantomData<&'a mut TokenStream>,
}

impl<'a> ContentStream<'a> {
    fn new(inner: Box<dyn Read>) -> Self {
        ContentStream {
            inner,
            _stream: PhantomData,
        }
    }

    /// Reads the rest of the content into memory.
    pub fn into_vec(mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl<'a> Read for ContentStream<'a> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.inner.read(dst)
    }
}
