use crate::boundary::BoundaryStream;
use crate::buffer::{CursorBuffer, SharedBuffer, SharedReader};
use crate::config::MimeConfig;
use crate::constants::{self, LF};
use crate::decoder::{self, IdentityDecoder, TransferDecoder};
use crate::descriptor::BodyDescriptor;
use crate::field::{self, Field};
use crate::monitor::{Condition, ConditionKind, Monitor, NullMonitor};
use crate::params::FieldParser;
use crate::state::{EntityState, RecursionMode, Stage};
use crate::Error;
use bytes::Bytes;
use std::cell::RefCell;
use std::io::{self, Read};
use std::mem;
use std::rc::Rc;

/// Everything the entity machines share while one input is tokenized.
pub(crate) struct ParseContext {
    pub(crate) config: MimeConfig,
    pub(crate) parser: FieldParser,
    pub(crate) monitor: Box<dyn Monitor>,
    pub(crate) decoder: Box<dyn TransferDecoder>,
    pub(crate) recursion_mode: RecursionMode,
    pub(crate) stopped: bool,
}

impl ParseContext {
    pub(crate) fn new(config: MimeConfig) -> ParseContext {
        ParseContext {
            parser: FieldParser::new(config.strict_parsing),
            config,
            monitor: Box::new(NullMonitor),
            decoder: Box::new(IdentityDecoder),
            recursion_mode: RecursionMode::default(),
            stopped: false,
        }
    }

    /// Hands a condition to the monitor. In strict mode the condition comes
    /// back as an error. Nothing is reported once parsing was stopped.
    pub(crate) fn report(&mut self, condition: Condition) -> crate::Result<()> {
        if self.stopped {
            return Ok(());
        }

        log::debug!("{}", condition);
        self.monitor.warn(&condition);

        if self.config.strict_parsing {
            return Err(condition.into_error());
        }
        Ok(())
    }

    pub(crate) fn decode(&self, encoding: &str, input: Box<dyn Read>) -> Box<dyn Read> {
        if decoder::is_encoded(encoding) {
            self.decoder.decode(encoding, input)
        } else {
            input
        }
    }
}

/// One level of the entity stack.
pub(crate) enum Machine {
    Entity(MimeEntity),
    Raw(RawEntity),
}

impl Machine {
    pub(crate) fn stage(&self) -> Stage {
        match self {
            Machine::Entity(entity) => entity.stage,
            Machine::Raw(raw) => raw.stage,
        }
    }

    /// Moves to the next stage. A returned machine is a nested entity that
    /// has to be tokenized before this one continues.
    pub(crate) fn advance(&mut self, ctx: &mut ParseContext) -> crate::Result<Option<Machine>> {
        match self {
            Machine::Entity(entity) => entity.advance(ctx),
            Machine::Raw(raw) => {
                raw.stage = EntityState::EndOfStream.into();
                Ok(None)
            }
        }
    }

    pub(crate) fn field(&self) -> Option<&Field> {
        match self {
            Machine::Entity(entity) if entity.stage == EntityState::Field.into() => entity.field.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn descriptor(&self) -> Option<&BodyDescriptor> {
        match self {
            Machine::Entity(entity) => Some(&entity.descriptor),
            Machine::Raw(_) => None,
        }
    }

    /// A reader over the content of the current stage, sharing its position
    /// with the machine.
    pub(crate) fn content(&self) -> Option<Box<dyn Read>> {
        match self {
            Machine::Entity(entity) => entity.content(),
            Machine::Raw(raw) if raw.stage == EntityState::RawEntity.into() => {
                Some(Box::new(SharedReader(raw.source.clone())))
            }
            Machine::Raw(_) => None,
        }
    }

    /// Makes every buffered byte of this level unreachable.
    pub(crate) fn truncate(&self) {
        if let Machine::Entity(entity) = self {
            entity.source.borrow_mut().truncate();
        }
    }
}

/// An entity handed out undivided: headers and content in one stream.
pub(crate) struct RawEntity {
    stage: Stage,
    source: Rc<RefCell<Box<dyn Read>>>,
}

impl RawEntity {
    fn new(source: Box<dyn Read>) -> RawEntity {
        RawEntity {
            stage: EntityState::RawEntity.into(),
            source: Rc::new(RefCell::new(source)),
        }
    }
}

/// The state machine for one message or body part.
pub(crate) struct MimeEntity {
    stage: Stage,
    end_state: EntityState,
    source: SharedBuffer,
    line_offset: usize,
    descriptor: Rc<BodyDescriptor>,
    field: Option<Field>,
    header_count: usize,
    end_of_header: bool,
    pending: Vec<u8>,
    pending_line: usize,
    raw_field: Vec<u8>,
    boundary: Option<String>,
    part: Option<Rc<RefCell<BoundaryStream>>>,
}

impl MimeEntity {
    fn new(
        start: EntityState,
        end_state: EntityState,
        source: SharedBuffer,
        descriptor: BodyDescriptor,
        line_offset: usize,
    ) -> MimeEntity {
        MimeEntity {
            stage: start.into(),
            end_state,
            source,
            line_offset,
            descriptor: Rc::new(descriptor),
            field: None,
            header_count: 0,
            end_of_header: false,
            pending: Vec::new(),
            pending_line: 0,
            raw_field: Vec::new(),
            boundary: None,
            part: None,
        }
    }

    pub(crate) fn message(source: SharedBuffer, parent: Option<Rc<BodyDescriptor>>, line_offset: usize) -> MimeEntity {
        let descriptor = match parent {
            Some(parent) => BodyDescriptor::with_parent(parent),
            None => BodyDescriptor::new(),
        };

        MimeEntity::new(
            EntityState::StartMessage,
            EntityState::EndMessage,
            source,
            descriptor,
            line_offset,
        )
    }

    pub(crate) fn body_part(source: SharedBuffer, parent: Rc<BodyDescriptor>, line_offset: usize) -> MimeEntity {
        MimeEntity::new(
            EntityState::StartBodyPart,
            EntityState::EndBodyPart,
            source,
            BodyDescriptor::with_parent(parent),
            line_offset,
        )
    }

    /// A message whose header section is replaced by a single content type.
    pub(crate) fn headless(source: SharedBuffer, content_type: &str, parser: &FieldParser) -> crate::Result<MimeEntity> {
        let mut descriptor = BodyDescriptor::new();
        descriptor.add_field(&Field::new("Content-Type", content_type), parser)?;

        let mut entity = MimeEntity::new(
            EntityState::StartMessage,
            EntityState::EndMessage,
            source,
            descriptor,
            0,
        );
        entity.stage = EntityState::EndHeader.into();
        entity.end_of_header = true;

        Ok(entity)
    }

    fn advance(&mut self, ctx: &mut ParseContext) -> crate::Result<Option<Machine>> {
        if ctx.stopped {
            self.unwind();
            return Ok(None);
        }

        let state = match self.stage {
            Stage::Visible(state) => state,
            Stage::InBodyPart => return self.next_part(ctx),
            Stage::InMessage => {
                self.stage = self.end_state.into();
                return Ok(None);
            }
        };

        match state {
            EntityState::StartMessage | EntityState::StartBodyPart => {
                self.stage = EntityState::StartHeader.into();
            }
            EntityState::StartHeader | EntityState::Field => {
                self.stage = if self.next_field(ctx)? {
                    EntityState::Field.into()
                } else {
                    EntityState::EndHeader.into()
                };
            }
            EntityState::EndHeader => return Ok(self.enter_body(ctx)),
            EntityState::StartMultipart => self.start_multipart(),
            EntityState::Preamble => return self.next_part(ctx),
            EntityState::Epilogue => self.stage = EntityState::EndMultipart.into(),
            EntityState::Body | EntityState::EndMultipart => self.stage = self.end_state.into(),
            EntityState::EndMessage | EntityState::EndBodyPart => {
                self.stage = EntityState::EndOfStream.into();
            }
            EntityState::RawEntity | EntityState::EndOfStream => {}
        }

        Ok(None)
    }

    /// Moves straight to the next closing state.
    fn unwind(&mut self) {
        self.stage = match self.stage {
            Stage::Visible(EntityState::StartHeader) | Stage::Visible(EntityState::Field) => {
                EntityState::EndHeader.into()
            }
            Stage::Visible(EntityState::StartMultipart)
            | Stage::Visible(EntityState::Preamble)
            | Stage::Visible(EntityState::Epilogue)
            | Stage::InBodyPart => EntityState::EndMultipart.into(),
            Stage::Visible(EntityState::EndMessage)
            | Stage::Visible(EntityState::EndBodyPart)
            | Stage::Visible(EntityState::EndOfStream) => EntityState::EndOfStream.into(),
            _ => self.end_state.into(),
        };
        self.part = None;
    }

    fn current_line(&self) -> usize {
        self.line_offset + self.source.borrow().lines() + 1
    }

    fn next_field(&mut self, ctx: &mut ParseContext) -> crate::Result<bool> {
        loop {
            if self.end_of_header {
                return Ok(false);
            }

            let line = self.read_raw_field(ctx)?;
            if self.raw_field.is_empty() {
                continue;
            }

            match Field::parse(Bytes::copy_from_slice(&self.raw_field), line) {
                Ok(field) => {
                    if self.header_count >= ctx.config.max_header_count {
                        return Err(Error::MaxHeaderCountExceeded {
                            limit: ctx.config.max_header_count,
                        });
                    }
                    self.header_count += 1;

                    Rc::make_mut(&mut self.descriptor).add_field(&field, &ctx.parser)?;
                    self.field = Some(field);
                    return Ok(true);
                }
                Err(_) => {
                    let condition = Condition::new(ConditionKind::InvalidHeaderField, line)
                        .with_raw(field::decode_header_bytes(&self.raw_field));
                    ctx.report(condition)?;

                    if ctx.config.malformed_header_starts_body {
                        self.replay_raw_field();
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Puts the rejected field and the line read after it back in front of
    /// the remaining input, which becomes the body.
    fn replay_raw_field(&mut self) {
        let mut replay = mem::take(&mut self.raw_field);
        replay.append(&mut self.pending);

        let replayed_lines = memchr::memchr_iter(LF, &replay).count();
        self.line_offset = (self.line_offset + self.source.borrow().lines()).saturating_sub(replayed_lines);

        let rest = SharedReader(self.source.clone());
        let input: Box<dyn Read> = Box::new(io::Cursor::new(replay).chain(rest));
        self.source = CursorBuffer::new(input).shared();
        self.end_of_header = true;
    }

    /// Collects the next field, continuation lines included, into `raw_field`
    /// and returns the line it starts on. The line following the field stays
    /// in `pending`.
    fn read_raw_field(&mut self, ctx: &mut ParseContext) -> crate::Result<usize> {
        self.raw_field.clear();
        let mut start = self.pending_line;

        loop {
            if !self.pending.is_empty() {
                if self.raw_field.len() + self.pending.len() > ctx.config.max_header_len {
                    return Err(Error::MaxHeaderLengthExceeded {
                        limit: ctx.config.max_header_len,
                    });
                }
                self.raw_field.extend_from_slice(&self.pending);
                self.pending.clear();
            }

            let line = self.current_line();
            let read = self
                .source
                .borrow_mut()
                .read_line(&mut self.pending, ctx.config.max_line_len)?;

            if read == 0 {
                self.end_of_header = true;
                ctx.report(Condition::new(ConditionKind::HeadersPrematureEnd, line))?;
                break;
            }

            if is_blank_line(&self.pending) {
                self.end_of_header = true;
                break;
            }

            if self.raw_field.is_empty() {
                start = line;
            } else if !constants::is_wsp(self.pending[0]) {
                self.pending_line = line;
                break;
            }
        }

        Ok(start)
    }

    fn enter_body(&mut self, ctx: &mut ParseContext) -> Option<Machine> {
        let mode = ctx.recursion_mode;

        if mode != RecursionMode::Flat && self.descriptor.is_multipart() {
            self.stage = EntityState::StartMultipart.into();
            None
        } else if mode != RecursionMode::Flat && mode != RecursionMode::NoRecurse && self.descriptor.is_message() {
            self.stage = Stage::InMessage;
            Some(self.message_child(ctx))
        } else {
            self.stage = EntityState::Body.into();
            None
        }
    }

    fn message_child(&self, ctx: &ParseContext) -> Machine {
        let raw: Box<dyn Read> = Box::new(SharedReader(self.source.clone()));
        if ctx.recursion_mode == RecursionMode::Raw {
            return Machine::Raw(RawEntity::new(raw));
        }

        let input = ctx.decode(self.descriptor.transfer_encoding(), raw);
        let line_offset = self.line_offset + self.source.borrow().lines();
        log::debug!("entering encapsulated message at line {}", line_offset + 1);

        Machine::Entity(MimeEntity::message(
            CursorBuffer::new(input).shared(),
            Some(self.descriptor.clone()),
            line_offset,
        ))
    }

    fn start_multipart(&mut self) {
        let boundary = self.descriptor.boundary().map(str::to_owned);

        self.part = match &boundary {
            Some(boundary) => Some(Rc::new(RefCell::new(BoundaryStream::new(self.source.clone(), boundary)))),
            None => None,
        };
        self.boundary = boundary;
        self.stage = EntityState::Preamble.into();
    }

    /// Finishes the current part (or the preamble) and opens the next one.
    fn next_part(&mut self, ctx: &mut ParseContext) -> crate::Result<Option<Machine>> {
        let (part, boundary) = match (&self.part, &self.boundary) {
            (Some(part), Some(boundary)) => (part.clone(), boundary.clone()),
            _ => {
                self.stage = EntityState::Epilogue.into();
                return Ok(None);
            }
        };

        part.borrow_mut().drain()?;
        let (last, premature) = {
            let part = part.borrow();
            (part.is_last_part(), part.is_premature())
        };

        if premature {
            ctx.report(Condition::new(ConditionKind::MimeBodyPrematureEnd, self.current_line()))?;
        }

        if last {
            self.part = None;
            self.stage = EntityState::Epilogue.into();
            return Ok(None);
        }

        let stream = Rc::new(RefCell::new(BoundaryStream::new(self.source.clone(), &boundary)));
        self.part = Some(stream.clone());
        self.stage = Stage::InBodyPart;

        Ok(Some(self.body_part_child(stream, ctx)))
    }

    fn body_part_child(&self, stream: Rc<RefCell<BoundaryStream>>, ctx: &ParseContext) -> Machine {
        let reader: Box<dyn Read> = Box::new(SharedReader(stream));
        if ctx.recursion_mode == RecursionMode::Raw {
            return Machine::Raw(RawEntity::new(reader));
        }

        let line_offset = self.line_offset + self.source.borrow().lines();
        Machine::Entity(MimeEntity::body_part(
            CursorBuffer::new(reader).shared(),
            self.descriptor.clone(),
            line_offset,
        ))
    }

    fn content(&self) -> Option<Box<dyn Read>> {
        match self.stage {
            Stage::Visible(EntityState::Preamble) => match &self.part {
                Some(part) => Some(Box::new(SharedReader(part.clone()))),
                None => None,
            },
            Stage::Visible(EntityState::Body) | Stage::Visible(EntityState::Epilogue) => {
                Some(Box::new(SharedReader(self.source.clone())))
            }
            _ => None,
        }
    }
}

fn is_blank_line(line: &[u8]) -> bool {
    line == b"\n" || line == b"\r\n"
}
