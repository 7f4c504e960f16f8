use std::fmt;

/// The token a [`TokenStream`](crate::TokenStream) is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    StartMessage,
    EndMessage,
    RawEntity,
    StartHeader,
    Field,
    EndHeader,
    StartMultipart,
    EndMultipart,
    Preamble,
    Epilogue,
    StartBodyPart,
    EndBodyPart,
    Body,
    EndOfStream,
}

impl EntityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::StartMessage => "start-message",
            EntityState::EndMessage => "end-message",
            EntityState::RawEntity => "raw-entity",
            EntityState::StartHeader => "start-header",
            EntityState::Field => "field",
            EntityState::EndHeader => "end-header",
            EntityState::StartMultipart => "start-multipart",
            EntityState::EndMultipart => "end-multipart",
            EntityState::Preamble => "preamble",
            EntityState::Epilogue => "epilogue",
            EntityState::StartBodyPart => "start-bodypart",
            EntityState::EndBodyPart => "end-bodypart",
            EntityState::Body => "body",
            EntityState::EndOfStream => "end-of-stream",
        }
    }

    /// States that carry content readable through
    /// [`TokenStream::input_stream`](crate::TokenStream::input_stream).
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            EntityState::Preamble | EntityState::Epilogue | EntityState::Body | EntityState::RawEntity
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the tokenizer treats nested entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionMode {
    /// Descend into multiparts and encapsulated messages.
    Recurse,
    /// Descend into multiparts; encapsulated messages are plain bodies.
    NoRecurse,
    /// Treat every body as a plain body, multiparts included.
    Flat,
    /// Report each body part as one [`EntityState::RawEntity`] with its
    /// headers and content unparsed.
    Raw,
}

impl Default for RecursionMode {
    fn default() -> Self {
        RecursionMode::Recurse
    }
}

/// The machine-internal stage of an entity. The two extra stages drive
/// transitions and never reach callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Visible(EntityState),
    InBodyPart,
    InMessage,
}

impl Stage {
    pub(crate) fn visible(self) -> Option<EntityState> {
        match self {
            Stage::Visible(state) => Some(state),
            Stage::InBodyPart | Stage::InMessage => None,
        }
    }
}

impl From<EntityState> for Stage {
    fn from(state: EntityState) -> Self {
        Stage::Visible(state)
    }
}
