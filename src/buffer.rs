use crate::constants::{self, LF};
use crate::Error;
use bytes::{Buf, BytesMut};
use memchr::memmem::Finder;
use std::cell::RefCell;
use std::io::{self, Read};
use std::rc::Rc;

pub(crate) type SharedBuffer = Rc<RefCell<CursorBuffer>>;

/// A growable read-ahead buffer over a blocking byte source.
///
/// The unconsumed bytes are `buf[pos..]`; the consumed prefix is dropped on
/// the next [`fill`](CursorBuffer::fill).
pub(crate) struct CursorBuffer {
    source: Box<dyn Read>,
    buf: BytesMut,
    pos: usize,
    eof: bool,
    truncated: bool,
    lines: usize,
}

impl CursorBuffer {
    pub fn new(source: Box<dyn Read>) -> Self {
        CursorBuffer::with_capacity(source, constants::DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(source: Box<dyn Read>, capacity: usize) -> Self {
        CursorBuffer {
            source,
            buf: BytesMut::with_capacity(capacity),
            pos: 0,
            eof: false,
            truncated: false,
            lines: 0,
        }
    }

    pub fn shared(self) -> SharedBuffer {
        Rc::new(RefCell::new(self))
    }

    /// Pulls more bytes from the source. Returns the number of bytes added,
    /// `0` meaning the source is exhausted (or truncated).
    pub fn fill(&mut self) -> crate::Result<usize> {
        if self.eof || self.truncated {
            return Ok(0);
        }

        if self.pos > 0 {
            self.buf.advance(self.pos);
            self.pos = 0;
        }

        let len = self.buf.len();
        if self.buf.capacity() - len < constants::MIN_READ_SIZE {
            let grow = self.buf.capacity().max(constants::MIN_READ_SIZE);
            self.buf.reserve(grow);
        }

        let spare = self.buf.capacity() - len;
        self.buf.resize(len + spare, 0);

        let read = loop {
            match self.source.read(&mut self.buf[len..]) {
                Ok(n) => break Ok(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => break Err(err),
            }
        };

        match read {
            Ok(n) => {
                self.buf.truncate(len + n);
                if n == 0 {
                    self.eof = true;
                }
                Ok(n)
            }
            Err(err) => {
                self.buf.truncate(len);
                Err(Error::StreamReadFailed(err))
            }
        }
    }

    pub fn ensure_capacity(&mut self, capacity: usize) {
        if self.buf.capacity() < capacity {
            self.buf.reserve(capacity - self.buf.len());
        }
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The buffered, unconsumed bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn has_buffered(&self) -> bool {
        self.len() > 0
    }

    pub fn is_eof(&self) -> bool {
        self.eof || self.truncated
    }

    /// Searches the unconsumed bytes, starting `from` bytes past the read position.
    pub fn find(&self, finder: &Finder<'_>, from: usize) -> Option<usize> {
        let data = self.data();
        if from >= data.len() {
            return None;
        }
        finder.find(&data[from..]).map(|idx| idx + from)
    }

    pub fn byte_at(&self, idx: usize) -> Option<u8> {
        self.data().get(idx).copied()
    }

    /// Consumes up to `n` buffered bytes, returning how many were skipped.
    pub fn skip(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.consume(n);
        n
    }

    /// Appends one line, terminator included, to `dst`. Returns `0` at end of input.
    pub fn read_line(&mut self, dst: &mut Vec<u8>, max_len: usize) -> crate::Result<usize> {
        let mut total = 0;

        loop {
            if !self.has_buffered() {
                if self.fill()? == 0 {
                    return Ok(total);
                }
                continue;
            }

            let (chunk, done) = match memchr::memchr(LF, self.data()) {
                Some(idx) => (idx + 1, true),
                None => (self.len(), false),
            };

            if total + chunk > max_len {
                return Err(Error::MaxLineLengthExceeded { limit: max_len });
            }

            dst.extend_from_slice(&self.buf[self.pos..self.pos + chunk]);
            self.consume(chunk);
            total += chunk;

            if done {
                return Ok(total);
            }
        }
    }

    /// Drops everything buffered and makes the source behave as exhausted.
    pub fn truncate(&mut self) {
        self.buf.clear();
        self.pos = 0;
        self.truncated = true;
    }

    /// Number of line feeds consumed so far.
    pub fn lines(&self) -> usize {
        self.lines
    }

    fn consume(&mut self, n: usize) {
        let end = self.pos + n;
        self.lines += memchr::memchr_iter(LF, &self.buf[self.pos..end]).count();
        self.pos = end;
    }
}

impl Read for CursorBuffer {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        if !self.has_buffered() && self.fill()? == 0 {
            return Ok(0);
        }

        let n = dst.len().min(self.len());
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.consume(n);

        Ok(n)
    }
}

/// A `Read` handle onto a reader that other parts of the machine stack also hold.
pub(crate) struct SharedReader<T>(pub(crate) Rc<RefCell<T>>);

impl<T: Read> Read for SharedReader<T> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.0.borrow_mut().read(dst)
    }
}
