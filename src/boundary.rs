use crate::buffer::SharedBuffer;
use crate::constants::{self, CR, LF};
use memchr::memmem::Finder;
use std::io::{self, Read};

/// A bounded view of a [`CursorBuffer`](crate::buffer::CursorBuffer) that ends
/// right before the next `--boundary` delimiter line.
///
/// The line terminator preceding the delimiter belongs to the delimiter, not
/// to the content. Once the content is drained the delimiter line itself is
/// consumed and [`is_last_part`](BoundaryStream::is_last_part) tells whether
/// it was the closing `--boundary--`.
pub(crate) struct BoundaryStream {
    buffer: SharedBuffer,
    finder: Finder<'static>,
    pattern_len: usize,
    limit: usize,
    delimiter_len: usize,
    at_boundary: bool,
    line_start: bool,
    eof: bool,
    last_part: bool,
    completed: bool,
    premature: bool,
}

impl BoundaryStream {
    pub fn new(buffer: SharedBuffer, boundary: &str) -> BoundaryStream {
        let pattern = format!("{}{}", constants::BOUNDARY_EXT, boundary).into_bytes();
        buffer.borrow_mut().ensure_capacity(pattern.len() * 2);

        BoundaryStream {
            buffer,
            pattern_len: pattern.len(),
            finder: Finder::new(&pattern).into_owned(),
            limit: 0,
            delimiter_len: 0,
            at_boundary: false,
            line_start: true,
            eof: false,
            last_part: false,
            completed: false,
            premature: false,
        }
    }

    /// Whether the delimiter that ended this stream was the closing one.
    /// Only meaningful once the stream is exhausted.
    pub fn is_last_part(&self) -> bool {
        self.last_part
    }

    /// Whether the input ran out before any delimiter was seen.
    pub fn is_premature(&self) -> bool {
        self.premature
    }

    /// Reads and discards whatever is left of the content, then the delimiter.
    pub fn drain(&mut self) -> crate::Result<()> {
        io::copy(self, &mut io::sink()).map_err(crate::Error::StreamReadFailed)?;
        Ok(())
    }

    fn locate(&mut self) {
        let buffer = self.buffer.borrow();
        let data = buffer.data();

        let mut from = 0;
        let found = loop {
            match buffer.find(&self.finder, from) {
                Some(0) if !self.line_start => from = 1,
                Some(idx) if idx > 0 && data[idx - 1] != LF => from = idx + 1,
                other => break other,
            }
        };

        match found {
            Some(idx) => {
                let mut strip = 0;
                if idx > 0 {
                    strip += 1;
                    if idx > 1 && data[idx - 2] == CR {
                        strip += 1;
                    }
                }

                log::trace!("boundary found {} bytes ahead", idx);

                self.limit = idx - strip;
                self.delimiter_len = strip + self.pattern_len;
                self.at_boundary = true;
            }
            None if buffer.is_eof() => {
                self.limit = data.len();
                self.eof = true;
            }
            None => {
                self.limit = data.len().saturating_sub(self.pattern_len + 1);
            }
        }
    }

    fn skip_boundary(&mut self) -> crate::Result<()> {
        if self.completed {
            return Ok(());
        }
        self.completed = true;

        let mut buffer = self.buffer.borrow_mut();
        buffer.skip(self.delimiter_len);

        let mut check_last_part = true;
        loop {
            if let (Some(b1), Some(b2)) = (buffer.byte_at(0), buffer.byte_at(1)) {
                if check_last_part && b1 == b'-' && b2 == b'-' {
                    self.last_part = true;
                    buffer.skip(2);
                    check_last_part = false;
                    continue;
                }
                check_last_part = false;

                if b1 == CR && b2 == LF {
                    buffer.skip(2);
                    break;
                } else if b1 == LF {
                    buffer.skip(1);
                    break;
                }

                // transport padding and anything else on the delimiter line
                buffer.skip(1);
            } else if buffer.is_eof() {
                buffer.skip(1);
                break;
            } else {
                buffer.fill()?;
            }
        }

        Ok(())
    }
}

impl Read for BoundaryStream {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }

        loop {
            if self.completed {
                return Ok(0);
            }

            if self.limit > self.buffer.borrow().len() {
                // the buffer was truncated underneath us
                self.limit = 0;
                self.at_boundary = false;
                self.eof = true;
            }

            if self.limit > 0 {
                let mut buffer = self.buffer.borrow_mut();
                let n = dst.len().min(self.limit);
                dst[..n].copy_from_slice(&buffer.data()[..n]);
                buffer.skip(n);
                self.limit -= n;
                self.line_start = dst[n - 1] == LF;
                return Ok(n);
            }

            if self.at_boundary {
                self.skip_boundary()?;
                return Ok(0);
            }

            if self.eof {
                self.premature = true;
                self.last_part = true;
                self.completed = true;
                return Ok(0);
            }

            self.locate();
            if self.limit == 0 && !self.at_boundary && !self.eof {
                self.buffer.borrow_mut().fill()?;
                self.locate();
            }
        }
    }
}
