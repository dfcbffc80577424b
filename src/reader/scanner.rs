//! Decoded character buffer with line/column bookkeeping.

use crate::escape::{is_whitespace, is_xml_char};
use crate::{Error, Result};

use super::input::Input;
use super::source::ByteSource;

/// Consumed text is dropped from the buffer once it grows past this size
const COMPACT_THRESHOLD: usize = 8 * 1024;

/// A line and a 1-based column of a character, both counted over decoded
/// characters after newline normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    /// Line, starting from 1
    pub line: u32,
    /// Column, starting from 1
    pub column: u32,
}

/// A saved scanner location used to rewind after a pending source.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Mark {
    pos: usize,
    line: u32,
    column: u32,
}

/// A window over the decoded document.
///
/// Characters are pulled from the [`Input`] on demand. Everything from the
/// oldest live [`Mark`] on stays buffered, so a construct that could not be
/// completed because the source went pending can be scanned again from its
/// start once more input arrives.
pub(crate) struct Scanner<R> {
    input: Input<R>,
    buf: String,
    /// Byte offset of the next character in `buf`
    pos: usize,
    line: u32,
    /// Number of characters consumed on the current line
    column: u32,
}

impl<R> Scanner<R> {
    pub fn new(input: Input<R>) -> Self {
        Self {
            input,
            buf: String::new(),
            pos: 0,
            line: 1,
            column: 0,
        }
    }

    #[inline]
    pub fn input(&self) -> &Input<R> {
        &self.input
    }

    #[inline]
    pub fn input_mut(&mut self) -> &mut Input<R> {
        &mut self.input
    }

    pub fn into_input(self) -> Input<R> {
        self.input
    }

    /// Position of the next character
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    #[inline]
    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    #[inline]
    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    /// Drops already consumed text. Invalidates all marks.
    pub fn commit(&mut self) {
        if self.pos > COMPACT_THRESHOLD {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    /// The buffered, not yet consumed text
    #[inline]
    pub fn rest(&self) -> &str {
        &self.buf[self.pos..]
    }

    /// Skips `len` bytes of markup that are known to be buffered and to contain
    /// no line breaks.
    #[inline]
    pub fn advance(&mut self, len: usize) {
        debug_assert!(!self.rest()[..len].contains(|c| c == '\r' || c == '\n'));
        self.column += self.rest()[..len].chars().count() as u32;
        self.pos += len;
    }

    /// Consumes `len` buffered bytes, appending them to `out` with line breaks
    /// normalized to `\n`.
    ///
    /// A `\r` ending the range is taken as a lone line break, so callers never
    /// split a `\r\n` pair.
    pub fn take(&mut self, len: usize, out: &mut String) -> Result<()> {
        let end = self.pos + len;
        let text = &self.buf[self.pos..end];
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\r' | '\n' => {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    out.push('\n');
                    self.line += 1;
                    self.column = 0;
                }
                c if is_xml_char(c) => {
                    out.push(c);
                    self.column += 1;
                }
                _ => return Err(Error::XmlCharacter),
            }
        }
        self.pos = end;
        Ok(())
    }
}

impl<R: ByteSource> Scanner<R> {
    /// Decodes more input into the buffer. Returns `Ok(false)` at the end of input.
    #[inline]
    pub fn fill(&mut self) -> Result<bool> {
        self.input.decode_more(&mut self.buf)
    }

    /// Makes sure at least `len` bytes are buffered after the current position.
    /// Returns `Ok(false)` if the input ends before that.
    pub fn ensure(&mut self, len: usize) -> Result<bool> {
        while self.buf.len() - self.pos < len {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn peek(&mut self) -> Result<Option<char>> {
        self.ensure(1)?;
        Ok(self.rest().chars().next())
    }

    pub fn starts_with(&mut self, prefix: &str) -> Result<bool> {
        self.ensure(prefix.len())?;
        Ok(self.rest().starts_with(prefix))
    }

    /// Consumes one character. `\r\n` and a lone `\r` are returned as `\n`.
    pub fn next_char(&mut self) -> Result<Option<char>> {
        let c = match self.peek()? {
            Some(c) => c,
            None => return Ok(None),
        };
        match c {
            '\r' => {
                // a following `\n` must be visible before the pair can be folded
                self.ensure(2)?;
                let len = if self.rest().starts_with("\r\n") { 2 } else { 1 };
                self.pos += len;
            }
            '\n' => self.pos += 1,
            c if is_xml_char(c) => {
                self.pos += c.len_utf8();
                self.column += 1;
                return Ok(Some(c));
            }
            _ => return Err(Error::XmlCharacter),
        }
        self.line += 1;
        self.column = 0;
        Ok(Some('\n'))
    }

    /// Consumes the next character if it equals `c`.
    pub fn eat(&mut self, c: char) -> Result<bool> {
        if self.peek()? == Some(c) {
            self.next_char()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skips whitespace. Returns `true` if anything was skipped.
    pub fn skip_whitespace(&mut self) -> Result<bool> {
        let mut skipped = false;
        while let Some(c) = self.peek()? {
            if !is_whitespace(c) {
                break;
            }
            self.next_char()?;
            skipped = true;
        }
        Ok(skipped)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::source::FeedSource;
    use pretty_assertions::assert_eq;

    fn scanner(text: &str) -> Scanner<&[u8]> {
        Scanner::new(Input::new(text.as_bytes(), None))
    }

    #[test]
    fn newlines_are_normalized() {
        let mut s = scanner("a\r\nb\rc\nd");
        let mut chars = String::new();
        while let Some(c) = s.next_char().unwrap() {
            chars.push(c);
        }
        assert_eq!(chars, "a\nb\nc\nd");
        assert_eq!(s.position(), Position { line: 4, column: 2 });
    }

    #[test]
    fn take_normalizes() {
        let mut s = scanner("x\r\n\r y]]>");
        s.ensure(9).unwrap();
        let mut out = String::new();
        s.take(6, &mut out).unwrap();
        assert_eq!(out, "x\n\n y");
        assert_eq!(s.position(), Position { line: 3, column: 3 });
        assert_eq!(s.rest(), "]]>");
    }

    #[test]
    fn invalid_characters() {
        let mut s = scanner("a\u{1}");
        assert_eq!(s.next_char().unwrap(), Some('a'));
        assert!(matches!(s.next_char(), Err(Error::XmlCharacter)));
    }

    #[test]
    fn mark_and_reset() {
        let mut s = scanner("ab\ncd");
        let mark = s.mark();
        s.next_char().unwrap();
        s.next_char().unwrap();
        s.next_char().unwrap();
        assert_eq!(s.position(), Position { line: 2, column: 1 });
        s.reset(mark);
        assert_eq!(s.position(), Position { line: 1, column: 1 });
        assert_eq!(s.peek().unwrap(), Some('a'));
    }

    /// A `\r` at the end of the available data is held back until the next
    /// character is known
    #[test]
    fn pending_carriage_return() {
        let mut s = Scanner::new(Input::new(FeedSource::new(), None));
        s.input_mut().source_mut().push(b"abc\r");
        assert_eq!(s.next_char().unwrap(), Some('a'));
        assert_eq!(s.next_char().unwrap(), Some('b'));
        assert_eq!(s.next_char().unwrap(), Some('c'));
        let mark = s.mark();
        assert!(matches!(s.next_char(), Err(Error::Pending)));
        s.reset(mark);

        s.input_mut().source_mut().push(b"\nd");
        s.input_mut().source_mut().close();
        assert_eq!(s.next_char().unwrap(), Some('\n'));
        assert_eq!(s.next_char().unwrap(), Some('d'));
        assert_eq!(s.next_char().unwrap(), None);
        assert_eq!(s.position(), Position { line: 2, column: 2 });
    }
}
