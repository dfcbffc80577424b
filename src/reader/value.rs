//! Text value of the current node.

use std::sync::Arc;

use crate::heap::Heap;
use crate::{Error, Result};

use super::lexer::{Body, Lexer};
use super::source::ByteSource;

/// Outcome of [`XmlReader::read_value_chunk`](crate::XmlReader::read_value_chunk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueChunk {
    /// That many characters were appended to the buffer.
    Read(usize),
    /// The whole value was already consumed.
    Exhausted,
    /// The value was already retrieved as a whole, it can no longer be read in
    /// chunks.
    Unavailable,
}

/// The value of the current node.
///
/// Comment, CDATA and processing instruction values may still be partially
/// unread when the node is produced; the rest is scanned on demand. Chunked
/// reads consume the value from its front, whole-value access returns what is
/// left and turns chunked reads off until the reader moves to another node.
#[derive(Default)]
pub(crate) struct ValueBuffer {
    text: String,
    /// Byte offset of the first character not yet returned by a chunked read
    offset: usize,
    /// Kind of markup whose remaining content is still in the lexer
    body: Option<Body>,
    materialized: bool,
    heap: Option<Arc<Heap>>,
    /// Bytes of `text` charged to `heap`
    charged: usize,
}

impl ValueBuffer {
    pub fn new(heap: Option<Arc<Heap>>) -> Self {
        Self {
            heap,
            ..Self::default()
        }
    }

    /// Forgets the current value and releases its heap charge.
    pub fn clear(&mut self) {
        self.text.clear();
        self.offset = 0;
        self.body = None;
        self.materialized = false;
        if let Some(heap) = &self.heap {
            heap.release(self.charged);
        }
        self.charged = 0;
    }

    /// Replaces the value with a completely known text.
    pub fn set(&mut self, text: &str) -> Result<()> {
        self.clear();
        self.text.push_str(text);
        self.charge()
    }

    /// Starts a value that is read from the lexer as `body`.
    pub fn start(&mut self, body: Body) {
        self.clear();
        self.body = Some(body);
    }

    /// Returns the kind of markup whose content is not read completely yet.
    #[cfg(test)]
    pub fn pending_body(&self) -> Option<Body> {
        self.body
    }

    fn charge(&mut self) -> Result<()> {
        if let Some(heap) = &self.heap {
            let size = self.text.len() - self.charged;
            heap.charge(size)?;
            self.charged += size;
        }
        Ok(())
    }

    /// Scans whatever part of the value is buffered or can be read without
    /// waiting. Never fails with [`Error::Pending`].
    pub fn prefetch<R: ByteSource>(&mut self, lexer: &mut Lexer<R>) -> Result<()> {
        match self.complete(lexer) {
            Err(Error::Pending) => Ok(()),
            result => result,
        }
    }

    /// Reads the rest of the value.
    pub fn complete<R: ByteSource>(&mut self, lexer: &mut Lexer<R>) -> Result<()> {
        while let Some(body) = self.body {
            let done = lexer.body_step(body, &mut self.text);
            self.charge()?;
            if done? {
                self.body = None;
            } else {
                lexer.body_fill(body)?;
            }
        }
        Ok(())
    }

    /// Returns the value without the part already consumed by chunked reads.
    /// The value must be [complete](Self::complete).
    pub fn value(&mut self) -> &str {
        self.materialized = true;
        &self.text[self.offset..]
    }

    /// Moves up to `max` characters from the front of the value to `out`.
    pub fn read_chunk<R: ByteSource>(
        &mut self,
        lexer: Option<&mut Lexer<R>>,
        out: &mut String,
        max: usize,
    ) -> Result<ValueChunk> {
        if max == 0 {
            return Ok(ValueChunk::Read(0));
        }
        if self.materialized {
            return Ok(ValueChunk::Unavailable);
        }
        if let Some(lexer) = lexer {
            while let Some(body) = self.body {
                if self.text[self.offset..].chars().nth(max - 1).is_some() {
                    break;
                }
                let done = lexer.body_step(body, &mut self.text);
                self.charge()?;
                if done? {
                    self.body = None;
                    continue;
                }
                match lexer.body_fill(body) {
                    Ok(()) => {}
                    // hand out what is there, report pending only if nothing is
                    Err(Error::Pending) if self.offset < self.text.len() => break,
                    Err(e) => return Err(e),
                }
            }
        }

        let rest = &self.text[self.offset..];
        if rest.is_empty() {
            return Ok(ValueChunk::Exhausted);
        }
        let (len, count) = match rest.char_indices().nth(max) {
            Some((len, _)) => (len, max),
            None => (rest.len(), rest.chars().count()),
        };
        out.push_str(&rest[..len]);
        self.offset += len;
        Ok(ValueChunk::Read(count))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reader::input::Input;
    use crate::reader::source::FeedSource;
    use crate::DtdProcessing;
    use pretty_assertions::assert_eq;

    fn comment(text: &str) -> (Lexer<&[u8]>, ValueBuffer) {
        let mut lexer = Lexer::new(Input::new(text.as_bytes(), None));
        lexer.next_token(DtdProcessing::Prohibit).unwrap();
        let mut value = ValueBuffer::default();
        value.start(Body::Comment);
        (lexer, value)
    }

    #[test]
    fn chunks_consume_the_front() {
        let (mut lexer, mut value) = comment("<!-- comment1 -->");
        let mut out = String::new();
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 1).unwrap(),
            ValueChunk::Read(1)
        );
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 1).unwrap(),
            ValueChunk::Read(1)
        );
        assert_eq!(out, " c");
        value.complete(&mut lexer).unwrap();
        assert_eq!(value.value(), "omment1 ");

        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 1).unwrap(),
            ValueChunk::Unavailable
        );
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 0).unwrap(),
            ValueChunk::Read(0)
        );
        assert_eq!(value.value(), "omment1 ");
    }

    #[test]
    fn exhausted() {
        let (mut lexer, mut value) = comment("<!-- comment2 -->");
        let mut out = String::new();
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 64).unwrap(),
            ValueChunk::Read(10)
        );
        assert_eq!(out, " comment2 ");
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 64).unwrap(),
            ValueChunk::Exhausted
        );
    }

    #[test]
    fn set_text() {
        let mut value = ValueBuffer::default();
        value.set("värde").unwrap();
        let mut out = String::new();
        assert_eq!(
            value.read_chunk::<&[u8]>(None, &mut out, 2).unwrap(),
            ValueChunk::Read(2)
        );
        assert_eq!(out, "vä");
        assert_eq!(value.value(), "rde");
        value.clear();
        assert_eq!(value.value(), "");
    }

    /// Chunks hand out what arrived so far and report pending only when
    /// nothing is left
    #[test]
    fn pending_body() {
        let mut lexer = Lexer::new(Input::new(FeedSource::new(), None));
        lexer.input_mut().source_mut().push(b"<![CDATA[abcdef");
        lexer.next_token(DtdProcessing::Prohibit).unwrap();
        let mut value = ValueBuffer::default();
        value.start(Body::CData);
        value.prefetch(&mut lexer).unwrap();
        assert_eq!(value.pending_body(), Some(Body::CData));

        let mut out = String::new();
        assert_eq!(
            value.read_chunk(Some(&mut lexer), &mut out, 10).unwrap(),
            ValueChunk::Read(4)
        );
        assert_eq!(out, "abcd");
        assert!(matches!(
            value.read_chunk(Some(&mut lexer), &mut out, 10),
            Err(Error::Pending)
        ));
        assert!(matches!(value.complete(&mut lexer), Err(Error::Pending)));

        lexer.input_mut().source_mut().push(b"]]>");
        value.complete(&mut lexer).unwrap();
        assert_eq!(value.value(), "ef");
        assert_eq!(value.pending_body(), None);
    }

    #[test]
    fn quota() {
        let heap = Arc::new(Heap::new(4, 4));
        let mut value = ValueBuffer::new(Some(heap.clone()));
        value.set("abcd").unwrap();
        assert_eq!(heap.requested_size(), 4);
        assert!(matches!(value.set("abcde"), Err(Error::QuotaExceeded)));
        value.clear();
        assert_eq!(heap.requested_size(), 0);
    }
}
