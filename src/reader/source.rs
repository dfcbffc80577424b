//! Module for the [`ByteSource`] trait.

use std::collections::VecDeque;
use std::io::{self, Read};

use delegate::delegate;

use crate::{Error, Result};

/// Outcome of one [`ByteSource::read_bytes`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// That many bytes (at least one) were written to the front of the buffer.
    Ready(usize),
    /// No data is available right now, but more may arrive later.
    Pending,
    /// The input is exhausted.
    Eof,
}

/// A pull-style provider of raw document bytes.
///
/// Any [`std::io::Read`] is a byte source: an `Ok(0)` read is the end of
/// input, [`ErrorKind::WouldBlock`] is reported as [`SourceStatus::Pending`]
/// and [`ErrorKind::Interrupted`] is retried. Non-blocking sockets therefore
/// work out of the box.
///
/// [`ErrorKind::WouldBlock`]: io::ErrorKind::WouldBlock
/// [`ErrorKind::Interrupted`]: io::ErrorKind::Interrupted
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes into `buf`.
    ///
    /// `buf` is never empty.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<SourceStatus>;
}

impl<R: Read> ByteSource for R {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<SourceStatus> {
        loop {
            break match self.read(buf) {
                Ok(0) => Ok(SourceStatus::Eof),
                Ok(n) => Ok(SourceStatus::Ready(n)),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(SourceStatus::Pending),
                Err(e) => Err(Error::from(e)),
            };
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// An in-memory push buffer.
///
/// The producer [`push`]es bytes as they arrive and [`close`]s the source at
/// the end. While the buffer is empty and not closed the source reports
/// [`SourceStatus::Pending`].
///
/// ```
/// # use pretty_assertions::assert_eq;
/// use xml_cursor::{Error, FeedSource, NodeType, XmlReader};
///
/// let mut reader = XmlReader::from_source(FeedSource::new());
/// assert!(matches!(reader.read(), Err(Error::Pending)));
///
/// reader.source_mut().unwrap().push(b"<root/>");
/// reader.source_mut().unwrap().close();
/// assert_eq!(reader.read().unwrap(), Some(NodeType::Element));
/// ```
///
/// [`push`]: Self::push
/// [`close`]: Self::close
#[derive(Debug, Default, Clone)]
pub struct FeedSource {
    buffer: VecDeque<u8>,
    closed: bool,
}

impl FeedSource {
    /// Creates an empty, open source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the end of the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Marks the end of input. Buffered bytes are still delivered.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns `true` if [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    delegate! {
        to self.buffer {
            /// Returns the number of buffered bytes not yet consumed by a reader.
            pub fn len(&self) -> usize;
            /// Returns `true` if no bytes are buffered.
            pub fn is_empty(&self) -> bool;
        }
    }
}

impl ByteSource for FeedSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<SourceStatus> {
        if self.buffer.is_empty() {
            return Ok(if self.closed {
                SourceStatus::Eof
            } else {
                SourceStatus::Pending
            });
        }
        let n = self.buffer.read(buf)?;
        Ok(SourceStatus::Ready(n))
    }
}
