//! Module for async-specific reader code.
//!
//! A reader over a [`FeedSource`] never blocks: it reports
//! [`Error::Pending`] when the buffered bytes run out. The methods here fill
//! the feed from an [`AsyncRead`] whenever that happens.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Error, Result};

use super::{FeedSource, NodeType, XmlReader};

/// Amount of bytes read from the async input at once
const CHUNK_SIZE: usize = 4096;

impl XmlReader<FeedSource> {
    /// An async version of [`read`](Self::read), pulling bytes from `input`
    /// until the next node is complete.
    ///
    /// ```
    /// # use pretty_assertions::assert_eq;
    /// use xml_cursor::{FeedSource, NodeType, XmlReader};
    ///
    /// # tokio_test();
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn tokio_test() {
    /// let mut input: &[u8] = b"<a>text</a>";
    /// let mut reader = XmlReader::from_source(FeedSource::new());
    /// let mut count = 0;
    /// while let Some(_) = reader.read_async(&mut input).await.unwrap() {
    ///     count += 1;
    /// }
    /// assert_eq!(count, 3);
    /// # }
    /// ```
    pub async fn read_async<A>(&mut self, input: &mut A) -> Result<Option<NodeType>>
    where
        A: AsyncRead + Unpin,
    {
        loop {
            match self.read() {
                Err(Error::Pending) => self.feed(input).await?,
                result => return result,
            }
        }
    }

    /// An async version of [`value`](Self::value), pulling bytes from `input`
    /// until the whole value of the current node is known.
    pub async fn value_async<A>(&mut self, input: &mut A) -> Result<&str>
    where
        A: AsyncRead + Unpin,
    {
        loop {
            match self.value() {
                Err(Error::Pending) => {}
                Err(e) => return Err(e),
                Ok(_) => break,
            }
            self.feed(input).await?;
        }
        self.value()
    }

    /// Moves one chunk of `input` into the feed, closing it at the end.
    async fn feed<A>(&mut self, input: &mut A) -> Result<()>
    where
        A: AsyncRead + Unpin,
    {
        let source = match self.source_mut() {
            Some(source) => source,
            None => return Err(Error::InvalidArgument("no input attached")),
        };
        if source.is_closed() {
            return Err(Error::InvalidArgument("feed is closed"));
        }
        let mut buf = [0; CHUNK_SIZE];
        let n = input.read(&mut buf).await?;
        if n == 0 {
            source.close();
        } else {
            source.push(&buf[..n]);
        }
        Ok(())
    }
}
