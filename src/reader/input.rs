//! Byte to character decoding with encoding detection.

use encoding_rs::{Decoder, DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use log::debug;
use memchr::memmem;

use crate::{Error, Result};

use super::source::{ByteSource, SourceStatus};

/// Amount of bytes requested from a source at once
const CHUNK_SIZE: usize = 4096;
/// How far to look for the end of an XML declaration while detecting the encoding
const MAX_DECLARATION_LEN: usize = 1024;

/// A reference to an encoding together with information about how it was retrieved.
///
/// The state transition diagram:
///
/// ```mermaid
/// flowchart LR
///   Implicit    -- builder        --> Explicit
///   Implicit    -- BOM            --> BomDetected
///   Implicit    -- "encoding=..." --> XmlDetected
///   BomDetected -- "encoding=..." (no BOM) --> XmlDetected
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EncodingRef {
    /// Encoding was implicitly assumed to have a specified value. It can be refined
    /// using BOM or by the XML declaration (`<?xml encoding=... ?>`)
    Implicit(&'static Encoding),
    /// Encoding was explicitly set to the desired value. It cannot be changed
    /// nor by BOM, nor by parsing XML declaration (`<?xml encoding=... ?>`)
    Explicit(&'static Encoding),
    /// Encoding was detected from a byte order mark (BOM) or by the first bytes
    /// of the content. Only an encoding guessed from the first bytes can be
    /// refined by the XML declaration (`<?xml encoding=... ?>`)
    BomDetected(&'static Encoding),
    /// Encoding was detected using XML declaration (`<?xml encoding=... ?>`).
    /// It can no longer change
    XmlDetected(&'static Encoding),
}

impl EncodingRef {
    /// The encoding itself
    #[inline]
    pub fn encoding(&self) -> &'static Encoding {
        match self {
            Self::Implicit(e) => e,
            Self::Explicit(e) => e,
            Self::BomDetected(e) => e,
            Self::XmlDetected(e) => e,
        }
    }
    #[inline]
    fn can_be_refined(&self) -> bool {
        match self {
            Self::Implicit(_) | Self::BomDetected(_) => true,
            Self::Explicit(_) | Self::XmlDetected(_) => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// The byte/encoding layer between a [`ByteSource`] and the scanner.
///
/// The first call to [`decode_more`](Self::decode_more) sniffs the encoding:
/// it needs four bytes (or the end of input) for the BOM window, and for
/// ASCII compatible input that starts with `<?xml` the whole declaration. If
/// the source goes pending before that, [`Error::Pending`] is returned and the
/// sniff restarts on the next call with the bytes gathered so far.
pub(crate) struct Input<R> {
    source: R,
    /// Raw bytes not decoded yet
    raw: Vec<u8>,
    encoding: EncodingRef,
    /// Created once the encoding is known
    decoder: Option<Decoder>,
    /// The source reported the end of input
    eof: bool,
    /// The decoder was flushed, nothing more will come
    finished: bool,
}

impl<R> Input<R> {
    pub fn new(source: R, encoding: Option<&'static Encoding>) -> Self {
        Self {
            source,
            raw: Vec::new(),
            encoding: match encoding {
                Some(e) => EncodingRef::Explicit(e),
                None => EncodingRef::Implicit(UTF_8),
            },
            decoder: None,
            eof: false,
            finished: false,
        }
    }

    #[inline]
    pub fn encoding(&self) -> EncodingRef {
        self.encoding
    }

    #[inline]
    pub fn source(&self) -> &R {
        &self.source
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_source(self) -> R {
        self.source
    }
}

impl<R: ByteSource> Input<R> {
    /// Decodes more characters and appends them to `out`.
    ///
    /// Returns `Ok(true)` if at least one character was appended, `Ok(false)`
    /// at the end of input.
    pub fn decode_more(&mut self, out: &mut String) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        if self.decoder.is_none() {
            self.sniff()?;
        }
        loop {
            if !self.raw.is_empty() || self.eof {
                let before = out.len();
                self.decode_raw(out)?;
                if out.len() > before {
                    return Ok(true);
                }
                if self.finished {
                    return Ok(false);
                }
            }
            self.fetch()?;
        }
    }

    /// Reads one chunk from the source into `raw`.
    fn fetch(&mut self) -> Result<()> {
        let len = self.raw.len();
        self.raw.resize(len + CHUNK_SIZE, 0);
        let status = self.source.read_bytes(&mut self.raw[len..]);
        let read = match status {
            Ok(SourceStatus::Ready(n)) => n.min(CHUNK_SIZE),
            _ => 0,
        };
        self.raw.truncate(len + read);
        match status? {
            SourceStatus::Ready(_) => {}
            SourceStatus::Pending => return Err(Error::Pending),
            SourceStatus::Eof => self.eof = true,
        }
        Ok(())
    }

    fn decode_raw(&mut self, out: &mut String) -> Result<()> {
        let decoder = match self.decoder.as_mut() {
            Some(d) => d,
            None => return Ok(()),
        };
        let last = self.eof;
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(self.raw.len())
            .unwrap_or(self.raw.len() * 3 + 16);
        out.reserve(needed);
        let (result, read) = decoder.decode_to_string_without_replacement(&self.raw, out, last);
        self.raw.drain(..read);
        match result {
            DecoderResult::InputEmpty => {
                if last {
                    self.finished = true;
                }
                Ok(())
            }
            DecoderResult::OutputFull => Ok(()),
            DecoderResult::Malformed(_, _) => {
                Err(Error::NonDecodable(self.encoding.encoding().name()))
            }
        }
    }

    /// Detects the encoding from the BOM, the first bytes or the XML declaration
    /// and creates the decoder.
    fn sniff(&mut self) -> Result<()> {
        while self.raw.len() < 4 && !self.eof {
            self.fetch()?;
        }
        let mut skip = 0;
        let mut bom = false;
        if let Some((encoding, bom_len)) = detect_encoding(&self.raw) {
            if bom_len > 0 {
                bom = true;
                if let EncodingRef::Explicit(e) = self.encoding {
                    // only a BOM of the forced encoding is dropped
                    if e == encoding {
                        skip = bom_len;
                    }
                } else {
                    skip = bom_len;
                    self.encoding = EncodingRef::BomDetected(encoding);
                }
            } else if self.encoding.can_be_refined() {
                self.encoding = EncodingRef::BomDetected(encoding);
            }
        }

        // a byte order mark wins over the declaration
        if !bom && self.encoding.can_be_refined() && self.encoding.encoding().is_ascii_compatible()
        {
            if let Some(label) = self.declared_encoding(skip)? {
                match Encoding::for_label(label.as_bytes()) {
                    // a declaration readable as ASCII cannot describe UTF-16
                    Some(e) if e.is_ascii_compatible() => {
                        self.encoding = EncodingRef::XmlDetected(e);
                    }
                    Some(_) => {}
                    None => return Err(Error::UnsupportedEncoding(label)),
                }
            }
        }

        debug!("decoding input as {:?}", self.encoding);
        self.raw.drain(..skip);
        self.decoder = Some(self.encoding.encoding().new_decoder_without_bom_handling());
        Ok(())
    }

    /// Extracts the `encoding` pseudo-attribute of an XML declaration at
    /// `start`, buffering until the declaration is complete.
    fn declared_encoding(&mut self, start: usize) -> Result<Option<String>> {
        loop {
            let bytes = &self.raw[start..];
            if !bytes.starts_with(b"<?xml") {
                // not enough input to be sure yet
                if !self.eof && b"<?xml".starts_with(bytes) {
                    self.fetch()?;
                    continue;
                }
                return Ok(None);
            }
            if let Some(end) = memmem::find(bytes, b"?>") {
                return Ok(encoding_label(&bytes[..end]));
            }
            if self.eof || bytes.len() > MAX_DECLARATION_LEN {
                return Ok(None);
            }
            self.fetch()?;
        }
    }
}

/// Finds the value of the `encoding` pseudo-attribute in the raw content of
/// an XML declaration.
fn encoding_label(decl: &[u8]) -> Option<String> {
    let at = memmem::find(decl, b"encoding")?;
    let rest = &decl[at + "encoding".len()..];
    let rest = trim_start(rest).strip_prefix(b"=")?;
    let rest = trim_start(rest);
    let quote = *rest.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value = &rest[1..];
    let end = memchr::memchr(quote, value)?;
    std::str::from_utf8(&value[..end]).ok().map(str::to_string)
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// Automatic encoding detection of XML files based using the [recommended algorithm]
/// (https://www.w3.org/TR/xml11/#sec-guessing)
///
/// The algorithm suggests examine up to the first 4 bytes to determine encoding
/// according to the following table:
///
/// | Bytes       |Detected encoding
/// |-------------|------------------------------------------
/// |`FE FF ## ##`|UTF-16, big-endian
/// |`FF FE ## ##`|UTF-16, little-endian
/// |`EF BB BF`   |UTF-8
/// |-------------|------------------------------------------
/// |`00 3C 00 3F`|UTF-16 BE or ISO-10646-UCS-2 BE or similar 16-bit BE (use declared encoding to find the exact one)
/// |`3C 00 3F 00`|UTF-16 LE or ISO-10646-UCS-2 LE or similar 16-bit LE (use declared encoding to find the exact one)
/// |`3C 3F 78 6D`|UTF-8, ISO 646, ASCII, some part of ISO 8859, Shift-JIS, EUC, or any other 7-bit, 8-bit, or mixed-width encoding
/// |_Other_      |UTF-8 without an encoding declaration, or else the data stream is mislabeled
///
/// A `<` followed by a zero byte (`3C 00`, `00 3C`) is taken as UTF-16 too,
/// which covers documents without a declaration.
///
/// Returns the encoding and the length of the BOM, if one was found.
pub(crate) fn detect_encoding(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    match bytes {
        // with BOM
        _ if bytes.starts_with(&[0xFE, 0xFF]) => Some((UTF_16BE, 2)),
        _ if bytes.starts_with(&[0xFF, 0xFE]) => Some((UTF_16LE, 2)),
        _ if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) => Some((UTF_8, 3)),

        // without BOM
        _ if bytes.starts_with(&[0x00, b'<']) => Some((UTF_16BE, 0)),
        _ if bytes.starts_with(&[b'<', 0x00]) => Some((UTF_16LE, 0)),
        _ if bytes.starts_with(b"<?xm") => Some((UTF_8, 0)),

        _ => None,
    }
}
