//! Error management module

use crate::name::NamespaceError;
use std::fmt;
use std::io::Error as IoError;
use std::sync::Arc;

/// The error type used by this crate.
///
/// A reader that fails with a [well-formedness](Error::is_fatal) error moves
/// to the [`ReadState::Error`] state and keeps reporting a clone of the same
/// error from every subsequent [`XmlReader::read()`] call.
///
/// [`ReadState::Error`]: crate::ReadState::Error
/// [`XmlReader::read()`]: crate::XmlReader::read
#[derive(Clone, Debug)]
pub enum Error {
    /// IO error reported by the byte source.
    ///
    /// `Arc<IoError>` instead of `IoError` since `IoError` is not `Clone`.
    Io(Arc<IoError>),
    /// The byte source has no data right now. Not a failure: retry the same
    /// call once more input is available.
    Pending,
    /// Input bytes cannot be decoded in the named encoding
    NonDecodable(&'static str),
    /// The encoding label found in the XML declaration is not known
    UnsupportedEncoding(String),
    /// Generic syntax error with a short description of what was wrong
    Syntax(&'static str),
    /// Input ended in the middle of a construct
    UnexpectedEof(String),
    /// End tag does not match the innermost open element
    ElementMatch {
        /// Expected end tag
        expected: String,
        /// Found end tag
        found: String,
    },
    /// Invalid character in a name (entity reference, DOCTYPE name)
    NameCharacter,
    /// Invalid character in a qualified name
    QNameCharacter,
    /// More than one colon in a qualified name
    QNameColon,
    /// Colon in a name that must not contain one (processing instruction target)
    NameColon,
    /// Malformed processing instruction
    Pi,
    /// `--` inside a comment
    Comment,
    /// `]]>` outside of a CDATA section
    CDataEnd,
    /// `<` inside an attribute value
    LessThan,
    /// Missing `>`
    GreaterThan,
    /// Missing or mismatched quote around an attribute value or a literal
    Quote,
    /// Missing `=` after an attribute name
    Equal,
    /// The same attribute occurs twice on one element
    DuplicateAttribute(String),
    /// Reference to an entity that is neither predefined nor declared
    UndeclaredEntity(String),
    /// Bad decimal digit in a character reference
    Digit,
    /// Bad hexadecimal digit in a character reference
    HexDigit,
    /// Missing `;` after a reference
    Semicolon,
    /// Character not allowed in XML, either literally or through a reference
    XmlCharacter,
    /// DOCTYPE found while DTD processing is [prohibited](crate::DtdProcessing::Prohibit)
    DtdProhibited,
    /// Namespace related error
    Namespace(NamespaceError),
    /// Element nesting exceeds the configured maximum depth
    MaxElementDepth,
    /// Invalid property identifier, property value or call argument
    InvalidArgument(&'static str),
    /// The heap refused an allocation
    QuotaExceeded,
}

impl Error {
    /// Returns `true` if this is the [`Error::Pending`] condition.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns `true` if the error ends processing of the current input, moving
    /// the reader to the Error state.
    ///
    /// Pending and invalid argument conditions leave the reader untouched.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Pending | Self::InvalidArgument(_))
    }
}

impl From<IoError> for Error {
    /// Creates a new `Error::Io` from the given error
    #[inline]
    fn from(error: IoError) -> Error {
        Error::Io(Arc::new(error))
    }
}

impl From<NamespaceError> for Error {
    #[inline]
    fn from(error: NamespaceError) -> Error {
        Error::Namespace(error)
    }
}

/// A specialized `Result` type where the error is hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Pending => f.write_str("input is pending, more data is required"),
            Error::NonDecodable(e) => write!(f, "malformed input, cannot decode as {}", e),
            Error::UnsupportedEncoding(e) => write!(f, "unsupported encoding '{}'", e),
            Error::Syntax(e) => write!(f, "syntax error: {}", e),
            Error::UnexpectedEof(e) => write!(f, "unexpected end of input: {}", e),
            Error::ElementMatch { expected, found } => write!(
                f,
                "expecting </{}> found </{}>",
                expected, found
            ),
            Error::NameCharacter => f.write_str("invalid character in a name"),
            Error::QNameCharacter => f.write_str("invalid character in a qualified name"),
            Error::QNameColon => f.write_str("multiple colons in a qualified name"),
            Error::NameColon => f.write_str("colon in a name that cannot contain one"),
            Error::Pi => f.write_str("malformed processing instruction"),
            Error::Comment => f.write_str("'--' is not allowed inside a comment"),
            Error::CDataEnd => f.write_str("']]>' is not allowed in text"),
            Error::LessThan => f.write_str("'<' is not allowed in an attribute value"),
            Error::GreaterThan => f.write_str("expecting '>'"),
            Error::Quote => f.write_str("missing or mismatched quote"),
            Error::Equal => f.write_str("expecting '=' after an attribute name"),
            Error::DuplicateAttribute(name) => write!(f, "duplicate attribute '{}'", name),
            Error::UndeclaredEntity(name) => write!(f, "undeclared entity '&{};'", name),
            Error::Digit => f.write_str("invalid digit in a character reference"),
            Error::HexDigit => f.write_str("invalid hexadecimal digit in a character reference"),
            Error::Semicolon => f.write_str("expecting ';' at the end of a reference"),
            Error::XmlCharacter => f.write_str("character is not allowed in XML"),
            Error::DtdProhibited => f.write_str("DOCTYPE is prohibited by the DTD processing mode"),
            Error::Namespace(e) => write!(f, "namespace error: {}", e),
            Error::MaxElementDepth => f.write_str("maximum element depth exceeded"),
            Error::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            Error::QuotaExceeded => f.write_str("heap quota exceeded"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e.as_ref()),
            Error::Namespace(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::name::NamespaceError;
    use pretty_assertions::assert_eq;
    use std::io::ErrorKind;

    #[test]
    fn pending_is_not_fatal() {
        assert!(Error::Pending.is_pending());
        assert!(!Error::Pending.is_fatal());
        assert!(!Error::InvalidArgument("depth").is_fatal());
        assert!(Error::MaxElementDepth.is_fatal());
        assert!(Error::QuotaExceeded.is_fatal());
    }

    #[test]
    fn io_errors_are_cloneable() {
        let error = Error::from(std::io::Error::new(ErrorKind::Other, "boom"));
        let copy = error.clone();
        assert_eq!(copy.to_string(), "I/O error: boom");
        assert!(std::error::Error::source(&copy).is_some());
    }

    #[test]
    fn display() {
        assert_eq!(
            Error::ElementMatch {
                expected: "a".to_string(),
                found: "b".to_string(),
            }
            .to_string(),
            "expecting </a> found </b>"
        );
        assert_eq!(
            Error::from(NamespaceError::UndeclaredPrefix("p".to_string())).to_string(),
            "namespace error: undeclared namespace prefix 'p'"
        );
    }
}
