//! Module for handling names according to the W3C [Namespaces in XML 1.0][spec]
//! specification
//!
//! [spec]: https://www.w3.org/TR/xml-names/

use std::fmt;

/// The namespace the `xml` prefix is permanently bound to
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// The namespace of `xmlns` and `xmlns:*` attributes
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Some namespace was invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// Specified namespace prefix is not declared in any enclosing element
    UndeclaredPrefix(String),
    /// Attempts to bind the `xml` prefix to something other than `http://www.w3.org/XML/1998/namespace`.
    ///
    /// Contains the namespace to which `xml` tried to be bound.
    InvalidXmlPrefixBind(String),
    /// Attempts to bind the `xmlns` prefix.
    ///
    /// Contains the namespace to which `xmlns` tried to be bound.
    InvalidXmlnsPrefixBind(String),
    /// Attempts to bind some prefix (except `xml`) to `http://www.w3.org/XML/1998/namespace`.
    ///
    /// Contains the prefix that is tried to be bound.
    InvalidPrefixForXml(String),
    /// Attempts to bind some prefix to `http://www.w3.org/2000/xmlns/`.
    ///
    /// Contains the prefix that is tried to be bound.
    InvalidPrefixForXmlns(String),
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UndeclaredPrefix(prefix) => {
                write!(f, "undeclared namespace prefix '{}'", prefix)
            }
            Self::InvalidXmlPrefixBind(namespace) => {
                write!(f, "the namespace prefix 'xml' cannot be bound to '{}'", namespace)
            }
            Self::InvalidXmlnsPrefixBind(namespace) => {
                write!(f, "the namespace prefix 'xmlns' cannot be bound to '{}'", namespace)
            }
            Self::InvalidPrefixForXml(prefix) => write!(
                f,
                "the namespace prefix '{}' cannot be bound to '{}'",
                prefix, XML_NAMESPACE
            ),
            Self::InvalidPrefixForXmlns(prefix) => write!(
                f,
                "the namespace prefix '{}' cannot be bound to '{}'",
                prefix, XMLNS_NAMESPACE
            ),
        }
    }
}

impl std::error::Error for NamespaceError {}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A [qualified name] of an element or an attribute, including an optional
/// namespace prefix and a local name.
///
/// The name owns its text; the position of the colon is remembered so prefix
/// and local name are plain slices.
///
/// [qualified name]: https://www.w3.org/TR/xml-names/#dt-qualname
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct QName {
    raw: String,
    colon: Option<usize>,
}

impl QName {
    /// Builds a name from already validated text. `colon` is the byte index of
    /// the prefix separator, if any.
    pub fn new(raw: String, colon: Option<usize>) -> Self {
        debug_assert!(colon.map_or(true, |i| raw.as_bytes()[i] == b':'));
        Self { raw, colon }
    }

    /// A name without a prefix
    pub fn local(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            colon: None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the prefix, or an empty string for unprefixed names
    #[inline]
    pub fn prefix(&self) -> &str {
        self.colon.map_or("", |i| &self.raw[..i])
    }

    #[inline]
    pub fn local_name(&self) -> &str {
        self.colon.map_or(&self.raw, |i| &self.raw[i + 1..])
    }

    /// Checks if this name is a namespace declaration and returns the
    /// declared prefix (empty for the default namespace).
    ///
    /// ```plain
    /// xmlns="..."   -> Some("")
    /// xmlns:p="..." -> Some("p")
    /// p:xmlns="..." -> None
    /// ```
    pub fn as_namespace_binding(&self) -> Option<&str> {
        match self.colon {
            None if self.raw == "xmlns" => Some(""),
            Some(_) if self.prefix() == "xmlns" => Some(self.local_name()),
            _ => None,
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `NameStartChar` production of XML 1.0 (Fifth Edition), without the colon.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// `NameChar` production of XML 1.0 (Fifth Edition), without the colon.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
struct NamespaceBinding {
    /// Empty for the default namespace
    prefix: String,
    /// Empty when the declaration removes a binding (`xmlns=""`)
    uri: String,
}

/// A namespace scope stack.
///
/// Holds all bindings introduced by currently open elements, innermost last.
/// Each element frame remembers how many bindings it added and gives them
/// back with [`NamespaceResolver::unbind`] when it closes, which uncovers any
/// shadowed outer binding.
#[derive(Debug, Default, Clone)]
pub(crate) struct NamespaceResolver {
    bindings: Vec<NamespaceBinding>,
}

impl NamespaceResolver {
    /// Declares `prefix` (empty for the default namespace) in the innermost
    /// scope.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> Result<(), NamespaceError> {
        match prefix {
            "xml" if uri != XML_NAMESPACE => {
                return Err(NamespaceError::InvalidXmlPrefixBind(uri.to_string()))
            }
            "xml" => {}
            "xmlns" => return Err(NamespaceError::InvalidXmlnsPrefixBind(uri.to_string())),
            _ if uri == XML_NAMESPACE => {
                return Err(NamespaceError::InvalidPrefixForXml(prefix.to_string()))
            }
            _ if uri == XMLNS_NAMESPACE => {
                return Err(NamespaceError::InvalidPrefixForXmlns(prefix.to_string()))
            }
            _ => {}
        }
        self.bindings.push(NamespaceBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    /// Removes the `count` most recent bindings.
    pub fn unbind(&mut self, count: usize) {
        let len = self.bindings.len().saturating_sub(count);
        self.bindings.truncate(len);
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Resolves the namespace of an element name. Unprefixed names take the
    /// nearest default namespace.
    pub fn resolve_element(&self, name: &QName) -> Result<&str, NamespaceError> {
        match name.prefix() {
            "" => Ok(self.find("").unwrap_or("")),
            prefix => self.resolve_prefix(prefix),
        }
    }

    /// Resolves the namespace of an attribute name. Unprefixed attributes
    /// never inherit the default namespace.
    pub fn resolve_attribute(&self, name: &QName) -> Result<&str, NamespaceError> {
        match name.prefix() {
            "" if name.local_name() == "xmlns" => Ok(XMLNS_NAMESPACE),
            "" => Ok(""),
            "xmlns" => Ok(XMLNS_NAMESPACE),
            prefix => self.resolve_prefix(prefix),
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<&str, NamespaceError> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE);
        }
        match self.find(prefix) {
            Some(uri) if !uri.is_empty() => Ok(uri),
            _ => Err(NamespaceError::UndeclaredPrefix(prefix.to_string())),
        }
    }

    #[inline]
    fn find(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(raw: &str) -> QName {
        QName::new(raw.to_string(), raw.find(':'))
    }

    mod qname {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn split() {
            let n = name("r:a");
            assert_eq!(n.prefix(), "r");
            assert_eq!(n.local_name(), "a");
            assert_eq!(n.as_str(), "r:a");

            let n = name("a");
            assert_eq!(n.prefix(), "");
            assert_eq!(n.local_name(), "a");
        }

        #[test]
        fn namespace_binding() {
            assert_eq!(name("xmlns").as_namespace_binding(), Some(""));
            assert_eq!(name("xmlns:r").as_namespace_binding(), Some("r"));
            assert_eq!(name("r:xmlns").as_namespace_binding(), None);
            assert_eq!(name("xmlnsx").as_namespace_binding(), None);
        }
    }

    mod resolver {
        use super::*;
        use pretty_assertions::assert_eq;

        /// Declarations are scoped and inner bindings shadow outer ones
        #[test]
        fn scoping() {
            let mut resolver = NamespaceResolver::default();
            resolver.bind("", "defns a").unwrap();
            resolver.bind("r", "ns r").unwrap();
            assert_eq!(resolver.resolve_element(&name("r:a")), Ok("ns r"));
            assert_eq!(resolver.resolve_element(&name("b")), Ok("defns a"));

            resolver.bind("", "defns b").unwrap();
            assert_eq!(resolver.resolve_element(&name("b")), Ok("defns b"));
            resolver.unbind(1);
            assert_eq!(resolver.resolve_element(&name("b")), Ok("defns a"));
            resolver.unbind(2);
            assert_eq!(resolver.resolve_element(&name("b")), Ok(""));
        }

        #[test]
        fn attributes_ignore_default_namespace() {
            let mut resolver = NamespaceResolver::default();
            resolver.bind("", "defns").unwrap();
            assert_eq!(resolver.resolve_attribute(&name("attr")), Ok(""));
            assert_eq!(resolver.resolve_attribute(&name("xmlns")), Ok(XMLNS_NAMESPACE));
            assert_eq!(resolver.resolve_attribute(&name("xmlns:c")), Ok(XMLNS_NAMESPACE));
            assert_eq!(resolver.resolve_attribute(&name("xml:a")), Ok(XML_NAMESPACE));
        }

        #[test]
        fn undeclared() {
            let mut resolver = NamespaceResolver::default();
            assert_eq!(
                resolver.resolve_element(&name("a:b")),
                Err(NamespaceError::UndeclaredPrefix("a".to_string()))
            );
            resolver.bind("a", "").unwrap();
            assert_eq!(
                resolver.resolve_attribute(&name("a:b")),
                Err(NamespaceError::UndeclaredPrefix("a".to_string()))
            );
        }

        #[test]
        fn reserved_prefixes() {
            let mut resolver = NamespaceResolver::default();
            assert_eq!(resolver.bind("xml", XML_NAMESPACE), Ok(()));
            assert_eq!(
                resolver.bind("xml", "other"),
                Err(NamespaceError::InvalidXmlPrefixBind("other".to_string()))
            );
            assert_eq!(
                resolver.bind("xmlns", XMLNS_NAMESPACE),
                Err(NamespaceError::InvalidXmlnsPrefixBind(XMLNS_NAMESPACE.to_string()))
            );
            assert_eq!(
                resolver.bind("p", XML_NAMESPACE),
                Err(NamespaceError::InvalidPrefixForXml("p".to_string()))
            );
            assert_eq!(
                resolver.bind("", XMLNS_NAMESPACE),
                Err(NamespaceError::InvalidPrefixForXmlns("".to_string()))
            );
        }
    }

    #[test]
    fn name_chars() {
        assert!(is_name_start_char('a'));
        assert!(is_name_start_char('_'));
        assert!(!is_name_start_char(':'));
        assert!(!is_name_start_char('-'));
        assert!(!is_name_start_char('1'));
        assert!(is_name_char('-'));
        assert!(is_name_char('1'));
        assert!(is_name_char('\u{B7}'));
        assert!(!is_name_char(' '));
    }
}
