//! Character classes and reference resolution used while scanning text and
//! attribute values.

use crate::errors::{Error, Result};

/// `Char` production of XML 1.0: characters allowed anywhere in a document.
#[inline]
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// A function to check whether the character is a whitespace (blank, new line, carriage return or tab)
#[inline]
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\r' | '\n' | '\t')
}

/// Resolves one of the five entities every XML document has.
pub(crate) fn resolve_predefined_entity(name: &str) -> Option<char> {
    let c = match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "apos" => '\'',
        "quot" => '"',
        _ => return None,
    };
    Some(c)
}

/// Converts the code point of a character reference to a character.
///
/// Surrogates, values above `U+10FFFF` and characters outside of the
/// [`Char`](is_xml_char) production are rejected.
pub(crate) fn char_from_code_point(code: u32) -> Result<char> {
    match std::char::from_u32(code) {
        Some(c) if is_xml_char(c) => Ok(c),
        _ => Err(Error::XmlCharacter),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn predefined() {
        assert_eq!(resolve_predefined_entity("lt"), Some('<'));
        assert_eq!(resolve_predefined_entity("quot"), Some('"'));
        assert_eq!(resolve_predefined_entity("entname"), None);
        assert_eq!(resolve_predefined_entity("LT"), None);
    }

    #[test]
    fn code_points() {
        assert_eq!(char_from_code_point(0x1f3).unwrap(), '\u{1f3}');
        assert_eq!(char_from_code_point(0x10ffff).unwrap(), '\u{10ffff}');
        assert!(matches!(char_from_code_point(0xfffe), Err(Error::XmlCharacter)));
        assert!(matches!(char_from_code_point(0xd800), Err(Error::XmlCharacter)));
        assert!(matches!(char_from_code_point(0), Err(Error::XmlCharacter)));
        assert!(matches!(char_from_code_point(0x110000), Err(Error::XmlCharacter)));
    }
}
