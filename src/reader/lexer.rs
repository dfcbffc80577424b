//! Recognition of lexical constructs on top of the [`Scanner`].

use memchr::memmem;

use crate::escape::{char_from_code_point, is_whitespace, resolve_predefined_entity};
use crate::name::{is_name_char, is_name_start_char, QName};
use crate::{DtdProcessing, Error, Result};

use super::input::Input;
use super::scanner::{Position, Scanner};
use super::source::ByteSource;

/// Markup whose content is scanned separately from its opening delimiter,
/// so a node can be reported before its whole value has arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Body {
    /// `<!--...-->`
    Comment,
    /// `<![CDATA[...]]>`
    CData,
    /// `<?target ...?>`
    Pi,
}

impl Body {
    fn name(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::CData => "CDATA section",
            Self::Pi => "processing instruction",
        }
    }
}

/// An attribute as written in a tag, with references already resolved.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Attr {
    pub name: QName,
    pub value: String,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Tag {
    pub name: QName,
    pub attributes: Vec<Attr>,
    /// Position of the name
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    /// `<name attr="value">`
    StartTag(Tag),
    /// `<name attr="value"/>`
    EmptyElementTag(Tag),
    /// `</name>`
    EndTag { name: QName, position: Position },
    /// Character data containing something besides whitespace
    Text { text: String, position: Position },
    /// Character data consisting of spaces, tabs and line breaks only
    Whitespace { text: String, position: Position },
    /// Opening `<![CDATA[`, the content follows as a [`Body::CData`]
    CData { position: Position },
    /// Opening `<!--`, the content follows as a [`Body::Comment`]
    Comment { position: Position },
    /// Opening `<?target`, the content follows as a [`Body::Pi`]
    Pi { target: String, position: Position },
    /// `<!DOCTYPE name PUBLIC "..." "..." [...]>`. The external identifiers
    /// are given as `PUBLIC`/`SYSTEM` attributes.
    DocType {
        name: String,
        attributes: Vec<Attr>,
        subset: String,
        position: Position,
    },
    /// `<?xml version="1.0"?>`
    XmlDecl {
        attributes: Vec<Attr>,
        position: Position,
    },
    Eof,
}

/// The tokenizer.
///
/// [`next_token`](Self::next_token) either returns a complete token or, when
/// the source goes pending in the middle of one, rewinds to where the token
/// began and returns [`Error::Pending`]. Bodies of comments, CDATA sections
/// and processing instructions are read separately with
/// [`body_step`](Self::body_step), which keeps everything it consumed.
pub(crate) struct Lexer<R> {
    scanner: Scanner<R>,
    /// No token was produced yet, so an XML declaration is allowed
    at_start: bool,
    token_start: Position,
}

impl<R> Lexer<R> {
    pub fn new(input: Input<R>) -> Self {
        Self {
            scanner: Scanner::new(input),
            at_start: true,
            token_start: Position::default(),
        }
    }

    #[inline]
    pub fn input(&self) -> &Input<R> {
        self.scanner.input()
    }

    #[inline]
    pub fn input_mut(&mut self) -> &mut Input<R> {
        self.scanner.input_mut()
    }

    pub fn into_input(self) -> Input<R> {
        self.scanner.into_input()
    }

    /// Where the last token began
    #[inline]
    pub fn token_start(&self) -> Position {
        self.token_start
    }

    /// Position of the next character
    #[inline]
    pub fn position(&self) -> Position {
        self.scanner.position()
    }
}

impl<R: ByteSource> Lexer<R> {
    pub fn next_token(&mut self, dtd: DtdProcessing) -> Result<Token> {
        self.scanner.commit();
        let mark = self.scanner.mark();
        self.token_start = self.scanner.position();
        match self.scan_token(dtd) {
            Ok(token) => {
                self.at_start = false;
                Ok(token)
            }
            Err(Error::Pending) => {
                self.scanner.reset(mark);
                Err(Error::Pending)
            }
            Err(e) => Err(e),
        }
    }

    fn scan_token(&mut self, dtd: DtdProcessing) -> Result<Token> {
        let position = self.scanner.position();
        match self.scanner.peek()? {
            None => Ok(Token::Eof),
            Some('<') => {
                self.scanner.advance(1);
                self.scan_markup(dtd)
            }
            Some(_) => self.scan_text(position),
        }
    }

    /// Markup after the `<`
    fn scan_markup(&mut self, dtd: DtdProcessing) -> Result<Token> {
        match self.scanner.peek()? {
            Some('/') => {
                self.scanner.advance(1);
                let position = self.scanner.position();
                let name = self.scan_qname()?;
                self.scanner.skip_whitespace()?;
                if !self.scanner.eat('>')? {
                    return Err(Error::GreaterThan);
                }
                Ok(Token::EndTag { name, position })
            }
            Some('?') => {
                self.scanner.advance(1);
                self.scan_pi()
            }
            Some('!') => {
                self.scanner.advance(1);
                if self.scanner.starts_with("--")? {
                    self.scanner.advance(2);
                    Ok(Token::Comment {
                        position: self.scanner.position(),
                    })
                } else if self.scanner.starts_with("[CDATA[")? {
                    self.scanner.advance(7);
                    Ok(Token::CData {
                        position: self.scanner.position(),
                    })
                } else if self.scanner.starts_with("DOCTYPE")? {
                    if dtd == DtdProcessing::Prohibit {
                        return Err(Error::DtdProhibited);
                    }
                    self.scanner.advance(7);
                    self.scan_doctype()
                } else {
                    Err(Error::Syntax("unknown markup declaration"))
                }
            }
            _ => self.scan_start_tag(),
        }
    }

    fn scan_start_tag(&mut self) -> Result<Token> {
        let position = self.scanner.position();
        let name = self.scan_qname()?;
        match self.scanner.peek()? {
            Some(c) if is_whitespace(c) || c == '>' || c == '/' => {}
            Some(_) => return Err(Error::QNameCharacter),
            None => return Err(Error::UnexpectedEof(format!("<{}", name))),
        }
        let (attributes, empty) = self.scan_attributes(false, false)?;
        let tag = Tag {
            name,
            attributes,
            position,
        };
        Ok(if empty {
            Token::EmptyElementTag(tag)
        } else {
            Token::StartTag(tag)
        })
    }

    /// Scans attributes up to and including the end of a tag (`>` or `/>`) or
    /// of an XML declaration (`?>`). Returns the attributes and whether the
    /// tag was self-closing.
    fn scan_attributes(&mut self, decl: bool, separated: bool) -> Result<(Vec<Attr>, bool)> {
        let mut attributes: Vec<Attr> = Vec::new();
        let mut after_name = separated;
        loop {
            let separated = self.scanner.skip_whitespace()? || after_name;
            after_name = false;
            match self.scanner.peek()? {
                None if decl => return Err(Error::UnexpectedEof("<?xml".to_string())),
                None => return Err(Error::UnexpectedEof("start tag".to_string())),
                Some('?') if decl => {
                    if !self.scanner.starts_with("?>")? {
                        return Err(Error::Syntax("malformed XML declaration"));
                    }
                    self.scanner.advance(2);
                    return Ok((attributes, false));
                }
                Some('>') if !decl => {
                    self.scanner.advance(1);
                    return Ok((attributes, false));
                }
                Some('/') if !decl => {
                    self.scanner.advance(1);
                    if !self.scanner.eat('>')? {
                        return Err(Error::GreaterThan);
                    }
                    return Ok((attributes, true));
                }
                Some(_) if !separated => {
                    return Err(Error::Syntax("missing whitespace before an attribute"))
                }
                Some(_) => {
                    let attr = self.scan_attribute()?;
                    if attributes.iter().any(|a| a.name == attr.name) {
                        return Err(Error::DuplicateAttribute(attr.name.to_string()));
                    }
                    attributes.push(attr);
                }
            }
        }
    }

    fn scan_attribute(&mut self) -> Result<Attr> {
        let position = self.scanner.position();
        let name = self.scan_qname()?;
        self.scanner.skip_whitespace()?;
        if !self.scanner.eat('=')? {
            return Err(Error::Equal);
        }
        self.scanner.skip_whitespace()?;
        let value = self.scan_attribute_value()?;
        Ok(Attr {
            name,
            value,
            position,
        })
    }

    /// Reads a quoted attribute value. Each literal whitespace character,
    /// including a normalized line break, becomes one space.
    fn scan_attribute_value(&mut self) -> Result<String> {
        let quote = match self.scanner.peek()? {
            Some(q) if q == '"' || q == '\'' => q,
            _ => return Err(Error::Quote),
        };
        self.scanner.advance(1);
        let mut value = String::new();
        loop {
            match self.scanner.next_char()? {
                None => return Err(Error::UnexpectedEof("attribute value".to_string())),
                Some(c) if c == quote => return Ok(value),
                Some('<') => return Err(Error::LessThan),
                Some('&') => value.push(self.scan_reference()?),
                Some(c) if is_whitespace(c) => value.push(' '),
                Some(c) => value.push(c),
            }
        }
    }

    /// Resolves a reference after its `&`.
    fn scan_reference(&mut self) -> Result<char> {
        if self.scanner.eat('#')? {
            let radix = if self.scanner.eat('x')? { 16 } else { 10 };
            let mut code: u32 = 0;
            let mut digits = 0;
            while let Some(d) = self.scanner.peek()?.and_then(|c| c.to_digit(radix)) {
                self.scanner.advance(1);
                code = code.saturating_mul(radix).saturating_add(d);
                digits += 1;
            }
            if digits == 0 {
                return Err(if radix == 16 {
                    Error::HexDigit
                } else {
                    Error::Digit
                });
            }
            if !self.scanner.eat(';')? {
                return Err(Error::Semicolon);
            }
            return char_from_code_point(code);
        }
        let name = self.scan_ncname(Error::NameCharacter, Error::NameColon)?;
        if !self.scanner.eat(';')? {
            return Err(Error::Semicolon);
        }
        resolve_predefined_entity(&name).ok_or(Error::UndeclaredEntity(name))
    }

    /// Scans a qualified name: an NCName, optionally prefixed with another
    /// NCName and a colon.
    fn scan_qname(&mut self) -> Result<QName> {
        match self.scanner.peek()? {
            Some(c) if is_name_start_char(c) => {}
            Some(_) => return Err(Error::QNameCharacter),
            None => return Err(Error::UnexpectedEof("name".to_string())),
        }
        let mut raw = String::new();
        let mut colon = None;
        while let Some(c) = self.scanner.peek()? {
            if c == ':' {
                if colon.is_some() {
                    return Err(Error::QNameColon);
                }
                self.scanner.advance(1);
                match self.scanner.peek()? {
                    Some(c) if is_name_start_char(c) => {}
                    _ => return Err(Error::QNameCharacter),
                }
                colon = Some(raw.len());
                raw.push(':');
            } else if is_name_char(c) {
                self.scanner.advance(c.len_utf8());
                raw.push(c);
            } else {
                break;
            }
        }
        Ok(QName::new(raw, colon))
    }

    /// Scans a name that may not contain colons, reporting `bad_start` for an
    /// invalid first character and `colon` for a colon inside it.
    fn scan_ncname(&mut self, bad_start: Error, colon: Error) -> Result<String> {
        match self.scanner.peek()? {
            Some(c) if is_name_start_char(c) => {}
            Some(_) => return Err(bad_start),
            None => return Err(Error::UnexpectedEof("name".to_string())),
        }
        let mut name = String::new();
        while let Some(c) = self.scanner.peek()? {
            if c == ':' {
                return Err(colon);
            }
            if !is_name_char(c) {
                break;
            }
            self.scanner.advance(c.len_utf8());
            name.push(c);
        }
        Ok(name)
    }

    /// Processing instruction or XML declaration after the `<?`
    fn scan_pi(&mut self) -> Result<Token> {
        let position = self.scanner.position();
        let target = self.scan_ncname(Error::Pi, Error::NameColon)?;
        let separated = self.scanner.skip_whitespace()?;
        if !separated && !self.scanner.starts_with("?>")? {
            return Err(Error::Pi);
        }
        if target == "xml" && self.at_start {
            let (attributes, _) = self.scan_attributes(true, separated)?;
            check_declaration(&attributes)?;
            return Ok(Token::XmlDecl {
                attributes,
                position,
            });
        }
        if target.eq_ignore_ascii_case("xml") {
            return Err(Error::Pi);
        }
        Ok(Token::Pi { target, position })
    }

    /// DOCTYPE after the `<!DOCTYPE` keyword
    fn scan_doctype(&mut self) -> Result<Token> {
        if !self.scanner.skip_whitespace()? {
            return Err(Error::Syntax("missing whitespace after DOCTYPE"));
        }
        let position = self.scanner.position();
        let name = self.scan_qname()?.to_string();
        let mut attributes = Vec::new();
        if self.scanner.skip_whitespace()? {
            let public = self.scanner.starts_with("PUBLIC")?;
            if public || self.scanner.starts_with("SYSTEM")? {
                let keyword = self.scanner.position();
                self.scanner.advance(6);
                if !self.scanner.skip_whitespace()? {
                    return Err(Error::Syntax("missing whitespace after an external ID keyword"));
                }
                if public {
                    attributes.push(Attr {
                        name: QName::local("PUBLIC"),
                        value: self.scan_literal()?,
                        position: keyword,
                    });
                    if !self.scanner.skip_whitespace()? {
                        return Err(Error::Syntax("missing system literal"));
                    }
                }
                let position = if public {
                    self.scanner.position()
                } else {
                    keyword
                };
                attributes.push(Attr {
                    name: QName::local("SYSTEM"),
                    value: self.scan_literal()?,
                    position,
                });
                self.scanner.skip_whitespace()?;
            }
        }
        let mut subset = String::new();
        if self.scanner.eat('[')? {
            self.scan_internal_subset(&mut subset)?;
            self.scanner.skip_whitespace()?;
        }
        if !self.scanner.eat('>')? {
            return Err(Error::GreaterThan);
        }
        Ok(Token::DocType {
            name,
            attributes,
            subset,
            position,
        })
    }

    /// A quoted system or public literal. References are not resolved.
    fn scan_literal(&mut self) -> Result<String> {
        let quote = match self.scanner.peek()? {
            Some(q) if q == '"' || q == '\'' => q,
            _ => return Err(Error::Quote),
        };
        self.scanner.advance(1);
        let mut literal = String::new();
        loop {
            match self.scanner.next_char()? {
                None => return Err(Error::UnexpectedEof("DOCTYPE literal".to_string())),
                Some(c) if c == quote => return Ok(literal),
                Some(c) => literal.push(c),
            }
        }
    }

    /// Copies the internal subset up to its closing `]`, which is consumed
    /// but not copied. Brackets inside literals and comments do not count.
    fn scan_internal_subset(&mut self, out: &mut String) -> Result<()> {
        let mut quote = None;
        let mut comment = false;
        loop {
            if comment {
                if self.scanner.starts_with("-->")? {
                    self.scanner.advance(3);
                    out.push_str("-->");
                    comment = false;
                    continue;
                }
            } else if quote.is_none() && self.scanner.starts_with("<!--")? {
                self.scanner.advance(4);
                out.push_str("<!--");
                comment = true;
                continue;
            }
            let c = match self.scanner.next_char()? {
                Some(c) => c,
                None => return Err(Error::UnexpectedEof("DOCTYPE internal subset".to_string())),
            };
            match c {
                ']' if !comment && quote.is_none() => return Ok(()),
                '"' | '\'' if !comment && quote.is_none() => quote = Some(c),
                c if Some(c) == quote => quote = None,
                _ => {}
            }
            out.push(c);
        }
    }

    /// Character data up to the next `<` or the end of input
    fn scan_text(&mut self, position: Position) -> Result<Token> {
        let mut text = String::new();
        let mut whitespace = true;
        loop {
            match self.scanner.peek()? {
                None | Some('<') => break,
                Some('&') => {
                    self.scanner.advance(1);
                    text.push(self.scan_reference()?);
                    whitespace = false;
                }
                Some(']') if self.scanner.starts_with("]]>")? => return Err(Error::CDataEnd),
                Some(_) => {
                    if let Some(c) = self.scanner.next_char()? {
                        whitespace &= is_whitespace(c);
                        text.push(c);
                    }
                }
            }
        }
        Ok(if whitespace {
            Token::Whitespace { text, position }
        } else {
            Token::Text { text, position }
        })
    }

    /// Appends the part of a body that is already buffered to `out`.
    ///
    /// Returns `Ok(true)` once the closing delimiter was consumed. Otherwise
    /// everything that cannot be the start of the delimiter was consumed and
    /// [`body_fill`](Self::body_fill) must be called before the next step.
    pub fn body_step(&mut self, body: Body, out: &mut String) -> Result<bool> {
        let rest = self.scanner.rest();
        let bytes = rest.as_bytes();
        let (len, end) = match body {
            Body::Comment => match memmem::find(bytes, b"--") {
                Some(i) if i + 2 < bytes.len() => {
                    if bytes[i + 2] != b'>' {
                        return Err(Error::Comment);
                    }
                    (i, Some(3))
                }
                Some(i) => (i, None),
                None => (safe_len(rest, 1), None),
            },
            Body::CData => match memmem::find(bytes, b"]]>") {
                Some(i) => (i, Some(3)),
                None => (safe_len(rest, 2), None),
            },
            Body::Pi => match memmem::find(bytes, b"?>") {
                Some(i) => (i, Some(2)),
                None => (safe_len(rest, 1), None),
            },
        };
        self.scanner.take(len, out)?;
        match end {
            Some(n) => {
                self.scanner.advance(n);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Buffers more input for the next [`body_step`](Self::body_step).
    pub fn body_fill(&mut self, body: Body) -> Result<()> {
        if self.scanner.fill()? {
            Ok(())
        } else {
            Err(Error::UnexpectedEof(body.name().to_string()))
        }
    }

    /// Reads the rest of a body into `out`.
    #[cfg(test)]
    pub fn read_body(&mut self, body: Body, out: &mut String) -> Result<()> {
        while !self.body_step(body, out)? {
            self.body_fill(body)?;
        }
        Ok(())
    }
}

/// Length of the prefix of `rest` that cannot contain the beginning of a
/// delimiter: everything except the last `keep` bytes, cut at a character
/// boundary and never ending with a `\r` that may start a `\r\n` pair.
fn safe_len(rest: &str, keep: usize) -> usize {
    let mut len = rest.len().saturating_sub(keep);
    while !rest.is_char_boundary(len) {
        len -= 1;
    }
    if rest[..len].ends_with('\r') {
        len -= 1;
    }
    len
}

/// Checks names and order of the XML declaration pseudo-attributes
fn check_declaration(attributes: &[Attr]) -> Result<()> {
    const ORDER: [&str; 3] = ["version", "encoding", "standalone"];

    let mut next = 0;
    for attr in attributes {
        let index = ORDER
            .iter()
            .position(|n| *n == attr.name.as_str())
            .ok_or(Error::Syntax("unknown XML declaration attribute"))?;
        if index < next {
            return Err(Error::Syntax("XML declaration attributes out of order"));
        }
        next = index + 1;
    }
    match attributes.first() {
        Some(attr) if attr.name.as_str() == "version" => Ok(()),
        _ => Err(Error::Syntax("XML declaration without version")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lexer(text: &str) -> Lexer<&[u8]> {
        Lexer::new(Input::new(text.as_bytes(), None))
    }

    fn first(text: &str) -> Result<Token> {
        lexer(text).next_token(DtdProcessing::Parse)
    }

    fn pos(line: u32, column: u32) -> Position {
        Position { line, column }
    }

    fn name(raw: &str) -> QName {
        QName::new(raw.to_string(), raw.find(':'))
    }

    mod tags {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn start() {
            assert_eq!(
                first("<a:b \r \t\nattr1='1' x='&lt;'>").unwrap(),
                Token::StartTag(Tag {
                    name: name("a:b"),
                    attributes: vec![
                        Attr {
                            name: name("attr1"),
                            value: "1".to_string(),
                            position: pos(2, 1),
                        },
                        Attr {
                            name: name("x"),
                            value: "<".to_string(),
                            position: pos(2, 11),
                        },
                    ],
                    position: pos(1, 2),
                })
            );
        }

        #[test]
        fn empty() {
            assert_eq!(
                first("<a />").unwrap(),
                Token::EmptyElementTag(Tag {
                    name: name("a"),
                    attributes: vec![],
                    position: pos(1, 2),
                })
            );
        }

        #[test]
        fn end() {
            assert_eq!(
                first("</c:a >").unwrap(),
                Token::EndTag {
                    name: name("c:a"),
                    position: pos(1, 3),
                }
            );
        }

        #[test]
        fn bad_names() {
            assert!(matches!(first("<:a/>"), Err(Error::QNameCharacter)));
            assert!(matches!(first("< a/>"), Err(Error::QNameCharacter)));
            assert!(matches!(first("<a:b:c />"), Err(Error::QNameColon)));
            assert!(matches!(first("<:b:c />"), Err(Error::QNameCharacter)));
            assert!(matches!(first("<a:/>"), Err(Error::QNameCharacter)));
            assert!(matches!(first("<a#/>"), Err(Error::QNameCharacter)));
        }

        #[test]
        fn bad_attributes() {
            assert!(matches!(first("<a b=c/>"), Err(Error::Quote)));
            assert!(matches!(first("<a b/>"), Err(Error::Equal)));
            assert!(matches!(first("<a b='<'/>"), Err(Error::LessThan)));
            assert!(matches!(first("<a b='1'c='2'/>"), Err(Error::Syntax(_))));
            assert!(matches!(
                first("<a b='1' b='2'/>"),
                Err(Error::DuplicateAttribute(ref n)) if n == "b"
            ));
            assert!(matches!(first("<a b='1'"), Err(Error::UnexpectedEof(_))));
        }
    }

    /// Line breaks and whitespace inside attribute values become spaces
    #[test]
    fn attribute_value_normalization() {
        let cases = [
            ("<a attr1=\"\r\n \r \n \t\n\r\"/>", "         "),
            ("<a attr1=\"\r\n\tval\n\"/>", "  val "),
            ("<a attr1=\"val&#32;\"/>", "val "),
            ("<a attr1=\"val&#x20;\"/>", "val "),
            ("<a attr1=\"&lt;&gt;&amp;&apos;&quot;\"/>", "<>&'\""),
            ("<a attr1='a\"ttrvalue'/>", "a\"ttrvalue"),
        ];
        for (xml, value) in cases.iter() {
            match first(xml).unwrap() {
                Token::EmptyElementTag(tag) => assert_eq!(tag.attributes[0].value, *value),
                token => panic!("unexpected token {:?}", token),
            }
        }
    }

    #[test]
    fn references() {
        assert!(matches!(
            first("<a attr1=\"&entname;\"/>"),
            Err(Error::UndeclaredEntity(ref n)) if n == "entname"
        ));
        assert!(matches!(first("<a attr1=\"&entname\"/>"), Err(Error::Semicolon)));
        assert!(matches!(first("<a attr1=\"val&#xfffe;\"/>"), Err(Error::XmlCharacter)));
        assert!(matches!(first("<a attr1=\"val &#a;\"/>"), Err(Error::Digit)));
        assert!(matches!(first("<a attr1=\"val &#12a;\"/>"), Err(Error::Semicolon)));
        assert!(matches!(first("<a attr1=\"val &#x12g;\"/>"), Err(Error::Semicolon)));
        assert!(matches!(first("<a attr1=\"val &#xg;\"/>"), Err(Error::HexDigit)));
        assert_eq!(
            first("&#x1f3;&#x103;&gt;").unwrap(),
            Token::Text {
                text: "\u{1f3}\u{103}>".to_string(),
                position: pos(1, 1),
            }
        );
    }

    mod text {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn whitespace() {
            assert_eq!(
                first(" \r\n\t<a/>").unwrap(),
                Token::Whitespace {
                    text: " \n\t".to_string(),
                    position: pos(1, 1),
                }
            );
        }

        #[test]
        fn newlines() {
            assert_eq!(
                first("\r \r\r\n \n\n text<").unwrap(),
                Token::Text {
                    text: "\n \n\n \n\n text".to_string(),
                    position: pos(1, 1),
                }
            );
        }

        #[test]
        fn cdata_end() {
            assert!(matches!(first("text ]]> text"), Err(Error::CDataEnd)));
            assert_eq!(
                first("a]]b").unwrap(),
                Token::Text {
                    text: "a]]b".to_string(),
                    position: pos(1, 1),
                }
            );
        }
    }

    mod bodies {
        use super::*;
        use pretty_assertions::assert_eq;

        fn body(text: &str, body: Body) -> Result<String> {
            let mut lexer = lexer(text);
            lexer.next_token(DtdProcessing::Parse)?;
            let mut out = String::new();
            lexer.read_body(body, &mut out)?;
            Ok(out)
        }

        #[test]
        fn comment() {
            assert_eq!(body("<!-- comment -->", Body::Comment).unwrap(), " comment ");
            assert_eq!(body("<!---->", Body::Comment).unwrap(), "");
            assert_eq!(body("<!-- - comment-->", Body::Comment).unwrap(), " - comment");
            assert!(matches!(body("<!-- -- comment-->", Body::Comment), Err(Error::Comment)));
            assert!(matches!(body("<!-- comment--->", Body::Comment), Err(Error::Comment)));
            assert!(matches!(
                body("<!-- comment", Body::Comment),
                Err(Error::UnexpectedEof(_))
            ));
        }

        #[test]
        fn cdata() {
            assert_eq!(body("<![CDATA[ ]]data ]]>", Body::CData).unwrap(), " ]]data ");
            assert_eq!(
                body("<![CDATA[<![CDATA[ data ]]]]>", Body::CData).unwrap(),
                "<![CDATA[ data ]]"
            );
            assert_eq!(
                body("<![CDATA[\r\r \n\r \r \n\n ]]>", Body::CData).unwrap(),
                "\n\n \n\n \n \n\n "
            );
        }

        #[test]
        fn pi() {
            let mut lexer = lexer("<?pi    data  ?>");
            assert_eq!(
                lexer.next_token(DtdProcessing::Parse).unwrap(),
                Token::Pi {
                    target: "pi".to_string(),
                    position: pos(1, 3),
                }
            );
            let mut out = String::new();
            lexer.read_body(Body::Pi, &mut out).unwrap();
            assert_eq!(out, "data  ");
        }
    }

    #[test]
    fn bad_pis() {
        assert!(matches!(first("<?pi:pi?>"), Err(Error::NameColon)));
        assert!(matches!(first("<?:pi ?>"), Err(Error::Pi)));
        assert!(matches!(first("<?-pi ?>"), Err(Error::Pi)));
        assert!(matches!(first("<?pi#?>"), Err(Error::Pi)));
    }

    mod declaration {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn full() {
            match first("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>").unwrap() {
                Token::XmlDecl {
                    attributes,
                    position,
                } => {
                    assert_eq!(position, pos(1, 3));
                    let names: Vec<_> = attributes.iter().map(|a| a.name.as_str()).collect();
                    assert_eq!(names, ["version", "encoding", "standalone"]);
                    assert_eq!(attributes[0].position, pos(1, 7));
                }
                token => panic!("unexpected token {:?}", token),
            }
        }

        #[test]
        fn invalid() {
            assert!(matches!(first("<?xml encoding='UTF-8'?>"), Err(Error::Syntax(_))));
            assert!(matches!(
                first("<?xml version='1.0' standalone='yes' encoding='UTF-8'?>"),
                Err(Error::Syntax(_))
            ));
            assert!(matches!(
                first("<?xml version='1.0'encoding='UTF-8'?>"),
                Err(Error::Syntax(_))
            ));
        }

        /// Only the very first construct may be a declaration
        #[test]
        fn not_at_start() {
            let mut lexer = lexer(" <?xml version='1.0'?>");
            lexer.next_token(DtdProcessing::Parse).unwrap();
            assert!(matches!(lexer.next_token(DtdProcessing::Parse), Err(Error::Pi)));
        }
    }

    mod doctype {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn public() {
            match first("<!DOCTYPE testdtd PUBLIC \"pubid\" \"externalid uri\" >").unwrap() {
                Token::DocType {
                    name,
                    attributes,
                    subset,
                    position,
                } => {
                    assert_eq!(name, "testdtd");
                    assert_eq!(position, pos(1, 11));
                    assert_eq!(subset, "");
                    let pairs: Vec<_> = attributes
                        .iter()
                        .map(|a| (a.name.as_str(), a.value.as_str()))
                        .collect();
                    assert_eq!(pairs, [("PUBLIC", "pubid"), ("SYSTEM", "externalid uri")]);
                }
                token => panic!("unexpected token {:?}", token),
            }
        }

        #[test]
        fn internal_subset() {
            match first("<!DOCTYPE a SYSTEM 'a.dtd' [<!ENTITY e ']'><!-- ] -->]>").unwrap() {
                Token::DocType {
                    attributes, subset, ..
                } => {
                    assert_eq!(attributes.len(), 1);
                    assert_eq!(attributes[0].value, "a.dtd");
                    assert_eq!(subset, "<!ENTITY e ']'><!-- ] -->");
                }
                token => panic!("unexpected token {:?}", token),
            }
        }

        #[test]
        fn prohibited() {
            assert!(matches!(
                lexer("<!DOCTYPE a>").next_token(DtdProcessing::Prohibit),
                Err(Error::DtdProhibited)
            ));
        }
    }
}
