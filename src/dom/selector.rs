//! CSS selector subset used by the in-memory page
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute selectors with
//! `= *= ^= $= ~=` and the `i` flag, descendant and child combinators, and comma lists.
//! Pseudo-classes are rejected so callers see them as invalid selectors.

use std::fmt;

/// Read access to an element for matching purposes
pub trait Matchable: Copy {
    /// Lowercase tag name
    fn tag(&self) -> &str;
    /// Attribute value by lowercase name
    fn attr(&self, name: &str) -> Option<&str>;
    /// Parent element within the same tree scope
    fn parent(&self) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub selector: String,
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}'", self.reason, self.selector)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AttrOp {
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
    case_insensitive: bool,
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let Some((op, expected)) = &self.test else {
            return true;
        };

        let (actual, expected) = if self.case_insensitive {
            (actual.to_lowercase(), expected.to_lowercase())
        } else {
            (actual.to_string(), expected.clone())
        };

        match op {
            AttrOp::Equals => actual == expected,
            AttrOp::Contains => !expected.is_empty() && actual.contains(&expected),
            AttrOp::Prefix => !expected.is_empty() && actual.starts_with(&expected),
            AttrOp::Suffix => !expected.is_empty() && actual.ends_with(&expected),
            AttrOp::Word => actual.split_whitespace().any(|w| w == expected),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches<E: Matchable>(&self, el: E) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !el.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = el.attr("class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|wanted| classes.split_whitespace().any(|c| c == wanted))
            {
                return false;
            }
        }
        self.attrs.iter().all(|a| a.matches(el.attr(&a.name)))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    /// Compounds left to right; the combinator links a compound to the one before it
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches<E: Matchable>(&self, el: E) -> bool {
        self.matches_at(self.parts.len() - 1, el)
    }

    fn matches_at<E: Matchable>(&self, idx: usize, el: E) -> bool {
        let (combinator, compound) = &self.parts[idx];
        if !compound.matches(el) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match combinator {
            Combinator::Child => el.parent().is_some_and(|p| self.matches_at(idx - 1, p)),
            Combinator::Descendant => {
                let mut ancestor = el.parent();
                while let Some(a) = ancestor {
                    if self.matches_at(idx - 1, a) {
                        return true;
                    }
                    ancestor = a.parent();
                }
                false
            }
        }
    }
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Parser::new(input).parse_list()
    }

    pub fn matches<E: Matchable>(&self, el: E) -> bool {
        self.selectors.iter().any(|s| s.matches(el))
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error(format!("expected identifier at {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_list(mut self) -> Result<SelectorList, ParseError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            selectors.push(self.parse_complex()?);
            match self.peek() {
                Some(',') => self.pos += 1,
                None => break,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<Complex, ParseError> {
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;

        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return Err(self.error("empty compound selector"));
            }
            parts.push((combinator, compound));

            let had_space = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    combinator = Combinator::Child;
                }
                Some(_) if had_space => combinator = Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }

        Ok(Complex { parts })
    }

    fn parse_compound(&mut self) -> Result<Compound, ParseError> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".to_string());
            }
            Some(c) if c.is_ascii_alphabetic() => {
                compound.tag = Some(self.ident()?.to_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, ParseError> {
        self.skip_whitespace();
        let name = self.ident()?.to_lowercase();
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    test: None,
                    case_insensitive: false,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(c @ ('*' | '^' | '$' | '~')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.error("expected '=' in attribute selector"));
                }
                self.pos += 1;
                match c {
                    '*' => AttrOp::Contains,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Word,
                }
            }
            _ => return Err(self.error("malformed attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.ident()?,
        };

        self.skip_whitespace();
        let mut case_insensitive = false;
        if let Some(flag @ ('i' | 'I' | 's' | 'S')) = self.peek() {
            self.pos += 1;
            case_insensitive = flag.eq_ignore_ascii_case(&'i');
            self.skip_whitespace();
        }

        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;

        Ok(AttrSelector {
            name,
            test: Some((op, value)),
            case_insensitive,
        })
    }
}
