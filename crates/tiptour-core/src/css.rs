//! CSS selector subset used for element targeting
//!
//! Syntax:
//!   div, *                        - type / universal
//!   #id .class                    - id and class
//!   [attr] [attr="v"]             - presence, equality
//!   [attr~=v] [attr^=v] [attr$=v] [attr*=v]
//!   :nth-of-type(n) :nth-child(n) :first-child :last-child :first-of-type
//!   a b, a > b                    - descendant and child combinators
//!   sel1, sel2                    - selector lists
//!
//! Backslash escapes work in identifiers and quoted strings.

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

/// Compounds joined by combinators, stored left to right. `combinators[i]`
/// sits between `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pseudo {
    NthOfType(usize),
    NthChild(usize),
    FirstChild,
    LastChild,
    FirstOfType,
}

impl SelectorList {
    pub fn parse(s: &str) -> Result<Self> {
        let mut parser = Parser {
            src: s,
            chars: s.chars().collect(),
            pos: 0,
        };
        let mut selectors = vec![parser.complex()?];
        loop {
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => {
                    parser.pos += 1;
                    selectors.push(parser.complex()?);
                }
                Some(c) => return Err(parser.error(&format!("unexpected '{}'", c))),
            }
        }
        Ok(Self { selectors })
    }

    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.selectors.iter().any(|c| c.matches(doc, id))
    }
}

impl Complex {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let last = self.compounds.len() - 1;
        self.matches_from(doc, id, last)
    }

    /// Right-to-left match of `compounds[..=idx]` with `compounds[idx]` on `id`.
    fn matches_from(&self, doc: &Document, id: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(doc, id) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent_element(id)
                .map(|p| self.matches_from(doc, p, idx - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut cur = doc.parent_element(id);
                while let Some(p) = cur {
                    if self.matches_from(doc, p, idx - 1) {
                        return true;
                    }
                    cur = doc.parent_element(p);
                }
                false
            }
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.ids.is_empty()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.pseudos.is_empty()
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(tag) = doc.tag_name(id) else {
            return false;
        };
        if let Some(want) = &self.tag {
            if want != "*" && want != tag {
                return false;
            }
        }
        if !self.ids.is_empty() {
            let own = doc.get_attribute(id, "id");
            if !self.ids.iter().all(|want| own.as_deref() == Some(want.as_str())) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = doc.class_list(id);
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        for attr in &self.attrs {
            let Some(value) = doc.get_attribute(id, &attr.name) else {
                return false;
            };
            let ok = match &attr.op {
                AttrOp::Exists => true,
                AttrOp::Equals(v) => value == *v,
                AttrOp::Includes(v) => value.split_whitespace().any(|w| w == v),
                AttrOp::Prefix(v) => !v.is_empty() && value.starts_with(v.as_str()),
                AttrOp::Suffix(v) => !v.is_empty() && value.ends_with(v.as_str()),
                AttrOp::Substring(v) => !v.is_empty() && value.contains(v.as_str()),
            };
            if !ok {
                return false;
            }
        }
        self.pseudos.iter().all(|p| match p {
            Pseudo::NthOfType(n) => doc.index_of_type(id) == *n,
            Pseudo::NthChild(n) => doc.index_in_parent(id) == *n,
            Pseudo::FirstChild => doc.index_in_parent(id) == 1,
            Pseudo::LastChild => doc.index_in_parent(id) == doc.sibling_count(id),
            Pseudo::FirstOfType => doc.index_of_type(id) == 1,
        })
    }
}

struct Parser<'a> {
    src: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> Error {
        Error::selector_invalid(self.src, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_ws();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(&format!("unexpected '{}'", c))),
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".to_string());
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => {
                    self.pos += 1;
                    compound.pseudos.push(self.pseudo()?);
                }
                _ => break,
            }
        }

        if compound.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.error(&format!("expected a selector, found '{}'", c)),
                None => self.error("expected a selector"),
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("dangling escape")),
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(out)
    }

    fn attribute(&mut self) -> Result<AttrMatch> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.bump() {
            Some(']') => return Ok(AttrMatch { name, op: AttrOp::Exists }),
            Some('=') => "=",
            Some(c @ ('~' | '^' | '$' | '*')) => {
                if self.bump() != Some('=') {
                    return Err(self.error(&format!("expected '=' after '{}'", c)));
                }
                match c {
                    '~' => "~=",
                    '^' => "^=",
                    '$' => "$=",
                    _ => "*=",
                }
            }
            _ => return Err(self.error("malformed attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.quoted(q)?
            }
            _ => self.ident()?,
        };
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(self.error("expected ']'"));
        }

        let op = match op {
            "=" => AttrOp::Equals(value),
            "~=" => AttrOp::Includes(value),
            "^=" => AttrOp::Prefix(value),
            "$=" => AttrOp::Suffix(value),
            _ => AttrOp::Substring(value),
        };
        Ok(AttrMatch { name, op })
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn pseudo(&mut self) -> Result<Pseudo> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "first-of-type" => Ok(Pseudo::FirstOfType),
            "nth-of-type" | "nth-child" => {
                if self.bump() != Some('(') {
                    return Err(self.error("expected '('"));
                }
                self.skip_ws();
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(char::is_ascii_digit) {
                    digits.push(c);
                    self.pos += 1;
                }
                self.skip_ws();
                if self.bump() != Some(')') {
                    return Err(self.error("expected a positive integer argument"));
                }
                let n: usize = digits
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| self.error("expected a positive integer argument"))?;
                Ok(if name == "nth-of-type" {
                    Pseudo::NthOfType(n)
                } else {
                    Pseudo::NthChild(n)
                })
            }
            other => Err(self.error(&format!("unsupported pseudo-class ':{}'", other))),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Escapes CSS metacharacters with a backslash so `value` can be embedded in
/// an identifier or a quoted attribute value.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\!\"#$%&'()*+,./:;<=>?@[]^`{|}~ ".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
