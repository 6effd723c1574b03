//! Tolerant HTML fragment parser, serializer and sanitizer
//!
//! Good enough for tooltip content and small page fixtures. Malformed input is
//! never rejected: unknown constructs become text, unclosed tags are closed at
//! the end of input and stray end tags are dropped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HtmlNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

impl HtmlNode {
    pub fn element(tag: &str) -> Self {
        HtmlNode::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            HtmlNode::Element { tag, .. } => Some(tag),
            HtmlNode::Text(_) => None,
        }
    }
}

enum Token {
    Text(String),
    Start {
        tag: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Raw text up to the matching close tag, used for script/style bodies.
    fn raw_text(&mut self, tag: &str) -> String {
        let rest = self.rest();
        let lower = rest.to_ascii_lowercase();
        let close = format!("</{}", tag);
        match lower.find(&close) {
            Some(i) => {
                self.pos += i;
                rest[..i].to_string()
            }
            None => {
                self.pos = self.src.len();
                rest.to_string()
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return None;
            }

            if let Some(after) = rest.strip_prefix("<!--") {
                self.pos += 4 + after.find("-->").map(|i| i + 3).unwrap_or(after.len());
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                continue;
            }

            if let Some(after) = rest.strip_prefix("</") {
                if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    self.pos += 2;
                    let name = self.name();
                    let rest = self.rest();
                    self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
                    return Some(Token::End(name));
                }
            }

            if let Some(after) = rest.strip_prefix('<') {
                if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                    self.pos += 1;
                    return Some(self.start_tag());
                }
            }

            // Text run up to the next plausible tag opening; a '<' that did
            // not open a tag is literal text.
            let end = if rest.starts_with('<') {
                rest[1..].find('<').map(|i| i + 1).unwrap_or(rest.len())
            } else {
                rest.find('<').unwrap_or(rest.len())
            };
            self.pos += end;
            return Some(Token::Text(decode_entities(&rest[..end])));
        }
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '>' || c == '/' || c == '=' {
                break;
            }
            name.push(c);
            self.bump();
        }
        name.to_ascii_lowercase()
    }

    fn start_tag(&mut self) -> Token {
        let tag = self.name();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_ws();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        self_closing = true;
                        break;
                    }
                }
                Some(_) => {
                    let name = self.name();
                    if name.is_empty() {
                        // Unparseable character inside the tag; skip it.
                        self.bump();
                        continue;
                    }
                    self.skip_ws();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_ws();
                        self.attr_value()
                    } else {
                        String::new()
                    };
                    if !attrs.iter().any(|(n, _)| *n == name) {
                        attrs.push((name, value));
                    }
                }
            }
        }

        Token::Start {
            tag,
            attrs,
            self_closing,
        }
    }

    fn attr_value(&mut self) -> String {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let rest = self.rest();
                let end = rest.find(q).unwrap_or(rest.len());
                let raw = &rest[..end];
                self.pos += (end + 1).min(rest.len());
                decode_entities(raw)
            }
            _ => {
                let mut raw = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    raw.push(c);
                    self.bump();
                }
                decode_entities(&raw)
            }
        }
    }
}

/// Parses a fragment into a node forest.
pub fn parse_fragment(src: &str) -> Vec<HtmlNode> {
    // Each open element: (tag, attrs, children).
    let mut stack: Vec<(String, Vec<(String, String)>, Vec<HtmlNode>)> = Vec::new();
    let mut roots: Vec<HtmlNode> = Vec::new();
    let mut tokens = Tokenizer::new(src);

    fn push(
        stack: &mut [(String, Vec<(String, String)>, Vec<HtmlNode>)],
        roots: &mut Vec<HtmlNode>,
        node: HtmlNode,
    ) {
        match stack.last_mut() {
            Some((_, _, children)) => children.push(node),
            None => roots.push(node),
        }
    }

    fn close_top(
        stack: &mut Vec<(String, Vec<(String, String)>, Vec<HtmlNode>)>,
        roots: &mut Vec<HtmlNode>,
    ) {
        if let Some((tag, attrs, children)) = stack.pop() {
            push(stack, roots, HtmlNode::Element { tag, attrs, children });
        }
    }

    while let Some(token) = tokens.next_token() {
        match token {
            Token::Text(text) => {
                if !text.is_empty() {
                    push(&mut stack, &mut roots, HtmlNode::Text(text));
                }
            }
            Token::Start {
                tag,
                attrs,
                self_closing,
            } => {
                if is_void(&tag) || self_closing {
                    push(
                        &mut stack,
                        &mut roots,
                        HtmlNode::Element {
                            tag,
                            attrs,
                            children: Vec::new(),
                        },
                    );
                } else if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let body = tokens.raw_text(&tag);
                    let children = if body.is_empty() {
                        Vec::new()
                    } else {
                        vec![HtmlNode::Text(body)]
                    };
                    // Consume the close tag if present.
                    let _ = tokens.next_token_if_end();
                    push(&mut stack, &mut roots, HtmlNode::Element { tag, attrs, children });
                } else {
                    stack.push((tag, attrs, Vec::new()));
                }
            }
            Token::End(tag) => {
                if let Some(depth) = stack.iter().rposition(|(t, _, _)| *t == tag) {
                    while stack.len() > depth {
                        close_top(&mut stack, &mut roots);
                    }
                }
            }
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    roots
}

impl Tokenizer<'_> {
    fn next_token_if_end(&mut self) -> Option<Token> {
        if self.rest().starts_with("</") {
            self.next_token()
        } else {
            None
        }
    }
}

/// Drops `script` elements and every attribute whose name starts with `on`.
pub fn sanitize(nodes: &mut Vec<HtmlNode>) {
    nodes.retain(|n| n.tag() != Some("script"));
    for node in nodes.iter_mut() {
        if let HtmlNode::Element {
            attrs, children, ..
        } = node
        {
            attrs.retain(|(name, _)| !name.to_ascii_lowercase().starts_with("on"));
            sanitize(children);
        }
    }
}

pub fn sanitize_html(src: &str) -> String {
    let mut nodes = parse_fragment(src);
    sanitize(&mut nodes);
    serialize(&nodes)
}

pub fn serialize(nodes: &[HtmlNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &HtmlNode) {
    match node {
        HtmlNode::Text(text) => out.push_str(&escape_text(text)),
        HtmlNode::Element {
            tag,
            attrs,
            children,
        } => {
            write_open_tag(out, tag, attrs);
            if is_void(tag) {
                return;
            }
            if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                for child in children {
                    if let HtmlNode::Text(t) = child {
                        out.push_str(t);
                    }
                }
            } else {
                for child in children {
                    write_node(out, child);
                }
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub(crate) fn write_open_tag(out: &mut String, tag: &str, attrs: &[(String, String)]) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        rest = &rest[i..];
        let decoded = rest[1..].find(';').filter(|&j| j <= 10).and_then(|j| {
            let entity = &rest[1..1 + j];
            decode_entity(entity).map(|c| (c, j + 2))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let nodes = parse_fragment(r#"<div class="a"><b>bold</b> text</div>"#);
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            HtmlNode::Element {
                tag,
                attrs,
                children,
            } => {
                assert_eq!(tag, "div");
                assert_eq!(attrs[0], ("class".to_string(), "a".to_string()));
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected element"),
        }
    }

    #[test]
    fn void_and_self_closing() {
        let html = serialize(&parse_fragment("<p>a<br>b<input type=text/></p>"));
        assert_eq!(html, r#"<p>a<br>b<input type="text/"></p>"#);
    }

    #[test]
    fn unclosed_tags_are_closed() {
        assert_eq!(serialize(&parse_fragment("<div><span>x")), "<div><span>x</span></div>");
    }

    #[test]
    fn stray_end_tags_dropped() {
        assert_eq!(serialize(&parse_fragment("a</b>c")), "ac");
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        assert_eq!(serialize(&parse_fragment("1 < 2")), "1 &lt; 2");
    }

    #[test]
    fn comments_skipped_entities_decoded() {
        let nodes = parse_fragment("<!-- hi -->Tom &amp; Jerry &#65;&#x42;");
        assert_eq!(nodes, vec![HtmlNode::Text("Tom & Jerry AB".into())]);
    }

    #[test]
    fn sanitize_strips_scripts_and_handlers() {
        let out = sanitize_html(
            r#"<div onclick="steal()" OnMouseOver="x()" title="ok">Hi<script>alert(1)</script></div><script src="x.js"></script>"#,
        );
        assert_eq!(out, r#"<div title="ok">Hi</div>"#);
    }

    #[test]
    fn sanitize_nested_script() {
        let out = sanitize_html("<p><span><script>bad()</script>ok</span></p>");
        assert_eq!(out, "<p><span>ok</span></p>");
    }

    #[test]
    fn script_body_is_raw() {
        let nodes = parse_fragment("<script>if (a < b) { x('</div>') }</script>after");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], HtmlNode::Text("after".into()));
    }
}
