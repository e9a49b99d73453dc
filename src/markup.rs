//! A small owned markup tree: elements with sorted attributes, and text.
//!
//! The tree is what documents are made of after Markdown rendering. Children
//! are owned and there are no parent pointers, so a subtree (the headline
//! image) can be cloned out and changed on its own.
//!
//! Serialization is deterministic: attributes are written in name order, void
//! elements are self-closed (`<img src="a.png" />`) and no blank line is ever
//! emitted inside a block. Serialized output can therefore go back through the
//! Markdown renderer as raw HTML and come out with the same structure.

use std::collections::BTreeMap;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text content is written and read verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Append `class` to the class list unless it is already there.
    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    /// Append a child, merging adjacent text nodes.
    pub fn push(&mut self, node: Node) {
        push_node(&mut self.children, node);
    }

    pub fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.push(Node::Text(text.to_string()));
        }
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// The only child of this element, ignoring whitespace-only text.
    pub fn sole_child(&self) -> Option<&Element> {
        let mut significant = self.children.iter().filter(|n| !n.is_blank_text());
        match (significant.next(), significant.next()) {
            (Some(Node::Element(e)), None) => Some(e),
            _ => None,
        }
    }

    /// All text beneath this element, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Depth-first, pre-order iteration over this element and its descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Depth-first iteration filtered by tag name.
    pub fn iter_tag<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.descendants().filter(move |e| e.name == name)
    }

    /// Visit this element and every descendant mutably, pre-order.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.walk_mut(f);
            }
        }
    }

    /// Serialize this element, including its own tags.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    /// Serialize only this element's children, one line per top-level child.
    pub fn inner_html(&self) -> String {
        let raw = RAW_TEXT_ELEMENTS.contains(&self.name.as_str());
        let mut parts = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if child.is_blank_text() {
                continue;
            }
            let mut out = String::new();
            write_node(child, raw, &mut out);
            parts.push(out);
        }
        parts.join("\n")
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack
            .extend(current.element_children().collect::<Vec<_>>().into_iter().rev());
        Some(current)
    }
}

pub(crate) fn push_node(children: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
            return;
        }
    }
    children.push(node);
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

// ============================================================================
// Serialization
// ============================================================================

fn write_node(node: &Node, raw_text: bool, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, out),
        Node::Text(t) if raw_text => out.push_str(t),
        Node::Text(t) => write_text(t, out),
    }
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        write_attr_value(value, out);
        out.push('"');
    }
    if is_void(&element.name) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
    for child in &element.children {
        write_node(child, raw, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

/// Escape text content. A newline that would end a whitespace-only line is
/// written as `&#10;` so the output never contains a blank line.
fn write_text(text: &str, out: &mut String) {
    let mut line_blank = false;
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' if line_blank => {
                out.push_str("&#10;");
                line_blank = false;
                continue;
            }
            '\n' => {
                out.push('\n');
                line_blank = true;
                continue;
            }
            c => out.push(c),
        }
        if !c.is_whitespace() {
            line_blank = false;
        }
    }
}

fn write_attr_value(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse an HTML fragment into nodes.
///
/// Whitespace-only text between top-level nodes and comments are dropped.
/// Character references in text and attribute values are decoded.
pub fn parse_fragment(html: &str) -> Vec<Node> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return vec![Node::Text(decode_entities(html))];
    };
    let parser = dom.parser();
    let mut nodes = Vec::new();
    for handle in dom.children() {
        if let Some(node) = convert_tl_node(*handle, parser, false)
            && !node.is_blank_text()
        {
            push_node(&mut nodes, node);
        }
    }
    nodes
}

/// Parse a single opening or self-contained tag, e.g. `<span class="x">`.
pub fn parse_tag(html: &str) -> Option<Element> {
    parse_fragment(html).into_iter().find_map(|n| match n {
        Node::Element(e) => Some(e),
        Node::Text(_) => None,
    })
}

fn convert_tl_node(handle: tl::NodeHandle, parser: &tl::Parser, raw_text: bool) -> Option<Node> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => {
            let mut element = Element::new(tag.name().as_utf8_str().to_lowercase());
            let attributes = tag.attributes();
            for (key, value) in attributes.iter() {
                let value = value.map(|v| decode_entities(&v)).unwrap_or_default();
                element.set_attr(key.to_lowercase(), value);
            }
            if let Some(id) = attributes.id() {
                element.set_attr("id", decode_entities(&id.as_utf8_str()));
            }
            if let Some(class) = attributes.class() {
                element.set_attr("class", decode_entities(&class.as_utf8_str()));
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
            for child in tag.children().top().iter() {
                if let Some(node) = convert_tl_node(*child, parser, raw) {
                    element.push(node);
                }
            }
            Some(Node::Element(element))
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            if raw_text {
                Some(Node::Text(text.into_owned()))
            } else {
                Some(Node::Text(decode_entities(&text)))
            }
        }
        tl::Node::Comment(_) => None,
    }
}

/// Decode the character references markup serializers commonly produce.
/// Unknown named references are left as written.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            decode_entity(entity).map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
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
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph_with_image(src: &str) -> Element {
        let mut p = Element::new("p");
        p.push(Node::Element(Element::new("img").with_attr("src", src)));
        p
    }

    #[test]
    fn serialize_void_element_self_closes() {
        let img = Element::new("img").with_attr("src", "a.png").with_attr("alt", "A");
        assert_eq!(img.outer_html(), r#"<img alt="A" src="a.png" />"#);
    }

    #[test]
    fn serialize_escapes_text_and_attributes() {
        let mut a = Element::new("a").with_attr("href", "?a=1&b=\"2\"");
        a.push_text("1 < 2 & 3");
        assert_eq!(
            a.outer_html(),
            r#"<a href="?a=1&amp;b=&quot;2&quot;">1 &lt; 2 &amp; 3</a>"#
        );
    }

    #[test]
    fn serialize_never_emits_blank_lines() {
        let mut pre = Element::new("pre");
        pre.push_text("a\n\n  \nb");
        let html = pre.outer_html();
        assert!(!html.lines().any(|l| l.trim().is_empty()), "{html}");
        let reparsed = parse_fragment(&html);
        assert_eq!(reparsed, vec![Node::Element(pre)]);
    }

    #[test]
    fn inner_html_puts_blocks_on_lines() {
        let mut root = Element::new("html");
        root.push(Node::Element(paragraph_with_image("a.png")));
        let mut h1 = Element::new("h1");
        h1.push_text("Title");
        root.push(Node::Element(h1));
        assert_eq!(
            root.inner_html(),
            "<p><img src=\"a.png\" /></p>\n<h1>Title</h1>"
        );
    }

    #[test]
    fn parse_fragment_reads_nested_tags() {
        let nodes = parse_fragment(r#"<p class="x">Hello <em>there</em></p>"#);
        assert_eq!(nodes.len(), 1);
        let p = nodes[0].as_element().unwrap();
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("class"), Some("x"));
        assert_eq!(p.text_content(), "Hello there");
        assert_eq!(p.element_children().next().unwrap().name, "em");
    }

    #[test]
    fn parse_fragment_decodes_entities() {
        let nodes = parse_fragment(r#"<a href="a?b=1&amp;c=2">x &lt; y</a>"#);
        let a = nodes[0].as_element().unwrap();
        assert_eq!(a.attr("href"), Some("a?b=1&c=2"));
        assert_eq!(a.text_content(), "x < y");
    }

    #[test]
    fn parse_fragment_drops_top_level_whitespace() {
        let nodes = parse_fragment("<p>a</p>\n<p>b</p>\n");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn serialize_parse_roundtrip_is_stable() {
        let html = "<p><img alt=\"x\" class=\"headline wide\" src=\"a.png\" /></p>\n<h1 id=\"t\">T &amp; U</h1>";
        let mut root = Element::new("html");
        root.children = parse_fragment(html);
        assert_eq!(root.inner_html(), html);
    }

    #[test]
    fn add_class_is_not_duplicated() {
        let mut img = Element::new("img");
        img.add_class("headline");
        img.add_class("headline");
        img.add_class("wide");
        assert_eq!(img.attr("class"), Some("headline wide"));
    }

    #[test]
    fn descendants_are_preorder() {
        let mut root = Element::new("html");
        let mut div = Element::new("div");
        div.push(Node::Element(Element::new("img").with_attr("src", "1")));
        root.push(Node::Element(div));
        root.push(Node::Element(Element::new("img").with_attr("src", "2")));
        let srcs: Vec<_> = root.iter_tag("img").filter_map(|e| e.attr("src")).collect();
        assert_eq!(srcs, vec!["1", "2"]);
    }

    #[test]
    fn sole_child_ignores_whitespace() {
        let mut p = paragraph_with_image("a.png");
        p.push_text("  \n");
        assert_eq!(p.sole_child().map(|e| e.name.as_str()), Some("img"));
        p.push_text("caption");
        assert!(p.sole_child().is_none());
    }

    #[test]
    fn decode_numeric_references() {
        assert_eq!(decode_entities("a&#10;b&#x41;"), "a\nbA");
        assert_eq!(decode_entities("AT&T &bogus;"), "AT&T &bogus;");
    }
}
