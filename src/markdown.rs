//! Markdown rendering into a [`markup`](crate::markup) tree.
//!
//! Rendering happens in three steps:
//!
//! 1. A leading front-matter block is split off (`key: value` lines, values
//!    continued on lines indented four spaces, optionally fenced by `---`).
//! 2. The rest goes through `pulldown-cmark` and its event stream is folded
//!    into owned elements. Raw HTML, block or inline, is parsed into real
//!    elements rather than kept as opaque strings, so HTML written by hand and
//!    HTML produced by an earlier render both end up as the same tree.
//! 3. Inline attribute lists are applied: `![alt](a.png){.headline .wide}`
//!    puts `class="headline wide"` on the image.
//!
//! ```text
//! date: 2021-04-02          front matter  → [("date", ["2021-04-02"])]
//!
//! ![Cast](cast.jpg){.wide}  paragraph     → <p><img alt="Cast" class="wide" src="cast.jpg" /></p>
//! # Bronze                  heading       → <h1>Bronze</h1>
//! ```

use crate::markup::{self, Element, Node};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Front-matter values in source order. Keys are lower-cased; a key that
/// appears on several lines, or continues onto indented lines, has several values.
pub type RawMetadata = Vec<(String, Vec<String>)>;

/// Output of [`render`]: top-level block nodes plus the front matter.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub nodes: Vec<Node>,
    pub metadata: RawMetadata,
}

/// Render Markdown text into block nodes and raw front-matter values.
pub fn render(text: &str) -> Rendered {
    let (metadata, body) = split_front_matter(text);
    let mut nodes = TreeBuilder::default().build(body);
    apply_attribute_lists(&mut nodes);
    Rendered { nodes, metadata }
}

fn parser_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    opts.insert(Options::ENABLE_DEFINITION_LIST);
    opts
}

// ============================================================================
// Front matter
// ============================================================================

static META_BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{3}(\s.*)?$").expect("valid pattern"));
static META_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-{3}|\.{3})(\s.*)?$").expect("valid pattern"));
static META_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ ]{0,3}(?P<key>[A-Za-z0-9_-]+):\s*(?P<value>.*)$").expect("valid pattern")
});
static META_MORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{4,}(?P<value>.*)$").expect("valid pattern"));

/// Split a leading front-matter block from the Markdown body.
///
/// The block ends at the first blank line or closing fence (both consumed),
/// or at the first line that is neither `key: value` nor a continuation
/// (kept as the first line of the body).
pub fn split_front_matter(text: &str) -> (RawMetadata, &str) {
    let mut metadata: RawMetadata = Vec::new();
    let mut offset = 0;
    let mut first = true;

    for raw_line in text.split_inclusive('\n') {
        let line = raw_line.trim_end_matches(['\n', '\r']);
        if first {
            first = false;
            if META_BEGIN.is_match(line) {
                offset += raw_line.len();
                continue;
            }
        }
        if line.trim().is_empty() || META_END.is_match(line) {
            offset += raw_line.len();
            break;
        }
        if let Some(caps) = META_LINE.captures(line) {
            let key = caps["key"].to_lowercase();
            let value = caps["value"].trim().to_string();
            match metadata.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => metadata.push((key, vec![value])),
            }
        } else if let (Some(caps), Some((_, values))) = (META_MORE.captures(line), metadata.last_mut())
        {
            values.push(caps["value"].trim().to_string());
        } else {
            break;
        }
        offset += raw_line.len();
    }

    (metadata, &text[offset..])
}

// ============================================================================
// Event stream → tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    /// Opened by a Markdown start tag, closed by its end tag.
    Markdown,
    /// Opened by an inline HTML tag, closed by a matching `</tag>`.
    InlineHtml,
    /// An image collecting its alt text.
    Image,
}

struct Frame {
    element: Element,
    kind: FrameKind,
    alt: String,
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    root: Vec<Node>,
    html_block: Option<String>,
    table_alignments: Vec<Alignment>,
    table_cell: usize,
    in_table_head: bool,
    image_nesting: usize,
    footnotes: HashMap<String, usize>,
}

impl TreeBuilder {
    fn build(mut self, body: &str) -> Vec<Node> {
        for event in Parser::new_ext(body, parser_options()) {
            self.handle_event(event);
        }
        self.flush_html_block();
        while !self.stack.is_empty() {
            self.pop_frame();
        }
        self.root
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.add_text(&text),
            Event::Code(code) => {
                if self.in_image() {
                    self.add_text(&code);
                } else {
                    let mut el = Element::new("code");
                    el.push_text(&code);
                    self.add_node(Node::Element(el));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => match &mut self.html_block {
                Some(buffer) => buffer.push_str(&html),
                None => self.add_inline_html(&html),
            },
            Event::SoftBreak => {
                if self.in_image() {
                    self.add_text(" ");
                } else {
                    self.add_text("\n");
                }
            }
            Event::HardBreak => self.add_node(Node::Element(Element::new("br"))),
            Event::Rule => self.add_node(Node::Element(Element::new("hr"))),
            Event::FootnoteReference(name) => self.add_footnote_reference(&name),
            Event::TaskListMarker(checked) => {
                let mut input = Element::new("input")
                    .with_attr("type", "checkbox")
                    .with_attr("disabled", "");
                if checked {
                    input.set_attr("checked", "");
                }
                self.add_node(Node::Element(input));
            }
            Event::InlineMath(math) => {
                let mut span = Element::new("span").with_attr("class", "math math-inline");
                span.push_text(&math);
                self.add_node(Node::Element(span));
            }
            Event::DisplayMath(math) => {
                let mut span = Element::new("span").with_attr("class", "math math-display");
                span.push_text(&math);
                self.add_node(Node::Element(span));
            }
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        // Markup inside an image only contributes its text to the alt attribute.
        if self.in_image() {
            self.image_nesting += 1;
            return;
        }
        let element = match tag {
            Tag::Paragraph => Element::new("p"),
            Tag::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                let mut el = Element::new(heading_name(level));
                if let Some(id) = id {
                    el.set_attr("id", id.to_string());
                }
                for class in &classes {
                    el.add_class(class);
                }
                for (key, value) in attrs {
                    el.set_attr(key.to_string(), value.map(|v| v.to_string()).unwrap_or_default());
                }
                el
            }
            Tag::BlockQuote(_) => Element::new("blockquote"),
            Tag::CodeBlock(kind) => {
                self.push_frame(Element::new("pre"), FrameKind::Markdown);
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(info) = kind
                    && let Some(lang) = info.split_whitespace().next()
                {
                    code.set_attr("class", format!("language-{lang}"));
                }
                code
            }
            Tag::HtmlBlock => {
                self.html_block = Some(String::new());
                return;
            }
            Tag::List(Some(start)) => {
                let mut ol = Element::new("ol");
                if start != 1 {
                    ol.set_attr("start", start.to_string());
                }
                ol
            }
            Tag::List(None) => Element::new("ul"),
            Tag::Item => Element::new("li"),
            Tag::FootnoteDefinition(name) => {
                let number = self.footnote_number(&name);
                let mut div = Element::new("div")
                    .with_attr("class", "footnote-definition")
                    .with_attr("id", name.to_string());
                let mut label = Element::new("sup").with_attr("class", "footnote-definition-label");
                label.push_text(&number.to_string());
                div.push(Node::Element(label));
                div
            }
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                Element::new("table")
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.table_cell = 0;
                self.push_frame(Element::new("thead"), FrameKind::Markdown);
                Element::new("tr")
            }
            Tag::TableRow => {
                self.table_cell = 0;
                Element::new("tr")
            }
            Tag::TableCell => {
                let mut cell = Element::new(if self.in_table_head { "th" } else { "td" });
                match self.table_alignments.get(self.table_cell) {
                    Some(Alignment::Left) => cell.set_attr("style", "text-align: left"),
                    Some(Alignment::Center) => cell.set_attr("style", "text-align: center"),
                    Some(Alignment::Right) => cell.set_attr("style", "text-align: right"),
                    _ => {}
                }
                self.table_cell += 1;
                cell
            }
            Tag::Emphasis => Element::new("em"),
            Tag::Strong => Element::new("strong"),
            Tag::Strikethrough => Element::new("del"),
            Tag::Superscript => Element::new("sup"),
            Tag::Subscript => Element::new("sub"),
            Tag::Link {
                dest_url, title, ..
            } => {
                let mut a = Element::new("a").with_attr("href", dest_url.to_string());
                if !title.is_empty() {
                    a.set_attr("title", title.to_string());
                }
                a
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut img = Element::new("img").with_attr("src", dest_url.to_string());
                if !title.is_empty() {
                    img.set_attr("title", title.to_string());
                }
                self.push_frame(img, FrameKind::Image);
                return;
            }
            Tag::DefinitionList => Element::new("dl"),
            Tag::DefinitionListTitle => Element::new("dt"),
            Tag::DefinitionListDefinition => Element::new("dd"),
            Tag::MetadataBlock(_) => Element::new("div"),
        };
        self.push_frame(element, FrameKind::Markdown);
    }

    fn end_tag(&mut self, tag: TagEnd) {
        if self.image_nesting > 0 {
            self.image_nesting -= 1;
            return;
        }
        match tag {
            TagEnd::HtmlBlock => self.flush_html_block(),
            TagEnd::CodeBlock | TagEnd::TableHead => {
                self.close_markdown_frame();
                self.close_markdown_frame();
                self.in_table_head = false;
            }
            TagEnd::Table => {
                self.close_markdown_frame();
                self.table_alignments.clear();
            }
            TagEnd::MetadataBlock(_) => {
                // Front matter is handled before parsing; drop anything that slipped through.
                self.stack.pop();
            }
            _ => self.close_markdown_frame(),
        }
    }

    fn push_frame(&mut self, element: Element, kind: FrameKind) {
        self.stack.push(Frame {
            element,
            kind,
            alt: String::new(),
        });
    }

    /// Pop frames up to and including the innermost Markdown or image frame,
    /// closing any inline HTML left open inside it.
    fn close_markdown_frame(&mut self) {
        while let Some(kind) = self.stack.last().map(|f| f.kind) {
            self.pop_frame();
            if kind != FrameKind::InlineHtml {
                break;
            }
        }
    }

    fn pop_frame(&mut self) {
        if let Some(mut frame) = self.stack.pop() {
            if frame.kind == FrameKind::Image {
                frame.element.set_attr("alt", frame.alt);
            }
            self.add_node(Node::Element(frame.element));
        }
    }

    fn in_image(&self) -> bool {
        self.stack.last().is_some_and(|f| f.kind == FrameKind::Image)
    }

    fn add_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(frame) => frame.element.push(node),
            None => markup::push_node(&mut self.root, node),
        }
    }

    fn add_text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(frame) if frame.kind == FrameKind::Image => frame.alt.push_str(text),
            _ => self.add_node(Node::Text(text.to_string())),
        }
    }

    fn flush_html_block(&mut self) {
        if let Some(buffer) = self.html_block.take() {
            for node in markup::parse_fragment(&buffer) {
                self.add_node(node);
            }
        }
    }

    fn add_inline_html(&mut self, html: &str) {
        let trimmed = html.trim();
        if trimmed.starts_with("<!--") || self.in_image() {
            return;
        }
        if let Some(caps) = CLOSING_TAG.captures(trimmed) {
            self.close_inline_html(&caps["name"].to_lowercase());
            return;
        }
        match markup::parse_tag(trimmed) {
            Some(el) if markup::is_void(&el.name) || trimmed.ends_with("/>") => {
                self.add_node(Node::Element(el))
            }
            Some(el) if !el.children.is_empty() => self.add_node(Node::Element(el)),
            Some(el) => self.push_frame(el, FrameKind::InlineHtml),
            None => self.add_text(&markup::decode_entities(html)),
        }
    }

    fn close_inline_html(&mut self, name: &str) {
        let open = self
            .stack
            .iter()
            .rev()
            .take_while(|f| f.kind == FrameKind::InlineHtml)
            .position(|f| f.element.name == name);
        if let Some(depth) = open {
            for _ in 0..=depth {
                self.pop_frame();
            }
        }
    }

    fn footnote_number(&mut self, name: &str) -> usize {
        let next = self.footnotes.len() + 1;
        *self.footnotes.entry(name.to_string()).or_insert(next)
    }

    fn add_footnote_reference(&mut self, name: &str) {
        let number = self.footnote_number(name);
        let mut a = Element::new("a").with_attr("href", format!("#{name}"));
        a.push_text(&number.to_string());
        let mut sup = Element::new("sup").with_attr("class", "footnote-reference");
        sup.push(Node::Element(a));
        self.add_node(Node::Element(sup));
    }
}

static CLOSING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</\s*(?P<name>[A-Za-z][A-Za-z0-9-]*)\s*>$").expect("valid pattern"));

fn heading_name(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

// ============================================================================
// Inline attribute lists
// ============================================================================

static ATTR_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:\.(?P<class>[\w-]+)|#(?P<id>[\w-]+)|(?P<key>[\w-]+)=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"']+)))"#,
    )
    .expect("valid pattern")
});

#[derive(Debug, Default, PartialEq)]
struct AttrList {
    classes: Vec<String>,
    id: Option<String>,
    pairs: Vec<(String, String)>,
}

/// Parse the inside of `{...}` (an optional leading `:` is allowed).
/// Returns `None` unless every token is a class, id, or key=value pair.
fn parse_attr_list(inner: &str) -> Option<AttrList> {
    let mut rest = inner.trim().strip_prefix(':').unwrap_or(inner.trim());
    let mut list = AttrList::default();
    while !rest.trim().is_empty() {
        let caps = ATTR_TOKEN.captures(rest)?;
        if let Some(class) = caps.name("class") {
            list.classes.push(class.as_str().to_string());
        } else if let Some(id) = caps.name("id") {
            list.id = Some(id.as_str().to_string());
        } else if let Some(key) = caps.name("key") {
            let value = caps
                .name("dq")
                .or_else(|| caps.name("sq"))
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            list.pairs.push((key.as_str().to_string(), value.to_string()));
        }
        rest = &rest[caps.get(0).map_or(rest.len(), |m| m.end())..];
    }
    if list == AttrList::default() {
        return None;
    }
    Some(list)
}

/// Apply `{...}` attribute lists that directly follow an element.
fn apply_attribute_lists(nodes: &mut Vec<Node>) {
    let mut i = 0;
    while i < nodes.len() {
        if let Node::Element(el) = &mut nodes[i] {
            apply_attribute_lists(&mut el.children);
        }
        if i + 1 < nodes.len()
            && let Some(consumed) = leading_attr_list(&nodes[i + 1])
            && let Node::Element(el) = &mut nodes[i]
        {
            let (list, len) = consumed;
            for class in &list.classes {
                el.add_class(class);
            }
            if let Some(id) = list.id {
                el.set_attr("id", id);
            }
            for (key, value) in list.pairs {
                el.set_attr(key, value);
            }
            if let Node::Text(text) = &mut nodes[i + 1] {
                text.drain(..len);
                if text.is_empty() {
                    nodes.remove(i + 1);
                }
            }
        }
        i += 1;
    }
}

/// If `node` is text starting with a valid `{...}`, return the list and its byte length.
fn leading_attr_list(node: &Node) -> Option<(AttrList, usize)> {
    let Node::Text(text) = node else {
        return None;
    };
    let inner = text.strip_prefix('{')?;
    let close = inner.find('}')?;
    let list = parse_attr_list(&inner[..close])?;
    Some((list, close + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(text: &str) -> String {
        let mut root = Element::new("html");
        root.children = render(text).nodes;
        root.inner_html()
    }

    #[test]
    fn renders_paragraph_and_heading() {
        assert_eq!(html("# Title\n\nHello *world*"), "<h1>Title</h1>\n<p>Hello <em>world</em></p>");
    }

    #[test]
    fn image_alt_text_becomes_attribute() {
        assert_eq!(
            html("![A *cast* piece](cast.jpg \"Cast\")"),
            r#"<p><img alt="A cast piece" src="cast.jpg" title="Cast" /></p>"#
        );
    }

    #[test]
    fn attribute_list_applies_to_image() {
        assert_eq!(
            html("![alt](a.png){.headline .wide}\n# slug"),
            "<p><img alt=\"alt\" class=\"headline wide\" src=\"a.png\" /></p>\n<h1>slug</h1>"
        );
    }

    #[test]
    fn attribute_list_with_colon_id_and_pairs() {
        let out = html("[Shop](https://x.test){: .button #buy data-kind=\"primary\"} now");
        assert_eq!(
            out,
            r#"<p><a class="button" data-kind="primary" href="https://x.test" id="buy">Shop</a> now</p>"#
        );
    }

    #[test]
    fn braces_that_are_not_attribute_lists_stay_text() {
        assert_eq!(html("*a*{not valid!}"), "<p><em>a</em>{not valid!}</p>");
    }

    #[test]
    fn heading_attributes() {
        assert_eq!(html("# Title {#top .big}"), r#"<h1 class="big" id="top">Title</h1>"#);
    }

    #[test]
    fn fenced_code_block() {
        assert_eq!(
            html("```rust\nfn a() {}\n```"),
            "<pre><code class=\"language-rust\">fn a() {}\n</code></pre>"
        );
    }

    #[test]
    fn table_with_alignment() {
        let out = html("| a | b |\n|:--|--:|\n| 1 | 2 |");
        assert_eq!(
            out,
            "<table><thead><tr><th style=\"text-align: left\">a</th><th style=\"text-align: right\">b</th></tr></thead><tr><td style=\"text-align: left\">1</td><td style=\"text-align: right\">2</td></tr></table>"
        );
    }

    #[test]
    fn raw_html_block_becomes_elements() {
        let rendered = render("<figure class=\"x\"><img src=\"a.png\"/></figure>\n\ntext");
        let figure = rendered.nodes[0].as_element().unwrap();
        assert_eq!(figure.name, "figure");
        assert_eq!(figure.iter_tag("img").count(), 1);
        assert_eq!(rendered.nodes[1].as_element().unwrap().name, "p");
    }

    #[test]
    fn inline_html_wraps_following_text() {
        assert_eq!(
            html("a <span class=\"k\">b</span> c"),
            r#"<p>a <span class="k">b</span> c</p>"#
        );
    }

    #[test]
    fn unclosed_inline_html_closes_with_paragraph() {
        assert_eq!(html("a <span>b\n\nnext"), "<p>a <span>b</span></p>\n<p>next</p>");
    }

    #[test]
    fn rendering_own_output_is_stable() {
        let source = "date: 2020-01-01\n\n![x](a.png){.headline}\n\n# Title\n\nSome *text* & more.\n\n```\na\n\nb\n```\n\n- one\n- two";
        let first = html(source);
        let second = html(&first);
        assert_eq!(first, second);
    }

    #[test]
    fn front_matter_is_split() {
        let (meta, body) = split_front_matter("Title: Bronze\nTags: cast\n    lost-wax\n\n# Body\n");
        assert_eq!(
            meta,
            vec![
                ("title".to_string(), vec!["Bronze".to_string()]),
                (
                    "tags".to_string(),
                    vec!["cast".to_string(), "lost-wax".to_string()]
                ),
            ]
        );
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn fenced_front_matter() {
        let (meta, body) = split_front_matter("---\ndate: 2021-04-02\n---\ntext");
        assert_eq!(meta, vec![("date".to_string(), vec!["2021-04-02".to_string()])]);
        assert_eq!(body, "text");
    }

    #[test]
    fn no_front_matter_leaves_body_intact() {
        let (meta, body) = split_front_matter("# Heading\n\ntext");
        assert!(meta.is_empty());
        assert_eq!(body, "# Heading\n\ntext");
    }

    #[test]
    fn footnotes_are_numbered() {
        let out = html("A[^n].\n\n[^n]: Note.");
        assert!(out.contains(r##"<sup class="footnote-reference"><a href="#n">1</a></sup>"##), "{out}");
        assert!(out.contains(r#"<div class="footnote-definition" id="n">"#), "{out}");
    }

    #[test]
    fn task_list_marker() {
        let out = html("- [x] done");
        assert!(out.contains(r#"<input checked="" disabled="" type="checkbox" />"#), "{out}");
    }
}
