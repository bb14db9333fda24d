use std::borrow::Cow;

use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::block::{
    AdmonitionKind, Block, Document, List, ListItem, Table, TableCell, TableRow, TextSpan,
    plain_text,
};
use crate::error::{Error, Result};
use crate::slug;

/// GitHub-style callout marker at the start of a blockquote's first paragraph
static ADMONITION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\[!(NOTE|TIP|IMPORTANT|WARNING|CAUTION)\]\s*(.*)$")
        .expect("admonition pattern is valid")
});

static YAML_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][\w.-]*\s*:(\s|$)").expect("key pattern is valid"));

/// Collapse CRLF and lone CR line endings to LF
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Strip a leading YAML frontmatter block. Both fences must be exactly `---`
/// and the block must hold at least one `key:` line, so a document opening
/// with a thematic break keeps its content.
fn strip_frontmatter(markdown: &str) -> &str {
    let Some(rest) = markdown.strip_prefix("---\n") else {
        return markdown;
    };
    let mut offset = 0;
    let mut has_key = false;
    for line in rest.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if content == "---" {
            if !has_key {
                return markdown;
            }
            return rest[offset + line.len()..].trim_start_matches('\n');
        }
        has_key |= YAML_KEY.is_match(content);
        offset += line.len();
    }
    markdown
}

/// Parse markdown text into a list of blocks
pub fn parse(markdown: &str) -> Document {
    let markdown = normalize_line_endings(markdown);
    let markdown = strip_frontmatter(&markdown);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);
    let mut state = ParseState::new();

    for event in parser {
        process_event(event, &mut state);
    }

    state.finish()
}

/// Parse raw bytes, failing only when they are not UTF-8
pub fn parse_bytes(bytes: &[u8]) -> Result<Document> {
    let markdown = std::str::from_utf8(bytes).map_err(|e| Error::Parse {
        message: format!("input is not valid UTF-8: {e}"),
    })?;
    Ok(parse(markdown))
}

struct ParseState {
    // Open containers; the root is always at the bottom
    frames: Vec<Frame>,
    // Spans of the paragraph, heading, cell or tight list item being built
    inline: InlineBuffer,
    // Formatting wrappers currently open
    format: Format,
    // Inside an explicit paragraph, heading or table cell
    in_inline_block: bool,

    heading_level: Option<u8>,
    code: Option<CodeBuffer>,
    table: Option<TableBuffer>,
}

struct Frame {
    kind: FrameKind,
    blocks: Vec<Block>,
    // Char offset of the first line break in the first block, if it is a paragraph
    lead_break: Option<usize>,
}

enum FrameKind {
    Root,
    BlockQuote,
    List {
        ordered: bool,
        start: u64,
        items: Vec<ListItem>,
    },
    Item,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            lead_break: None,
        }
    }
}

#[derive(Default)]
struct InlineBuffer {
    spans: Vec<TextSpan>,
    chars: usize,
    first_break: Option<usize>,
    // The next span must not be merged into the previous one
    sealed: bool,
    image: Option<PendingImage>,
    last_image: Option<(usize, Block)>,
}

impl InlineBuffer {
    fn push(&mut self, span: TextSpan) {
        self.chars += span.text.chars().count();
        if !self.sealed {
            if let Some(last) = self.spans.last_mut() {
                if same_format(last, &span) {
                    last.text.push_str(&span.text);
                    return;
                }
            }
        }
        self.spans.push(span);
        self.sealed = false;
    }

    fn push_sealed(&mut self, span: TextSpan) {
        self.chars += span.text.chars().count();
        self.spans.push(span);
        self.sealed = true;
    }

    fn line_break(&mut self, span: TextSpan) {
        if self.first_break.is_none() {
            self.first_break = Some(self.chars);
        }
        self.sealed = true;
        self.push_sealed(span);
    }

    /// A paragraph made of a single image becomes an image block.
    fn into_block(self) -> Option<Block> {
        if self.spans.is_empty() {
            return None;
        }
        if self.spans.len() == 1 {
            if let Some((0, image)) = self.last_image {
                return Some(image);
            }
        }
        Some(Block::Paragraph {
            content: self.spans,
        })
    }
}

fn same_format(a: &TextSpan, b: &TextSpan) -> bool {
    a.bold == b.bold
        && a.italic == b.italic
        && a.code == b.code
        && a.strikethrough == b.strikethrough
        && a.link == b.link
}

struct PendingImage {
    src: String,
    title: Option<String>,
    alt: String,
}

#[derive(Default)]
struct Format {
    bold: usize,
    italic: usize,
    strike: usize,
    links: Vec<String>,
}

impl Format {
    fn span(&self, text: &str, code: bool) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            bold: self.bold > 0,
            italic: self.italic > 0,
            code,
            strikethrough: self.strike > 0,
            link: self.links.last().filter(|url| !url.is_empty()).cloned(),
        }
    }
}

struct CodeBuffer {
    language: Option<String>,
    code: String,
}

#[derive(Default)]
struct TableBuffer {
    rows: Vec<TableRow>,
    current: Vec<TableCell>,
    in_head: bool,
    has_header: bool,
}

impl ParseState {
    fn new() -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Root)],
            inline: InlineBuffer::default(),
            format: Format::default(),
            in_inline_block: false,
            heading_level: None,
            code: None,
            table: None,
        }
    }

    fn begin_inline(&mut self) {
        self.inline = InlineBuffer::default();
        self.in_inline_block = true;
    }

    fn end_inline(&mut self) -> InlineBuffer {
        self.in_inline_block = false;
        std::mem::take(&mut self.inline)
    }

    fn push_block(&mut self, block: Block, first_break: Option<usize>) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.blocks.is_empty() {
                frame.lead_break = first_break;
            }
            frame.blocks.push(block);
        }
    }

    /// Tight list items carry bare text with no paragraph around it.
    fn flush_tight_text(&mut self) {
        if self.in_inline_block || self.inline.spans.is_empty() {
            return;
        }
        let inline = std::mem::take(&mut self.inline);
        let first_break = inline.first_break;
        if let Some(block) = inline.into_block() {
            self.push_block(block, first_break);
        }
    }

    fn text(&mut self, text: &str, code: bool) {
        if let Some(buffer) = self.code.as_mut() {
            buffer.code.push_str(text);
        } else if let Some(image) = self.inline.image.as_mut() {
            image.alt.push_str(text);
        } else {
            let span = self.format.span(text, code);
            self.inline.push(span);
        }
    }

    fn finish_image(&mut self) {
        let Some(image) = self.inline.image.take() else {
            return;
        };
        let label = if image.alt.is_empty() {
            &image.src
        } else {
            &image.alt
        };
        let placeholder = self.format.span(&format!("[Image: {label}]"), false);
        let index = self.inline.spans.len();
        self.inline.push_sealed(placeholder);
        self.inline.last_image = Some((
            index,
            Block::Image {
                src: image.src,
                alt: image.alt,
                title: image.title,
            },
        ));
    }

    fn finish(mut self) -> Document {
        self.flush_tight_text();
        while self.frames.len() > 1 {
            if let Some(frame) = self.frames.pop() {
                if let Some(parent) = self.frames.last_mut() {
                    parent.blocks.extend(frame.blocks);
                }
            }
        }
        self.frames.pop().map(|root| root.blocks).unwrap_or_default()
    }
}

fn process_event(event: Event, state: &mut ParseState) {
    match event {
        // Paragraphs
        Event::Start(Tag::Paragraph) => {
            state.flush_tight_text();
            state.begin_inline();
        }
        Event::End(TagEnd::Paragraph) => {
            let inline = state.end_inline();
            let first_break = inline.first_break;
            if let Some(block) = inline.into_block() {
                state.push_block(block, first_break);
            }
        }

        // Headings
        Event::Start(Tag::Heading { level, .. }) => {
            state.flush_tight_text();
            state.begin_inline();
            state.heading_level = Some(heading_level_to_u8(level));
        }
        Event::End(TagEnd::Heading(_)) => {
            let content = state.end_inline().spans;
            if let Some(level) = state.heading_level.take() {
                let anchor = slug::anchor(&plain_text(&content));
                state.push_block(
                    Block::Heading {
                        level,
                        content,
                        anchor,
                    },
                    None,
                );
            }
        }

        // Code blocks
        Event::Start(Tag::CodeBlock(kind)) => {
            state.flush_tight_text();
            let language = match kind {
                CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(String::from),
                CodeBlockKind::Indented => None,
            };
            state.code = Some(CodeBuffer {
                language,
                code: String::new(),
            });
        }
        Event::End(TagEnd::CodeBlock) => {
            if let Some(buffer) = state.code.take() {
                let code = buffer.code.trim_end_matches('\n').to_string();
                state.push_block(
                    Block::CodeBlock {
                        code,
                        language: buffer.language,
                    },
                    None,
                );
            }
        }

        // Blockquotes and admonitions
        Event::Start(Tag::BlockQuote(_)) => {
            state.flush_tight_text();
            state.frames.push(Frame::new(FrameKind::BlockQuote));
        }
        Event::End(TagEnd::BlockQuote(_)) => {
            state.flush_tight_text();
            if let Some(frame) = state.frames.pop() {
                let block = blockquote(frame.blocks, frame.lead_break);
                state.push_block(block, None);
            }
        }

        // Lists
        Event::Start(Tag::List(first_number)) => {
            state.flush_tight_text();
            state.frames.push(Frame::new(FrameKind::List {
                ordered: first_number.is_some(),
                start: first_number.unwrap_or(1),
                items: Vec::new(),
            }));
        }
        Event::End(TagEnd::List(_)) => {
            if let Some(frame) = state.frames.pop() {
                if let FrameKind::List {
                    ordered,
                    start,
                    items,
                } = frame.kind
                {
                    state.push_block(
                        Block::List(List {
                            ordered,
                            items,
                            start,
                        }),
                        None,
                    );
                }
            }
        }
        Event::Start(Tag::Item) => {
            state.frames.push(Frame::new(FrameKind::Item));
        }
        Event::End(TagEnd::Item) => {
            state.flush_tight_text();
            if let Some(frame) = state.frames.pop() {
                let item = list_item(frame.blocks);
                if let Some(Frame {
                    kind: FrameKind::List { items, .. },
                    ..
                }) = state.frames.last_mut()
                {
                    items.push(item);
                }
            }
        }

        // Tables
        Event::Start(Tag::Table(_)) => {
            state.flush_tight_text();
            state.table = Some(TableBuffer::default());
        }
        Event::End(TagEnd::Table) => {
            if let Some(table) = state.table.take() {
                state.push_block(
                    Block::Table(Table {
                        rows: table.rows,
                        has_header: table.has_header,
                    }),
                    None,
                );
            }
        }
        Event::Start(Tag::TableHead) => {
            if let Some(table) = state.table.as_mut() {
                table.in_head = true;
                table.current.clear();
            }
        }
        Event::End(TagEnd::TableHead) => {
            if let Some(table) = state.table.as_mut() {
                table.in_head = false;
                table.has_header = true;
                let cells = std::mem::take(&mut table.current);
                table.rows.push(TableRow { cells });
            }
        }
        Event::Start(Tag::TableRow) => {
            if let Some(table) = state.table.as_mut() {
                table.current.clear();
            }
        }
        Event::End(TagEnd::TableRow) => {
            if let Some(table) = state.table.as_mut() {
                let cells = std::mem::take(&mut table.current);
                table.rows.push(TableRow { cells });
            }
        }
        Event::Start(Tag::TableCell) => {
            state.begin_inline();
        }
        Event::End(TagEnd::TableCell) => {
            let spans = state.end_inline().spans;
            if let Some(table) = state.table.as_mut() {
                let cell = table_cell(spans, table.rows.len(), table.current.len(), table.in_head);
                table.current.push(cell);
            }
        }

        // Inline formatting
        Event::Start(Tag::Strong) => state.format.bold += 1,
        Event::End(TagEnd::Strong) => state.format.bold = state.format.bold.saturating_sub(1),
        Event::Start(Tag::Emphasis) => state.format.italic += 1,
        Event::End(TagEnd::Emphasis) => {
            state.format.italic = state.format.italic.saturating_sub(1)
        }
        Event::Start(Tag::Strikethrough) => state.format.strike += 1,
        Event::End(TagEnd::Strikethrough) => {
            state.format.strike = state.format.strike.saturating_sub(1)
        }

        // Links
        Event::Start(Tag::Link { dest_url, .. }) => {
            state.format.links.push(dest_url.into_string());
        }
        Event::End(TagEnd::Link) => {
            state.format.links.pop();
        }

        // Images
        Event::Start(Tag::Image {
            dest_url, title, ..
        }) => {
            let title = title.into_string();
            state.inline.image = Some(PendingImage {
                src: dest_url.into_string(),
                title: if title.is_empty() { None } else { Some(title) },
                alt: String::new(),
            });
        }
        Event::End(TagEnd::Image) => state.finish_image(),

        // Text content
        Event::Text(text) => state.text(&text, false),
        Event::Code(code) => state.text(&code, true),

        // Soft/hard breaks
        Event::SoftBreak => {
            if let Some(image) = state.inline.image.as_mut() {
                image.alt.push(' ');
            } else {
                let span = state.format.span(" ", false);
                state.inline.line_break(span);
            }
        }
        Event::HardBreak => {
            if state.inline.image.is_none() {
                let span = state.format.span("\n", false);
                state.inline.line_break(span);
            }
        }

        // Horizontal rule
        Event::Rule => {
            state.flush_tight_text();
            state.push_block(Block::Rule, None);
        }

        Event::Start(Tag::HtmlBlock) => state.flush_tight_text(),

        // Ignore other events
        _ => {}
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// The item's first paragraph is its own text, everything after nests under it
fn list_item(mut blocks: Vec<Block>) -> ListItem {
    let content = match blocks.first_mut() {
        Some(Block::Paragraph { content }) => std::mem::take(content),
        _ => return ListItem {
            content: Vec::new(),
            children: blocks,
        },
    };
    blocks.remove(0);
    ListItem {
        content,
        children: blocks,
    }
}

/// `^^` and `>>` mark merges, except where there is nothing to merge into
fn table_cell(spans: Vec<TextSpan>, row: usize, col: usize, is_header: bool) -> TableCell {
    match plain_text(&spans).trim() {
        "^^" if row > 0 => TableCell::merged_up(is_header),
        ">>" if col > 0 => TableCell::merged_left(is_header),
        _ => TableCell::new(spans, is_header),
    }
}

struct AdmonitionMarker {
    kind: AdmonitionKind,
    // Length of `[!KIND]` in chars
    len: usize,
    title: Option<String>,
}

fn admonition_marker(content: &[TextSpan], lead_break: Option<usize>) -> Option<AdmonitionMarker> {
    let text = plain_text(content);
    let captures = ADMONITION_MARKER.captures(&text)?;
    let kind: AdmonitionKind = captures[1].parse().ok()?;
    let len = captures[1].chars().count() + 3;

    // Only text on the marker's own line counts as a title
    let line_len = lead_break.map_or(usize::MAX, |at| at.saturating_sub(len));
    let line: String = text.chars().skip(len).take(line_len).collect();
    let line = line.trim();
    let title = if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    };

    Some(AdmonitionMarker { kind, len, title })
}

/// Drop the first `len` chars and any whitespace after them, keeping formatting
fn strip_marker(spans: &[TextSpan], len: usize) -> Vec<TextSpan> {
    let mut skip = len;
    let mut trimming = true;
    let mut rest = Vec::new();

    for span in spans {
        let mut text = span.text.as_str();
        if skip > 0 {
            let count = text.chars().count();
            if count <= skip {
                skip -= count;
                continue;
            }
            let at = text.char_indices().nth(skip).map_or(text.len(), |(i, _)| i);
            text = &text[at..];
            skip = 0;
        }
        if trimming {
            text = text.trim_start();
            if text.is_empty() {
                continue;
            }
            trimming = false;
        }
        rest.push(span.with_text(text));
    }

    rest
}

fn blockquote(mut children: Vec<Block>, lead_break: Option<usize>) -> Block {
    let marker = match children.first() {
        Some(Block::Paragraph { content }) => admonition_marker(content, lead_break),
        _ => None,
    };
    let Some(marker) = marker else {
        return Block::Blockquote { children };
    };

    if let Some(Block::Paragraph { content }) = children.first_mut() {
        let rest = strip_marker(content, marker.len);
        if rest.is_empty() {
            children.remove(0);
        } else {
            *content = rest;
        }
    }

    Block::Admonition {
        kind: marker.kind,
        title: marker.title,
        children,
    }
}
