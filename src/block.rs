use std::fmt;
use std::str::FromStr;

/// An inline run of text with formatting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
    pub link: Option<String>,
}

impl TextSpan {
    /// Unformatted text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Link target, treating an empty string as no link.
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref().filter(|url| !url.is_empty())
    }

    /// Same formatting, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Concatenated text of a span sequence, formatting dropped.
pub fn plain_text(spans: &[TextSpan]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

/// A single list item: its own first-line text plus everything nested beneath it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListItem {
    pub content: Vec<TextSpan>,
    pub children: Vec<Block>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
    /// First number of an ordered list.
    pub start: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub content: Vec<TextSpan>,
    pub is_header: bool,
    /// `^^`: continue the cell above.
    pub merge_up: bool,
    /// `>>`: continue the cell to the left.
    pub merge_left: bool,
}

impl TableCell {
    pub fn new(content: Vec<TextSpan>, is_header: bool) -> Self {
        Self {
            content,
            is_header,
            ..Self::default()
        }
    }

    pub fn merged_up(is_header: bool) -> Self {
        Self {
            is_header,
            merge_up: true,
            ..Self::default()
        }
    }

    pub fn merged_left(is_header: bool) -> Self {
        Self {
            is_header,
            merge_left: true,
            ..Self::default()
        }
    }

    pub fn is_merge_marker(&self) -> bool {
        self.merge_up || self.merge_left
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
    pub has_header: bool,
}

impl Table {
    /// Width of the widest row.
    pub fn num_cols(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).max().unwrap_or(0)
    }
}

/// GitHub-style callout kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdmonitionKind {
    Note,
    Tip,
    Important,
    Warning,
    Caution,
}

impl AdmonitionKind {
    pub const ALL: [AdmonitionKind; 5] = [
        AdmonitionKind::Note,
        AdmonitionKind::Tip,
        AdmonitionKind::Important,
        AdmonitionKind::Warning,
        AdmonitionKind::Caution,
    ];

    /// Upper-case marker name, as written in `[!NOTE]`.
    pub fn as_str(self) -> &'static str {
        match self {
            AdmonitionKind::Note => "NOTE",
            AdmonitionKind::Tip => "TIP",
            AdmonitionKind::Important => "IMPORTANT",
            AdmonitionKind::Warning => "WARNING",
            AdmonitionKind::Caution => "CAUTION",
        }
    }
}

impl fmt::Display for AdmonitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdmonitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdmonitionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown admonition kind: {s}"))
    }
}

/// Block-level elements parsed from Markdown
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<TextSpan>,
        /// Bookmark name for internal links, never empty.
        anchor: String,
    },
    Paragraph {
        content: Vec<TextSpan>,
    },
    CodeBlock {
        code: String,
        language: Option<String>,
    },
    Blockquote {
        children: Vec<Block>,
    },
    List(List),
    Table(Table),
    Image {
        src: String,
        alt: String,
        title: Option<String>,
    },
    Rule,
    Admonition {
        kind: AdmonitionKind,
        title: Option<String>,
        children: Vec<Block>,
    },
}

/// A parsed document, in document order
pub type Document = Vec<Block>;
