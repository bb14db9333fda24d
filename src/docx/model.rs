//! In-memory WordprocessingML document.
//!
//! Lengths are twips (1/1440 inch) unless a field says otherwise; font sizes are
//! half-points; colours are six-digit hex RGB.

use crate::docx::package::Template;
use crate::style::StyleSheet;

pub const TWIPS_PER_INCH: f32 = 1440.0;
pub const EMU_PER_INCH: f32 = 914_400.0;

/// Inches to twips.
pub fn twips(inches: f32) -> u32 {
    (inches * TWIPS_PER_INCH).round().max(0.0) as u32
}

/// Points to half-points.
pub fn half_points(points: f32) -> u32 {
    (points * 2.0).round().max(0.0) as u32
}

/// The converted document plus everything needed to write the package.
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub body: Vec<BodyItem>,
    /// Relationships added by the builder (hyperlinks and images).
    pub relationships: Vec<Relationship>,
    pub media: Vec<MediaPart>,
    pub styles: StyleSheet,
    pub template: Template,
}

impl OutputDocument {
    /// All paragraphs in document order, including those inside table cells.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.body.iter().flat_map(|item| -> Box<dyn Iterator<Item = &Paragraph> + '_> {
            match item {
                BodyItem::Paragraph(paragraph) => Box::new(std::iter::once(paragraph)),
                BodyItem::Table(table) => Box::new(
                    table
                        .rows
                        .iter()
                        .flat_map(|row| row.cells.iter())
                        .flat_map(|cell| cell.paragraphs.iter()),
                ),
            }
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.body
            .iter_mut()
            .flat_map(|item| -> Box<dyn Iterator<Item = &mut Paragraph> + '_> {
                match item {
                    BodyItem::Paragraph(paragraph) => Box::new(std::iter::once(paragraph)),
                    BodyItem::Table(table) => Box::new(
                        table
                            .rows
                            .iter_mut()
                            .flat_map(|row| row.cells.iter_mut())
                            .flat_map(|cell| cell.paragraphs.iter_mut()),
                    ),
                }
            })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.body.iter().filter_map(|item| match item {
            BodyItem::Table(table) => Some(table),
            BodyItem::Paragraph(_) => None,
        })
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|rel| rel.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyItem {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipKind {
    Hyperlink,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub kind: RelationshipKind,
    /// URL for hyperlinks, `media/<name>` for images.
    pub target: String,
}

/// A binary part stored under `word/media/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Center,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub style: Option<String>,
    pub alignment: Option<Alignment>,
    pub indent_left: Option<u32>,
    pub space_before: Option<u32>,
    pub space_after: Option<u32>,
    pub border_bottom: bool,
    pub bookmark: Option<Bookmark>,
    pub content: Vec<Inline>,
}

impl Paragraph {
    pub fn with_style(style: impl Into<String>) -> Self {
        Self {
            style: Some(style.into()),
            ..Self::default()
        }
    }

    pub fn push_run(&mut self, run: Run) {
        self.content.push(Inline::Run(run));
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.content.iter().flat_map(|inline| match inline {
            Inline::Run(run) => std::slice::from_ref(run).iter(),
            Inline::Hyperlink(link) => link.runs.iter(),
        })
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.content.iter_mut().flat_map(|inline| match inline {
            Inline::Run(run) => std::slice::from_mut(run).iter_mut(),
            Inline::Hyperlink(link) => link.runs.iter_mut(),
        })
    }

    /// Visible text of the paragraph.
    pub fn text(&self) -> String {
        self.runs().map(|run| run.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    Hyperlink(Hyperlink),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Relationship id of an external URL.
    External(String),
    /// Bookmark name inside this document.
    Anchor(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hyperlink {
    pub target: LinkTarget,
    pub runs: Vec<Run>,
}

/// A run of uniformly formatted text. `\n` in `text` becomes a line break.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub underline: bool,
    pub font: Option<String>,
    pub size: Option<u32>,
    pub color: Option<String>,
    pub char_style: Option<String>,
    pub drawing: Option<Drawing>,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Same formatting, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// An inline picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drawing {
    pub rel_id: String,
    pub id: u32,
    pub name: String,
    pub description: String,
    pub width_emu: u64,
    pub height_emu: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Border {
    Nil,
    /// Width in eighths of a point.
    Single { size: u32, color: Option<String> },
}

impl Border {
    pub fn single() -> Self {
        Border::Single {
            size: 4,
            color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Borders {
    pub top: Border,
    pub left: Border,
    pub bottom: Border,
    pub right: Border,
    pub inside_h: Border,
    pub inside_v: Border,
}

impl Borders {
    pub fn all_single() -> Self {
        Self {
            top: Border::single(),
            left: Border::single(),
            bottom: Border::single(),
            right: Border::single(),
            inside_h: Border::single(),
            inside_v: Border::single(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableWidth {
    Auto,
    /// Fiftieths of a percent, 5000 is full width.
    Pct(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub style: Option<String>,
    pub width: TableWidth,
    /// Left indent from the margin.
    pub indent: Option<u32>,
    pub borders: Option<Borders>,
    pub grid: Vec<u32>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    /// Minimum row height.
    pub min_height: Option<u32>,
    /// Repeat as header row on each page.
    pub header: bool,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VMerge {
    Restart,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Center,
}

impl VAlign {
    pub fn as_str(self) -> &'static str {
        match self {
            VAlign::Center => "center",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub width: Option<u32>,
    pub grid_span: u32,
    pub v_merge: Option<VMerge>,
    pub shading: Option<String>,
    pub v_align: Option<VAlign>,
    pub borders: Option<Borders>,
    /// Never empty once built.
    pub paragraphs: Vec<Paragraph>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            width: None,
            grid_span: 1,
            v_merge: None,
            shading: None,
            v_align: None,
            borders: None,
            paragraphs: Vec::new(),
        }
    }
}

impl TableCell {
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
