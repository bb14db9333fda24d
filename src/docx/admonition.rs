use crate::block::{AdmonitionKind, Block, TextSpan, plain_text};
use crate::docx::builder::BuildContext;
use crate::docx::model::{
    Alignment, Border, Borders, Paragraph, Run, Table, TableCell, TableRow, TableWidth, VAlign,
    half_points, twips,
};

const ICON_COLUMN: u32 = 864;
const CONTENT_COLUMN: u32 = 8496;
const MIN_ROW_HEIGHT: u32 = 720;
/// Accent border width in eighths of a point (3pt).
const ACCENT_SIZE: u32 = 24;
const ICON_FONT: &str = "Arial";
const ICON_SIZE_PT: f32 = 18.0;
/// Indent per nesting level of flattened content, in inches.
const NESTED_INDENT_IN: f32 = 0.25;

/// A one-row callout table: icon cell, then the content cell.
pub(super) fn build_admonition(
    ctx: &mut BuildContext,
    kind: AdmonitionKind,
    title: Option<&str>,
    children: &[Block],
) -> Table {
    let format = ctx.admonition_format(kind);
    let base = Run {
        color: Some(format.color.clone()),
        ..Run::default()
    };

    let mut icon = Paragraph {
        alignment: Some(Alignment::Center),
        space_before: Some(0),
        space_after: Some(0),
        ..Paragraph::default()
    };
    icon.push_run(Run {
        bold: true,
        font: Some(ICON_FONT.to_string()),
        size: Some(half_points(ICON_SIZE_PT)),
        color: Some(format.color.clone()),
        ..Run::text(format.icon.clone())
    });

    let icon_cell = TableCell {
        width: Some(ICON_COLUMN),
        shading: Some(format.bg.clone()),
        v_align: Some(VAlign::Center),
        paragraphs: vec![icon],
        ..TableCell::default()
    };
    let content_cell = TableCell {
        width: Some(CONTENT_COLUMN),
        shading: Some(format.bg.clone()),
        v_align: Some(VAlign::Center),
        paragraphs: content_paragraphs(ctx, title, children, &base),
        ..TableCell::default()
    };

    Table {
        style: None,
        width: TableWidth::Pct(5000),
        indent: None,
        borders: Some(Borders {
            top: Border::Nil,
            left: Border::Single {
                size: ACCENT_SIZE,
                color: Some(format.color),
            },
            bottom: Border::Nil,
            right: Border::Nil,
            inside_h: Border::Nil,
            inside_v: Border::Nil,
        }),
        grid: vec![ICON_COLUMN, CONTENT_COLUMN],
        rows: vec![TableRow {
            min_height: Some(MIN_ROW_HEIGHT),
            header: false,
            cells: vec![icon_cell, content_cell],
        }],
    }
}

fn compact(depth: usize) -> Paragraph {
    Paragraph {
        space_before: Some(0),
        space_after: Some(0),
        indent_left: (depth > 0).then(|| twips(NESTED_INDENT_IN * depth as f32)),
        ..Paragraph::default()
    }
}

fn content_paragraphs(
    ctx: &mut BuildContext,
    title: Option<&str>,
    children: &[Block],
    base: &Run,
) -> Vec<Paragraph> {
    let mut out = Vec::new();
    let mut rest = children;

    // The title is a bold lead-in of the first paragraph when it opens it,
    // otherwise a paragraph of its own
    if let Some(title) = title {
        match children.first() {
            Some(Block::Paragraph { content }) if plain_text(content).starts_with(title) => {
                let spans = bold_lead_in(content, title.chars().count());
                let mut paragraph = compact(0);
                paragraph.content = ctx.inlines(&spans, base);
                out.push(paragraph);
                rest = &children[1..];
            }
            _ => {
                let mut paragraph = compact(0);
                paragraph.push_run(Run {
                    bold: true,
                    ..base.clone()
                }
                .with_text(title));
                out.push(paragraph);
            }
        }
    }

    for child in rest {
        flatten(ctx, child, base, 0, &mut out);
    }
    if out.is_empty() {
        out.push(compact(0));
    }
    out
}

/// Embolden the first `len` chars, splitting a span if needed.
fn bold_lead_in(spans: &[TextSpan], len: usize) -> Vec<TextSpan> {
    let mut remaining = len;
    let mut out = Vec::with_capacity(spans.len() + 1);
    for span in spans {
        if remaining == 0 {
            out.push(span.clone());
            continue;
        }
        let count = span.text.chars().count();
        if count <= remaining {
            out.push(TextSpan {
                bold: true,
                ..span.clone()
            });
            remaining -= count;
        } else {
            let at = span
                .text
                .char_indices()
                .nth(remaining)
                .map_or(span.text.len(), |(i, _)| i);
            out.push(TextSpan {
                bold: true,
                ..span.with_text(&span.text[..at])
            });
            out.push(span.with_text(&span.text[at..]));
            remaining = 0;
        }
    }
    out
}

/// Render any block as compact paragraphs inside the content cell.
fn flatten(
    ctx: &mut BuildContext,
    block: &Block,
    base: &Run,
    depth: usize,
    out: &mut Vec<Paragraph>,
) {
    match block {
        Block::Paragraph { content } => {
            let mut paragraph = compact(depth);
            paragraph.content = ctx.inlines(content, base);
            out.push(paragraph);
        }
        Block::Heading { content, .. } => {
            let bold = Run {
                bold: true,
                ..base.clone()
            };
            let mut paragraph = compact(depth);
            paragraph.content = ctx.inlines(content, &bold);
            out.push(paragraph);
        }
        Block::CodeBlock { code, .. } => {
            let mut paragraph = compact(depth);
            paragraph.push_run(Run {
                color: base.color.clone(),
                ..ctx.code_run(code)
            });
            out.push(paragraph);
        }
        Block::List(list) => {
            for (i, item) in list.items.iter().enumerate() {
                let marker = if list.ordered {
                    format!("{}. ", list.start + i as u64)
                } else {
                    "- ".to_string()
                };
                let mut paragraph = compact(depth);
                paragraph.push_run(base.with_text(marker));
                paragraph.content.extend(ctx.inlines(&item.content, base));
                out.push(paragraph);
                for child in &item.children {
                    flatten(ctx, child, base, depth + 1, out);
                }
            }
        }
        Block::Blockquote { children } | Block::Admonition { children, .. } => {
            for child in children {
                flatten(ctx, child, base, depth + 1, out);
            }
        }
        Block::Table(table) => {
            for row in &table.rows {
                let text = row
                    .cells
                    .iter()
                    .filter(|cell| !cell.is_merge_marker())
                    .map(|cell| plain_text(&cell.content))
                    .collect::<Vec<_>>()
                    .join(" | ");
                let mut paragraph = compact(depth);
                paragraph.push_run(base.with_text(text));
                out.push(paragraph);
            }
        }
        Block::Image { src, alt, .. } => {
            let label = if alt.is_empty() { src } else { alt };
            let mut paragraph = compact(depth);
            paragraph.push_run(Run {
                italic: true,
                ..base.with_text(format!("[Image: {}]", label))
            });
            out.push(paragraph);
        }
        Block::Rule => {}
    }
}
