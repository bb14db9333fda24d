//! Table output and cell-merge resolution.

use crate::block::{self, TableCell as SourceCell};
use crate::docx::builder::BuildContext;
use crate::docx::model::{
    Alignment, Borders, Paragraph, Run, Table, TableCell, TableRow, TableWidth, VMerge,
};

/// Text width of a Letter page with 1in margins, in twips.
pub(super) const TEXT_WIDTH: u32 = 9360;

/// What occupies one grid position after merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A cell that is rendered, spanning `rowspan` x `colspan` positions.
    Origin { rowspan: usize, colspan: usize },
    /// Part of the span of the origin at `(row, col)`.
    Covered { row: usize, col: usize },
    /// Past the end of a short row.
    Absent,
}

/// Resolve `^^` and `>>` markers into rectangular spans.
///
/// Pass 1 walks each column top to bottom: a cell without `merge_up` absorbs
/// the run of `merge_up` cells below it. Pass 2 walks each row left to right
/// the same way for `merge_left`. An origin then covers its rowspan by
/// colspan rectangle; a marker left outside every rectangle renders empty.
pub fn resolve_merges(table: &block::Table) -> Vec<Vec<Slot>> {
    let num_rows = table.rows.len();
    let num_cols = table.num_cols();
    let cell = |r: usize, c: usize| table.rows[r].cells.get(c);

    let mut rowspan = vec![vec![1usize; num_cols]; num_rows];
    for c in 0..num_cols {
        let mut r = 0;
        while r < num_rows {
            if cell(r, c).is_some_and(|origin| !origin.merge_up) {
                let mut end = r + 1;
                while end < num_rows && cell(end, c).is_some_and(|next| next.merge_up) {
                    end += 1;
                }
                rowspan[r][c] = end - r;
                r = end;
            } else {
                r += 1;
            }
        }
    }

    let mut colspan = vec![vec![1usize; num_cols]; num_rows];
    for r in 0..num_rows {
        let mut c = 0;
        while c < num_cols {
            if cell(r, c).is_some_and(|origin| !origin.merge_left) {
                let mut end = c + 1;
                while end < num_cols && cell(r, end).is_some_and(|next| next.merge_left) {
                    end += 1;
                }
                colspan[r][c] = end - c;
                c = end;
            } else {
                c += 1;
            }
        }
    }

    let mut slots = vec![vec![Slot::Absent; num_cols]; num_rows];
    for r in 0..num_rows {
        for c in 0..num_cols {
            if matches!(slots[r][c], Slot::Covered { .. }) || cell(r, c).is_none() {
                continue;
            }
            let (rs, cs) = match cell(r, c) {
                Some(source) if source.is_merge_marker() => (1, 1),
                _ => (rowspan[r][c], colspan[r][c]),
            };
            for row in slots.iter_mut().skip(r).take(rs) {
                for slot in row.iter_mut().skip(c).take(cs) {
                    *slot = Slot::Covered { row: r, col: c };
                }
            }
            slots[r][c] = Slot::Origin {
                rowspan: rs,
                colspan: cs,
            };
        }
    }

    slots
}

/// Build the output table; `None` for a table with no cells.
pub(super) fn build_table(ctx: &mut BuildContext, source: &block::Table) -> Option<Table> {
    let num_cols = source.num_cols();
    if source.rows.is_empty() || num_cols == 0 {
        return None;
    }

    let slots = resolve_merges(source);
    let format = ctx.table_format.clone();
    let col_width = TEXT_WIDTH / num_cols as u32;
    let header_rows = usize::from(source.has_header);

    let mut rows = Vec::with_capacity(source.rows.len());
    for (r, row_slots) in slots.iter().enumerate() {
        let is_header = r < header_rows;
        let shading = if is_header {
            Some(format.header_bg.clone())
        } else if format.alternating_rows && (r - header_rows) % 2 == 0 {
            Some(format.alt_row_bg.clone())
        } else {
            None
        };
        let base = if is_header {
            Run {
                bold: true,
                color: Some(format.header_text.clone()),
                ..Run::default()
            }
        } else {
            Run::default()
        };

        let mut cells = Vec::new();
        for (c, slot) in row_slots.iter().enumerate() {
            let mut cell = TableCell {
                shading: shading.clone(),
                ..TableCell::default()
            };
            match *slot {
                Slot::Origin { rowspan, colspan } => {
                    cell.grid_span = colspan as u32;
                    if rowspan > 1 {
                        cell.v_merge = Some(VMerge::Restart);
                    }
                    let content = source.rows[r].cells.get(c).map(cell_spans).unwrap_or(&[]);
                    let mut paragraph = Paragraph {
                        space_after: Some(0),
                        alignment: is_header.then_some(Alignment::Center),
                        ..Paragraph::default()
                    };
                    paragraph.content = ctx.inlines(content, &base);
                    cell.paragraphs.push(paragraph);
                }
                Slot::Covered { row, col } if row < r && col == c => {
                    // Continuation of a vertical span, as wide as its origin
                    if let Slot::Origin { colspan, .. } = slots[row][col] {
                        cell.grid_span = colspan as u32;
                    }
                    cell.v_merge = Some(VMerge::Continue);
                }
                Slot::Covered { .. } => continue,
                Slot::Absent => {}
            }
            if cell.paragraphs.is_empty() {
                cell.paragraphs.push(Paragraph::default());
            }
            cell.width = Some(col_width * cell.grid_span);
            cells.push(cell);
        }

        rows.push(TableRow {
            min_height: None,
            header: is_header,
            cells,
        });
    }

    Some(Table {
        style: ctx.resolver.table_style(),
        width: TableWidth::Pct(5000),
        indent: None,
        borders: Some(Borders::all_single()),
        grid: vec![col_width; num_cols],
        rows,
    })
}

fn cell_spans(cell: &SourceCell) -> &[block::TextSpan] {
    if cell.is_merge_marker() {
        &[]
    } else {
        &cell.content
    }
}
