//! WordprocessingML serialization of the output model.

use crate::docx::model::{
    BodyItem, Border, Borders, Drawing, Hyperlink, Inline, LinkTarget, OutputDocument, Paragraph,
    Run, Table, TableCell, TableRow, TableWidth, VMerge,
};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
pub const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `word/document.xml` for the document, template content first.
pub fn document_xml(doc: &OutputDocument) -> String {
    let template = &doc.template;
    let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push_str("\n<w:document");
    for (prefix, uri) in template.namespaces() {
        out.push_str(&format!(r#" xmlns:{}="{}""#, prefix, escape(uri)));
    }
    if let Some(ignorable) = template.ignorable() {
        out.push_str(&format!(r#" mc:Ignorable="{}""#, escape(ignorable)));
    }
    out.push_str("><w:body>");

    for raw in template.preamble() {
        out.push_str(raw);
    }
    for item in &doc.body {
        match item {
            BodyItem::Paragraph(paragraph) => write_paragraph(&mut out, paragraph),
            BodyItem::Table(table) => write_table(&mut out, table),
        }
    }
    out.push_str(template.sect_pr());

    out.push_str("</w:body></w:document>");
    out
}

#[cfg(test)]
fn paragraph_xml(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    write_paragraph(&mut out, paragraph);
    out
}

#[cfg(test)]
fn table_xml(table: &Table) -> String {
    let mut out = String::new();
    write_table(&mut out, table);
    out
}

fn write_paragraph(out: &mut String, p: &Paragraph) {
    out.push_str("<w:p>");

    let mut ppr = String::new();
    if let Some(style) = &p.style {
        ppr.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, escape(style)));
    }
    if p.border_bottom {
        ppr.push_str(
            r#"<w:pBdr><w:bottom w:val="single" w:sz="6" w:space="1" w:color="auto"/></w:pBdr>"#,
        );
    }
    if p.space_before.is_some() || p.space_after.is_some() {
        ppr.push_str("<w:spacing");
        if let Some(before) = p.space_before {
            ppr.push_str(&format!(r#" w:before="{}""#, before));
        }
        if let Some(after) = p.space_after {
            ppr.push_str(&format!(r#" w:after="{}""#, after));
        }
        ppr.push_str("/>");
    }
    if let Some(left) = p.indent_left {
        ppr.push_str(&format!(r#"<w:ind w:left="{}"/>"#, left));
    }
    if let Some(alignment) = p.alignment {
        ppr.push_str(&format!(r#"<w:jc w:val="{}"/>"#, alignment.as_str()));
    }
    if !ppr.is_empty() {
        out.push_str("<w:pPr>");
        out.push_str(&ppr);
        out.push_str("</w:pPr>");
    }

    if let Some(bookmark) = &p.bookmark {
        out.push_str(&format!(
            r#"<w:bookmarkStart w:id="{}" w:name="{}"/>"#,
            bookmark.id,
            escape(&bookmark.name)
        ));
    }
    for inline in &p.content {
        match inline {
            Inline::Run(run) => write_run(out, run),
            Inline::Hyperlink(link) => write_hyperlink(out, link),
        }
    }
    if let Some(bookmark) = &p.bookmark {
        out.push_str(&format!(r#"<w:bookmarkEnd w:id="{}"/>"#, bookmark.id));
    }

    out.push_str("</w:p>");
}

fn write_hyperlink(out: &mut String, link: &Hyperlink) {
    match &link.target {
        LinkTarget::External(rel_id) => {
            out.push_str(&format!(
                r#"<w:hyperlink r:id="{}" w:history="1">"#,
                escape(rel_id)
            ));
        }
        LinkTarget::Anchor(name) => {
            out.push_str(&format!(
                r#"<w:hyperlink w:anchor="{}" w:history="1">"#,
                escape(name)
            ));
        }
    }
    for run in &link.runs {
        write_run(out, run);
    }
    out.push_str("</w:hyperlink>");
}

fn write_run(out: &mut String, run: &Run) {
    out.push_str("<w:r>");

    // Element order follows CT_RPr
    let mut rpr = String::new();
    if let Some(style) = &run.char_style {
        rpr.push_str(&format!(r#"<w:rStyle w:val="{}"/>"#, escape(style)));
    }
    if let Some(font) = &run.font {
        let font = escape(font);
        rpr.push_str(&format!(
            r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:cs="{0}"/>"#,
            font
        ));
    }
    if run.bold {
        rpr.push_str("<w:b/>");
    }
    if run.italic {
        rpr.push_str("<w:i/>");
    }
    if run.strike {
        rpr.push_str("<w:strike/>");
    }
    if let Some(color) = &run.color {
        rpr.push_str(&format!(r#"<w:color w:val="{}"/>"#, escape(color)));
    }
    if let Some(size) = run.size {
        rpr.push_str(&format!(r#"<w:sz w:val="{0}"/><w:szCs w:val="{0}"/>"#, size));
    }
    if run.underline {
        rpr.push_str(r#"<w:u w:val="single"/>"#);
    }
    if !rpr.is_empty() {
        out.push_str("<w:rPr>");
        out.push_str(&rpr);
        out.push_str("</w:rPr>");
    }

    if let Some(drawing) = &run.drawing {
        write_drawing(out, drawing);
    }
    write_run_text(out, &run.text);

    out.push_str("</w:r>");
}

fn write_run_text(out: &mut String, text: &str) {
    let mut pending = String::new();
    let flush = |out: &mut String, pending: &mut String| {
        if !pending.is_empty() {
            out.push_str(r#"<w:t xml:space="preserve">"#);
            out.push_str(&escape(pending));
            out.push_str("</w:t>");
            pending.clear();
        }
    };
    for ch in text.chars() {
        match ch {
            '\n' => {
                flush(out, &mut pending);
                out.push_str("<w:br/>");
            }
            '\t' => {
                flush(out, &mut pending);
                out.push_str("<w:tab/>");
            }
            _ => pending.push(ch),
        }
    }
    flush(out, &mut pending);
}

fn write_drawing(out: &mut String, d: &Drawing) {
    let name = escape(&d.name);
    out.push_str(&format!(
        concat!(
            r#"<w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}" descr="{descr}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="{pic_ns}"><pic:pic>"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#,
        ),
        cx = d.width_emu,
        cy = d.height_emu,
        id = d.id,
        name = name,
        descr = escape(&d.description),
        pic_ns = PIC_NS,
        rel = escape(&d.rel_id),
    ));
}

fn write_border(out: &mut String, side: &str, border: &Border) {
    match border {
        Border::Nil => out.push_str(&format!(r#"<w:{} w:val="nil"/>"#, side)),
        Border::Single { size, color } => out.push_str(&format!(
            r#"<w:{} w:val="single" w:sz="{}" w:space="0" w:color="{}"/>"#,
            side,
            size,
            color.as_deref().unwrap_or("auto")
        )),
    }
}

fn write_borders(out: &mut String, element: &str, borders: &Borders) {
    out.push_str(&format!("<w:{}>", element));
    write_border(out, "top", &borders.top);
    write_border(out, "left", &borders.left);
    write_border(out, "bottom", &borders.bottom);
    write_border(out, "right", &borders.right);
    write_border(out, "insideH", &borders.inside_h);
    write_border(out, "insideV", &borders.inside_v);
    out.push_str(&format!("</w:{}>", element));
}

fn write_table(out: &mut String, table: &Table) {
    out.push_str("<w:tbl><w:tblPr>");
    if let Some(style) = &table.style {
        out.push_str(&format!(r#"<w:tblStyle w:val="{}"/>"#, escape(style)));
    }
    match table.width {
        TableWidth::Auto => out.push_str(r#"<w:tblW w:w="0" w:type="auto"/>"#),
        TableWidth::Pct(pct) => out.push_str(&format!(r#"<w:tblW w:w="{}" w:type="pct"/>"#, pct)),
    }
    if let Some(indent) = table.indent {
        out.push_str(&format!(r#"<w:tblInd w:w="{}" w:type="dxa"/>"#, indent));
    }
    if let Some(borders) = &table.borders {
        write_borders(out, "tblBorders", borders);
    }
    out.push_str(r#"<w:tblLook w:val="04A0" w:firstRow="1" w:lastRow="0" w:firstColumn="1" w:lastColumn="0" w:noHBand="0" w:noVBand="1"/>"#);
    out.push_str("</w:tblPr><w:tblGrid>");
    for width in &table.grid {
        out.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, width));
    }
    out.push_str("</w:tblGrid>");

    for row in &table.rows {
        write_row(out, row);
    }
    out.push_str("</w:tbl>");
}

fn write_row(out: &mut String, row: &TableRow) {
    out.push_str("<w:tr>");
    if row.min_height.is_some() || row.header {
        out.push_str("<w:trPr>");
        if let Some(height) = row.min_height {
            out.push_str(&format!(r#"<w:trHeight w:val="{}" w:hRule="atLeast"/>"#, height));
        }
        if row.header {
            out.push_str("<w:tblHeader/>");
        }
        out.push_str("</w:trPr>");
    }
    for cell in &row.cells {
        write_cell(out, cell);
    }
    out.push_str("</w:tr>");
}

fn write_cell(out: &mut String, cell: &TableCell) {
    out.push_str("<w:tc><w:tcPr>");
    match cell.width {
        Some(width) => out.push_str(&format!(r#"<w:tcW w:w="{}" w:type="dxa"/>"#, width)),
        None => out.push_str(r#"<w:tcW w:w="0" w:type="auto"/>"#),
    }
    if cell.grid_span > 1 {
        out.push_str(&format!(r#"<w:gridSpan w:val="{}"/>"#, cell.grid_span));
    }
    match cell.v_merge {
        Some(VMerge::Restart) => out.push_str(r#"<w:vMerge w:val="restart"/>"#),
        Some(VMerge::Continue) => out.push_str("<w:vMerge/>"),
        None => {}
    }
    if let Some(borders) = &cell.borders {
        write_borders(out, "tcBorders", borders);
    }
    if let Some(fill) = &cell.shading {
        out.push_str(&format!(
            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
            escape(fill)
        ));
    }
    if let Some(v_align) = cell.v_align {
        out.push_str(&format!(r#"<w:vAlign w:val="{}"/>"#, v_align.as_str()));
    }
    out.push_str("</w:tcPr>");

    if cell.paragraphs.is_empty() {
        out.push_str("<w:p/>");
    }
    for paragraph in &cell.paragraphs {
        write_paragraph(out, paragraph);
    }
    out.push_str("</w:tc>");
}
