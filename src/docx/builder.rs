use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::block::{AdmonitionKind, Block, Document, TextSpan};
use crate::config::StyleConfig;
use crate::docx::model::{
    Alignment, BodyItem, Bookmark, Drawing, EMU_PER_INCH, Hyperlink, Inline, LinkTarget,
    MediaPart, OutputDocument, Paragraph, Relationship, RelationshipKind, Run, half_points, twips,
};
use crate::docx::package::Template;
use crate::docx::{admonition, list, media, table};
use crate::error::Result;
use crate::style::{AdmonitionFormat, CodeKind, ParagraphKind, StyleResolver, TableFormat};

pub(super) const LINK_COLOR: &str = "0563C1";

/// Left indent added per blockquote level.
const QUOTE_INDENT_IN: f32 = 0.5;

/// Where a block sits: accumulated left indent and whether it is quoted.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Nesting {
    pub indent: u32,
    pub quote: bool,
}

impl Nesting {
    pub fn indent_left(self) -> Option<u32> {
        if self.indent > 0 { Some(self.indent) } else { None }
    }
}

/// Turns a parsed [`Document`] into an [`OutputDocument`].
pub struct DocumentBuilder {
    styles: StyleConfig,
    template: Template,
    base_dir: Option<PathBuf>,
}

impl DocumentBuilder {
    pub fn new(styles: &StyleConfig, template: Option<Template>) -> Self {
        Self {
            styles: styles.clone(),
            template: template.unwrap_or_default(),
            base_dir: None,
        }
    }

    /// Directory relative image paths are resolved against.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn build(self, document: &Document) -> Result<OutputDocument> {
        self.styles.validate()?;
        let resolver = StyleResolver::new(&self.styles, self.template.styles());

        let mut admonitions = HashMap::new();
        for kind in AdmonitionKind::ALL {
            admonitions.insert(kind, resolver.admonition(kind)?);
        }
        let mut ctx = BuildContext {
            table_format: resolver.table_format()?,
            admonitions,
            inline_code_style: resolver.inline_code_style(),
            resolver: &resolver,
            base_dir: self.base_dir.as_deref(),
            relationships: Vec::new(),
            link_rels: HashMap::new(),
            media: Vec::new(),
            next_rel_id: self.template.next_rel_id(),
            next_bookmark_id: self.template.next_bookmark_id(),
            next_drawing_id: self.template.next_drawing_id(),
            anchors: HashSet::new(),
        };

        let mut body = Vec::new();
        for block in document {
            ctx.emit_block(block, Nesting::default(), &mut body);
        }
        log::debug!(
            "Built {} body items from {} blocks, {} media parts",
            body.len(),
            document.len(),
            ctx.media.len()
        );

        let relationships = ctx.relationships;
        let media = ctx.media;
        Ok(OutputDocument {
            body,
            relationships,
            media,
            styles: self.template.styles().clone(),
            template: self.template,
        })
    }
}

/// Mutable state of one build.
pub(super) struct BuildContext<'a> {
    pub resolver: &'a StyleResolver,
    pub table_format: TableFormat,
    admonitions: HashMap<AdmonitionKind, AdmonitionFormat>,
    inline_code_style: Option<String>,
    base_dir: Option<&'a Path>,
    relationships: Vec<Relationship>,
    link_rels: HashMap<String, String>,
    media: Vec<MediaPart>,
    next_rel_id: u32,
    next_bookmark_id: u32,
    next_drawing_id: u32,
    anchors: HashSet<String>,
}

impl BuildContext<'_> {
    pub fn emit_block(&mut self, block: &Block, nesting: Nesting, out: &mut Vec<BodyItem>) {
        match block {
            Block::Heading {
                level,
                content,
                anchor,
            } => {
                let mut paragraph = Paragraph::with_style(self.resolver.heading_style(*level));
                paragraph.indent_left = nesting.indent_left();
                paragraph.bookmark = self.bookmark(anchor);
                paragraph.content = self.inlines(content, &Run::default());
                out.push(BodyItem::Paragraph(paragraph));
            }
            Block::Paragraph { content } => {
                let kind = if nesting.quote {
                    ParagraphKind::Quote
                } else {
                    ParagraphKind::Normal
                };
                let mut paragraph = Paragraph::with_style(self.resolver.paragraph_style(kind));
                paragraph.indent_left = nesting.indent_left();
                paragraph.content = self.inlines(content, &Run::default());
                out.push(BodyItem::Paragraph(paragraph));
            }
            Block::CodeBlock { code, .. } => {
                let mut paragraph =
                    Paragraph::with_style(self.resolver.code_style(CodeKind::Block));
                paragraph.indent_left = nesting.indent_left();
                paragraph.push_run(self.code_run(code));
                out.push(BodyItem::Paragraph(paragraph));
            }
            Block::Blockquote { children } => {
                let inner = Nesting {
                    indent: nesting.indent + twips(QUOTE_INDENT_IN),
                    quote: true,
                };
                for child in children {
                    self.emit_block(child, inner, out);
                }
            }
            Block::List(items) => list::build_list(self, items, 0, nesting, out),
            Block::Table(data) => {
                if let Some(mut table) = table::build_table(self, data) {
                    table.indent = nesting.indent_left();
                    out.push(BodyItem::Table(table));
                }
            }
            Block::Image { src, alt, title } => {
                self.emit_image(src, alt, title.as_deref(), nesting, out);
            }
            Block::Rule => {
                out.push(BodyItem::Paragraph(Paragraph {
                    border_bottom: true,
                    indent_left: nesting.indent_left(),
                    ..Paragraph::default()
                }));
            }
            Block::Admonition {
                kind,
                title,
                children,
            } => {
                let mut table =
                    admonition::build_admonition(self, *kind, title.as_deref(), children);
                table.indent = nesting.indent_left();
                out.push(BodyItem::Table(table));
            }
        }
    }

    /// Spans to runs, grouping consecutive spans with the same link.
    pub fn inlines(&mut self, spans: &[TextSpan], base: &Run) -> Vec<Inline> {
        let mut out: Vec<Inline> = Vec::new();
        let mut open_link: Option<&str> = None;

        for span in spans {
            let run = self.span_run(span, base);
            let Some(url) = span.link() else {
                out.push(Inline::Run(run));
                open_link = None;
                continue;
            };
            if open_link == Some(url) {
                if let Some(Inline::Hyperlink(link)) = out.last_mut() {
                    link.runs.push(link_run(run));
                    continue;
                }
            }
            match self.link_target(url) {
                Some(target) => {
                    out.push(Inline::Hyperlink(Hyperlink {
                        target,
                        runs: vec![link_run(run)],
                    }));
                    open_link = Some(url);
                }
                None => {
                    out.push(Inline::Run(run));
                    open_link = None;
                }
            }
        }

        out
    }

    fn span_run(&self, span: &TextSpan, base: &Run) -> Run {
        let mut run = Run {
            text: span.text.clone(),
            ..base.clone()
        };
        run.bold |= span.bold;
        run.italic |= span.italic;
        run.strike |= span.strikethrough;
        if span.code {
            let code = &self.resolver.config().code;
            run.font = Some(code.font.clone());
            run.size = Some(half_points(code.size));
            run.char_style = self.inline_code_style.clone();
        }
        run
    }

    /// A monospace run for code block text.
    pub fn code_run(&self, code: &str) -> Run {
        let config = &self.resolver.config().code;
        Run {
            font: Some(config.font.clone()),
            size: Some(half_points(config.size)),
            ..Run::text(code)
        }
    }

    fn link_target(&mut self, url: &str) -> Option<LinkTarget> {
        if let Some(anchor) = url.strip_prefix('#') {
            if anchor.is_empty() {
                return None;
            }
            return Some(LinkTarget::Anchor(anchor.to_string()));
        }
        if let Some(id) = self.link_rels.get(url) {
            return Some(LinkTarget::External(id.clone()));
        }
        let id = self.next_rel();
        self.relationships.push(Relationship {
            id: id.clone(),
            kind: RelationshipKind::Hyperlink,
            target: url.to_string(),
        });
        self.link_rels.insert(url.to_string(), id.clone());
        Some(LinkTarget::External(id))
    }

    fn next_rel(&mut self) -> String {
        let id = format!("rId{}", self.next_rel_id);
        self.next_rel_id += 1;
        id
    }

    /// Only the first heading with a given anchor gets the bookmark.
    fn bookmark(&mut self, anchor: &str) -> Option<Bookmark> {
        if !self.anchors.insert(anchor.to_string()) {
            return None;
        }
        let id = self.next_bookmark_id;
        self.next_bookmark_id += 1;
        Some(Bookmark {
            id,
            name: anchor.to_string(),
        })
    }

    pub fn admonition_format(&self, kind: AdmonitionKind) -> AdmonitionFormat {
        self.admonitions
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| AdmonitionFormat {
                icon: String::new(),
                color: "000000".to_string(),
                bg: "FFFFFF".to_string(),
            })
    }

    fn emit_image(
        &mut self,
        src: &str,
        alt: &str,
        title: Option<&str>,
        nesting: Nesting,
        out: &mut Vec<BodyItem>,
    ) {
        let images = self.resolver.config().images.clone();
        let mut paragraph = Paragraph {
            alignment: Some(Alignment::Center),
            indent_left: nesting.indent_left(),
            ..Paragraph::default()
        };

        let description = title.unwrap_or(alt);
        match self.embed_image(src, description, images.width) {
            Some(drawing) => paragraph.push_run(Run {
                drawing: Some(drawing),
                ..Run::default()
            }),
            None => {
                let label = if alt.is_empty() { src } else { alt };
                paragraph.push_run(Run {
                    italic: true,
                    ..Run::text(format!("[Image: {}]", label))
                });
            }
        }
        out.push(BodyItem::Paragraph(paragraph));

        if !alt.is_empty() {
            let mut caption = Paragraph {
                alignment: Some(Alignment::Center),
                indent_left: nesting.indent_left(),
                ..Paragraph::default()
            };
            caption.push_run(Run {
                italic: true,
                size: Some(half_points(images.caption_size)),
                ..Run::text(alt)
            });
            out.push(BodyItem::Paragraph(caption));
        }
    }

    fn embed_image(&mut self, src: &str, description: &str, width_in: f32) -> Option<Drawing> {
        if src.contains("://") || src.starts_with("data:") {
            log::debug!("Remote image {} not embedded", src);
            return None;
        }
        let path = match self.base_dir {
            Some(dir) if Path::new(src).is_relative() => dir.join(src),
            _ => PathBuf::from(src),
        };
        let (info, bytes) = media::load(&path)?;

        let name = format!("image{}.{}", self.media.len() + 1, info.format.extension());
        let rel_id = self.next_rel();
        self.relationships.push(Relationship {
            id: rel_id.clone(),
            kind: RelationshipKind::Image,
            target: format!("media/{}", name),
        });
        self.media.push(MediaPart {
            name: name.clone(),
            bytes,
        });

        let width_emu = (width_in * EMU_PER_INCH).round() as u64;
        let height_emu = width_emu * u64::from(info.height) / u64::from(info.width);
        let id = self.next_drawing_id;
        self.next_drawing_id += 1;

        Some(Drawing {
            rel_id,
            id,
            name,
            description: description.to_string(),
            width_emu,
            height_emu,
        })
    }
}

fn link_run(run: Run) -> Run {
    Run {
        color: Some(LINK_COLOR.to_string()),
        underline: true,
        ..run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{List, ListItem};
    use crate::docx::model::{Table, TableWidth};
    use crate::error::Error;
    use crate::parser::parse;

    pub(crate) fn build(markdown: &str) -> OutputDocument {
        DocumentBuilder::new(&StyleConfig::default(), None)
            .build(&parse(markdown))
            .unwrap()
    }

    fn paragraphs(doc: &OutputDocument) -> Vec<&Paragraph> {
        doc.body
            .iter()
            .filter_map(|item| match item {
                BodyItem::Paragraph(p) => Some(p),
                BodyItem::Table(_) => None,
            })
            .collect()
    }

    #[test]
    fn empty_document_has_no_body() {
        let doc = DocumentBuilder::new(&StyleConfig::default(), None)
            .build(&Vec::new())
            .unwrap();
        assert!(doc.body.is_empty());
        assert!(doc.relationships.is_empty());
    }

    #[test]
    fn heading_gets_style_and_bookmark() {
        let doc = build("# Getting Started\n\n## Getting Started");
        let ps = paragraphs(&doc);
        assert_eq!(ps[0].style.as_deref(), Some("Heading1"));
        assert_eq!(ps[1].style.as_deref(), Some("Heading2"));
        let bookmark = ps[0].bookmark.as_ref().unwrap();
        assert_eq!(bookmark.name, "getting-started");
        assert!(ps[1].bookmark.is_none());
    }

    #[test]
    fn all_span_flags_reach_the_run() {
        let doc = build("***~~`x`~~***");
        let run = paragraphs(&doc)[0].runs().next().unwrap().clone();
        assert!(run.bold && run.italic && run.strike);
        assert_eq!(run.font.as_deref(), Some("Consolas"));
        assert_eq!(run.size, Some(20));
        assert_eq!(run.char_style.as_deref(), Some("CodeChar"));
    }

    #[test]
    fn external_links_share_a_relationship() {
        let doc = build("[a](https://x.test) and [b](https://x.test)");
        assert_eq!(doc.relationships.len(), 1);
        let rel = &doc.relationships[0];
        assert_eq!(rel.kind, RelationshipKind::Hyperlink);
        assert_eq!(rel.target, "https://x.test");

        let p = paragraphs(&doc)[0];
        let links: Vec<&Hyperlink> = p
            .content
            .iter()
            .filter_map(|i| match i {
                Inline::Hyperlink(h) => Some(h),
                Inline::Run(_) => None,
            })
            .collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, LinkTarget::External(rel.id.clone()));
        assert!(links[0].runs[0].underline);
        assert_eq!(links[0].runs[0].color.as_deref(), Some(LINK_COLOR));
    }

    #[test]
    fn formatted_link_text_stays_one_hyperlink() {
        let doc = build("[plain **bold**](https://x.test)");
        let p = paragraphs(&doc)[0];
        assert_eq!(p.content.len(), 1);
        let Inline::Hyperlink(link) = &p.content[0] else {
            panic!("expected hyperlink");
        };
        assert_eq!(link.runs.len(), 2);
        assert!(link.runs[1].bold);
    }

    #[test]
    fn hash_links_are_internal() {
        let doc = build("# Intro\n\nSee [intro](#intro).");
        assert!(doc.relationships.is_empty());
        let p = paragraphs(&doc)[1];
        assert!(p.content.iter().any(|i| matches!(
            i,
            Inline::Hyperlink(Hyperlink { target: LinkTarget::Anchor(name), .. }) if name == "intro"
        )));
    }

    #[test]
    fn code_block_is_one_monospace_run() {
        let doc = build("```\nfn main() {\n    run();\n}\n```");
        let p = paragraphs(&doc)[0];
        let runs: Vec<&Run> = p.runs().collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "fn main() {\n    run();\n}");
        assert_eq!(runs[0].font.as_deref(), Some("Consolas"));
        assert_eq!(p.style.as_deref(), Some("CodeBlock"));
    }

    #[test]
    fn blockquote_indents_per_level() {
        let doc = build("> outer\n>\n> > inner");
        let ps = paragraphs(&doc);
        assert_eq!(ps[0].style.as_deref(), Some("Quote"));
        assert_eq!(ps[0].indent_left, Some(720));
        assert_eq!(ps[1].indent_left, Some(1440));
    }

    #[test]
    fn missing_image_falls_back_to_placeholder() {
        let doc = build("![Diagram](does/not/exist.png)");
        let ps = paragraphs(&doc);
        assert_eq!(ps.len(), 2);
        let placeholder = ps[0].runs().next().unwrap();
        assert_eq!(placeholder.text, "[Image: Diagram]");
        assert!(placeholder.italic);
        let caption = ps[1].runs().next().unwrap();
        assert_eq!(caption.text, "Diagram");
        assert_eq!(caption.size, Some(20));
        assert!(doc.media.is_empty());
    }

    #[test]
    fn local_image_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pic.png"),
            crate::docx::media::tests::png_header(200, 100),
        )
        .unwrap();

        let doc = DocumentBuilder::new(&StyleConfig::default(), None)
            .base_dir(dir.path())
            .build(&parse("![](pic.png)"))
            .unwrap();

        assert_eq!(doc.media.len(), 1);
        assert_eq!(doc.media[0].name, "image1.png");
        let ps = paragraphs(&doc);
        assert_eq!(ps.len(), 1, "no caption without alt text");
        let drawing = ps[0].runs().next().unwrap().drawing.clone().unwrap();
        assert_eq!(drawing.width_emu, 5 * 914_400);
        assert_eq!(drawing.height_emu, 5 * 914_400 / 2);
        let rel = doc.relationship(&drawing.rel_id).unwrap();
        assert_eq!(rel.target, "media/image1.png");
    }

    #[test]
    fn rule_is_bordered_paragraph() {
        let doc = build("---");
        assert!(paragraphs(&doc)[0].border_bottom);
    }

    #[test]
    fn list_children_nest_under_items() {
        let doc = DocumentBuilder::new(&StyleConfig::default(), None)
            .build(&vec![Block::List(List {
                ordered: false,
                start: 1,
                items: vec![ListItem {
                    content: vec![TextSpan::plain("item")],
                    children: vec![Block::Paragraph {
                        content: vec![TextSpan::plain("more")],
                    }],
                }],
            })])
            .unwrap();
        let ps = paragraphs(&doc);
        assert_eq!(ps[0].text(), "- item");
        assert_eq!(ps[1].text(), "more");
        assert_eq!(ps[1].indent_left, ps[0].indent_left);
    }

    #[test]
    fn invalid_styles_fail_before_building() {
        let mut styles = StyleConfig::default();
        styles.admonitions.tip.bg = Some("green".into());
        let err = DocumentBuilder::new(&styles, None)
            .build(&parse("text"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let mut styles = StyleConfig::default();
        styles.images.width = -2.0;
        let err = DocumentBuilder::new(&styles, None)
            .build(&parse("![a](pic.png)"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn relationship_ids_follow_template() {
        let doc = build("[x](https://a.test)");
        // rId1 is the blank template's styles relationship
        assert_eq!(doc.relationships[0].id, "rId2");
    }

    #[test]
    fn nested_tables_follow_the_indent() {
        let doc = build("| A |\n|---|\n| 1 |\n\n> | B |\n> |---|\n> | 2 |");
        let tables: Vec<&Table> = doc.tables().collect();
        assert_eq!(tables[0].indent, None);
        assert_eq!(tables[1].indent, Some(720));

        let doc = build("- item\n\n  > [!NOTE]\n  > inside");
        let callout = doc.tables().next().unwrap();
        assert_eq!(callout.indent, Some(504));
    }

    #[test]
    fn template_ids_are_not_reused() {
        use std::io::{Cursor, Write};
        use zip::write::SimpleFileOptions;

        let document = concat!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            r#"<w:body><w:p><w:bookmarkStart w:id="0" w:name="cover"/><w:bookmarkEnd w:id="0"/></w:p>"#,
            r#"<w:sectPr/></w:body></w:document>"#,
        );
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        let template = Template::from_bytes(&zip.finish().unwrap().into_inner()).unwrap();

        let doc = DocumentBuilder::new(&StyleConfig::default(), Some(template))
            .build(&parse("# Intro\n\n# Usage"))
            .unwrap();
        let ids: Vec<u32> = paragraphs(&doc)
            .iter()
            .filter_map(|p| p.bookmark.as_ref().map(|b| b.id))
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn admonition_becomes_table() {
        let doc = build("> [!TIP]\n> Try it.");
        let tables: Vec<&Table> = doc.tables().collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].width, TableWidth::Pct(5000));
    }
}
