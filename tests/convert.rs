use std::io::{Cursor, Read, Write};

use md2docx::{Block, Config, Template};
use roxmltree::{Document, Node};
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn read_part(package: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

fn part_names(package: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(package)).unwrap();
    archive.file_names().map(String::from).collect()
}

fn body_children<'a, 'input>(doc: &'a Document<'input>) -> Vec<Node<'a, 'input>> {
    let body = doc
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "body")))
        .unwrap();
    body.children().filter(|n| n.is_element()).collect()
}

fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.has_tag_name((W_NS, "t")))
        .filter_map(|n| n.text())
        .collect()
}

fn style_of(paragraph: Node) -> Option<String> {
    paragraph
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "pStyle")))
        .and_then(|n| n.attribute((W_NS, "val")))
        .map(String::from)
}

const SCENARIO: &str = "# Title\n\nHello **world**.\n\n- a\n- b\n\n| X | Y |\n|---|---|\n| 1 | 2 |";

#[test]
fn scenario_parses_in_order() {
    let blocks = md2docx::parse(SCENARIO);
    assert_eq!(blocks.len(), 4);
    assert!(matches!(
        &blocks[0],
        Block::Heading { level: 1, anchor, .. } if anchor == "title"
    ));
    match &blocks[1] {
        Block::Paragraph { content } => {
            assert!(content.iter().any(|span| span.bold && span.text == "world"));
        }
        other => panic!("expected paragraph, got {other:?}"),
    }
    match &blocks[2] {
        Block::List(list) => {
            assert!(!list.ordered);
            assert_eq!(list.items.len(), 2);
        }
        other => panic!("expected list, got {other:?}"),
    }
    match &blocks[3] {
        Block::Table(table) => {
            assert!(table.has_header);
            assert_eq!(table.rows.len(), 2);
        }
        other => panic!("expected table, got {other:?}"),
    }
}

#[test]
fn scenario_produces_package() {
    let package = md2docx::markdown_to_docx(SCENARIO).unwrap();

    let names = part_names(&package);
    assert_eq!(names[0], "[Content_Types].xml");
    for required in [
        "_rels/.rels",
        "word/document.xml",
        "word/styles.xml",
        "word/_rels/document.xml.rels",
    ] {
        assert!(names.iter().any(|n| n == required), "missing {required}");
    }

    let xml = read_part(&package, "word/document.xml");
    let doc = Document::parse(&xml).unwrap();
    let children = body_children(&doc);
    let tags: Vec<&str> = children.iter().map(|n| n.tag_name().name()).collect();
    assert_eq!(tags, vec!["p", "p", "p", "p", "tbl", "sectPr"]);

    assert_eq!(style_of(children[0]).as_deref(), Some("Heading1"));
    assert_eq!(text_of(children[0]), "Title");
    let bookmark = children[0]
        .descendants()
        .find(|n| n.has_tag_name((W_NS, "bookmarkStart")))
        .unwrap();
    assert_eq!(bookmark.attribute((W_NS, "name")), Some("title"));

    assert_eq!(text_of(children[1]), "Hello world.");
    let bold = children[1]
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "r")))
        .find(|r| r.descendants().any(|n| n.has_tag_name((W_NS, "b"))))
        .unwrap();
    assert_eq!(text_of(bold), "world");

    assert_eq!(text_of(children[2]), "- a");
    assert_eq!(text_of(children[3]), "- b");

    let rows: Vec<Node> = children[4]
        .children()
        .filter(|n| n.has_tag_name((W_NS, "tr")))
        .collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].descendants().any(|n| n.has_tag_name((W_NS, "tblHeader"))));
    assert_eq!(text_of(rows[1]), "12");
}

#[test]
fn empty_input_yields_valid_empty_document() {
    assert!(md2docx::parse("").is_empty());

    let package = md2docx::markdown_to_docx("").unwrap();
    let xml = read_part(&package, "word/document.xml");
    let doc = Document::parse(&xml).unwrap();
    let children = body_children(&doc);
    assert_eq!(children.len(), 1);
    assert!(children[0].has_tag_name((W_NS, "sectPr")));
}

#[test]
fn config_variables_are_injected() {
    let mut config = Config::compiled_default();
    config.variables.insert("name".into(), "World".into());

    let package =
        md2docx::markdown_to_docx_with_config("Hello {{name}}\n\n{{missing}}", &config, None)
            .unwrap();
    let xml = read_part(&package, "word/document.xml");
    let doc = Document::parse(&xml).unwrap();
    let texts: Vec<String> = body_children(&doc)
        .into_iter()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(text_of)
        .collect();
    assert_eq!(texts, vec!["Hello World", "{{missing}}"]);
}

#[test]
fn external_link_gets_relationship() {
    let package = md2docx::markdown_to_docx("See [docs](https://example.com).").unwrap();
    let rels = read_part(&package, "word/_rels/document.xml.rels");
    assert!(rels.contains(r#"Target="https://example.com""#));
    assert!(rels.contains(r#"TargetMode="External""#));
}

fn template_package() -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t>Cover for {{{{client}}}}</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#
    );
    let styles = format!(
        r#"<w:styles xmlns:w="{W_NS}"><w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style></w:styles>"#
    );
    let footer = format!(
        r#"<w:ftr xmlns:w="{W_NS}"><w:p><w:r><w:t>{{{{client}}}} confidential</w:t></w:r></w:p></w:ftr>"#
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("word/document.xml", document.as_str()),
        ("word/styles.xml", styles.as_str()),
        ("word/footer1.xml", footer.as_str()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

#[test]
fn convert_file_with_template() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.md");
    let template = dir.path().join("template.docx");
    let output = dir.path().join("report.docx");
    std::fs::write(&input, "# Summary\n\nPrepared for {{client}}.").unwrap();
    std::fs::write(&template, template_package()).unwrap();

    let mut config = Config::compiled_default();
    config.variables.insert("client".into(), "Acme".into());
    md2docx::convert_file(&input, &output, Some(&template), &config).unwrap();

    let package = std::fs::read(&output).unwrap();
    let xml = read_part(&package, "word/document.xml");
    let doc = Document::parse(&xml).unwrap();
    let children = body_children(&doc);
    assert_eq!(text_of(children[0]), "Cover for Acme");
    assert_eq!(text_of(children[1]), "Summary");
    assert_eq!(text_of(children[2]), "Prepared for Acme.");
    assert!(xml.contains(r#"<w:pgSz w:w="11906" w:h="16838"/>"#));

    let footer = read_part(&package, "word/footer1.xml");
    assert!(footer.contains("Acme confidential"));
}

#[test]
fn missing_template_falls_back_to_blank() {
    let template = Template::open(std::path::Path::new("does/not/exist.docx")).unwrap();
    assert!(template.preamble().is_empty());
    assert!(template.styles().contains("Normal"));
}

#[test]
fn corrupt_template_is_rejected() {
    assert!(matches!(
        Template::from_bytes(b"not a zip"),
        Err(md2docx::Error::Template { .. })
    ));
}

#[test]
fn template_bookmarks_keep_unique_ids() {
    let document = format!(
        r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:bookmarkStart w:id="0" w:name="cover"/><w:r><w:t>Cover</w:t></w:r><w:bookmarkEnd w:id="0"/></w:p><w:sectPr/></w:body></w:document>"#
    );
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    let template = Template::from_bytes(&zip.finish().unwrap().into_inner()).unwrap();

    let package = md2docx::markdown_to_docx_with_config(
        "# Intro",
        &Config::compiled_default(),
        Some(template),
    )
    .unwrap();
    let xml = read_part(&package, "word/document.xml");
    let doc = Document::parse(&xml).unwrap();
    let ids: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W_NS, "bookmarkStart")))
        .filter_map(|n| n.attribute((W_NS, "id")))
        .collect();
    assert_eq!(ids, vec!["0", "1"]);
}

#[test]
fn document_opening_with_rule_keeps_content() {
    let blocks = md2docx::parse("---\n\n# Title\n\nIntro text\n\n---\n\nMore");
    assert_eq!(blocks.len(), 5);
    assert!(matches!(blocks[0], Block::Rule));
}
