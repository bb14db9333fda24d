//! Reading template packages and writing the finished `.docx`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::docx::model::{OutputDocument, RelationshipKind};
use crate::docx::xml::{self, A_NS, MC_NS, PIC_NS, R_NS, W_NS, WP_NS, escape};
use crate::error::{Error, Result};
use crate::style::StyleSheet;

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const STYLES_PART: &str = "word/styles.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const HYPERLINK_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const DEFAULT_STYLES: &str = include_str!("default_styles.xml");

const DEFAULT_SECT_PR: &str = concat!(
    r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
    r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
    r#"</w:sectPr>"#,
);

/// Namespaces the generated markup relies on.
const REQUIRED_NAMESPACES: [(&str, &str); 6] = [
    ("w", W_NS),
    ("r", R_NS),
    ("wp", WP_NS),
    ("a", A_NS),
    ("pic", PIC_NS),
    ("mc", MC_NS),
];

fn content_types_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#
}

fn rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
}

fn word_rels_xml() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#
}

/// A base `.docx` whose styles, headers, footers and leading body content are
/// carried into the output.
#[derive(Debug, Clone)]
pub struct Template {
    parts: BTreeMap<String, Vec<u8>>,
    namespaces: Vec<(String, String)>,
    ignorable: Option<String>,
    preamble: Vec<String>,
    sect_pr: String,
    styles: StyleSheet,
    next_rel_id: u32,
    next_bookmark_id: u32,
    next_drawing_id: u32,
}

impl Default for Template {
    fn default() -> Self {
        Self::blank()
    }
}

impl Template {
    /// An empty document with the bundled default styles.
    pub fn blank() -> Self {
        let mut parts = BTreeMap::new();
        parts.insert(CONTENT_TYPES_PART.to_string(), content_types_xml().as_bytes().to_vec());
        parts.insert("_rels/.rels".to_string(), rels_xml().as_bytes().to_vec());
        parts.insert(DOCUMENT_RELS_PART.to_string(), word_rels_xml().as_bytes().to_vec());
        parts.insert(STYLES_PART.to_string(), DEFAULT_STYLES.as_bytes().to_vec());

        Self {
            parts,
            namespaces: merge_namespaces(Vec::new()),
            ignorable: None,
            preamble: Vec::new(),
            sect_pr: DEFAULT_SECT_PR.to_string(),
            styles: parse_styles(DEFAULT_STYLES).unwrap_or_default(),
            next_rel_id: 2,
            next_bookmark_id: 0,
            next_drawing_id: 1,
        }
    }

    /// Load a template from a path. A missing file gives the blank template.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Template {} not found, using blank document", path.display());
            return Ok(Self::blank());
        }
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes).map_err(|e| match e {
            Error::Template { message, .. } => Error::Template {
                message,
                path: Some(path.to_path_buf()),
            },
            other => other,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::template(format!("not a .docx package: {}", e)))?;

        let mut parts = BTreeMap::new();
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| Error::template(format!("unreadable package entry: {}", e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| Error::template(format!("unreadable part {}: {}", name, e)))?;
            parts.insert(name, data);
        }

        let document = part_text(&parts, DOCUMENT_PART)?
            .ok_or_else(|| Error::template(format!("package has no {}", DOCUMENT_PART)))?;
        let doc = roxmltree::Document::parse(&document)
            .map_err(|e| Error::template(format!("malformed {}: {}", DOCUMENT_PART, e)))?;
        let root = doc.root_element();

        let declared = root
            .namespaces()
            .filter_map(|ns| ns.name().map(|prefix| (prefix.to_string(), ns.uri().to_string())))
            .collect();
        let ignorable = root.attribute((MC_NS, "Ignorable")).map(String::from);

        let mut preamble = Vec::new();
        let mut sect_pr = None;
        if let Some(body) = root.children().find(|n| n.has_tag_name((W_NS, "body"))) {
            for child in body.children().filter(|n| n.is_element()) {
                let raw = document[child.range()].to_string();
                if child.has_tag_name((W_NS, "sectPr")) {
                    sect_pr = Some(raw);
                } else {
                    preamble.push(raw);
                }
            }
        }

        // Generated bookmarks and drawings must not reuse the template's ids
        let next_bookmark_id = max_bookmark_id(&doc).map_or(0, |id| id + 1);
        let mut max_drawing = max_drawing_id(&doc);
        for name in header_footer_names(&parts) {
            let Some(text) = parts.get(&name).and_then(|b| std::str::from_utf8(b).ok()) else {
                continue;
            };
            match roxmltree::Document::parse(text) {
                Ok(part) => max_drawing = max_drawing.max(max_drawing_id(&part)),
                Err(e) => log::debug!("Not scanning {} for drawing ids: {}", name, e),
            }
        }
        let next_drawing_id = max_drawing.map_or(1, |id| id + 1);

        let styles = match part_text(&parts, STYLES_PART)? {
            Some(text) => parse_styles(&text)?,
            None => StyleSheet::default(),
        };
        let next_rel_id = match part_text(&parts, DOCUMENT_RELS_PART)? {
            Some(text) => max_rel_id(&text)? + 1,
            None => 1,
        };

        log::debug!(
            "Loaded template: {} parts, {} styles, {} preamble blocks",
            parts.len(),
            styles.universe().len(),
            preamble.len()
        );

        Ok(Self {
            parts,
            namespaces: merge_namespaces(declared),
            ignorable,
            preamble,
            sect_pr: sect_pr.unwrap_or_else(|| DEFAULT_SECT_PR.to_string()),
            styles,
            next_rel_id,
            next_bookmark_id,
            next_drawing_id,
        })
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    pub fn ignorable(&self) -> Option<&str> {
        self.ignorable.as_deref()
    }

    /// Body content of the template, emitted ahead of converted content.
    pub fn preamble(&self) -> &[String] {
        &self.preamble
    }

    pub fn preamble_mut(&mut self) -> &mut Vec<String> {
        &mut self.preamble
    }

    pub fn sect_pr(&self) -> &str {
        &self.sect_pr
    }

    /// First relationship number not taken by the template.
    pub fn next_rel_id(&self) -> u32 {
        self.next_rel_id
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        self.parts.insert(name.to_string(), bytes);
    }

    /// First bookmark id not used by the template body.
    pub fn next_bookmark_id(&self) -> u32 {
        self.next_bookmark_id
    }

    /// First drawing (`wp:docPr`) id not used by the template.
    pub fn next_drawing_id(&self) -> u32 {
        self.next_drawing_id
    }

    /// `word/header*.xml` and `word/footer*.xml` part names.
    pub fn header_footer_parts(&self) -> Vec<String> {
        header_footer_names(&self.parts)
    }
}

fn header_footer_names(parts: &BTreeMap<String, Vec<u8>>) -> Vec<String> {
    parts
        .keys()
        .filter(|name| {
            (name.starts_with("word/header") || name.starts_with("word/footer"))
                && name.ends_with(".xml")
        })
        .cloned()
        .collect()
}

fn max_bookmark_id(doc: &roxmltree::Document) -> Option<u32> {
    doc.descendants()
        .filter(|n| n.has_tag_name((W_NS, "bookmarkStart")))
        .filter_map(|n| n.attribute((W_NS, "id")))
        .filter_map(|id| id.parse::<u32>().ok())
        .max()
}

fn max_drawing_id(doc: &roxmltree::Document) -> Option<u32> {
    doc.descendants()
        .filter(|n| n.has_tag_name((WP_NS, "docPr")))
        .filter_map(|n| n.attribute("id"))
        .filter_map(|id| id.parse::<u32>().ok())
        .max()
}

fn part_text(parts: &BTreeMap<String, Vec<u8>>, name: &str) -> Result<Option<String>> {
    match parts.get(name) {
        Some(bytes) => String::from_utf8(bytes.clone())
            .map(Some)
            .map_err(|_| Error::template(format!("{} is not UTF-8", name))),
        None => Ok(None),
    }
}

/// Template declarations first, then whatever the generated markup still needs.
fn merge_namespaces(mut declared: Vec<(String, String)>) -> Vec<(String, String)> {
    for (prefix, uri) in REQUIRED_NAMESPACES {
        if !declared.iter().any(|(p, _)| p == prefix) {
            declared.push((prefix.to_string(), uri.to_string()));
        }
    }
    declared
}

/// Style names and ids from `word/styles.xml`.
pub fn parse_styles(text: &str) -> Result<StyleSheet> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| Error::template(format!("malformed {}: {}", STYLES_PART, e)))?;
    let mut sheet = StyleSheet::default();
    for style in doc.descendants().filter(|n| n.has_tag_name((W_NS, "style"))) {
        let Some(id) = style.attribute((W_NS, "styleId")) else {
            continue;
        };
        let name = style
            .children()
            .find(|n| n.has_tag_name((W_NS, "name")))
            .and_then(|n| n.attribute((W_NS, "val")))
            .unwrap_or(id);
        sheet.insert(name, id);
    }
    Ok(sheet)
}

fn max_rel_id(text: &str) -> Result<u32> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| Error::template(format!("malformed {}: {}", DOCUMENT_RELS_PART, e)))?;
    Ok(doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| n.attribute("Id"))
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0))
}

fn media_content_type(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

fn with_relationships(rels: &str, doc: &OutputDocument) -> String {
    let mut added = String::new();
    for rel in &doc.relationships {
        match rel.kind {
            RelationshipKind::Hyperlink => added.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}" TargetMode="External"/>"#,
                escape(&rel.id),
                HYPERLINK_REL,
                escape(&rel.target)
            )),
            RelationshipKind::Image => added.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
                escape(&rel.id),
                IMAGE_REL,
                escape(&rel.target)
            )),
        }
    }
    match rels.rfind("</Relationships>") {
        Some(at) => format!("{}{}{}", &rels[..at], added, &rels[at..]),
        None => format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            added
        ),
    }
}

fn with_media_types(types: &str, extensions: &BTreeSet<String>) -> String {
    let lower = types.to_lowercase();
    let mut added = String::new();
    for ext in extensions {
        if !lower.contains(&format!(r#"extension="{}""#, ext)) {
            added.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                ext,
                media_content_type(ext)
            ));
        }
    }
    match types.rfind("</Types>") {
        Some(at) => format!("{}{}{}", &types[..at], added, &types[at..]),
        None => types.to_string(),
    }
}

impl OutputDocument {
    /// Serialize the package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut parts = self.template.parts.clone();
        parts.insert(DOCUMENT_PART.to_string(), xml::document_xml(self).into_bytes());

        let rels = part_text(&parts, DOCUMENT_RELS_PART)?.unwrap_or_default();
        parts.insert(
            DOCUMENT_RELS_PART.to_string(),
            with_relationships(&rels, self).into_bytes(),
        );

        let mut extensions = BTreeSet::new();
        for media in &self.media {
            if let Some((_, ext)) = media.name.rsplit_once('.') {
                extensions.insert(ext.to_lowercase());
            }
            parts.insert(format!("word/media/{}", media.name), media.bytes.clone());
        }
        let types = part_text(&parts, CONTENT_TYPES_PART)?
            .unwrap_or_else(|| content_types_xml().to_string());
        parts.insert(
            CONTENT_TYPES_PART.to_string(),
            with_media_types(&types, &extensions).into_bytes(),
        );

        write_zip(&parts).map_err(|e| Error::build_with("writing .docx package", e))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

fn write_zip(parts: &BTreeMap<String, Vec<u8>>) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opt = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Content types first, as Word expects
    if let Some(types) = parts.get(CONTENT_TYPES_PART) {
        zip.start_file(CONTENT_TYPES_PART, opt)?;
        zip.write_all(types)?;
    }
    for (name, data) in parts {
        if name == CONTENT_TYPES_PART {
            continue;
        }
        zip.start_file(name.as_str(), opt)?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opt = SimpleFileOptions::default();
        for (name, content) in entries {
            zip.start_file(*name, opt).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const TEMPLATE_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="w14"><w:body><w:p><w:r><w:t>Cover {{title}}</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#;

    const TEMPLATE_STYLES: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style><w:style w:type="paragraph" w:styleId="Corporate"><w:name w:val="Corporate Body"/></w:style></w:styles>"#;

    const TEMPLATE_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="x" Target="styles.xml"/><Relationship Id="rId7" Type="y" Target="header1.xml"/></Relationships>"#;

    #[test]
    fn blank_template_has_default_styles() {
        let template = Template::blank();
        for name in [
            "Normal",
            "heading 1",
            "Heading 6",
            "Quote",
            "List Paragraph",
            "Table Grid",
            "Hyperlink",
            "Code Block",
            "Code Char",
        ] {
            assert!(template.styles().contains(name), "missing {name}");
        }
        assert_eq!(template.styles().id_for("Heading 2"), Some("Heading2"));
        assert!(template.preamble().is_empty());
    }

    #[test]
    fn reads_template_parts() {
        let bytes = package(&[
            ("[Content_Types].xml", content_types_xml()),
            ("word/document.xml", TEMPLATE_DOC),
            ("word/styles.xml", TEMPLATE_STYLES),
            ("word/_rels/document.xml.rels", TEMPLATE_RELS),
            ("word/header1.xml", "<w:hdr/>"),
        ]);
        let template = Template::from_bytes(&bytes).unwrap();

        assert_eq!(template.preamble().len(), 1);
        assert!(template.preamble()[0].contains("Cover {{title}}"));
        assert!(template.sect_pr().contains("11906"));
        assert_eq!(template.ignorable(), Some("w14"));
        assert!(template.namespaces().iter().any(|(p, _)| p == "w14"));
        assert!(template.namespaces().iter().any(|(p, _)| p == "pic"));
        assert_eq!(template.styles().id_for("corporate body"), Some("Corporate"));
        assert_eq!(template.next_rel_id(), 8);
        assert_eq!(template.header_footer_parts(), vec!["word/header1.xml".to_string()]);
    }

    #[test]
    fn generated_ids_start_above_template_ids() {
        let document = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body><w:p><w:bookmarkStart w:id="0" w:name="cover"/><w:bookmarkEnd w:id="0"/><w:bookmarkStart w:id="4" w:name="toc"/><w:bookmarkEnd w:id="4"/><w:r><w:drawing><wp:inline><wp:docPr id="3" name="Logo"/></wp:inline></w:drawing></w:r></w:p><w:sectPr/></w:body></w:document>"#;
        let footer = r#"<w:ftr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:p><w:r><w:drawing><wp:anchor><wp:docPr id="9" name="Seal"/></wp:anchor></w:drawing></w:r></w:p></w:ftr>"#;
        let bytes = package(&[("word/document.xml", document), ("word/footer1.xml", footer)]);
        let template = Template::from_bytes(&bytes).unwrap();
        assert_eq!(template.next_bookmark_id(), 5);
        assert_eq!(template.next_drawing_id(), 10);

        let blank = Template::blank();
        assert_eq!((blank.next_bookmark_id(), blank.next_drawing_id()), (0, 1));
    }

    #[test]
    fn garbage_is_template_error() {
        let err = Template::from_bytes(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn package_without_document_is_template_error() {
        let bytes = package(&[("word/styles.xml", TEMPLATE_STYLES)]);
        let err = Template::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn missing_template_path_is_blank() {
        let dir = tempfile::tempdir().unwrap();
        let template = Template::open(&dir.path().join("none.docx")).unwrap();
        assert!(template.styles().contains("Normal"));
    }

    #[test]
    fn corrupt_template_file_error_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.docx");
        fs::write(&path, b"nope").unwrap();
        match Template::open(&path).unwrap_err() {
            Error::Template { path: Some(p), .. } => assert_eq!(p, path),
            other => panic!("expected template error, got {other:?}"),
        }
    }

    #[test]
    fn media_types_added_once() {
        let mut extensions = BTreeSet::new();
        extensions.insert("png".to_string());
        extensions.insert("rels".to_string());
        let types = with_media_types(content_types_xml(), &extensions);
        assert_eq!(types.matches(r#"Extension="png""#).count(), 1);
        assert_eq!(types.matches(r#"Extension="rels""#).count(), 1);
    }
}
