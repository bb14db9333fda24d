//! `{{name}}` placeholder substitution.
//!
//! Substitution works on a paragraph's whole text, so placeholders split over
//! several runs are still found. When a paragraph changes, its first run takes
//! the substituted text and the remaining runs are emptied; only the first
//! run's formatting survives.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use roxmltree::{Document, Node};

use crate::docx::OutputDocument;
use crate::docx::model::Paragraph;
use crate::docx::xml::{W_NS, escape};
use crate::error::{Error, Result};

pub type Variables = BTreeMap<String, String>;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder pattern is valid"));

/// Replace every known `{{ name }}`; unknown names stay as written.
pub fn substitute(text: &str, variables: &Variables) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match variables.get(caps[1].trim()) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute variables throughout the document, its template content and
/// its headers and footers.
pub fn inject(mut document: OutputDocument, variables: &Variables) -> OutputDocument {
    if variables.is_empty() {
        return document;
    }

    for paragraph in document.paragraphs_mut() {
        inject_paragraph(paragraph, variables);
    }

    let namespaces = document.template.namespaces().to_vec();
    for raw in document.template.preamble_mut().iter_mut() {
        if let Some(updated) = inject_fragment(raw, &namespaces, variables) {
            *raw = updated;
        }
    }

    for name in document.template.header_footer_parts() {
        let Some(text) = document
            .template
            .part(&name)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
        else {
            continue;
        };
        if let Some(updated) = inject_xml(text, variables) {
            document.template.set_part(&name, updated.into_bytes());
        }
    }

    document
}

fn inject_paragraph(paragraph: &mut Paragraph, variables: &Variables) {
    let text = paragraph.text();
    if !text.contains("{{") {
        return;
    }
    let replaced = substitute(&text, variables);
    if replaced == text {
        return;
    }

    let mut runs = paragraph.runs_mut();
    if let Some(first) = runs.next() {
        first.text = replaced;
    }
    for run in runs {
        run.text.clear();
    }
}

/// `w:t` nodes of each paragraph with the paragraph's concatenated text.
fn xml_paragraphs<'a, 'input>(doc: &'a Document<'input>) -> Vec<(Vec<Node<'a, 'input>>, String)> {
    doc.descendants()
        .filter(|n| n.has_tag_name((W_NS, "p")))
        .map(|p| {
            let texts: Vec<Node> = p
                .descendants()
                .filter(|n| n.has_tag_name((W_NS, "t")))
                .filter(|t| t.ancestors().find(|a| a.has_tag_name((W_NS, "p"))) == Some(p))
                .collect();
            let text: String = texts.iter().filter_map(|t| t.text()).collect();
            (texts, text)
        })
        .collect()
}

/// Rewrite the `w:t` elements of changed paragraphs; `None` when nothing changed.
fn inject_xml(xml: &str, variables: &Variables) -> Option<String> {
    let doc = match Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("Skipping unparsable part during injection: {}", e);
            return None;
        }
    };

    let mut edits = Vec::new();
    for (texts, text) in xml_paragraphs(&doc) {
        if !text.contains("{{") {
            continue;
        }
        let replaced = substitute(&text, variables);
        if replaced == text {
            continue;
        }
        for (i, t) in texts.iter().enumerate() {
            let tag = match t.lookup_prefix(W_NS) {
                Some(prefix) if !prefix.is_empty() => format!("{}:t", prefix),
                _ => "t".to_string(),
            };
            let element = if i == 0 {
                format!(r#"<{0} xml:space="preserve">{1}</{0}>"#, tag, escape(&replaced))
            } else {
                format!("<{}/>", tag)
            };
            edits.push((t.range(), element));
        }
    }
    if edits.is_empty() {
        return None;
    }

    let mut out = xml.to_string();
    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    for (range, element) in edits {
        out.replace_range(range, &element);
    }
    Some(out)
}

const FRAGMENT_CLOSE: &str = "</fragment>";

/// Body fragments rely on the document root's namespace declarations.
fn wrap_fragment(raw: &str, namespaces: &[(String, String)]) -> (String, usize) {
    let mut wrapped = String::from("<fragment");
    for (prefix, uri) in namespaces {
        wrapped.push_str(&format!(r#" xmlns:{}="{}""#, prefix, escape(uri)));
    }
    wrapped.push('>');
    let open = wrapped.len();
    wrapped.push_str(raw);
    wrapped.push_str(FRAGMENT_CLOSE);
    (wrapped, open)
}

fn inject_fragment(
    raw: &str,
    namespaces: &[(String, String)],
    variables: &Variables,
) -> Option<String> {
    let (wrapped, open) = wrap_fragment(raw, namespaces);
    let updated = inject_xml(&wrapped, variables)?;
    Some(updated[open..updated.len() - FRAGMENT_CLOSE.len()].to_string())
}

/// Variables from a flat JSON object of scalars.
pub fn variables_from_json(json: &str) -> Result<Variables> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::template(format!("invalid variables JSON: {}", e)))?;
    let serde_json::Value::Object(map) = value else {
        return Err(Error::template("variables JSON must be an object"));
    };

    let mut variables = Variables::new();
    for (name, value) in map {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(Error::template(format!(
                    "variable '{}' must be a string, number or boolean",
                    name
                )));
            }
        };
        variables.insert(name, text);
    }
    Ok(variables)
}

/// Names of all placeholders in the document, template content included.
pub fn extract_variables(document: &OutputDocument) -> BTreeSet<String> {
    let mut texts: Vec<String> = document.paragraphs().map(Paragraph::text).collect();

    let namespaces = document.template.namespaces();
    let mut xml_sources: Vec<String> = document
        .template
        .preamble()
        .iter()
        .map(|raw| wrap_fragment(raw, namespaces).0)
        .collect();
    for name in document.template.header_footer_parts() {
        if let Some(text) = document
            .template
            .part(&name)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
        {
            xml_sources.push(text.to_string());
        }
    }
    for xml in &xml_sources {
        if let Ok(doc) = Document::parse(xml) {
            texts.extend(xml_paragraphs(&doc).into_iter().map(|(_, text)| text));
        }
    }

    texts
        .iter()
        .flat_map(|text| PLACEHOLDER.captures_iter(text))
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;
    use crate::docx::model::{BodyItem, Inline, Run};
    use crate::docx::{DocumentBuilder, Template};
    use crate::parser::parse;
    use rstest::rstest;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(markdown: &str, template: Option<Template>) -> OutputDocument {
        DocumentBuilder::new(&StyleConfig::default(), template)
            .build(&parse(markdown))
            .unwrap()
    }

    fn template_with(document_body: &str, header: &str) -> Template {
        let document = format!(
            r#"<w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            W_NS, document_body
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opt = SimpleFileOptions::default();
        zip.start_file("word/document.xml", opt).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.start_file("word/header1.xml", opt).unwrap();
        zip.write_all(header.as_bytes()).unwrap();
        Template::from_bytes(&zip.finish().unwrap().into_inner()).unwrap()
    }

    #[rstest]
    #[case("Hello {{name}}", "Hello World")]
    #[case("Hello {{ name }}!", "Hello World!")]
    #[case("{{missing}} stays", "{{missing}} stays")]
    #[case("{{name}} and {{name}}", "World and World")]
    #[case("no placeholders", "no placeholders")]
    #[case("{{}} empty", "{{}} empty")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute(input, &vars(&[("name", "World")])), expected);
    }

    #[test]
    fn split_runs_collapse_into_first() {
        let doc = build("Hello **{{na**me}} there", None);
        let doc = inject(doc, &vars(&[("name", "World")]));
        let BodyItem::Paragraph(p) = &doc.body[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.text(), "Hello World there");
        let runs: Vec<&Run> = p.runs().collect();
        assert_eq!(runs[0].text, "Hello World there");
        assert!(runs[1..].iter().all(|run| run.text.is_empty()));
    }

    #[test]
    fn unknown_names_leave_runs_untouched() {
        let doc = build("Keep **{{this}}** as is", None);
        let before = doc.body.clone();
        let doc = inject(doc, &vars(&[("other", "x")]));
        assert_eq!(doc.body, before);
    }

    #[test]
    fn reaches_table_cells_and_links() {
        let doc = build(
            "| {{a}} |\n|---|\n| [{{b}}](https://x.test) |",
            None,
        );
        let doc = inject(doc, &vars(&[("a", "A"), ("b", "B")]));
        let table = doc.tables().next().unwrap();
        assert_eq!(table.rows[0].cells[0].text(), "A");
        let cell = &table.rows[1].cells[0];
        assert_eq!(cell.text(), "B");
        assert!(matches!(cell.paragraphs[0].content[0], Inline::Hyperlink(_)));
    }

    #[test]
    fn template_preamble_and_headers() {
        let template = template_with(
            r#"<w:p><w:r><w:t>Report: {{</w:t></w:r><w:r><w:t>title}}</w:t></w:r></w:p>"#,
            &format!(
                r#"<w:hdr xmlns:w="{}"><w:p><w:r><w:t>{{{{company}}}} &amp; co</w:t></w:r></w:p></w:hdr>"#,
                W_NS
            ),
        );
        let doc = build("Body", Some(template));
        let doc = inject(doc, &vars(&[("title", "Q3 <final>"), ("company", "Acme")]));

        let preamble = &doc.template.preamble()[0];
        assert!(preamble.contains(r#"<w:t xml:space="preserve">Report: Q3 &lt;final&gt;</w:t>"#));
        assert!(preamble.contains("<w:t/>"));

        let header = std::str::from_utf8(doc.template.part("word/header1.xml").unwrap()).unwrap();
        assert!(header.contains(r#"<w:t xml:space="preserve">Acme &amp; co</w:t>"#));
    }

    #[test]
    fn empty_variables_change_nothing() {
        let doc = build("{{x}}", None);
        let doc = inject(doc, &Variables::new());
        assert_eq!(doc.paragraphs().next().unwrap().text(), "{{x}}");
    }

    #[test]
    fn json_scalars_become_strings() {
        let variables =
            variables_from_json(r#"{"name": "World", "n": 3, "ok": true, "none": null}"#).unwrap();
        assert_eq!(
            variables,
            vars(&[("name", "World"), ("n", "3"), ("ok", "true"), ("none", "")])
        );
    }

    #[rstest]
    #[case(r#"{"nested": {"a": 1}}"#)]
    #[case(r#"{"list": [1, 2]}"#)]
    #[case(r#"["not", "an", "object"]"#)]
    #[case("{broken")]
    fn bad_json_is_template_error(#[case] json: &str) {
        assert!(matches!(
            variables_from_json(json),
            Err(Error::Template { .. })
        ));
    }

    #[test]
    fn extracts_placeholder_names() {
        let template = template_with(
            r#"<w:p><w:r><w:t>{{ cover }}</w:t></w:r></w:p>"#,
            &format!(
                r#"<w:ftr xmlns:w="{}"><w:p><w:r><w:t>{{{{footer}}}}</w:t></w:r></w:p></w:ftr>"#,
                W_NS
            ),
        );
        let doc = build("# {{title}}\n\n{{name}} and {{ title }}", Some(template));
        let names: Vec<String> = extract_variables(&doc).into_iter().collect();
        assert_eq!(names, vec!["cover", "footer", "name", "title"]);
    }
}
