mod block;
pub mod config;
pub mod docx;
mod error;
pub mod inject;
mod parser;
pub mod slug;
pub mod style;

pub use block::{
    AdmonitionKind, Block, Document, List, ListItem, Table, TableCell, TableRow, TextSpan,
    plain_text,
};
pub use config::{Config, StyleConfig};
pub use docx::{DocumentBuilder, OutputDocument, Template};
pub use error::{Error, Result};
pub use inject::{Variables, extract_variables, inject, variables_from_json};
pub use parser::normalize_line_endings;

use std::fs;
use std::path::Path;

/// Parse markdown text into a vector of blocks.
pub fn parse(markdown: &str) -> Document {
    parser::parse(markdown)
}

/// Parse raw markdown bytes; fails only on invalid UTF-8.
pub fn parse_bytes(bytes: &[u8]) -> Result<Document> {
    parser::parse_bytes(bytes)
}

/// Build the output document for parsed blocks.
pub fn build(
    document: &Document,
    styles: &StyleConfig,
    template: Option<Template>,
) -> Result<OutputDocument> {
    DocumentBuilder::new(styles, template).build(document)
}

/// Convert markdown to `.docx` bytes with the bundled defaults.
pub fn markdown_to_docx(markdown: &str) -> Result<Vec<u8>> {
    markdown_to_docx_with_config(markdown, &Config::compiled_default(), None)
}

/// Convert markdown to `.docx` bytes, injecting `config.variables` if any.
pub fn markdown_to_docx_with_config(
    markdown: &str,
    config: &Config,
    template: Option<Template>,
) -> Result<Vec<u8>> {
    convert(&parse(markdown), config, DocumentBuilder::new(&config.styles, template))?.to_bytes()
}

/// Convert a markdown file. Relative image paths resolve against the input's directory.
pub fn convert_file(
    input: &Path,
    output: &Path,
    template: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let bytes = fs::read(input)?;
    let document = parse_bytes(&bytes)?;
    let template = template.map(Template::open).transpose()?;

    let mut builder = DocumentBuilder::new(&config.styles, template);
    if let Some(dir) = input.parent() {
        builder = builder.base_dir(dir);
    }
    convert(&document, config, builder)?.save(output)
}

fn convert(
    document: &Document,
    config: &Config,
    builder: DocumentBuilder,
) -> Result<OutputDocument> {
    let output = builder.build(document)?;
    if config.variables.is_empty() {
        Ok(output)
    } else {
        Ok(inject(output, &config.variables))
    }
}
