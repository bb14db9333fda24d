use std::collections::{HashMap, HashSet};

use crate::block::AdmonitionKind;
use crate::config::{AdmonitionStyle, StyleConfig};
use crate::error::{Error, Result};

/// Last resort when neither the requested nor the fallback style exists.
pub const NORMAL: &str = "Normal";

const TABLE_FALLBACK: &str = "Table Grid";

/// Styles defined by a template, keyed case-insensitively by name and id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    ids: HashMap<String, String>,
    names: HashSet<String>,
}

impl StyleSheet {
    pub fn insert(&mut self, name: &str, id: &str) {
        let name = name.to_lowercase();
        self.ids.insert(id.to_lowercase(), id.to_string());
        self.ids.insert(name.clone(), id.to_string());
        self.names.insert(name);
        self.names.insert(id.to_lowercase());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    /// The `w:styleId` to reference for a style name.
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.ids.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Lower-cased names and ids, the universe [`resolve`] checks against.
    pub fn universe(&self) -> &HashSet<String> {
        &self.names
    }
}

/// Pick `requested` if the template has it, else `fallback`, else `Normal`.
///
/// `universe` holds lower-cased style names.
pub fn resolve(requested: &str, fallback: &str, universe: &HashSet<String>) -> String {
    if universe.contains(&requested.to_lowercase()) {
        return requested.to_string();
    }
    if universe.contains(&fallback.to_lowercase()) {
        log::debug!("Style '{}' not in template, using '{}'", requested, fallback);
        return fallback.to_string();
    }
    log::debug!(
        "Neither '{}' nor '{}' in template, using '{}'",
        requested,
        fallback,
        NORMAL
    );
    NORMAL.to_string()
}

/// Normalize a hex colour to six upper-case digits, accepting a leading `#`.
pub fn hex_color(value: &str) -> Result<String> {
    let digits = value.trim().trim_start_matches('#');
    if digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(digits.to_ascii_uppercase())
    } else {
        Err(Error::config(format!("invalid colour value '{}'", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    Normal,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Inline,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleCategory {
    Heading(u8),
    Paragraph(ParagraphKind),
    Code(CodeKind),
    List { ordered: bool },
    Table,
}

/// Colours for table header and banded rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub header_bg: String,
    pub header_text: String,
    pub alternating_rows: bool,
    pub alt_row_bg: String,
}

/// How one admonition kind is drawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmonitionFormat {
    pub icon: String,
    pub color: String,
    pub bg: String,
}

/// Maps style categories to style ids present in the template.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    config: StyleConfig,
    sheet: StyleSheet,
}

impl StyleResolver {
    pub fn new(config: &StyleConfig, sheet: &StyleSheet) -> Self {
        Self {
            config: config.clone(),
            sheet: sheet.clone(),
        }
    }

    fn requested(&self, category: StyleCategory) -> &str {
        match category {
            StyleCategory::Heading(level) => self.config.headings.for_level(level),
            StyleCategory::Paragraph(ParagraphKind::Normal) => &self.config.paragraph.normal,
            StyleCategory::Paragraph(ParagraphKind::Quote) => &self.config.paragraph.quote,
            StyleCategory::Code(CodeKind::Inline) => &self.config.code.inline,
            StyleCategory::Code(CodeKind::Block) => &self.config.code.block,
            StyleCategory::List { ordered: true } => &self.config.lists.number,
            StyleCategory::List { ordered: false } => &self.config.lists.bullet,
            StyleCategory::Table => &self.config.table.style,
        }
    }

    /// Resolved style name for a category.
    pub fn name(&self, category: StyleCategory) -> String {
        let fallback = match category {
            StyleCategory::Table => TABLE_FALLBACK,
            _ => self.config.fallback.as_str(),
        };
        resolve(self.requested(category), fallback, self.sheet.universe())
    }

    fn id(&self, name: &str) -> String {
        match self.sheet.id_for(name) {
            Some(id) => id.to_string(),
            None => name.replace(' ', ""),
        }
    }

    pub fn heading_style(&self, level: u8) -> String {
        self.id(&self.name(StyleCategory::Heading(level)))
    }

    pub fn paragraph_style(&self, kind: ParagraphKind) -> String {
        self.id(&self.name(StyleCategory::Paragraph(kind)))
    }

    pub fn code_style(&self, kind: CodeKind) -> String {
        self.id(&self.name(StyleCategory::Code(kind)))
    }

    /// Character style for inline code, only when the template defines it.
    pub fn inline_code_style(&self) -> Option<String> {
        let requested = self.requested(StyleCategory::Code(CodeKind::Inline));
        self.sheet.id_for(requested).map(String::from)
    }

    pub fn list_style(&self, ordered: bool) -> String {
        self.id(&self.name(StyleCategory::List { ordered }))
    }

    /// Table style id, `None` when the template has no usable table style.
    pub fn table_style(&self) -> Option<String> {
        let name = self.name(StyleCategory::Table);
        if self.sheet.contains(&name) {
            Some(self.id(&name))
        } else {
            None
        }
    }

    pub fn table_format(&self) -> Result<TableFormat> {
        let table = &self.config.table;
        Ok(TableFormat {
            header_bg: hex_color(&table.header_bg)?,
            header_text: hex_color(&table.header_text)?,
            alternating_rows: table.alternating_rows,
            alt_row_bg: hex_color(&table.alt_row_bg)?,
        })
    }

    pub fn admonition(&self, kind: AdmonitionKind) -> Result<AdmonitionFormat> {
        let configured = self.config.admonitions.for_kind(kind);
        let builtin = AdmonitionStyle::builtin(kind);
        let pick = |value: &Option<String>, default: Option<String>| {
            value.clone().or(default).unwrap_or_default()
        };
        Ok(AdmonitionFormat {
            icon: pick(&configured.icon, builtin.icon),
            color: hex_color(&pick(&configured.color, builtin.color))?,
            bg: hex_color(&pick(&configured.bg, builtin.bg))?,
        })
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }
}
