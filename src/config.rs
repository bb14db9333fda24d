use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::block::AdmonitionKind;
use crate::error::{Error, Result};
use crate::style::hex_color;

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub styles: StyleConfig,
    /// Values for `{{name}}` placeholders.
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    /// Style used when a requested style is missing from the template.
    pub fallback: String,
    pub headings: HeadingStyles,
    pub paragraph: ParagraphStyles,
    pub code: CodeStyles,
    pub lists: ListStyles,
    pub table: TableStyles,
    pub admonitions: AdmonitionStyles,
    pub images: ImageConfig,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            fallback: "Normal".to_string(),
            headings: HeadingStyles::default(),
            paragraph: ParagraphStyles::default(),
            code: CodeStyles::default(),
            lists: ListStyles::default(),
            table: TableStyles::default(),
            admonitions: AdmonitionStyles::default(),
            images: ImageConfig::default(),
        }
    }
}

impl StyleConfig {
    /// Reject colours and sizes that cannot be written to the document.
    pub fn validate(&self) -> Result<()> {
        let table = &self.table;
        for (field, value) in [
            ("table.header_bg", &table.header_bg),
            ("table.header_text", &table.header_text),
            ("table.alt_row_bg", &table.alt_row_bg),
        ] {
            check_color(field, value)?;
        }
        for kind in AdmonitionKind::ALL {
            let style = self.admonitions.for_kind(kind);
            let section = kind.as_str().to_lowercase();
            if let Some(color) = &style.color {
                check_color(&format!("admonitions.{}.color", section), color)?;
            }
            if let Some(bg) = &style.bg {
                check_color(&format!("admonitions.{}.bg", section), bg)?;
            }
        }

        check_positive("images.width", self.images.width)?;
        check_positive("images.caption_size", self.images.caption_size)?;
        check_positive("code.size", self.code.size)?;
        for (field, value) in [
            ("lists.indent_base", self.lists.indent_base),
            ("lists.indent_step", self.lists.indent_step),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::config(format!(
                    "styles.{} must not be negative, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }
}

fn check_color(field: &str, value: &str) -> Result<()> {
    hex_color(value)
        .map(|_| ())
        .map_err(|_| Error::config(format!("styles.{}: invalid colour '{}'", field, value)))
}

fn check_positive(field: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!(
            "styles.{} must be positive, got {}",
            field, value
        )))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeadingStyles {
    pub h1: String,
    pub h2: String,
    pub h3: String,
    pub h4: String,
    pub h5: String,
    pub h6: String,
}

impl Default for HeadingStyles {
    fn default() -> Self {
        Self {
            h1: "Heading 1".to_string(),
            h2: "Heading 2".to_string(),
            h3: "Heading 3".to_string(),
            h4: "Heading 4".to_string(),
            h5: "Heading 5".to_string(),
            h6: "Heading 6".to_string(),
        }
    }
}

impl HeadingStyles {
    /// Style name for a heading level; levels past 6 use the h6 style.
    pub fn for_level(&self, level: u8) -> &str {
        match level {
            0 | 1 => &self.h1,
            2 => &self.h2,
            3 => &self.h3,
            4 => &self.h4,
            5 => &self.h5,
            _ => &self.h6,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParagraphStyles {
    pub normal: String,
    pub quote: String,
}

impl Default for ParagraphStyles {
    fn default() -> Self {
        Self {
            normal: "Normal".to_string(),
            quote: "Quote".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CodeStyles {
    /// Character style for inline code.
    pub inline: String,
    /// Paragraph style for fenced and indented code blocks.
    pub block: String,
    pub font: String,
    /// Font size in points.
    pub size: f32,
}

impl Default for CodeStyles {
    fn default() -> Self {
        Self {
            inline: "Code Char".to_string(),
            block: "Code Block".to_string(),
            font: "Consolas".to_string(),
            size: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListStyles {
    pub bullet: String,
    pub number: String,
    /// Left indent of top-level items, in inches.
    pub indent_base: f32,
    /// Extra indent per nesting level, in inches.
    pub indent_step: f32,
}

impl Default for ListStyles {
    fn default() -> Self {
        Self {
            bullet: "List Paragraph".to_string(),
            number: "List Paragraph".to_string(),
            indent_base: 0.35,
            indent_step: 0.35,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableStyles {
    pub style: String,
    pub header_bg: String,
    pub header_text: String,
    pub alternating_rows: bool,
    pub alt_row_bg: String,
}

impl Default for TableStyles {
    fn default() -> Self {
        Self {
            style: "Table Grid".to_string(),
            header_bg: "4472C4".to_string(),
            header_text: "FFFFFF".to_string(),
            alternating_rows: true,
            alt_row_bg: "D9E2F3".to_string(),
        }
    }
}

/// Appearance of one admonition kind. Unset fields use the builtin look.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AdmonitionStyle {
    pub icon: Option<String>,
    pub color: Option<String>,
    pub bg: Option<String>,
}

impl AdmonitionStyle {
    /// GitHub's callout palette.
    pub fn builtin(kind: AdmonitionKind) -> Self {
        let (icon, color, bg) = match kind {
            AdmonitionKind::Note => ("i", "0969DA", "DDF4FF"),
            AdmonitionKind::Tip => ("?", "1A7F37", "DCFFE4"),
            AdmonitionKind::Important => ("!", "8250DF", "FBEFFF"),
            AdmonitionKind::Warning => ("!", "9A6700", "FFF8C5"),
            AdmonitionKind::Caution => ("X", "CF222E", "FFEBE9"),
        };
        Self {
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
            bg: Some(bg.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdmonitionStyles {
    pub note: AdmonitionStyle,
    pub tip: AdmonitionStyle,
    pub important: AdmonitionStyle,
    pub warning: AdmonitionStyle,
    pub caution: AdmonitionStyle,
}

impl Default for AdmonitionStyles {
    fn default() -> Self {
        Self {
            note: AdmonitionStyle::builtin(AdmonitionKind::Note),
            tip: AdmonitionStyle::builtin(AdmonitionKind::Tip),
            important: AdmonitionStyle::builtin(AdmonitionKind::Important),
            warning: AdmonitionStyle::builtin(AdmonitionKind::Warning),
            caution: AdmonitionStyle::builtin(AdmonitionKind::Caution),
        }
    }
}

impl AdmonitionStyles {
    pub fn for_kind(&self, kind: AdmonitionKind) -> &AdmonitionStyle {
        match kind {
            AdmonitionKind::Note => &self.note,
            AdmonitionKind::Tip => &self.tip,
            AdmonitionKind::Important => &self.important,
            AdmonitionKind::Warning => &self.warning,
            AdmonitionKind::Caution => &self.caution,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    /// Rendered width of embedded images, in inches.
    pub width: f32,
    /// Caption font size, in points.
    pub caption_size: f32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 5.0,
            caption_size: 10.0,
        }
    }
}

impl Config {
    /// The configuration bundled with the crate.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Parse TOML text and validate the style values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        config.styles.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file, or return defaults if not found.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::compiled_default());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config { message, .. } => Error::Config {
                message,
                path: Some(path.to_path_buf()),
            },
            other => other,
        })
    }
}
