use crate::block::{Block, List};
use crate::docx::builder::{BuildContext, Nesting};
use crate::docx::model::{BodyItem, Paragraph, Run, twips};

/// Space after each list item, in twips (3pt).
const ITEM_SPACE_AFTER: u32 = 60;

/// Emit one paragraph per item with a literal marker, nested lists directly
/// after their parent item.
pub(super) fn build_list(
    ctx: &mut BuildContext,
    list: &List,
    level: usize,
    nesting: Nesting,
    out: &mut Vec<BodyItem>,
) {
    let lists = &ctx.resolver.config().lists;
    let indent = nesting.indent + twips(lists.indent_base + level as f32 * lists.indent_step);
    let style = ctx.resolver.list_style(list.ordered);

    for (i, item) in list.items.iter().enumerate() {
        let marker = if list.ordered {
            format!("{}. ", list.start + i as u64)
        } else {
            "- ".to_string()
        };

        let mut paragraph = Paragraph {
            style: Some(style.clone()),
            indent_left: Some(indent),
            space_after: Some(ITEM_SPACE_AFTER),
            ..Paragraph::default()
        };
        paragraph.push_run(Run::text(marker));
        paragraph.content.extend(ctx.inlines(&item.content, &Run::default()));
        out.push(BodyItem::Paragraph(paragraph));

        // Everything else in the item continues at the item's text indent
        let continuation = Nesting { indent, ..nesting };
        for child in &item.children {
            match child {
                Block::List(nested) => build_list(ctx, nested, level + 1, nesting, out),
                other => ctx.emit_block(other, continuation, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StyleConfig;
    use crate::docx::DocumentBuilder;
    use crate::docx::model::{BodyItem, OutputDocument, Paragraph};
    use crate::parser::parse;

    fn build(markdown: &str) -> OutputDocument {
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
    fn ordered_list_counts_from_start() {
        let doc = build("5. A\n6. B\n");
        let texts: Vec<String> = paragraphs(&doc).iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["5. A", "6. B"]);
    }

    #[test]
    fn unordered_list_uses_dash() {
        let doc = build("- a\n- b\n");
        let ps = paragraphs(&doc);
        assert_eq!(ps[0].text(), "- a");
        assert_eq!(ps[0].style.as_deref(), Some("ListParagraph"));
        assert_eq!(ps[0].space_after, Some(60));
        assert_eq!(ps[0].indent_left, Some(504));
    }

    #[test]
    fn nested_lists_are_preorder_and_indented() {
        let doc = build("- a\n  - a1\n  - a2\n- b\n");
        let ps = paragraphs(&doc);
        let texts: Vec<String> = ps.iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["- a", "- a1", "- a2", "- b"]);
        assert_eq!(ps[1].indent_left, Some(1008));
        assert_eq!(ps[3].indent_left, Some(504));
    }

    #[test]
    fn nested_list_inherits_blockquote_indent() {
        let doc = build("> - quoted\n");
        let ps = paragraphs(&doc);
        assert_eq!(ps[0].indent_left, Some(720 + 504));
    }

    #[test]
    fn item_formatting_is_kept() {
        let doc = build("1. **bold** item\n");
        let runs: Vec<_> = paragraphs(&doc)[0].runs().cloned().collect();
        assert_eq!(runs[0].text, "1. ");
        assert!(!runs[0].bold);
        assert!(runs[1].bold);
    }
}
