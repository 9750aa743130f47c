//! Markdown to portable-text blocks
//!
//! Line oriented and lossy: headings h1-h3, bullets, standalone images and
//! plain paragraphs. Inline markup stays in the span text as written.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref IMAGE_LINE: Regex = Regex::new(r"^!\[([^\]]*)\]\(([^)\s]+)\)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStyle {
    H1,
    H2,
    H3,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    #[serde(rename = "_type")]
    span_type: &'static str,
    #[serde(rename = "_key")]
    key: String,
    pub text: String,
    marks: Vec<String>,
}

impl Span {
    fn new(text: &str) -> Self {
        Self {
            span_type: "span",
            key: new_key(),
            text: text.to_string(),
            marks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_type")]
pub enum Block {
    #[serde(rename = "block")]
    Text {
        #[serde(rename = "_key")]
        key: String,
        style: BlockStyle,
        #[serde(rename = "listItem", skip_serializing_if = "Option::is_none")]
        list_item: Option<&'static str>,
        children: Vec<Span>,
        #[serde(rename = "markDefs")]
        mark_defs: Vec<serde_json::Value>,
    },
    #[serde(rename = "image")]
    Image {
        #[serde(rename = "_key")]
        key: String,
        url: String,
        alt: String,
    },
}

/// What a block is, without its generated keys
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind<'a> {
    Heading(BlockStyle, &'a str),
    Bullet(&'a str),
    Paragraph(&'a str),
    Image { url: &'a str, alt: &'a str },
}

impl Block {
    fn text(style: BlockStyle, list_item: Option<&'static str>, text: &str) -> Self {
        Block::Text {
            key: new_key(),
            style,
            list_item,
            children: vec![Span::new(text)],
            mark_defs: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn kind(&self) -> BlockKind<'_> {
        match self {
            Block::Image { url, alt, .. } => BlockKind::Image {
                url: url.as_str(),
                alt: alt.as_str(),
            },
            Block::Text {
                style,
                list_item,
                children,
                ..
            } => {
                let text = children.first().map(|s| s.text.as_str()).unwrap_or("");
                match (style, list_item) {
                    (_, Some(_)) => BlockKind::Bullet(text),
                    (BlockStyle::Normal, None) => BlockKind::Paragraph(text),
                    (heading, None) => BlockKind::Heading(*heading, text),
                }
            }
        }
    }
}

fn new_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub fn markdown_to_blocks(markdown: &str) -> Vec<Block> {
    markdown
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(line_to_block)
        .collect()
}

fn line_to_block(line: &str) -> Block {
    if let Some(caps) = IMAGE_LINE.captures(line) {
        return Block::Image {
            key: new_key(),
            alt: caps[1].to_string(),
            url: caps[2].to_string(),
        };
    }
    if let Some(rest) = line.strip_prefix("### ") {
        return Block::text(BlockStyle::H3, None, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return Block::text(BlockStyle::H2, None, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("# ") {
        return Block::text(BlockStyle::H1, None, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Block::text(BlockStyle::Normal, Some("bullet"), rest.trim());
    }
    Block::text(BlockStyle::Normal, None, line)
}

/// Render blocks back to the markdown subset they were parsed from
#[cfg(test)]
pub fn blocks_to_markdown(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| match block.kind() {
            BlockKind::Heading(BlockStyle::H1, text) => format!("# {}", text),
            BlockKind::Heading(BlockStyle::H2, text) => format!("## {}", text),
            BlockKind::Heading(_, text) => format!("### {}", text),
            BlockKind::Bullet(text) => format!("- {}", text),
            BlockKind::Paragraph(text) => text.to_string(),
            BlockKind::Image { url, alt } => format!("![{}]({})", alt, url),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "# 流浪地球\n\n![流浪地球 海报](https://image.tmdb.org/t/p/w500/a.jpg)\n\n## 🎬 资源特色\n\n- 高清画质\n* 多种格式\n\n### 使用说明\n\n本资源仅供**学习**交流。\n  \n## ⚠️ 免责声明\n如有侵权，请联系删除。";

    #[test]
    fn test_line_classification() {
        let blocks = markdown_to_blocks(ARTICLE);
        let kinds: Vec<BlockKind> = blocks.iter().map(Block::kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Heading(BlockStyle::H1, "流浪地球"),
                BlockKind::Image {
                    url: "https://image.tmdb.org/t/p/w500/a.jpg",
                    alt: "流浪地球 海报"
                },
                BlockKind::Heading(BlockStyle::H2, "🎬 资源特色"),
                BlockKind::Bullet("高清画质"),
                BlockKind::Bullet("多种格式"),
                BlockKind::Heading(BlockStyle::H3, "使用说明"),
                BlockKind::Paragraph("本资源仅供**学习**交流。"),
                BlockKind::Heading(BlockStyle::H2, "⚠️ 免责声明"),
                BlockKind::Paragraph("如有侵权，请联系删除。"),
            ]
        );
    }

    #[test]
    fn test_classification_is_stable_through_markdown() {
        let first = markdown_to_blocks(ARTICLE);
        let second = markdown_to_blocks(&blocks_to_markdown(&first));
        let first_kinds: Vec<BlockKind> = first.iter().map(Block::kind).collect();
        let second_kinds: Vec<BlockKind> = second.iter().map(Block::kind).collect();
        assert_eq!(first_kinds, second_kinds);
    }

    #[test]
    fn test_block_json_shape() {
        let blocks = markdown_to_blocks("- 要点\n![a](https://x/y.png)");
        let value = serde_json::to_value(&blocks).unwrap();
        assert_eq!(value[0]["_type"], "block");
        assert_eq!(value[0]["style"], "normal");
        assert_eq!(value[0]["listItem"], "bullet");
        assert_eq!(value[0]["children"][0]["_type"], "span");
        assert_eq!(value[0]["children"][0]["text"], "要点");
        assert_eq!(value[1]["_type"], "image");
        assert_eq!(value[1]["url"], "https://x/y.png");
        assert!(value[1]["_key"].as_str().is_some());
    }

    #[test]
    fn test_hash_without_space_is_paragraph() {
        let blocks = markdown_to_blocks("#标签");
        assert_eq!(blocks[0].kind(), BlockKind::Paragraph("#标签"));
    }
}
