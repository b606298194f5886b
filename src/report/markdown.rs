//! Minimal markdown rendering for report bodies.
//!
//! Supports paragraphs, `-`/`*` bullet lists and `**bold**` spans. Text is
//! HTML-escaped before bold markup is applied.

use regex::Regex;
use std::sync::LazyLock;

static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern"));

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s*").expect("list marker pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(String),
    List(Vec<String>),
}

impl Block {
    pub fn to_html(&self) -> String {
        match self {
            Block::Paragraph(text) => format!("<p>{}</p>", text),
            Block::List(items) => {
                let items: String = items.iter().map(|i| format!("<li>{}</li>", i)).collect();
                format!("<ul class=\"report-list\">{}</ul>", items)
            }
        }
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn format_inline(text: &str) -> String {
    BOLD_SPAN
        .replace_all(&escape_html(text), "<strong>$1</strong>")
        .into_owned()
}

/// Blank lines end the current list
pub fn render_markdown(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut list: Option<Vec<String>> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if let Some(items) = list.take() {
                blocks.push(Block::List(items));
            }
            continue;
        }

        if line.starts_with(['-', '*']) {
            let item = format_inline(&LIST_MARKER.replace(line, ""));
            list.get_or_insert_with(Vec::new).push(item);
        } else {
            if let Some(items) = list.take() {
                blocks.push(Block::List(items));
            }
            blocks.push(Block::Paragraph(format_inline(line)));
        }
    }

    if let Some(items) = list {
        blocks.push(Block::List(items));
    }
    blocks
}

pub fn render_html(text: &str) -> String {
    render_markdown(text).iter().map(Block::to_html).collect()
}
