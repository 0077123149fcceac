//! Lightweight markdown to HTML conversion for chat bubbles.
//!
//! Handles the subset of markdown the model actually produces: bold,
//! italic, headings, numbered and bulleted lists, and paragraphs. Passes run
//! in a fixed order; later passes see the output of earlier ones.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static BOLD_ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*\*([^*\n]+?)\*\*\*").expect("Invalid regex: bold italic")
});

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("Invalid regex: bold"));

// Opening `*` must be followed by a non-space so `* item` bullets are left alone.
static ITALIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|[^*])\*([^*\s](?:[^*\n]*[^*\s])?)\*").expect("Invalid regex: italic")
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}[ \t]+(.+)$").expect("Invalid regex: heading"));

static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+)\.[ \t]+(.+)$").expect("Invalid regex: numbered item")
});

static BULLET_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*][ \t]+(.+)$").expect("Invalid regex: bullet item"));

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("Invalid regex: blank line"));

static SPACE_AFTER_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<(?:ul|li|p|div)(?:\s[^>]*)?>)\s+").expect("Invalid regex: space after open")
});

static SPACE_BEFORE_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+(</(?:ul|li|p|div)>)").expect("Invalid regex: space before close")
});

static SPACE_BETWEEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(</(?:ul|li|p|div)>)\s+(<)").expect("Invalid regex: space between blocks")
});

const HEADING_OPEN: &str = "<div class=\"heading\">";
const ITEM_OPEN: &str = "<li ";

fn is_block(line: &str) -> bool {
    line.starts_with(HEADING_OPEN) || line.starts_with(ITEM_OPEN)
}

/// Inner text of a title that is bold as a whole, so headings don't double up `<strong>`.
fn unwrap_strong(title: &str) -> &str {
    title
        .strip_prefix("<strong>")
        .and_then(|t| t.strip_suffix("</strong>"))
        .filter(|t| !t.contains("<strong>"))
        .unwrap_or(title)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert raw assistant text into display markup.
///
/// Empty or whitespace-only input yields an empty string.
pub fn to_display_markup(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = escape_html(&text);

    let text = BOLD_ITALIC.replace_all(&text, "<strong><em>${1}</em></strong>");
    let text = BOLD.replace_all(&text, "<strong>${1}</strong>");
    let text = ITALIC.replace_all(&text, "${1}<em>${2}</em>");
    let text = HEADING.replace_all(&text, |caps: &Captures| {
        format!("{}<strong>{}</strong></div>", HEADING_OPEN, unwrap_strong(&caps[1]))
    });
    let text = NUMBERED_ITEM.replace_all(
        &text,
        "<li class=\"numbered\"><strong>${1}.</strong> ${2}</li>",
    );
    let text = BULLET_ITEM.replace_all(&text, "<li class=\"bullet\">• ${1}</li>");

    let mut blocks: Vec<String> = Vec::new();
    for paragraph in BLANK_LINE.split(&text) {
        if paragraph.trim().is_empty() {
            continue;
        }

        let mut plain: Vec<&str> = Vec::new();
        for line in paragraph.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if is_block(line) {
                flush_paragraph(&mut plain, &mut blocks);
                blocks.push(line.to_string());
            } else {
                plain.push(line);
            }
        }
        flush_paragraph(&mut plain, &mut blocks);
    }

    let html = group_list_items(blocks);
    let html = SPACE_AFTER_OPEN.replace_all(&html, "${1}");
    let html = SPACE_BEFORE_CLOSE.replace_all(&html, "${1}");
    let html = SPACE_BETWEEN_BLOCKS.replace_all(&html, "${1}${2}");
    html.trim().to_string()
}

fn flush_paragraph(plain: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if plain.is_empty() {
        return;
    }
    blocks.push(format!("<p>{}</p>", plain.join("<br>")));
    plain.clear();
}

/// Wrap each run of adjacent list items in a single `<ul>`.
fn group_list_items(blocks: Vec<String>) -> String {
    let mut out = String::new();
    let mut in_list = false;

    for block in blocks {
        let is_item = block.starts_with(ITEM_OPEN);
        if is_item && !in_list {
            out.push_str("<ul>");
            in_list = true;
        } else if !is_item && in_list {
            out.push_str("</ul>");
            in_list = false;
        }
        out.push_str(&block);
    }

    if in_list {
        out.push_str("</ul>");
    }
    out
}
