//! Flattening of assistant text for speech synthesis.
//!
//! Markup is removed while punctuation is kept so the synthesizer still
//! pauses in natural places. Colons, semicolons and line breaks become commas.

use regex::Regex;
use std::sync::LazyLock;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("Invalid regex: ", stringify!($name))));
    };
}

pattern!(BREAK_TAG, r"(?i)<br\s*/?>|</(?:p|div|li|h[1-6])>");
pattern!(TAG, r"<[^>]+>");
pattern!(NBSP, r"&nbsp;");
pattern!(ENTITY, r"&(?:#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);");
pattern!(CODE_FENCE, r"```[A-Za-z0-9_-]*");
pattern!(BACKTICK, r"`");
pattern!(LINK, r"\[([^\]]+)\]\([^)]*\)");
pattern!(BOLD_STARS, r"\*\*(.+?)\*\*");
pattern!(BOLD_UNDERSCORES, r"__(.+?)__");
pattern!(ITALIC_STARS, r"\*([^*\n]+)\*");
pattern!(ITALIC_UNDERSCORES, r"\b_([^_\n]+)_\b");
pattern!(HEADING_MARK, r"(?m)^[ \t]*#{1,6}[ \t]*");
pattern!(LIST_MARK, r"(?m)^[ \t]*(?:[-*+•]|\d+[.)])[ \t]+");
pattern!(HORIZONTAL_SPACE, r"[ \t]+");
pattern!(PAUSE_MARK, r"[ \t]*[:;](?:\s+|$)");
pattern!(SENTENCE_BREAK, r"([.!?,])[ \t]*\n\s*");
pattern!(LINE_BREAK, r"\s*\n\s*");
pattern!(SPACE_BEFORE_COMMA, r"\s+,");
pattern!(REPEATED_COMMA, r",(?:\s*,)+");
pattern!(MULTI_SPACE, r"\s{2,}");

/// Convert raw (or already formatted) assistant text into plain prose for audio.
pub fn to_speech_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");

    let text = BREAK_TAG.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = NBSP.replace_all(&text, " ");
    let text = ENTITY.replace_all(&text, "");

    let text = CODE_FENCE.replace_all(&text, "");
    let text = BACKTICK.replace_all(&text, "");
    let text = LINK.replace_all(&text, "${1}");
    let text = BOLD_STARS.replace_all(&text, "${1}");
    let text = BOLD_UNDERSCORES.replace_all(&text, "${1}");
    let text = ITALIC_STARS.replace_all(&text, "${1}");
    let text = ITALIC_UNDERSCORES.replace_all(&text, "${1}");
    let text = HEADING_MARK.replace_all(&text, "");
    let text = LIST_MARK.replace_all(&text, "");

    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = PAUSE_MARK.replace_all(&text, ", ");
    let text = SENTENCE_BREAK.replace_all(&text, "${1} ");
    let text = LINE_BREAK.replace_all(&text, ", ");
    let text = SPACE_BEFORE_COMMA.replace_all(&text, ",");
    let text = REPEATED_COMMA.replace_all(&text, ",");
    let text = MULTI_SPACE.replace_all(&text, " ");

    text.trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}
