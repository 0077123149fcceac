//! Response formatting: display markup and speech-ready text.
//!
//! Both transforms are pure and work from the same raw assistant text.

mod display;
mod speech;

pub use display::to_display_markup;
pub use speech::to_speech_text;

use serde::{Deserialize, Serialize};

/// Display and speech renditions of one assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedText {
    pub display: String,
    pub speech: String,
}

impl FormattedText {
    pub fn from_raw(raw: &str) -> Self {
        Self {
            display: to_display_markup(raw),
            speech: to_speech_text(raw),
        }
    }
}

/// Plain-text excerpt of at most `max_chars` characters, with an ellipsis when cut.
pub fn excerpt(raw: &str, max_chars: usize) -> String {
    let plain = to_speech_text(raw);
    if plain.chars().count() <= max_chars {
        return plain;
    }
    let cut: String = plain.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
