//! Topic relevance filter.
//!
//! Decides whether a message belongs to the mental-health and well-being
//! domain. Three layers are checked in order: greetings/farewells at the
//! start of the message, substring keywords, then help-seeking phrase
//! patterns. Keyword matching is deliberately unanchored, so "mood" inside
//! a longer word still counts.

use regex::Regex;
use std::sync::LazyLock;

static GREETING_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(hi|hello|hey|hiya|howdy|greetings|good (morning|afternoon|evening|night)|thank you|thanks|thx|bye|goodbye|good bye|see you|take care)\b",
    )
    .expect("Invalid regex: greeting patterns")
});

/// Mental-health, emotion and wellness vocabulary, lowercase.
const DOMAIN_KEYWORDS: &[&str] = &[
    // conditions
    "anxiety",
    "anxious",
    "depress",
    "stress",
    "panic",
    "trauma",
    "ptsd",
    "ocd",
    "adhd",
    "bipolar",
    "burnout",
    "burn out",
    "insomnia",
    "phobia",
    "grief",
    "grieving",
    "eating disorder",
    "self-harm",
    "self harm",
    "suicid",
    // emotions
    "feel",
    "emotion",
    "mood",
    "sad",
    "unhappy",
    "lonely",
    "alone",
    "angry",
    "anger",
    "upset",
    "worried",
    "worry",
    "scared",
    "afraid",
    "fear",
    "nervous",
    "overwhelm",
    "hopeless",
    "helpless",
    "worthless",
    "guilt",
    "shame",
    "jealous",
    "frustrat",
    "irritat",
    "cry",
    "crying",
    "tears",
    "hurt",
    "heartbreak",
    "happy",
    "happiness",
    "joy",
    "excited",
    "tired",
    "exhausted",
    "numb",
    "empty",
    // wellness
    "mental health",
    "mental",
    "wellbeing",
    "well-being",
    "wellness",
    "self-care",
    "self care",
    "mindful",
    "meditat",
    "breath",
    "relax",
    "calm",
    "sleep",
    "therapy",
    "therapist",
    "counsel",
    "psycholog",
    "psychiatr",
    "support",
    "cope",
    "coping",
    "motivat",
    "confidence",
    "self-esteem",
    "self esteem",
    "relationship",
    "breakup",
    "break up",
    "journal",
    "gratitude",
    "healing",
    "resilien",
];

static HELP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)how .*feel").expect("Invalid regex: how-feel pattern"),
        Regex::new(r"(?i)cope .*with|coping .*with").expect("Invalid regex: cope-with pattern"),
        Regex::new(r"(?i)deal(ing)? with").expect("Invalid regex: deal-with pattern"),
        Regex::new(r"(?i)tips (for|on|to)").expect("Invalid regex: tips pattern"),
        Regex::new(r"(?i)advice (for|on|about)").expect("Invalid regex: advice pattern"),
        Regex::new(r"(?i)help me").expect("Invalid regex: help-me pattern"),
        Regex::new(r"(?i)i need (help|someone|to talk)").expect("Invalid regex: need-help pattern"),
        Regex::new(r"(?i)(can|could) (you|we) talk").expect("Invalid regex: talk pattern"),
        Regex::new(r"(?i)what (should|can) i do").expect("Invalid regex: what-to-do pattern"),
        Regex::new(r"(?i)i('m| am) (not okay|not ok|struggling|going through)")
            .expect("Invalid regex: struggling pattern"),
        Regex::new(r"(?i)(get|feel) better").expect("Invalid regex: better pattern"),
    ]
});

/// Returns true when the message is in-domain.
pub fn is_relevant(message: &str) -> bool {
    if message.trim().is_empty() {
        return false;
    }

    if GREETING_PATTERNS.is_match(message) {
        return true;
    }

    let lower = message.to_lowercase();
    if DOMAIN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }

    HELP_PATTERNS.iter().any(|p| p.is_match(&lower))
}
