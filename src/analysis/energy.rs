//! Emotional intensity heuristic for incoming messages.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Emotional intensity of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyLevel {
    High,
    MediumHigh,
    Medium,
    Neutral,
    Low,
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl EnergyLevel {
    pub fn label(&self) -> &'static str {
        match self {
            EnergyLevel::High => "high",
            EnergyLevel::MediumHigh => "medium-high",
            EnergyLevel::Medium => "medium",
            EnergyLevel::Neutral => "neutral",
            EnergyLevel::Low => "low",
        }
    }

    /// Tone instruction for the prompt so the reply matches the user's energy.
    pub fn guidance(&self) -> &'static str {
        match self {
            EnergyLevel::High => {
                "The user is very energized. Match their enthusiasm with warmth, keep sentences short and lively, and help them channel the energy."
            }
            EnergyLevel::MediumHigh => {
                "The user is upbeat. Respond with positive, encouraging energy while staying grounded."
            }
            EnergyLevel::Medium => {
                "The user is curious or engaged. Respond clearly and attentively with a friendly, steady tone."
            }
            EnergyLevel::Neutral => {
                "The user is calm. Respond in a relaxed, conversational tone."
            }
            EnergyLevel::Low => {
                "The user seems low on energy. Respond gently and softly, keep it brief, and avoid overwhelming them."
            }
        }
    }
}

const HIGH_ENERGY_WORDS: &[&str] = &[
    "excited",
    "amazing",
    "awesome",
    "thrilled",
    "ecstatic",
    "fantastic",
    "incredible",
    "pumped",
    "can't wait",
    "cant wait",
    "overjoyed",
    "so happy",
    "furious",
    "livid",
    "freaking out",
    "panicking",
];

const LOW_ENERGY_WORDS: &[&str] = &[
    "tired",
    "exhausted",
    "drained",
    "sad",
    "depressed",
    "lonely",
    "hopeless",
    "empty",
    "numb",
    "sleepy",
    "worn out",
    "unmotivated",
    "feeling down",
    "bored",
    "no energy",
];

const NEUTRAL_WORDS: &[&str] = &[
    "okay",
    "fine",
    "alright",
    "normal",
    "so-so",
    "not bad",
    "nothing much",
];

static CAPS_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{3,}").expect("Invalid regex: capital run"));

static TRAILING_DOTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}|\.\s*$").expect("Invalid regex: trailing dots"));

fn contains_any(haystack: &str, words: &[&str]) -> bool {
    words.iter().any(|w| haystack.contains(w))
}

/// Label the emotional intensity of a message. First matching rule wins.
pub fn detect_energy(message: &str) -> EnergyLevel {
    let lower = message.to_lowercase();

    if contains_any(&lower, HIGH_ENERGY_WORDS)
        || message.matches('!').count() >= 2
        || CAPS_RUN.is_match(message)
    {
        return EnergyLevel::High;
    }

    if contains_any(&lower, LOW_ENERGY_WORDS)
        || (TRAILING_DOTS.is_match(message) && message.chars().count() > 10)
    {
        return EnergyLevel::Low;
    }

    if contains_any(&lower, NEUTRAL_WORDS) {
        return EnergyLevel::Neutral;
    }

    if message.contains('!') {
        return EnergyLevel::MediumHigh;
    }

    if message.contains('?') {
        return EnergyLevel::Medium;
    }

    EnergyLevel::Neutral
}
