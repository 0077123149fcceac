//! Persona templates for the support assistant
//!
//! The built-in persona can be replaced by a TOML file.
//!
//! # Example Prompt File
//!
//! ```toml
//! [persona]
//! name = "Sage"
//! description = "Gentle listener for everyday stress"
//!
//! [system_prompt]
//! content = """
//! You are Sage, a calm and caring companion...
//! """
//!
//! [style]
//! guidelines = ["Keep replies under 150 words", "Use at most one list"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// A persona/prompt template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Persona metadata
    pub persona: PersonaInfo,

    /// The system prompt
    pub system_prompt: SystemPrompt,

    /// Response style rules appended after the system prompt
    #[serde(default)]
    pub style: StyleGuide,
}

/// Persona metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    /// Display name of the persona
    pub name: String,

    /// Brief description
    #[serde(default)]
    pub description: String,
}

/// System prompt content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    /// The full system prompt content
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleGuide {
    #[serde(default)]
    pub guidelines: Vec<String>,
}

impl PromptTemplate {
    /// The persona shipped with the binary, named `name`.
    pub fn builtin(name: &str) -> Self {
        Self {
            persona: PersonaInfo {
                name: name.to_string(),
                description: "Supportive mental-health companion".to_string(),
            },
            system_prompt: SystemPrompt {
                content: builtin::PERSONA.replace("{name}", name),
            },
            style: StyleGuide {
                guidelines: builtin::STYLE.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    /// Load a template directly from a file path
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| PromptError::ParseError(e.to_string()))
    }

    /// System prompt followed by the style rules as a bulleted block
    pub fn instructions(&self) -> String {
        if self.style.guidelines.is_empty() {
            return self.system_prompt.content.trim().to_string();
        }

        let rules = self
            .style
            .guidelines
            .iter()
            .map(|g| format!("- {}", g))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "{}\n\nResponse style:\n{}",
            self.system_prompt.content.trim(),
            rules
        )
    }
}

/// Errors from prompt loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Built-in prompt text that doesn't require files
pub mod builtin {
    /// Default persona; `{name}` is replaced with the assistant name
    pub const PERSONA: &str = "You are {name}, a warm, empathetic mental-health support companion. You listen without judgement, validate feelings, and offer practical, evidence-informed coping ideas such as breathing exercises, grounding techniques, journaling, and healthy routines. You are not a therapist and never diagnose or prescribe.";

    /// Default style rules
    pub const STYLE: &[&str] = &[
        "Keep replies conversational and under 150 words unless the user asks for detail",
        "Use **bold** for key ideas and short bulleted or numbered lists for steps",
        "Ask at most one gentle follow-up question",
        "Write in plain language suitable for being read aloud",
    ];

    /// Safety directives appended to every prompt
    pub const SAFETY: &str = r#"Safety rules:
- If the user mentions self-harm, suicide, or being in danger, respond with compassion and urge them to contact local emergency services or a crisis line (for example 988 in the US) right away.
- Do not provide medical diagnoses, medication advice, or instructions that could cause harm.
- Stay on topics related to mental health, emotions, and well-being; gently steer back if the conversation drifts."#;
}
