use std::fmt;

use anyhow::Result;

use crate::models::RetrievedChunk;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const INPUT_PLACEHOLDER: &str = "{input}";

pub const SYSTEM_PROMPT: &str = "You are a medical expert. Provide clear, concise answers using this context:
{context}

Answer in complete sentences using everyday language. Structure your response:
1. Brief definition
2. Main causes
3. Affected groups
4. Common treatments
Do not use markdown or special formatting.";

const DOCUMENT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Human,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => f.write_str("System"),
            Role::Human => f.write_str("Human"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Two-message chat template: the system instructions carry the retrieved
/// context, the human turn carries the question.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    human: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Result<Self> {
        let system = system.into();
        let human = human.into();

        if !system.contains(CONTEXT_PLACEHOLDER) {
            anyhow::bail!("system prompt template is missing {CONTEXT_PLACEHOLDER}");
        }
        if !human.contains(INPUT_PLACEHOLDER) {
            anyhow::bail!("human prompt template is missing {INPUT_PLACEHOLDER}");
        }

        Ok(Self { system, human })
    }

    pub fn medical() -> Result<Self> {
        Self::new(SYSTEM_PROMPT, INPUT_PLACEHOLDER)
    }

    pub fn assemble(&self, chunks: &[RetrievedChunk], input: &str) -> Vec<PromptMessage> {
        let context = build_context(chunks);
        vec![
            PromptMessage {
                role: Role::System,
                content: self.system.replace(CONTEXT_PLACEHOLDER, &context),
            },
            PromptMessage {
                role: Role::Human,
                content: self.human.replace(INPUT_PLACEHOLDER, input),
            },
        ]
    }
}

fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// Flattens chat messages into the single string a completion endpoint takes.
pub fn render_for_completion(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}
