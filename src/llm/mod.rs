pub mod capability;
pub mod models;
pub mod ollama;
pub mod openai;
pub mod prompt_builder;
mod prompts;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A uniform chat request, mapped onto each backend's wire shape by its adapter.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
    /// Number of candidates wanted, always at least 1.
    pub candidates: usize,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        CompletionRequest {
            messages,
            model: model.into(),
            temperature: None,
            reasoning_effort: None,
            candidates: 1,
            max_tokens: None,
        }
    }

    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates.max(1);
        self
    }
}

/// Candidate texts in provider order. An empty list is a valid answer here;
/// callers decide whether that is a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResult {
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub id: String,
    pub label: String,
}

/// A function the model may call during a tool-enabled turn.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

/// A tool invocation emitted by the model. `arguments` is the raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One entry of a tool-enabled dialog.
#[derive(Debug, Clone)]
pub enum Turn {
    Message(Message),
    ToolCalls(Vec<ToolInvocation>),
    ToolResult {
        call_id: String,
        name: String,
        content: String,
    },
}

#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub model: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolSpec>,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
}

/// What the model answered on a tool-enabled turn.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Trait for talking to a chat-completion backend.
pub trait LlmClient: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Base URL the client talks to; model discovery filters on it.
    fn base_url(&self) -> &str;

    /// All models the backend advertises, normalised to id/label pairs.
    fn list_models(&self) -> Result<Vec<ModelChoice>>;

    fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResult>;

    /// Stream a single candidate. `on_delta` sees every non-empty fragment in
    /// arrival order; `on_complete` runs once with the full text after the
    /// stream closes, and never when the stream fails.
    fn stream_completion(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
        on_complete: Box<dyn FnOnce(String) + '_>,
    ) -> Result<()>;

    /// One assistant turn with tools available.
    fn complete_with_tools(&self, request: &ToolRequest) -> Result<AssistantTurn>;
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n[truncated {} chars]", &s[..end], s.len() - end)
}
