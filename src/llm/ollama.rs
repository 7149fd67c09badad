use super::capability::{self, ModelCapabilities};
use super::openai::fold_system_messages;
use super::stream::{self, read_stream, StreamEvent};
use super::{
    AssistantTurn, CompletionRequest, CompletionResult, LlmClient, Message, ModelChoice, Role,
    ToolInvocation, ToolRequest, Turn,
};
use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::time::Duration;

const BACKEND: &str = "Ollama";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        OllamaMessage {
            role: role.to_string(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamResponse {
    message: Option<OllamaMessage>,
    done: Option<bool>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

fn options_for(caps: ModelCapabilities, temperature: Option<f32>, max_tokens: Option<u32>) -> OllamaOptions {
    let mut options = OllamaOptions {
        num_predict: max_tokens,
        ..Default::default()
    };
    if caps.allows_sampling {
        options.temperature = Some(temperature.unwrap_or(DEFAULT_TEMPERATURE));
        options.top_p = Some(1.0);
        options.frequency_penalty = Some(0.0);
        options.presence_penalty = Some(0.0);
    }
    options
}

pub(crate) fn build_chat_request(request: &CompletionRequest, stream: bool) -> ChatRequest {
    let caps = capability::resolve(&request.model);
    let messages: Vec<Message> = if caps.folds_system_into_user {
        fold_system_messages(&request.messages)
    } else {
        request.messages.clone()
    };

    ChatRequest {
        model: request.model.clone(),
        stream,
        messages: messages
            .iter()
            .map(|m| OllamaMessage::text(m.role.as_str(), m.content.clone()))
            .collect(),
        options: options_for(caps, request.temperature, request.max_tokens),
        tools: Vec::new(),
    }
}

fn build_tool_request(request: &ToolRequest) -> ChatRequest {
    let caps = capability::resolve(&request.model);

    let mut folded = Vec::new();
    let mut messages = Vec::new();
    for turn in &request.turns {
        match turn {
            Turn::Message(m) if m.role == Role::System && caps.folds_system_into_user => {
                folded.push(OllamaMessage::text(
                    "user",
                    format!("System instructions: {}", m.content),
                ));
            }
            Turn::Message(m) => messages.push(OllamaMessage::text(m.role.as_str(), m.content.clone())),
            Turn::ToolCalls(calls) => {
                let mut msg = OllamaMessage::text("assistant", "");
                msg.tool_calls = calls
                    .iter()
                    .map(|c| OllamaToolCall {
                        function: OllamaFunctionCall {
                            name: c.name.clone(),
                            arguments: serde_json::from_str(&c.arguments)
                                .unwrap_or(serde_json::Value::Null),
                        },
                    })
                    .collect();
                messages.push(msg);
            }
            Turn::ToolResult { name, content, .. } => {
                let mut msg = OllamaMessage::text("tool", content.clone());
                msg.tool_name = Some(name.clone());
                messages.push(msg);
            }
        }
    }

    folded.extend(messages);

    let tools = request
        .tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect();

    ChatRequest {
        model: request.model.clone(),
        stream: false,
        messages: folded,
        options: options_for(caps, request.temperature, None),
        tools,
    }
}

fn parse_stream_line(line: &str) -> Result<StreamEvent> {
    let parsed: OllamaStreamResponse =
        serde_json::from_str(line).map_err(|e| Error::decode(BACKEND, e))?;

    if let Some(error) = parsed.error {
        return Err(Error::Stream {
            backend: BACKEND,
            message: stream::error_message(&error),
        });
    }

    if parsed.done.unwrap_or(false) {
        return Ok(StreamEvent::Done);
    }

    Ok(match parsed.message {
        Some(m) if !m.content.is_empty() => StreamEvent::Delta(m.content),
        _ => StreamEvent::Skip,
    })
}

/// Synchronous Ollama client using /api/chat.
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Transport {
                backend: BACKEND,
                source,
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn post_chat(&self, body: &ChatRequest) -> Result<Response> {
        let url = format!("{}/api/chat", self.base_url);
        log::info!("Calling Ollama model {:?}", body.model);
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(body) {
                log::trace!("Ollama request body: {}", super::truncate(&json, 4000));
            }
        }

        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .map_err(|source| Error::Transport {
                backend: BACKEND,
                source,
            })?;
        check_status(resp)
    }

    fn chat_once(&self, body: &ChatRequest) -> Result<OllamaMessage> {
        let resp = self.post_chat(body)?;
        let resp_text = resp.text().map_err(|source| Error::Transport {
            backend: BACKEND,
            source,
        })?;

        log::trace!("Ollama raw JSON response: {resp_text}");

        let parsed: OllamaChatResponse =
            serde_json::from_str(&resp_text).map_err(|e| Error::decode(BACKEND, e))?;
        Ok(parsed.message)
    }
}

fn check_status(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    Err(Error::Status {
        backend: BACKEND,
        status,
        body,
    })
}

impl LlmClient for OllamaClient {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn list_models(&self) -> Result<Vec<ModelChoice>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.http.get(&url).send().map_err(|source| Error::Transport {
            backend: BACKEND,
            source,
        })?;
        let tags: TagList = check_status(resp)?
            .json()
            .map_err(|e| Error::decode(BACKEND, e))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| {
                let label = match m.details.and_then(|d| d.parameter_size) {
                    Some(size) if !size.is_empty() => format!("{} ({size})", m.name),
                    _ => m.name.clone(),
                };
                ModelChoice { id: m.name, label }
            })
            .collect())
    }

    /// Ollama has no candidate-count field, so each candidate is its own request.
    fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let body = build_chat_request(request, false);
        let mut candidates = Vec::with_capacity(request.candidates);
        for _ in 0..request.candidates.max(1) {
            let message = self.chat_once(&body)?;
            candidates.push(message.content);
        }
        Ok(CompletionResult { candidates })
    }

    fn stream_completion(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
        on_complete: Box<dyn FnOnce(String) + '_>,
    ) -> Result<()> {
        let body = build_chat_request(request, true);
        let resp = self.post_chat(&body)?;
        read_stream(
            BACKEND,
            BufReader::new(resp),
            parse_stream_line,
            on_delta,
            on_complete,
        )
    }

    fn complete_with_tools(&self, request: &ToolRequest) -> Result<AssistantTurn> {
        let body = build_tool_request(request);
        let message = self.chat_once(&body)?;

        // Ollama does not assign call ids.
        let tool_calls = message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, c)| ToolInvocation {
                id: format!("call_{i}"),
                name: c.function.name,
                arguments: c.function.arguments.to_string(),
            })
            .collect();

        let content = Some(message.content).filter(|c| !c.trim().is_empty());
        Ok(AssistantTurn { content, tool_calls })
    }
}
