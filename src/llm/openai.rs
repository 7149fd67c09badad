use super::capability::{self, MaxTokensField, ModelCapabilities};
use super::stream::{self, read_stream, StreamEvent};
use super::{
    AssistantTurn, CompletionRequest, CompletionResult, LlmClient, Message, ModelChoice, Role,
    ToolInvocation, ToolRequest, ToolSpec, Turn,
};
use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::time::Duration;

const BACKEND: &str = "OpenAI";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Request body for the Chat Completions API.
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        ChatMessage {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCallMessage {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: FunctionCallMessage,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCallMessage {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDefinition,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        ToolDefinition {
            tool_type: "function",
            function: FunctionDefinition {
                name: spec.name,
                description: spec.description,
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Rewrite system turns as user turns prefixed with "System instructions: ",
/// ahead of the rest of the dialog.
pub(crate) fn fold_system_messages(messages: &[Message]) -> Vec<Message> {
    let (system, rest): (Vec<&Message>, Vec<&Message>) =
        messages.iter().partition(|m| m.role == Role::System);

    system
        .into_iter()
        .map(|m| Message::user(format!("System instructions: {}", m.content)))
        .chain(rest.into_iter().cloned())
        .collect()
}

fn sampling_fields(caps: ModelCapabilities, temperature: Option<f32>) -> [Option<f32>; 4] {
    if caps.allows_sampling {
        [
            Some(temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            Some(1.0),
            Some(0.0),
            Some(0.0),
        ]
    } else {
        [None; 4]
    }
}

/// Build the wire request for a plain completion.
pub(crate) fn build_chat_request(request: &CompletionRequest, stream: bool) -> ChatRequest {
    let caps = capability::resolve(&request.model);

    let messages = if caps.folds_system_into_user {
        fold_system_messages(&request.messages)
    } else {
        request.messages.clone()
    };

    let [temperature, top_p, frequency_penalty, presence_penalty] =
        sampling_fields(caps, request.temperature);

    let (max_tokens, max_completion_tokens) = match caps.max_tokens_field {
        MaxTokensField::MaxTokens => (request.max_tokens, None),
        MaxTokensField::MaxCompletionTokens => (None, request.max_tokens),
    };

    ChatRequest {
        model: request.model.clone(),
        messages: messages
            .iter()
            .map(|m| ChatMessage::text(m.role.as_str(), m.content.clone()))
            .collect(),
        temperature,
        top_p,
        frequency_penalty,
        presence_penalty,
        n: Some(if stream { 1 } else { request.candidates.max(1) }),
        max_tokens,
        max_completion_tokens,
        reasoning_effort: request
            .reasoning_effort
            .clone()
            .filter(|_| caps.allows_reasoning_effort),
        stream,
        tools: None,
    }
}

/// Build the wire request for a tool-enabled turn.
pub(crate) fn build_tool_request(request: &ToolRequest) -> ChatRequest {
    let caps = capability::resolve(&request.model);
    let [temperature, top_p, frequency_penalty, presence_penalty] =
        sampling_fields(caps, request.temperature);

    let mut system = Vec::new();
    let mut rest = Vec::new();
    for turn in &request.turns {
        match turn {
            Turn::Message(m) if m.role == Role::System && caps.folds_system_into_user => {
                system.push(ChatMessage::text(
                    "user",
                    format!("System instructions: {}", m.content),
                ));
            }
            Turn::Message(m) => rest.push(ChatMessage::text(m.role.as_str(), m.content.clone())),
            Turn::ToolCalls(calls) => rest.push(ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(
                    calls
                        .iter()
                        .map(|c| ToolCallMessage {
                            id: c.id.clone(),
                            call_type: function_type(),
                            function: FunctionCallMessage {
                                name: c.name.clone(),
                                arguments: c.arguments.clone(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            }),
            Turn::ToolResult {
                call_id, content, ..
            } => rest.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            }),
        }
    }
    system.extend(rest);

    ChatRequest {
        model: request.model.clone(),
        messages: system,
        temperature,
        top_p,
        frequency_penalty,
        presence_penalty,
        n: None,
        max_tokens: None,
        max_completion_tokens: None,
        reasoning_effort: request
            .reasoning_effort
            .clone()
            .filter(|_| caps.allows_reasoning_effort),
        stream: false,
        tools: Some(request.tools.iter().map(ToolDefinition::from).collect()),
    }
}

fn parse_stream_line(line: &str) -> Result<StreamEvent> {
    let line = line.trim_start();
    if !line.starts_with("data:") {
        return Ok(StreamEvent::Skip);
    }

    let data = line.trim_start_matches("data:").trim();
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let chunk: StreamResponse = serde_json::from_str(data).map_err(|e| Error::decode(BACKEND, e))?;
    if let Some(error) = chunk.error {
        return Err(Error::Stream {
            backend: BACKEND,
            message: stream::error_message(&error),
        });
    }

    let content = chunk.choices.into_iter().next().and_then(|c| c.delta.content);
    Ok(content.map_or(StreamEvent::Skip, StreamEvent::Delta))
}

/// OpenAI-compatible implementation of LlmClient.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, api_base_url: String, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::Transport {
                backend: BACKEND,
                source,
            })?;

        Ok(OpenAiClient {
            client,
            api_key,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/{}", self.api_base_url, path)
        } else {
            format!("{}/v1/{}", self.api_base_url, path)
        }
    }

    fn post(&self, body: &ChatRequest) -> Result<Response> {
        log::info!("Calling OpenAI model {:?}", body.model);
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(body) {
                log::trace!("OpenAI request body: {}", super::truncate(&json, 4000));
            }
        }

        let resp = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|source| Error::Transport {
                backend: BACKEND,
                source,
            })?;

        check_status(resp)
    }

    fn post_and_parse(&self, body: &ChatRequest) -> Result<ChatResponse> {
        let resp = self.post(body)?;
        let chat_resp: ChatResponse = resp.json().map_err(|e| Error::decode(BACKEND, e))?;

        if let Some(usage) = &chat_resp.usage {
            log::debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        Ok(chat_resp)
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

impl LlmClient for OpenAiClient {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn base_url(&self) -> &str {
        &self.api_base_url
    }

    fn list_models(&self) -> Result<Vec<ModelChoice>> {
        let resp = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|source| Error::Transport {
                backend: BACKEND,
                source,
            })?;
        let list: ModelList = check_status(resp)?
            .json()
            .map_err(|e| Error::decode(BACKEND, e))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelChoice {
                label: m.id.clone(),
                id: m.id,
            })
            .collect())
    }

    fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let body = build_chat_request(request, false);
        let resp = self.post_and_parse(&body)?;

        let candidates = resp
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect();

        Ok(CompletionResult { candidates })
    }

    fn stream_completion(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
        on_complete: Box<dyn FnOnce(String) + '_>,
    ) -> Result<()> {
        let body = build_chat_request(request, true);
        let resp = self.post(&body)?;
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
        let resp = self.post_and_parse(&body)?;

        let Some(choice) = resp.choices.into_iter().next() else {
            return Ok(AssistantTurn::default());
        };

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolInvocation {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();

        Ok(AssistantTurn {
            content: choice.message.content,
            tool_calls,
        })
    }
}
