//! Scripted `LlmClient` for unit tests.

use super::stream::StreamEvent;
use super::{
    AssistantTurn, CompletionRequest, CompletionResult, LlmClient, ModelChoice, ToolInvocation,
    ToolRequest,
};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type CompletionFn = Box<dyn Fn(&CompletionRequest) -> Result<CompletionResult> + Send + Sync>;
type StreamFn = Box<dyn Fn(&CompletionRequest) -> Result<Vec<String>> + Send + Sync>;

pub(crate) struct ScriptedClient {
    base_url: String,
    models: Vec<ModelChoice>,
    completion: Option<CompletionFn>,
    stream: Option<StreamFn>,
    tool_turns: Mutex<VecDeque<Result<AssistantTurn>>>,
    pub tool_requests: Mutex<Vec<ToolRequest>>,
    calls: AtomicUsize,
}

/// True when the request asks for a commit subject line.
pub(crate) fn is_subject_request(request: &CompletionRequest) -> bool {
    request
        .messages
        .iter()
        .any(|m| m.content.contains("Write only the subject line"))
}

pub(crate) fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> AssistantTurn {
    AssistantTurn {
        content: None,
        tool_calls: vec![ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        ScriptedClient {
            base_url: "http://localhost:11434".to_string(),
            models: Vec::new(),
            completion: None,
            stream: None,
            tool_turns: Mutex::new(VecDeque::new()),
            tool_requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelChoice>) -> Self {
        self.models = models;
        self
    }

    pub fn with_completion<F>(mut self, f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResult> + Send + Sync + 'static,
    {
        self.completion = Some(Box::new(f));
        self
    }

    pub fn with_stream<F>(mut self, f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.stream = Some(Box::new(f));
        self
    }

    pub fn with_tool_turns(self, turns: Vec<Result<AssistantTurn>>) -> Self {
        *self.tool_turns.lock().unwrap() = turns.into();
        self
    }

    /// Total provider calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for ScriptedClient {
    fn backend(&self) -> &'static str {
        "Scripted"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn list_models(&self) -> Result<Vec<ModelChoice>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.models.clone())
    }

    fn generate_completion(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.completion {
            Some(f) => f(request),
            None => Ok(CompletionResult::default()),
        }
    }

    fn stream_completion(
        &self,
        request: &CompletionRequest,
        on_delta: &mut dyn FnMut(&str),
        on_complete: Box<dyn FnOnce(String) + '_>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fragments = match &self.stream {
            Some(f) => f(request)?,
            None => Vec::new(),
        };
        let events = fragments
            .into_iter()
            .map(|f| Ok(StreamEvent::Delta(f)))
            .chain(std::iter::once(Ok(StreamEvent::Done)));
        super::stream::accumulate("scripted", events, on_delta, on_complete)
    }

    fn complete_with_tools(&self, request: &ToolRequest) -> Result<AssistantTurn> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tool_requests.lock().unwrap().push(request.clone());
        self.tool_turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::decode("Scripted", "no scripted tool turn left")))
    }
}
