//! Model-driven revision with repository tools.
//!
//! The model may inspect the staged changes through [`tools::Tool`] calls
//! before it settles on a final subject and body via `finishCommitMessage`.
//! Each call runs to completion before the model sees its result.

pub mod tools;

use crate::error::{Error, Result};
use crate::generate::{sanitize, Draft, GenerationConfig, ModelSettings};
use crate::git::StagedDiff;
use crate::llm::prompt_builder::{self, Artifact};
use crate::llm::{LlmClient, ToolInvocation, ToolRequest, Turn};
use serde_json::{json, Value};
use tools::{Tool, ToolExecutor};

/// Model turns allowed before the run is abandoned.
pub const DEFAULT_MAX_STEPS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// The tool is about to run.
    Call,
    /// The tool finished.
    Result,
}

/// Progress event handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStep {
    pub kind: StepKind,
    pub tool: String,
    /// Arguments for a call, the result payload for a result.
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    pub draft: Draft,
    pub steps: Vec<ToolStep>,
}

pub struct Agent<'a> {
    client: &'a dyn LlmClient,
    settings: &'a ModelSettings,
    config: &'a GenerationConfig,
    executor: &'a dyn ToolExecutor,
    artifact: Artifact,
    max_steps: usize,
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<'a> Agent<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        settings: &'a ModelSettings,
        config: &'a GenerationConfig,
        executor: &'a dyn ToolExecutor,
    ) -> Self {
        Agent {
            client,
            settings,
            config,
            executor,
            artifact: Artifact::Commit,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = artifact;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn run(
        &self,
        instruction: &str,
        current: &Draft,
        diff: &StagedDiff,
        observer: &mut dyn FnMut(&ToolStep),
    ) -> Result<AgentRun> {
        let prompt = prompt_builder::agent_prompt(
            self.artifact,
            self.config,
            instruction,
            &current.message,
            &current.body,
            diff,
        );

        let mut request = ToolRequest {
            model: self.settings.model.clone(),
            turns: prompt.into_messages().into_iter().map(Turn::Message).collect(),
            tools: tools::tool_specs(),
            temperature: self.settings.temperature,
            reasoning_effort: self.settings.reasoning_effort.clone(),
        };
        let mut steps = Vec::new();

        for step in 1..=self.max_steps {
            log::debug!("Agent step {step}/{}", self.max_steps);
            let reply = self.client.complete_with_tools(&request)?;

            if reply.tool_calls.is_empty() {
                log::debug!("Agent answered without a tool call; nudging");
                if let Some(text) = reply.content.filter(|t| !t.trim().is_empty()) {
                    request
                        .turns
                        .push(Turn::Message(crate::llm::Message::assistant(text)));
                }
                request.turns.push(Turn::Message(prompt_builder::agent_nudge()));
                continue;
            }

            request.turns.push(Turn::ToolCalls(reply.tool_calls.clone()));

            for call in reply.tool_calls {
                if let Some(draft) = self.dispatch(&call, &mut request, &mut steps, observer) {
                    return Ok(AgentRun { draft, steps });
                }
            }
        }

        Err(Error::ToolBudgetExceeded(self.max_steps))
    }

    /// Run one tool call and record its result. Returns the final draft when
    /// the call finishes the run.
    fn dispatch(
        &self,
        call: &ToolInvocation,
        request: &mut ToolRequest,
        steps: &mut Vec<ToolStep>,
        observer: &mut dyn FnMut(&ToolStep),
    ) -> Option<Draft> {
        let mut emit = |kind: StepKind, tool: &str, payload: Value| {
            let step = ToolStep {
                kind,
                tool: tool.to_string(),
                payload,
            };
            observer(&step);
            steps.push(step);
        };

        let payload = match Tool::parse(&call.name, &call.arguments) {
            Err(e) => {
                let raw = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| Value::String(call.arguments.clone()));
                emit(StepKind::Call, &call.name, raw);
                json!({ "error": e.to_string() })
            }
            Ok(tool) => {
                emit(StepKind::Call, tool.name(), tool.arguments());
                match tool {
                    Tool::FinishCommitMessage { message, body } => {
                        let draft = Draft {
                            message: sanitize(&message),
                            body: body.trim().to_string(),
                        };
                        if !draft.message.is_empty() {
                            emit(StepKind::Result, &call.name, json!({ "accepted": true }));
                            return Some(draft);
                        }
                        json!({ "error": "message must not be empty" })
                    }
                    other => other
                        .execute(self.executor)
                        .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                }
            }
        };

        log::debug!("Tool {} returned {} bytes", call.name, payload_text(&payload).len());
        emit(StepKind::Result, &call.name, payload.clone());
        request.turns.push(Turn::ToolResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: payload_text(&payload),
        });
        None
    }
}
