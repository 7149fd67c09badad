//! Terminal front end for generation and review.

use crate::agent::tools::ToolExecutor;
use crate::agent::{Agent, StepKind, ToolStep};
use crate::error::{Error, Result};
use crate::generate::{Draft, GenerationConfig, ModelSettings, StreamObserver};
use crate::llm::prompt_builder::Artifact;
use crate::llm::LlmClient;
use crate::revision::{Action, Regenerator, Reviewer, RevisionSession};
use colored::Colorize;
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const FALLBACK_WIDTH: u16 = 60;
const MAX_RULE_WIDTH: u16 = 80;

/// Ask the user a question and return a trimmed input line.
/// `None` means stdin is closed.
fn prompt_input(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut buf = String::new();
    if io::stdin().read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim().to_string()))
}

fn rule() -> String {
    let width = terminal::size()
        .ok()
        .map(|(w, _)| w)
        .filter(|w| *w > 0)
        .unwrap_or(FALLBACK_WIDTH)
        .min(MAX_RULE_WIDTH);
    "─".repeat(width as usize)
}

fn parse_action(input: &str) -> Option<Action> {
    match input.trim().to_ascii_lowercase().as_str() {
        "c" | "commit" | "y" | "yes" => Some(Action::Commit),
        "e" | "edit" => Some(Action::Edit),
        "r" | "regenerate" => Some(Action::Regenerate),
        "q" | "quit" | "n" | "no" | "cancel" => Some(Action::Cancel),
        _ => None,
    }
}

/// Let the user pick one of several subject candidates. Returns an index into
/// `subjects`.
pub fn choose_candidate(subjects: &[String]) -> Result<usize> {
    if subjects.len() <= 1 {
        return Ok(0);
    }

    println!("{}", "Pick a message:".bold());
    for (idx, subject) in subjects.iter().enumerate() {
        println!("  {}) {subject}", idx + 1);
    }

    loop {
        let Some(input) = prompt_input(&format!("Enter choice [1-{}]: ", subjects.len()))? else {
            return Ok(0);
        };
        match input.parse::<usize>() {
            Ok(n) if (1..=subjects.len()).contains(&n) => return Ok(n - 1),
            _ => println!("Invalid choice. Please enter a number from 1 to {}.", subjects.len()),
        }
    }
}

/// Reviews a draft at the terminal.
pub struct TerminalReviewer {
    artifact: Artifact,
    round_limit: Option<usize>,
}

impl TerminalReviewer {
    pub fn new(artifact: Artifact, round_limit: Option<usize>) -> Self {
        TerminalReviewer {
            artifact,
            round_limit,
        }
    }

    fn accept_label(&self) -> &'static str {
        match self.artifact {
            Artifact::Commit => "[c]ommit",
            Artifact::PullRequest => "[c]reate",
        }
    }

    fn preview(&self, session: &RevisionSession) {
        let heading = match self.artifact {
            Artifact::Commit => "Commit Message Preview",
            Artifact::PullRequest => "PR Message Preview",
        };
        let rule = rule();

        println!();
        println!("{}", heading.bold());
        println!("{}", rule.bright_black());
        println!("{}", session.draft.message.green().bold());
        if !session.draft.body.is_empty() {
            println!();
            println!("{}", session.draft.body);
        }
        println!("{}", rule.bright_black());

        let files = session.files();
        println!(
            "{}",
            format!("{} file(s): {}", files.len(), files.join(", ")).bright_black()
        );
        if let Some(limit) = self.round_limit {
            println!(
                "{}",
                format!("Round {} of {limit}", session.rounds + 1).bright_black()
            );
        }
    }
}

impl Reviewer for TerminalReviewer {
    fn choose(&mut self, session: &RevisionSession) -> Result<Action> {
        self.preview(session);
        let prompt = format!("{}, [e]dit, [r]egenerate, [q]uit: ", self.accept_label());
        loop {
            let Some(input) = prompt_input(&prompt)? else {
                return Ok(Action::Cancel);
            };
            match parse_action(&input) {
                Some(action) => return Ok(action),
                None => println!("Invalid choice. Please enter c, e, r, or q."),
            }
        }
    }

    fn instruction(&mut self) -> Result<String> {
        Ok(prompt_input("What should change? ")?.unwrap_or_default())
    }

    fn report_error(&mut self, error: &Error) {
        eprintln!("{} {error}", "error:".red().bold());
    }

    fn notice(&mut self, message: &str) {
        println!("{}", message.yellow());
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Run `work` behind a spinner that is cleared when it returns.
pub fn with_spinner<T>(message: &'static str, work: impl FnOnce() -> T) -> T {
    let bar = spinner(message);
    let out = work();
    bar.finish_and_clear();
    out
}

/// Shows how much of the subject and body has arrived while streaming.
pub struct StreamProgress {
    bar: ProgressBar,
    subject_chars: AtomicUsize,
    body_chars: AtomicUsize,
}

impl StreamProgress {
    pub fn start() -> Self {
        StreamProgress {
            bar: spinner("Waiting for the model..."),
            subject_chars: AtomicUsize::new(0),
            body_chars: AtomicUsize::new(0),
        }
    }

    fn refresh(&self) {
        self.bar.set_message(format!(
            "Receiving: subject {} chars, body {} chars",
            self.subject_chars.load(Ordering::Relaxed),
            self.body_chars.load(Ordering::Relaxed)
        ));
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

impl StreamObserver for StreamProgress {
    fn subject_delta(&self, delta: &str) {
        self.subject_chars
            .fetch_add(delta.chars().count(), Ordering::Relaxed);
        self.refresh();
    }

    fn body_delta(&self, delta: &str) {
        self.body_chars.fetch_add(delta.chars().count(), Ordering::Relaxed);
        self.refresh();
    }
}

/// One-line description of a tool step. Missing payload fields just leave
/// the detail out.
pub fn describe_step(step: &ToolStep) -> String {
    let field = |key: &str| step.payload.get(key).and_then(Value::as_str);

    let detail = match step.kind {
        StepKind::Call => field("filePath")
            .map(str::to_string)
            .or_else(|| {
                step.payload.get("filePaths").and_then(Value::as_array).map(|paths| {
                    paths
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
            })
            .or_else(|| field("message").map(str::to_string)),
        StepKind::Result => field("error")
            .map(|e| format!("failed: {e}"))
            .or_else(|| step.payload.as_array().map(|items| format!("{} item(s)", items.len())))
            .or_else(|| step.payload.as_str().map(|s| format!("{} chars", s.chars().count()))),
    };

    let arrow = match step.kind {
        StepKind::Call => "→",
        StepKind::Result => "✓",
    };
    match detail.filter(|d| !d.is_empty()) {
        Some(d) => format!("{arrow} {} ({d})", step.tool),
        None => format!("{arrow} {}", step.tool),
    }
}

/// Regenerates a draft by letting the model inspect the repository.
pub struct AgentRegenerator<'a> {
    client: &'a dyn LlmClient,
    settings: &'a ModelSettings,
    config: &'a GenerationConfig,
    executor: &'a dyn ToolExecutor,
    artifact: Artifact,
}

impl<'a> AgentRegenerator<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        settings: &'a ModelSettings,
        config: &'a GenerationConfig,
        executor: &'a dyn ToolExecutor,
        artifact: Artifact,
    ) -> Self {
        AgentRegenerator {
            client,
            settings,
            config,
            executor,
            artifact,
        }
    }
}

impl Regenerator for AgentRegenerator<'_> {
    fn regenerate(&mut self, instruction: &str, session: &RevisionSession) -> Result<Draft> {
        let agent = Agent::new(self.client, self.settings, self.config, self.executor).artifact(self.artifact);
        let bar = spinner("Revising...");
        let result = agent.run(instruction, &session.draft, &session.diff, &mut |step| {
            bar.println(describe_step(step).bright_black().to_string());
        });
        bar.finish_and_clear();

        let run = result?;
        log::info!("Revision finished after {} tool step(s)", run.steps.len());
        Ok(run.draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(kind: StepKind, tool: &str, payload: Value) -> ToolStep {
        ToolStep {
            kind,
            tool: tool.into(),
            payload,
        }
    }

    #[test]
    fn actions_accept_short_and_long_forms() {
        assert_eq!(parse_action("c"), Some(Action::Commit));
        assert_eq!(parse_action(" Edit "), Some(Action::Edit));
        assert_eq!(parse_action("r"), Some(Action::Regenerate));
        assert_eq!(parse_action("q"), Some(Action::Cancel));
        assert_eq!(parse_action("x"), None);
        assert_eq!(parse_action(""), None);
    }

    #[test]
    fn calls_show_their_arguments() {
        let read = step(StepKind::Call, "readStagedFile", json!({ "filePath": "src/a.rs" }));
        assert_eq!(describe_step(&read), "→ readStagedFile (src/a.rs)");

        let diffs = step(
            StepKind::Call,
            "readStagedFileDiffs",
            json!({ "filePaths": ["a.rs", "b.rs"] }),
        );
        assert_eq!(describe_step(&diffs), "→ readStagedFileDiffs (a.rs, b.rs)");
    }

    #[test]
    fn results_are_summarised() {
        let listed = step(StepKind::Result, "listStagedFiles", json!(["a", "b"]));
        assert_eq!(describe_step(&listed), "✓ listStagedFiles (2 item(s))");

        let failed = step(StepKind::Result, "readStagedFile", json!({ "error": "no such file" }));
        assert_eq!(describe_step(&failed), "✓ readStagedFile (failed: no such file)");
    }

    #[test]
    fn missing_fields_render_the_bare_tool_name() {
        let bare = step(StepKind::Call, "listStagedFiles", json!({}));
        assert_eq!(describe_step(&bare), "→ listStagedFiles");

        let odd = step(StepKind::Call, "readStagedFile", json!({ "filePath": 3 }));
        assert_eq!(describe_step(&odd), "→ readStagedFile");

        let null = step(StepKind::Result, "finishCommitMessage", Value::Null);
        assert_eq!(describe_step(&null), "✓ finishCommitMessage");
    }

    #[test]
    fn single_candidate_needs_no_prompt() {
        assert_eq!(choose_candidate(&["only".into()]).unwrap(), 0);
        assert_eq!(choose_candidate(&[]).unwrap(), 0);
    }
}
