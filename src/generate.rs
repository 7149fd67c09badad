//! Turns a diff into subject/body candidates.
//!
//! Subject and body are produced by two independent requests issued side by
//! side; both are awaited before anything is returned.

use crate::error::{Error, Result};
use crate::git::StagedDiff;
use crate::llm::prompt_builder::{self, PromptPair};
use crate::llm::{CompletionRequest, LlmClient};
use std::collections::HashSet;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitType {
    Conventional,
    #[default]
    Plain,
}

impl CommitType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "conventional" => Some(CommitType::Conventional),
            "" => Some(CommitType::Plain),
            _ => None,
        }
    }
}

/// Generation settings; validated before they get here.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Two-letter language code.
    pub locale: String,
    pub max_length: usize,
    pub commit_type: CommitType,
    /// Candidates requested per prompt.
    pub generate: usize,
    pub context_lines: u32,
    pub exclude: Vec<String>,
}

/// Per-request model parameters.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<String>,
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn request(&self, prompt: PromptPair, candidates: usize) -> CompletionRequest {
        let mut request =
            CompletionRequest::new(self.model.clone(), prompt.into_messages()).with_candidates(candidates);
        request.temperature = self.temperature;
        request.reasoning_effort = self.reasoning_effort.clone();
        request.max_tokens = self.max_tokens;
        request
    }
}

/// Result of a generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation<T> {
    /// The diff source had no changes; no request was made.
    NothingStaged,
    Ready(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub subjects: Vec<String>,
    pub bodies: Vec<String>,
}

impl Candidates {
    /// Pair the chosen subject with the first body.
    pub fn draft(&self, subject_index: usize) -> Draft {
        Draft {
            message: self
                .subjects
                .get(subject_index)
                .or_else(|| self.subjects.first())
                .cloned()
                .unwrap_or_default(),
            body: self.bodies.first().cloned().unwrap_or_default(),
        }
    }
}

/// A subject/body pair under review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub message: String,
    pub body: String,
}

/// Receives streamed fragments. The subject and body streams call in from
/// different threads and are not synchronised with each other.
pub trait StreamObserver: Sync {
    fn subject_delta(&self, delta: &str);
    fn body_delta(&self, delta: &str);
}

/// Trim, drop line breaks, and remove one trailing period that follows a word
/// character.
pub fn sanitize(text: &str) -> String {
    let mut out: String = text
        .trim()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    let mut tail = out.chars().rev();
    if tail.next() == Some('.') && tail.next().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
        out.pop();
    }
    out
}

/// Remove exact duplicates, keeping the first occurrence of each.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

pub struct Generator<'a> {
    client: &'a dyn LlmClient,
    settings: &'a ModelSettings,
    config: &'a GenerationConfig,
}

impl<'a> Generator<'a> {
    pub fn new(client: &'a dyn LlmClient, settings: &'a ModelSettings, config: &'a GenerationConfig) -> Self {
        Generator {
            client,
            settings,
            config,
        }
    }

    pub fn commit(&self, diff: &StagedDiff) -> Result<Generation<Candidates>> {
        if diff.files.is_empty() {
            return Ok(Generation::NothingStaged);
        }
        let (subject, body) = self.commit_requests(diff);
        self.fan_out(subject, body).map(Generation::Ready)
    }

    pub fn pull_request(&self, diff: &StagedDiff) -> Result<Generation<Candidates>> {
        if diff.files.is_empty() {
            return Ok(Generation::NothingStaged);
        }
        let (title, body) = self.pull_request_requests(diff);
        self.fan_out(title, body).map(Generation::Ready)
    }

    pub fn commit_streaming(&self, diff: &StagedDiff, observer: &dyn StreamObserver) -> Result<Generation<Draft>> {
        if diff.files.is_empty() {
            return Ok(Generation::NothingStaged);
        }
        let (subject, body) = self.commit_requests(diff);
        self.stream_pair(subject, body, observer).map(Generation::Ready)
    }

    pub fn pull_request_streaming(
        &self,
        diff: &StagedDiff,
        observer: &dyn StreamObserver,
    ) -> Result<Generation<Draft>> {
        if diff.files.is_empty() {
            return Ok(Generation::NothingStaged);
        }
        let (title, body) = self.pull_request_requests(diff);
        self.stream_pair(title, body, observer).map(Generation::Ready)
    }

    fn commit_requests(&self, diff: &StagedDiff) -> (CompletionRequest, CompletionRequest) {
        let subject = prompt_builder::subject_prompt(self.config, diff);
        let body = prompt_builder::body_prompt(self.config, diff);
        log::trace!("Subject prompt:\n{}", crate::llm::truncate(&subject.system, 3000));
        (
            self.settings.request(subject, self.config.generate),
            self.settings.request(body, self.config.generate),
        )
    }

    fn pull_request_requests(&self, diff: &StagedDiff) -> (CompletionRequest, CompletionRequest) {
        let title = prompt_builder::pr_title_prompt(self.config, diff);
        let body = prompt_builder::pr_body_prompt(self.config, diff);
        log::trace!("PR title prompt:\n{}", crate::llm::truncate(&title.system, 3000));
        (
            self.settings.request(title, self.config.generate),
            self.settings.request(body, self.config.generate),
        )
    }

    fn fan_out(&self, subject: CompletionRequest, body: CompletionRequest) -> Result<Candidates> {
        let client = self.client;
        let (subjects, bodies) = thread::scope(|s| {
            let subject_task = s.spawn(|| client.generate_completion(&subject));
            let body_task = s.spawn(|| client.generate_completion(&body));
            (join(subject_task), join(body_task))
        });
        let (subjects, bodies) = (subjects?, bodies?);

        let subjects: Vec<String> = dedupe(
            subjects
                .candidates
                .iter()
                .map(|s| sanitize(s))
                .filter(|s| !s.is_empty())
                .collect(),
        );
        if subjects.is_empty() {
            return Err(Error::EmptyResult);
        }
        let bodies = bodies.candidates.iter().map(|b| sanitize(b)).collect();

        log::info!("Generated {} distinct subject candidate(s)", subjects.len());
        Ok(Candidates { subjects, bodies })
    }

    fn stream_pair(
        &self,
        subject: CompletionRequest,
        body: CompletionRequest,
        observer: &dyn StreamObserver,
    ) -> Result<Draft> {
        let client = self.client;
        let (message, body) = thread::scope(|s| {
            let subject_task = s.spawn(|| {
                let mut full = String::new();
                client.stream_completion(
                    &subject,
                    &mut |d| observer.subject_delta(d),
                    Box::new(|text| full = text),
                )?;
                Ok::<_, Error>(full)
            });
            let body_task = s.spawn(|| {
                let mut full = String::new();
                client.stream_completion(
                    &body,
                    &mut |d| observer.body_delta(d),
                    Box::new(|text| full = text),
                )?;
                Ok::<_, Error>(full)
            });
            (join(subject_task), join(body_task))
        });

        let message = sanitize(&message?);
        if message.is_empty() {
            return Err(Error::EmptyResult);
        }
        Ok(Draft {
            message,
            body: sanitize(&body?),
        })
    }
}
