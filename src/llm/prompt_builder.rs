use crate::generate::{CommitType, GenerationConfig};
use crate::git::StagedDiff;
use crate::llm::{prompts, Message};

/// Longest PR title we ask for.
pub const PR_TITLE_MAX_LENGTH: usize = 72;

pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn into_messages(self) -> Vec<Message> {
        vec![Message::system(self.system), Message::user(self.user)]
    }
}

/// What the generated text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Commit,
    PullRequest,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::Commit => "commit message",
            Artifact::PullRequest => "pull request title and description",
        }
    }
}

fn language_line(locale: &str) -> String {
    format!("Write in the language with ISO 639-1 code \"{locale}\".")
}

fn diff_block(diff: &StagedDiff) -> String {
    format!(
        "Files:\n{files}\n\nDiff:\n```diff\n{diff}\n```",
        files = diff.files.join("\n"),
        diff = diff.diff
    )
}

pub fn subject_prompt(cfg: &GenerationConfig, diff: &StagedDiff) -> PromptPair {
    let mut system = prompts::SUBJECT_INSTRUCTIONS.to_owned();
    system.push('\n');
    system.push_str(&language_line(&cfg.locale));
    system.push_str(&format!(
        "\nThe subject line must be at most {} characters.",
        cfg.max_length
    ));
    if cfg.commit_type == CommitType::Conventional {
        system.push('\n');
        system.push_str(prompts::CONVENTIONAL_RULES);
    }

    PromptPair {
        system,
        user: diff_block(diff),
    }
}

pub fn body_prompt(cfg: &GenerationConfig, diff: &StagedDiff) -> PromptPair {
    let mut system = prompts::BODY_INSTRUCTIONS.to_owned();
    system.push('\n');
    system.push_str(&language_line(&cfg.locale));

    PromptPair {
        system,
        user: diff_block(diff),
    }
}

pub fn pr_title_prompt(cfg: &GenerationConfig, diff: &StagedDiff) -> PromptPair {
    let mut system = prompts::PR_TITLE_INSTRUCTIONS.to_owned();
    system.push('\n');
    system.push_str(&language_line(&cfg.locale));
    system.push_str(&format!(
        "\nThe title must be at most {PR_TITLE_MAX_LENGTH} characters."
    ));

    PromptPair {
        system,
        user: diff_block(diff),
    }
}

pub fn pr_body_prompt(cfg: &GenerationConfig, diff: &StagedDiff) -> PromptPair {
    let mut system = prompts::PR_BODY_INSTRUCTIONS.to_owned();
    system.push('\n');
    system.push_str(&language_line(&cfg.locale));

    PromptPair {
        system,
        user: diff_block(diff),
    }
}

/// Opening turns of an agent run revising the current text.
pub fn agent_prompt(
    artifact: Artifact,
    cfg: &GenerationConfig,
    instruction: &str,
    message: &str,
    body: &str,
    diff: &StagedDiff,
) -> PromptPair {
    let mut system = prompts::AGENT_INSTRUCTIONS.replace("{artifact}", artifact.as_str());
    system.push('\n');
    system.push_str(&language_line(&cfg.locale));
    let max_length = match artifact {
        Artifact::Commit => cfg.max_length,
        Artifact::PullRequest => PR_TITLE_MAX_LENGTH,
    };
    system.push_str(&format!(
        "\nThe subject must be at most {max_length} characters."
    ));
    if artifact == Artifact::Commit && cfg.commit_type == CommitType::Conventional {
        system.push('\n');
        system.push_str(prompts::CONVENTIONAL_RULES);
    }

    let user = format!(
        "Instruction: {instruction}\n\n\
         Current subject:\n{message}\n\n\
         Current body:\n{body}\n\n\
         {diff}",
        instruction = instruction.trim(),
        diff = diff_block(diff)
    );

    PromptPair { system, user }
}

pub fn agent_nudge() -> Message {
    Message::user(prompts::AGENT_NUDGE)
}
