//! The fixed tool set the agent may call while revising a message.

use crate::error::Result;
use crate::llm::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How many prior subjects `getRecentCommitMessageExamples` returns.
pub const RECENT_COMMIT_LIMIT: usize = 10;

/// Per-file diff text returned by `readStagedFileDiffs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub diff: String,
}

/// Repository access backing the tools. Implemented against git by
/// [`crate::git::StagedChanges`] and [`crate::git::BranchChanges`].
pub trait ToolExecutor {
    fn list_staged_files(&self) -> Result<Vec<String>>;
    fn recent_commit_messages(&self, limit: usize) -> Result<Vec<String>>;
    fn read_staged_file(&self, path: &str) -> Result<String>;
    fn staged_file_diffs(&self, paths: &[String]) -> Result<Vec<FileDiff>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    ListStagedFiles,
    GetRecentCommitMessageExamples,
    ReadStagedFile { file_path: String },
    ReadStagedFileDiffs { file_paths: Vec<String> },
    FinishCommitMessage { message: String, body: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadStagedFileArgs {
    file_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadStagedFileDiffsArgs {
    file_paths: Vec<String>,
}

#[derive(Deserialize)]
struct FinishArgs {
    message: String,
    #[serde(default)]
    body: String,
}

/// Why a tool call from the model could not be turned into a [`Tool`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {message}")]
    BadArguments { tool: String, message: String },
}

fn args<T: for<'de> Deserialize<'de>>(name: &str, raw: &str) -> Result<T, ParseError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| ParseError::BadArguments {
        tool: name.to_string(),
        message: e.to_string(),
    })
}

impl Tool {
    pub const LIST_STAGED_FILES: &'static str = "listStagedFiles";
    pub const GET_RECENT_COMMIT_MESSAGE_EXAMPLES: &'static str = "getRecentCommitMessageExamples";
    pub const READ_STAGED_FILE: &'static str = "readStagedFile";
    pub const READ_STAGED_FILE_DIFFS: &'static str = "readStagedFileDiffs";
    pub const FINISH_COMMIT_MESSAGE: &'static str = "finishCommitMessage";

    pub fn parse(name: &str, arguments: &str) -> Result<Tool, ParseError> {
        match name {
            Self::LIST_STAGED_FILES => Ok(Tool::ListStagedFiles),
            Self::GET_RECENT_COMMIT_MESSAGE_EXAMPLES => Ok(Tool::GetRecentCommitMessageExamples),
            Self::READ_STAGED_FILE => {
                let a: ReadStagedFileArgs = args(name, arguments)?;
                Ok(Tool::ReadStagedFile {
                    file_path: a.file_path,
                })
            }
            Self::READ_STAGED_FILE_DIFFS => {
                let a: ReadStagedFileDiffsArgs = args(name, arguments)?;
                Ok(Tool::ReadStagedFileDiffs {
                    file_paths: a.file_paths,
                })
            }
            Self::FINISH_COMMIT_MESSAGE => {
                let a: FinishArgs = args(name, arguments)?;
                Ok(Tool::FinishCommitMessage {
                    message: a.message,
                    body: a.body,
                })
            }
            other => Err(ParseError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ListStagedFiles => Self::LIST_STAGED_FILES,
            Tool::GetRecentCommitMessageExamples => Self::GET_RECENT_COMMIT_MESSAGE_EXAMPLES,
            Tool::ReadStagedFile { .. } => Self::READ_STAGED_FILE,
            Tool::ReadStagedFileDiffs { .. } => Self::READ_STAGED_FILE_DIFFS,
            Tool::FinishCommitMessage { .. } => Self::FINISH_COMMIT_MESSAGE,
        }
    }

    /// Arguments as shown to progress observers.
    pub fn arguments(&self) -> Value {
        match self {
            Tool::ListStagedFiles | Tool::GetRecentCommitMessageExamples => json!({}),
            Tool::ReadStagedFile { file_path } => json!({ "filePath": file_path }),
            Tool::ReadStagedFileDiffs { file_paths } => json!({ "filePaths": file_paths }),
            Tool::FinishCommitMessage { message, body } => {
                json!({ "message": message, "body": body })
            }
        }
    }

    /// Run a non-terminal tool. `FinishCommitMessage` is handled by the loop
    /// and echoes its arguments here.
    pub fn execute(&self, executor: &dyn ToolExecutor) -> Result<Value> {
        Ok(match self {
            Tool::ListStagedFiles => json!(executor.list_staged_files()?),
            Tool::GetRecentCommitMessageExamples => {
                json!(executor.recent_commit_messages(RECENT_COMMIT_LIMIT)?)
            }
            Tool::ReadStagedFile { file_path } => json!(executor.read_staged_file(file_path)?),
            Tool::ReadStagedFileDiffs { file_paths } => {
                json!(executor.staged_file_diffs(file_paths)?)
            }
            Tool::FinishCommitMessage { .. } => self.arguments(),
        })
    }
}

/// Definitions advertised to the model.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: Tool::LIST_STAGED_FILES,
            description: "List the paths of all staged files.",
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
        ToolSpec {
            name: Tool::GET_RECENT_COMMIT_MESSAGE_EXAMPLES,
            description: "Return recent commit subject lines from this repository, to match its style.",
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
        ToolSpec {
            name: Tool::READ_STAGED_FILE,
            description: "Read the staged content of one file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "Repository-relative path." }
                },
                "required": ["filePath"]
            }),
        },
        ToolSpec {
            name: Tool::READ_STAGED_FILE_DIFFS,
            description: "Return the staged diff of each named file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "filePaths": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["filePaths"]
            }),
        },
        ToolSpec {
            name: Tool::FINISH_COMMIT_MESSAGE,
            description: "Finish with the final subject line and body.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Subject line." },
                    "body": { "type": "string", "description": "Body text, may be empty." }
                },
                "required": ["message", "body"]
            }),
        },
    ]
}


#[cfg(test)]
mod tests {
    use super::fake::FakeRepo;
    use super::*;

    #[test]
    fn parses_every_tool() {
        assert_eq!(Tool::parse("listStagedFiles", ""), Ok(Tool::ListStagedFiles));
        assert_eq!(
            Tool::parse("getRecentCommitMessageExamples", "{}"),
            Ok(Tool::GetRecentCommitMessageExamples)
        );
        assert_eq!(
            Tool::parse("readStagedFile", r#"{"filePath":"a.rs"}"#),
            Ok(Tool::ReadStagedFile {
                file_path: "a.rs".into()
            })
        );
        assert_eq!(
            Tool::parse("readStagedFileDiffs", r#"{"filePaths":["a.rs","b.rs"]}"#),
            Ok(Tool::ReadStagedFileDiffs {
                file_paths: vec!["a.rs".into(), "b.rs".into()]
            })
        );
        assert_eq!(
            Tool::parse("finishCommitMessage", r#"{"message":"fix: x"}"#),
            Ok(Tool::FinishCommitMessage {
                message: "fix: x".into(),
                body: String::new()
            })
        );
    }

    #[test]
    fn unknown_and_malformed_calls_are_rejected() {
        assert_eq!(
            Tool::parse("deleteEverything", "{}"),
            Err(ParseError::UnknownTool("deleteEverything".into()))
        );
        assert!(matches!(
            Tool::parse("readStagedFile", r#"{"path":"a.rs"}"#),
            Err(ParseError::BadArguments { .. })
        ));
    }

    #[test]
    fn parse_errors_read_as_tool_results() {
        let unknown = ParseError::UnknownTool("deleteEverything".into());
        assert_eq!(unknown.to_string(), "unknown tool `deleteEverything`");

        let bad = ParseError::BadArguments {
            tool: "readStagedFile".into(),
            message: "missing field `filePath`".into(),
        };
        assert_eq!(
            bad.to_string(),
            "invalid arguments for `readStagedFile`: missing field `filePath`"
        );

        let err: &dyn std::error::Error = &bad;
        assert!(err.source().is_none());
    }

    #[test]
    fn specs_cover_every_tool_name() {
        let names: Vec<_> = tool_specs().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "listStagedFiles",
                "getRecentCommitMessageExamples",
                "readStagedFile",
                "readStagedFileDiffs",
                "finishCommitMessage"
            ]
        );
    }

    #[test]
    fn executes_against_the_repository() {
        let mut repo = FakeRepo::default();
        repo.files.insert("a.rs".into(), "fn a() {}".into());
        repo.commits = vec!["feat: one".into(), "fix: two".into()];

        assert_eq!(
            Tool::ListStagedFiles.execute(&repo).unwrap(),
            json!(["a.rs"])
        );
        assert_eq!(
            Tool::GetRecentCommitMessageExamples.execute(&repo).unwrap(),
            json!(["feat: one", "fix: two"])
        );
        let diffs = Tool::ReadStagedFileDiffs {
            file_paths: vec!["a.rs".into()],
        }
        .execute(&repo)
        .unwrap();
        assert_eq!(diffs[0]["path"], "a.rs");
        assert_eq!(diffs[0]["diff"], "+fn a() {}");
        assert!(Tool::ReadStagedFile {
            file_path: "missing.rs".into()
        }
        .execute(&repo)
        .is_err());
    }
}
