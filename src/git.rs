use crate::agent::tools::{FileDiff, ToolExecutor};
use crate::error::{Error, Result};
use std::process::Command as GitCommand;

/// Lockfiles and similar generated files are never sent to the model.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "*.lock",
];

/// Staged changes handed to the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedDiff {
    pub files: Vec<String>,
    pub diff: String,
}

/// Where diffs come from. `None` means there is nothing staged.
pub trait DiffSource {
    fn staged_diff(&self, exclude: &[String], context_lines: u32) -> Result<Option<StagedDiff>>;
}

/// Run a git command and capture stdout as String.
pub fn git_output(args: &[&str]) -> Result<String> {
    let output = GitCommand::new("git")
        .args(args)
        .output()
        .map_err(|e| Error::Git(format!("failed to run git {args:?}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {:?} exited with status {:?}: {}",
            args,
            output.status.code(),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Pathspecs selecting everything except the excluded patterns.
fn pathspecs(exclude: &[String]) -> Vec<String> {
    let mut specs = vec![".".to_string()];
    specs.extend(
        DEFAULT_EXCLUDES
            .iter()
            .map(|p| p.to_string())
            .chain(exclude.iter().cloned())
            .map(|p| format!(":(exclude){p}")),
    );
    specs
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Get the current branch name.
pub fn current_branch() -> Result<String> {
    let name = git_output(&["rev-parse", "--abbrev-ref", "HEAD"])?
        .trim()
        .to_string();
    Ok(name)
}

/// Stage all new, modified, and deleted files
pub fn stage_all() -> Result<()> {
    log::warn!("Staging all changes");
    git_output(&["add", "-A"])?;
    Ok(())
}

/// Create a commit from a subject and optional body.
pub fn commit(message: &str, body: &str) -> Result<()> {
    let mut args = vec!["commit", "-m", message];
    if !body.trim().is_empty() {
        args.extend(["-m", body]);
    }
    git_output(&args)?;
    Ok(())
}

/// Open a pull request through the GitHub CLI.
pub fn create_pull_request(base: &str, title: &str, body: &str) -> Result<String> {
    let output = GitCommand::new("gh")
        .args(["pr", "create", "--base", base, "--title", title, "--body", body])
        .output()
        .map_err(|e| Error::Git(format!("failed to run gh: {e}")))?;

    if !output.status.success() {
        return Err(Error::Git(format!(
            "gh pr create exited with status {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The index of the repository in the current directory.
#[derive(Debug, Clone)]
pub struct StagedChanges {
    context_lines: u32,
}

impl StagedChanges {
    pub fn new(context_lines: u32) -> Self {
        StagedChanges { context_lines }
    }
}

impl DiffSource for StagedChanges {
    fn staged_diff(&self, exclude: &[String], context_lines: u32) -> Result<Option<StagedDiff>> {
        let specs = pathspecs(exclude);
        let unified = format!("-U{context_lines}");

        let mut name_args = vec!["diff", "--cached", "--name-only", "--"];
        name_args.extend(specs.iter().map(String::as_str));
        let files = lines(&git_output(&name_args)?);
        if files.is_empty() {
            return Ok(None);
        }

        let mut diff_args = vec!["diff", "--cached", "--diff-algorithm=minimal", unified.as_str(), "--"];
        diff_args.extend(specs.iter().map(String::as_str));
        let diff = git_output(&diff_args)?;

        log::info!("Found {} staged file(s)", files.len());
        Ok(Some(StagedDiff { files, diff }))
    }
}

impl ToolExecutor for StagedChanges {
    fn list_staged_files(&self) -> Result<Vec<String>> {
        Ok(lines(&git_output(&["diff", "--cached", "--name-only"])?))
    }

    fn recent_commit_messages(&self, limit: usize) -> Result<Vec<String>> {
        let count = format!("-n{limit}");
        // A fresh repository has no HEAD yet.
        match git_output(&["log", count.as_str(), "--pretty=format:%s"]) {
            Ok(out) => Ok(lines(&out)),
            Err(e) => {
                log::debug!("No commit history available: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn read_staged_file(&self, path: &str) -> Result<String> {
        let spec = format!(":{path}");
        git_output(&["show", spec.as_str()])
    }

    fn staged_file_diffs(&self, paths: &[String]) -> Result<Vec<FileDiff>> {
        let unified = format!("-U{}", self.context_lines);
        paths
            .iter()
            .map(|path| {
                let diff = git_output(&["diff", "--cached", unified.as_str(), "--", path.as_str()])?;
                Ok(FileDiff {
                    path: path.clone(),
                    diff,
                })
            })
            .collect()
    }
}

/// Changes on the current branch relative to a base branch.
#[derive(Debug, Clone)]
pub struct BranchChanges {
    base: String,
    context_lines: u32,
}

impl BranchChanges {
    pub fn new(base: impl Into<String>, context_lines: u32) -> Self {
        BranchChanges {
            base: base.into(),
            context_lines,
        }
    }

    fn range(&self) -> String {
        format!("{}...HEAD", self.base)
    }
}

impl DiffSource for BranchChanges {
    fn staged_diff(&self, exclude: &[String], context_lines: u32) -> Result<Option<StagedDiff>> {
        let range = self.range();
        let specs = pathspecs(exclude);
        let unified = format!("-U{context_lines}");

        let mut name_args = vec!["diff", "--name-only", range.as_str(), "--"];
        name_args.extend(specs.iter().map(String::as_str));
        let files = lines(&git_output(&name_args)?);
        if files.is_empty() {
            return Ok(None);
        }

        let mut diff_args = vec!["diff", "--diff-algorithm=minimal", unified.as_str(), range.as_str(), "--"];
        diff_args.extend(specs.iter().map(String::as_str));
        let diff = git_output(&diff_args)?;

        log::info!("Found {} changed file(s) against {}", files.len(), self.base);
        Ok(Some(StagedDiff { files, diff }))
    }
}

/// In PR mode the tools look at the branch instead of the index.
impl ToolExecutor for BranchChanges {
    fn list_staged_files(&self) -> Result<Vec<String>> {
        let range = self.range();
        Ok(lines(&git_output(&["diff", "--name-only", range.as_str()])?))
    }

    fn recent_commit_messages(&self, limit: usize) -> Result<Vec<String>> {
        let count = format!("-n{limit}");
        Ok(lines(&git_output(&["log", count.as_str(), "--pretty=format:%s", self.base.as_str()])?))
    }

    fn read_staged_file(&self, path: &str) -> Result<String> {
        let spec = format!("HEAD:{path}");
        git_output(&["show", spec.as_str()])
    }

    fn staged_file_diffs(&self, paths: &[String]) -> Result<Vec<FileDiff>> {
        let range = self.range();
        let unified = format!("-U{}", self.context_lines);
        paths
            .iter()
            .map(|path| {
                let diff = git_output(&["diff", unified.as_str(), range.as_str(), "--", path.as_str()])?;
                Ok(FileDiff {
                    path: path.clone(),
                    diff,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pathspecs_exclude_defaults_and_user_patterns() {
        let specs = pathspecs(&["dist/*".to_string()]);
        assert_eq!(specs[0], ".");
        assert!(specs.contains(&":(exclude)package-lock.json".to_string()));
        assert!(specs.contains(&":(exclude)*.lock".to_string()));
        assert_eq!(specs.last().unwrap(), ":(exclude)dist/*");
    }

    #[test]
    fn lines_skips_blanks() {
        assert_eq!(lines("a.rs\n\n  b.rs  \n"), vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn branch_range_is_three_dot() {
        assert_eq!(BranchChanges::new("main", 3).range(), "main...HEAD");
    }
}
