use crate::error::{Error, Result};
use crate::revision::{EditResult, Editor};
use std::env;
use std::fs;
use std::io::Write;
use std::process::Command;

/// Launches `$VISUAL`/`$EDITOR` (falling back to `vi`) on a temporary file.
///
/// The file lives in a `NamedTempFile`, so it is removed on every exit path.
pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    pub fn new(command: impl Into<String>) -> Self {
        ExternalEditor {
            command: command.into(),
        }
    }

    pub fn from_env() -> Self {
        let command = env::var("VISUAL")
            .or_else(|_| env::var("EDITOR"))
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());
        Self::new(command)
    }
}

impl Editor for ExternalEditor {
    fn edit(&mut self, initial: &str) -> Result<EditResult> {
        let mut file = tempfile::Builder::new()
            .prefix("COMMIT_EDITMSG-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(initial.as_bytes())?;
        file.flush()?;

        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Editor("no editor configured".into()))?;

        log::debug!("Opening {:?} in {program}", file.path());
        let status = Command::new(program)
            .args(parts)
            .arg(file.path())
            .status()
            .map_err(|e| Error::Editor(format!("failed to launch {program}: {e}")))?;

        if !status.success() {
            return Err(Error::Editor(format!(
                "{program} exited with status {:?}",
                status.code()
            )));
        }

        let edited = fs::read_to_string(file.path())?;
        if edited.trim() == initial.trim() {
            return Ok(EditResult::Unchanged);
        }
        Ok(EditResult::Edited(edited))
    }
}
