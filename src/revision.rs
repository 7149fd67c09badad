//! Interactive review of a generated draft.
//!
//! A session starts in review and moves through edit/regenerate rounds until
//! the user accepts or cancels. With a round limit, running out of rounds
//! cancels the session.

use crate::error::{Error, Result};
use crate::generate::{sanitize, Draft};
use crate::git::StagedDiff;

/// Round limit used by the bounded variant.
pub const BOUNDED_ROUNDS: usize = 10;

/// How many times an empty regenerate instruction is asked for again.
pub const INSTRUCTION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Commit,
    Edit,
    Regenerate,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Reviewing,
    Editing,
    Regenerating,
    Accepted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    User,
    RoundLimit(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Draft),
    Cancelled(CancelReason),
}

/// What the editor handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditResult {
    Unchanged,
    Edited(String),
}

/// State carried between rounds of one review.
#[derive(Debug, Clone)]
pub struct RevisionSession {
    pub draft: Draft,
    pub rounds: usize,
    pub diff: StagedDiff,
    pub state: State,
}

impl RevisionSession {
    pub fn new(draft: Draft, diff: StagedDiff) -> Self {
        RevisionSession {
            draft,
            rounds: 0,
            diff,
            state: State::Reviewing,
        }
    }

    pub fn files(&self) -> &[String] {
        &self.diff.files
    }
}

/// The person driving the review.
pub trait Reviewer {
    fn choose(&mut self, session: &RevisionSession) -> Result<Action>;
    fn instruction(&mut self) -> Result<String>;
    /// A round failed; the session stays in review.
    fn report_error(&mut self, error: &Error);
    fn notice(&mut self, message: &str);
}

/// Full-screen editing of the current text.
pub trait Editor {
    fn edit(&mut self, initial: &str) -> Result<EditResult>;
}

/// Produces a replacement draft from a free-text instruction.
pub trait Regenerator {
    fn regenerate(&mut self, instruction: &str, session: &RevisionSession) -> Result<Draft>;
}

/// Subject and body joined by one blank line.
pub fn join_draft(draft: &Draft) -> String {
    format!("{}\n\n{}", draft.message, draft.body)
}

/// Split edited text at the first blank line into subject and body.
/// Leading and trailing blank lines are ignored.
pub fn split_draft(text: &str) -> Draft {
    let text = text.trim();
    let lines: Vec<&str> = text.lines().collect();
    match lines.iter().position(|l| l.trim().is_empty()) {
        Some(blank) => Draft {
            message: lines[..blank].join("\n").trim().to_string(),
            body: lines[blank + 1..].join("\n").trim().to_string(),
        },
        None => Draft {
            message: text.to_string(),
            body: String::new(),
        },
    }
}

pub struct RevisionLoop {
    round_limit: Option<usize>,
}

impl RevisionLoop {
    pub fn new(round_limit: Option<usize>) -> Self {
        RevisionLoop { round_limit }
    }

    /// Loops until the user accepts or cancels.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn bounded() -> Self {
        Self::new(Some(BOUNDED_ROUNDS))
    }

    pub fn round_limit(&self) -> Option<usize> {
        self.round_limit
    }

    pub fn run(
        &self,
        session: &mut RevisionSession,
        reviewer: &mut dyn Reviewer,
        editor: &mut dyn Editor,
        regenerator: &mut dyn Regenerator,
    ) -> Result<Outcome> {
        loop {
            if let Some(limit) = self.round_limit {
                if session.rounds >= limit {
                    reviewer.notice(&format!(
                        "Reached the limit of {limit} rounds without a commit; cancelling."
                    ));
                    session.state = State::Cancelled;
                    return Ok(Outcome::Cancelled(CancelReason::RoundLimit(limit)));
                }
            }

            session.state = State::Reviewing;
            let action = reviewer.choose(session)?;
            session.rounds += 1;
            log::debug!("Revision round {}: {action:?}", session.rounds);

            match action {
                Action::Commit => {
                    session.state = State::Accepted;
                    return Ok(Outcome::Accepted(session.draft.clone()));
                }
                Action::Cancel => {
                    session.state = State::Cancelled;
                    return Ok(Outcome::Cancelled(CancelReason::User));
                }
                Action::Edit => {
                    session.state = State::Editing;
                    if let Err(e) = edit_round(session, editor) {
                        reviewer.report_error(&e);
                    }
                }
                Action::Regenerate => {
                    session.state = State::Regenerating;
                    if let Err(e) = regenerate_round(session, reviewer, regenerator) {
                        reviewer.report_error(&e);
                    }
                }
            }
        }
    }
}

fn edit_round(session: &mut RevisionSession, editor: &mut dyn Editor) -> Result<()> {
    let original = join_draft(&session.draft);
    let edited = match editor.edit(&original)? {
        EditResult::Unchanged => return Ok(()),
        EditResult::Edited(text) => text,
    };
    if edited.trim() == original.trim() {
        return Ok(());
    }
    let draft = split_draft(&edited);
    if draft.message.is_empty() {
        return Err(Error::validation("the subject line must not be empty"));
    }
    session.draft = draft;
    Ok(())
}

fn regenerate_round(
    session: &mut RevisionSession,
    reviewer: &mut dyn Reviewer,
    regenerator: &mut dyn Regenerator,
) -> Result<()> {
    let mut instruction = String::new();
    for _ in 0..INSTRUCTION_ATTEMPTS {
        instruction = reviewer.instruction()?;
        if !instruction.trim().is_empty() {
            break;
        }
    }
    if instruction.trim().is_empty() {
        return Err(Error::validation(
            "a regenerate instruction is required (no instruction given)",
        ));
    }

    let draft = regenerator.regenerate(instruction.trim(), session)?;
    session.draft = Draft {
        message: sanitize(&draft.message),
        body: draft.body.trim().to_string(),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedReviewer {
        actions: VecDeque<Action>,
        instructions: VecDeque<String>,
        errors: Vec<String>,
        notices: Vec<String>,
        instruction_prompts: usize,
    }

    impl ScriptedReviewer {
        fn new(actions: &[Action]) -> Self {
            ScriptedReviewer {
                actions: actions.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl Reviewer for ScriptedReviewer {
        fn choose(&mut self, _session: &RevisionSession) -> Result<Action> {
            Ok(self.actions.pop_front().unwrap_or(Action::Regenerate))
        }

        fn instruction(&mut self) -> Result<String> {
            self.instruction_prompts += 1;
            Ok(self.instructions.pop_front().unwrap_or_else(|| "shorter".into()))
        }

        fn report_error(&mut self, error: &Error) {
            self.errors.push(error.to_string());
        }

        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    struct FixedEditor(EditResult);

    impl Editor for FixedEditor {
        fn edit(&mut self, _initial: &str) -> Result<EditResult> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingRegenerator {
        calls: usize,
        fail: bool,
        instructions: Vec<String>,
    }

    impl Regenerator for CountingRegenerator {
        fn regenerate(&mut self, instruction: &str, session: &RevisionSession) -> Result<Draft> {
            self.calls += 1;
            self.instructions.push(instruction.to_string());
            if self.fail {
                return Err(Error::ToolBudgetExceeded(12));
            }
            Ok(Draft {
                message: format!("{} v{}.", session.draft.message, self.calls),
                body: "  new body \n".into(),
            })
        }
    }

    fn session() -> RevisionSession {
        RevisionSession::new(
            Draft {
                message: "feat: add x".into(),
                body: "Adds x".into(),
            },
            StagedDiff {
                files: vec!["x.rs".into()],
                diff: "+x".into(),
            },
        )
    }

    #[test]
    fn commit_returns_held_draft_untouched() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Commit]);
        let mut regen = CountingRegenerator::default();
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut FixedEditor(EditResult::Unchanged), &mut regen)
            .unwrap();

        assert_eq!(outcome, Outcome::Accepted(session().draft));
        assert_eq!(regen.calls, 0);
        assert_eq!(s.state, State::Accepted);
    }

    #[test]
    fn cancel_ends_the_session() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Cancel]);
        let outcome = RevisionLoop::bounded()
            .run(
                &mut s,
                &mut reviewer,
                &mut FixedEditor(EditResult::Unchanged),
                &mut CountingRegenerator::default(),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Cancelled(CancelReason::User));
    }

    #[test]
    fn edit_splits_at_first_blank_line() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Edit, Action::Commit]);
        let mut editor = FixedEditor(EditResult::Edited(
            "fix: y\n\nFirst paragraph.\n\nSecond paragraph.\n".into(),
        ));
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut editor, &mut CountingRegenerator::default())
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Accepted(Draft {
                message: "fix: y".into(),
                body: "First paragraph.\n\nSecond paragraph.".into(),
            })
        );
    }

    #[test]
    fn edit_returning_same_text_is_a_no_op() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Edit, Action::Commit]);
        let mut editor = FixedEditor(EditResult::Edited("\nfeat: add x\n\nAdds x\n\n".into()));
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut editor, &mut CountingRegenerator::default())
            .unwrap();
        assert_eq!(outcome, Outcome::Accepted(session().draft));
        assert!(reviewer.errors.is_empty());
    }

    #[test]
    fn regenerate_replaces_the_draft() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Regenerate, Action::Commit]);
        reviewer.instructions.push_back("  mention tests ".into());
        let mut regen = CountingRegenerator::default();
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut FixedEditor(EditResult::Unchanged), &mut regen)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Accepted(Draft {
                message: "feat: add x v1".into(),
                body: "new body".into(),
            })
        );
        assert_eq!(regen.instructions, vec!["mention tests"]);
    }

    #[test]
    fn failed_regeneration_keeps_values_and_reports() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Regenerate, Action::Commit]);
        let mut regen = CountingRegenerator {
            fail: true,
            ..Default::default()
        };
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut FixedEditor(EditResult::Unchanged), &mut regen)
            .unwrap();

        assert_eq!(outcome, Outcome::Accepted(session().draft));
        assert_eq!(reviewer.errors.len(), 1);
        assert!(reviewer.errors[0].contains("12 steps"));
    }

    #[test]
    fn empty_instruction_is_asked_for_a_bounded_number_of_times() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Regenerate, Action::Commit]);
        reviewer.instructions = ["", "  ", "\t", "never asked"].iter().map(|s| s.to_string()).collect();
        let mut regen = CountingRegenerator::default();
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut FixedEditor(EditResult::Unchanged), &mut regen)
            .unwrap();

        assert_eq!(reviewer.instruction_prompts, INSTRUCTION_ATTEMPTS);
        assert_eq!(regen.calls, 0);
        assert_eq!(reviewer.errors.len(), 1);
        assert_eq!(outcome, Outcome::Accepted(session().draft));
    }

    #[test]
    fn bounded_loop_cancels_after_ten_rounds() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[]);
        let mut regen = CountingRegenerator::default();
        let outcome = RevisionLoop::bounded()
            .run(&mut s, &mut reviewer, &mut FixedEditor(EditResult::Unchanged), &mut regen)
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled(CancelReason::RoundLimit(10)));
        assert_eq!(regen.calls, 10);
        assert_eq!(s.rounds, 10);
        assert_eq!(s.state, State::Cancelled);
        assert_eq!(reviewer.notices.len(), 1);
    }

    #[test]
    fn edit_rounds_count_toward_the_limit() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Edit, Action::Edit, Action::Commit]);
        let outcome = RevisionLoop::new(Some(2))
            .run(
                &mut s,
                &mut reviewer,
                &mut FixedEditor(EditResult::Unchanged),
                &mut CountingRegenerator::default(),
            )
            .unwrap();
        assert_eq!(outcome, Outcome::Cancelled(CancelReason::RoundLimit(2)));
        assert_eq!(RevisionLoop::unbounded().round_limit(), None);
    }

    #[test]
    fn split_without_blank_line_is_all_subject() {
        assert_eq!(
            split_draft("  just a subject \n"),
            Draft {
                message: "just a subject".into(),
                body: String::new()
            }
        );
        assert_eq!(join_draft(&session().draft), "feat: add x\n\nAdds x");
    }

    #[test]
    fn leading_blank_lines_do_not_empty_the_subject() {
        assert_eq!(
            split_draft("\nfix: y\n\nbody text\n"),
            Draft {
                message: "fix: y".into(),
                body: "body text".into(),
            }
        );
    }

    #[test]
    fn edit_clearing_the_subject_keeps_the_draft() {
        let mut s = session();
        let mut reviewer = ScriptedReviewer::new(&[Action::Edit, Action::Commit]);
        let mut editor = FixedEditor(EditResult::Edited("   \n\n".into()));
        let outcome = RevisionLoop::unbounded()
            .run(&mut s, &mut reviewer, &mut editor, &mut CountingRegenerator::default())
            .unwrap();

        assert_eq!(outcome, Outcome::Accepted(session().draft));
        assert_eq!(reviewer.errors, vec!["the subject line must not be empty".to_string()]);
    }
}
