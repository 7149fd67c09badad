use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use commitsmith::agent::tools::ToolExecutor;
use commitsmith::cli_args::{Cli, Command};
use commitsmith::config::Config;
use commitsmith::editor::ExternalEditor;
use commitsmith::generate::{Draft, Generation, GenerationConfig, Generator, ModelSettings};
use commitsmith::git::{self, BranchChanges, DiffSource, StagedChanges, StagedDiff};
use commitsmith::interactive::{self, AgentRegenerator, StreamProgress, TerminalReviewer};
use commitsmith::llm::models;
use commitsmith::llm::prompt_builder::Artifact;
use commitsmith::llm::LlmClient;
use commitsmith::logging::init_logger;
use commitsmith::revision::{CancelReason, Outcome, RevisionLoop, RevisionSession};
use commitsmith::setup::build_llm_client;

/// Everything one run needs to generate and review an artifact.
struct Run<'a> {
    cli: &'a Cli,
    cfg: &'a Config,
    client: &'a dyn LlmClient,
    settings: ModelSettings,
    generation: GenerationConfig,
}

impl<'a> Run<'a> {
    fn new(cli: &'a Cli, cfg: &'a Config, client: &'a dyn LlmClient) -> Self {
        Run {
            cli,
            cfg,
            client,
            settings: cfg.model_settings(),
            generation: cfg.generation(),
        }
    }

    /// Generate a first draft. `None` when there is nothing to describe.
    fn first_draft(&self, artifact: Artifact, diff: &StagedDiff) -> Result<Option<Draft>> {
        let generator = Generator::new(self.client, &self.settings, &self.generation);

        let generation = if self.cfg.stream {
            let progress = StreamProgress::start();
            let result = match artifact {
                Artifact::Commit => generator.commit_streaming(diff, &progress),
                Artifact::PullRequest => generator.pull_request_streaming(diff, &progress),
            };
            progress.finish();
            result?
        } else {
            let result = interactive::with_spinner("Generating...", || match artifact {
                Artifact::Commit => generator.commit(diff),
                Artifact::PullRequest => generator.pull_request(diff),
            });
            match result? {
                Generation::NothingStaged => Generation::NothingStaged,
                Generation::Ready(candidates) => {
                    let idx = interactive::choose_candidate(&candidates.subjects)?;
                    Generation::Ready(candidates.draft(idx))
                }
            }
        };

        Ok(match generation {
            Generation::Ready(draft) => Some(draft),
            Generation::NothingStaged => None,
        })
    }

    fn review(
        &self,
        artifact: Artifact,
        draft: Draft,
        diff: StagedDiff,
        executor: &dyn ToolExecutor,
    ) -> Result<Outcome> {
        let revision = if self.cli.bounded {
            RevisionLoop::bounded()
        } else {
            RevisionLoop::unbounded()
        };

        let mut session = RevisionSession::new(draft, diff);
        let mut reviewer = TerminalReviewer::new(artifact, revision.round_limit());
        let mut editor = ExternalEditor::from_env();
        let mut regenerator =
            AgentRegenerator::new(self.client, &self.settings, &self.generation, executor, artifact);

        let outcome = revision.run(&mut session, &mut reviewer, &mut editor, &mut regenerator)?;
        Ok(outcome)
    }
}

fn report_cancel(reason: CancelReason) {
    match reason {
        CancelReason::User => println!("{}", "Cancelled.".yellow()),
        CancelReason::RoundLimit(limit) => {
            println!("{}", format!("Cancelled after {limit} rounds.").yellow())
        }
    }
}

/// Commit mode: describe the staged changes and commit them.
fn run_commit(run: &Run) -> Result<()> {
    if run.cli.all {
        git::stage_all()?;
    }

    let source = StagedChanges::new(run.generation.context_lines);
    let Some(diff) = source.staged_diff(&run.generation.exclude, run.generation.context_lines)? else {
        println!("No staged changes found.");
        return Ok(());
    };

    let Some(draft) = run.first_draft(Artifact::Commit, &diff)? else {
        println!("No staged changes found.");
        return Ok(());
    };

    match run.review(Artifact::Commit, draft, diff, &source)? {
        Outcome::Accepted(draft) => {
            if run.cli.dry_run {
                println!("{}", "Dry run: not committing.".bright_black());
                return Ok(());
            }
            git::commit(&draft.message, &draft.body).context("git commit failed")?;
            println!("{} {}", "Committed:".green().bold(), draft.message);
        }
        Outcome::Cancelled(reason) => report_cancel(reason),
    }
    Ok(())
}

/// PR mode: describe the branch against `base` and open a pull request.
fn run_pr(run: &Run, base: &str) -> Result<()> {
    let source = BranchChanges::new(base, run.generation.context_lines);
    let Some(diff) = source.staged_diff(&run.generation.exclude, run.generation.context_lines)? else {
        let branch = git::current_branch()?;
        println!("No changes found between {base} and {branch}.");
        return Ok(());
    };

    let Some(draft) = run.first_draft(Artifact::PullRequest, &diff)? else {
        println!("No changes found against {base}.");
        return Ok(());
    };

    match run.review(Artifact::PullRequest, draft, diff, &source)? {
        Outcome::Accepted(draft) => {
            if run.cli.dry_run {
                println!("{}", "Dry run: not opening a pull request.".bright_black());
                return Ok(());
            }
            let url = git::create_pull_request(base, &draft.message, &draft.body)
                .context("gh pr create failed")?;
            println!("{} {url}", "Opened:".green().bold());
        }
        Outcome::Cancelled(reason) => report_cancel(reason),
    }
    Ok(())
}

/// List chat models, or check that one id is offered.
fn run_models(cfg: &Config, client: &dyn LlmClient, id: Option<&str>) -> Result<()> {
    let available = models::discover(client)?;

    if let Some(id) = id {
        let found = models::find_model(&available, id)?;
        println!("{} {}", "Available:".green().bold(), found.label);
        return Ok(());
    }

    let default = models::default_model(&available, Some(cfg.model.as_str()))?;
    for model in &available {
        if model.id == default.id {
            println!("* {}", model.label.bold());
        } else {
            println!("  {}", model.label);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let cfg = Config::from_sources(&cli)?;
    let client = build_llm_client(&cfg)?;
    log::info!("Using model {} at {}", cfg.model, client.base_url());

    match &cli.command {
        Some(Command::Models { id }) => run_models(&cfg, client.as_ref(), id.as_deref()),
        Some(Command::Pr { base }) => run_pr(&Run::new(&cli, &cfg, client.as_ref()), base),
        None => run_commit(&Run::new(&cli, &cfg, client.as_ref())),
    }
}
