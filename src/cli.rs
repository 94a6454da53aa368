//! The command line interface.
use crate::action::Action;
use crate::dispatch::{DispatchOutcome, dispatch};
use crate::evaluate::{EvaluationOutcome, evaluate};
use crate::input::read_toml;
use crate::log;
use crate::model::Model;
use crate::observation::ObservationRaw;
use crate::output::{create_output_directory, write_action, write_diagnostics, write_rollout};
use crate::settings::Settings;
use crate::state::SystemStateRaw;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the dispatcher and evaluator.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options shared by the commands which load a model
#[derive(Args, Default)]
pub struct ModelOpts {
    /// Directory containing `model.toml`. The bundled Case 1 model is used if omitted.
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the prior policy on a single observation.
    Dispatch {
        /// Path to the observation TOML file.
        observation: PathBuf,
        /// Model and output options
        #[command(flatten)]
        opts: ModelOpts,
    },
    /// Run the prior policy on a sequence of observations, feeding each action into the next step.
    Rollout {
        /// Path to a TOML file with one `[[steps]]` table per observation.
        observations: PathBuf,
        /// Model and output options
        #[command(flatten)]
        opts: ModelOpts,
    },
    /// Score a system state and the action that produced it.
    Evaluate {
        /// Path to the system state TOML file.
        state: PathBuf,
        /// Path to the action TOML file.
        action: PathBuf,
        /// Model and output options
        #[command(flatten)]
        opts: ModelOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The subcommands for managing the settings file
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Dispatch { observation, opts } => {
                handle_dispatch_command(&observation, &opts, None).map(|_| ())
            }
            Self::Rollout { observations, opts } => {
                handle_rollout_command(&observations, &opts, None).map(|_| ())
            }
            Self::Evaluate {
                state,
                action,
                opts,
            } => handle_evaluate_command(&state, &action, &opts, None).map(|_| ()),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ ies-dispatch --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// A sequence of observations, one per control step
#[derive(Deserialize)]
struct ObservationSequence {
    steps: Vec<ObservationRaw>,
}

/// Load settings (unless given), prepare the output directory and start the logger.
///
/// # Returns
///
/// The output directory, if one was requested
fn prepare<'a>(opts: &'a ModelOpts, settings: Option<Settings>) -> Result<Option<&'a Path>> {
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    let output_dir = opts.output_dir.as_deref();
    let mut overwritten = false;
    if let Some(output_dir) = output_dir {
        overwritten = create_output_directory(output_dir, opts.overwrite || settings.overwrite)
            .with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    output_dir.display()
                )
            })?;
    }

    log::init(Some(&settings.log_level), output_dir).context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder was overwritten");
    }

    Ok(output_dir)
}

/// Load the model named in the options, or the bundled Case 1 model
fn load_model(opts: &ModelOpts) -> Result<Model> {
    let model = if let Some(model_dir) = &opts.model_dir {
        let model = Model::from_path(model_dir).context("Failed to load model.")?;
        info!("Loaded model from {}", model_dir.display());
        model
    } else {
        Model::case1()?
    };

    Ok(model)
}

/// Print a value as TOML
fn print_toml<T: serde::Serialize>(value: &T) -> Result<()> {
    print!("{}", toml::to_string(value)?);

    Ok(())
}

/// Handle the `dispatch` command.
pub fn handle_dispatch_command(
    observation_path: &Path,
    opts: &ModelOpts,
    settings: Option<Settings>,
) -> Result<DispatchOutcome> {
    let output_dir = prepare(opts, settings)?;
    let model = load_model(opts)?;
    let observation: ObservationRaw = read_toml(observation_path)?;

    let outcome = dispatch(&model, &observation);
    if let DispatchOutcome::Fallback { reason, .. } = &outcome {
        warn!("Using the safe fallback action: {reason}");
    }

    print_toml(outcome.action())?;
    if let Some(output_dir) = output_dir {
        write_action(output_dir, outcome.action())?;
    }

    Ok(outcome)
}

/// Handle the `rollout` command.
///
/// Unless a step supplies its own `previous_action`, it is given the action chosen at the step
/// before.
pub fn handle_rollout_command(
    observations_path: &Path,
    opts: &ModelOpts,
    settings: Option<Settings>,
) -> Result<Vec<Action>> {
    let output_dir = prepare(opts, settings)?;
    let model = load_model(opts)?;
    let sequence: ObservationSequence = read_toml(observations_path)?;

    let mut actions: Vec<Action> = Vec::with_capacity(sequence.steps.len());
    for (step, mut observation) in sequence.steps.into_iter().enumerate() {
        if observation.previous_action.is_none() {
            observation.previous_action = actions.last().cloned();
        }

        let outcome = dispatch(&model, &observation);
        match &outcome {
            DispatchOutcome::Dispatched { action, .. } => {
                info!(
                    "Step {step}: grid import {} MW, DG output {} MW",
                    action.grid.p,
                    action.dg_total()
                );
            }
            DispatchOutcome::Fallback { reason, .. } => {
                warn!("Step {step}: using the safe fallback action: {reason}");
            }
        }
        actions.push(outcome.into_action());
    }

    if let Some(output_dir) = output_dir {
        write_rollout(output_dir, &actions)?;
    } else {
        for (step, action) in actions.iter().enumerate() {
            println!("# Step {step}");
            print_toml(action)?;
        }
    }

    Ok(actions)
}

/// Handle the `evaluate` command.
pub fn handle_evaluate_command(
    state_path: &Path,
    action_path: &Path,
    opts: &ModelOpts,
    settings: Option<Settings>,
) -> Result<EvaluationOutcome> {
    let output_dir = prepare(opts, settings)?;
    let model = load_model(opts)?;
    let state: SystemStateRaw = read_toml(state_path)?;
    let action: Action = read_toml(action_path)?;

    let outcome = evaluate(&model, &state, &action);
    match &outcome {
        EvaluationOutcome::Scored {
            reward,
            diagnostics,
        } => {
            println!("reward = {reward:?}");
            print_toml(diagnostics)?;
            if let Some(output_dir) = output_dir {
                write_diagnostics(output_dir, *reward, diagnostics)?;
            }
        }
        EvaluationOutcome::Failed { error } => {
            println!("reward = {:?}", outcome.reward());
            warn!("Evaluation failed: {error}");
        }
    }

    Ok(outcome)
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    Model::from_path(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
