//! The module responsible for writing output data to disk.
use crate::action::Action;
use crate::evaluate::Diagnostics;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for a single dispatched action
pub const ACTION_FILE_NAME: &str = "action.toml";

/// The output file name for the actions of a rollout
pub const ROLLOUT_FILE_NAME: &str = "actions.toml";

/// The output file name for evaluation diagnostics
pub const DIAGNOSTICS_FILE_NAME: &str = "diagnostics.toml";

/// A sequence of actions, one per control step
#[derive(Serialize)]
struct Rollout<'a> {
    steps: &'a [Action],
}

/// A reward and the diagnostics behind it
#[derive(Serialize)]
struct Evaluation<'a> {
    reward: f64,
    diagnostics: &'a Diagnostics,
}

/// Create a new output directory.
///
/// If the directory already exists and isn't empty, it is only replaced if `allow_overwrite` is
/// set.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use the --overwrite option to \
            replace it."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Serialise a value to a TOML file
fn write_toml<T: Serialize>(file_path: &Path, value: &T) -> Result<()> {
    let contents = toml::to_string(value)
        .with_context(|| format!("Could not serialise {}", file_path.display()))?;
    fs::write(file_path, contents)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

/// Write a dispatched action to the output directory
pub fn write_action(output_dir: &Path, action: &Action) -> Result<()> {
    write_toml(&output_dir.join(ACTION_FILE_NAME), action)
}

/// Write the actions of a rollout to the output directory
pub fn write_rollout(output_dir: &Path, steps: &[Action]) -> Result<()> {
    write_toml(&output_dir.join(ROLLOUT_FILE_NAME), &Rollout { steps })
}

/// Write a reward and its diagnostics to the output directory
pub fn write_diagnostics(output_dir: &Path, reward: f64, diagnostics: &Diagnostics) -> Result<()> {
    write_toml(
        &output_dir.join(DIAGNOSTICS_FILE_NAME),
        &Evaluation {
            reward,
            diagnostics,
        },
    )
}
