//! The model: the unit registry plus every scalar parameter, loaded once per scenario.
//!
//! Both the dispatcher and the evaluator read their limits from the same [`Model`].
use crate::input::{input_err_msg, read_toml};
use crate::unit::{UnitRegistry, UnitRegistryRaw};
use anyhow::{Context, Result};
use include_dir::{Dir, include_dir};
use log::warn;
use serde::Deserialize;
use std::path::Path;

pub mod parameters;
pub use parameters::ModelParameters;

/// The name of the file holding the model definition
pub const MODEL_FILE_NAME: &str = "model.toml";

/// The directory containing the bundled example models
pub const EXAMPLES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/demos");

/// The name of the bundled IEEE 33-bus / 12-node thermal example
pub const CASE1_EXAMPLE_NAME: &str = "case1";

/// Top-level sections recognised in the model file
const MODEL_SECTIONS: [&str; 11] = [
    "network",
    "renewables",
    "generators",
    "chps",
    "boilers",
    "tcls",
    "grid",
    "demand_response",
    "thresholds",
    "limits",
    "fallback",
];

/// Represents the contents of the entire model file.
///
/// Both members are flattened, so serde can't reject unknown sections. They are reported by
/// [`unknown_sections`] instead.
#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(flatten)]
    units: UnitRegistryRaw,
    #[serde(flatten)]
    parameters: ModelParameters,
}

/// A fully validated model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Every unit in the system
    pub units: UnitRegistry,
    /// Policy settings, thresholds and physical limits
    pub parameters: ModelParameters,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The validated model or an error if the file is missing or invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        let table: toml::Table = read_toml(&file_path)?;
        Self::from_table(table).with_context(|| input_err_msg(&file_path))
    }

    /// Parse a model from the contents of a model file
    pub fn from_toml_str(contents: &str) -> Result<Model> {
        let table: toml::Table = toml::from_str(contents)?;
        Self::from_table(table)
    }

    /// The bundled Case 1 model (IEEE 33-bus electrical network, 12-node thermal network)
    pub fn case1() -> Result<Model> {
        let path: std::path::PathBuf = [CASE1_EXAMPLE_NAME, MODEL_FILE_NAME].iter().collect();
        let contents = EXAMPLES_DIR
            .get_file(&path)
            .and_then(|file| file.contents_utf8())
            .context("Bundled Case 1 model is missing")?;
        Self::from_toml_str(contents).context("Bundled Case 1 model is invalid")
    }

    fn from_table(table: toml::Table) -> Result<Model> {
        for section in unknown_sections(&table) {
            warn!("Unknown section `{section}` in model file will be ignored");
        }

        let model_file: ModelFile = toml::Value::Table(table).try_into()?;
        Self::from_file(model_file)
    }

    fn from_file(model_file: ModelFile) -> Result<Model> {
        let units = UnitRegistry::from_raw(model_file.units)?;
        model_file.parameters.validate()?;

        Ok(Model {
            units,
            parameters: model_file.parameters,
        })
    }
}

/// Names of top-level keys in the model file which don't correspond to any known section
fn unknown_sections(table: &toml::Table) -> Vec<&str> {
    table
        .keys()
        .map(String::as_str)
        .filter(|key| !MODEL_SECTIONS.contains(key))
        .collect()
}
