//! Prior dispatch policy and constraint evaluator for a coupled electrical/thermal microgrid.
//!
//! The two entry points are [`dispatch::dispatch`], which turns an observation into set points
//! for every unit, and [`evaluate::evaluate`], which scores the resulting physical state. Both
//! read unit limits and thresholds from the same [`model::Model`].
#![warn(missing_docs)]
pub mod action;
pub mod cli;
pub mod dispatch;
pub mod evaluate;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod observation;
pub mod output;
pub mod settings;
pub mod state;
pub mod unit;
pub mod units;

#[cfg(test)]
mod fixture;
