//! Per-unit operating envelope checks on realised outputs.
use crate::id::get_by_str;
use crate::state::UnitOutputs;
use crate::unit::UnitRegistry;
use anyhow::{Context, Result};
use log::warn;

/// Count the box and coupled-region violations of the CHP, DG and EB outputs.
///
/// A CHP can contribute up to three violations: one each for its electrical limits, its heat
/// limits and its coupled operating region.
///
/// # Returns
///
/// The number of violations, or an error if an output refers to an unknown unit.
pub fn unit_violations(units: &UnitRegistry, outputs: &UnitOutputs) -> Result<usize> {
    let mut violations = 0;

    for (id, output) in &outputs.chp {
        let unit = get_by_str(&units.chps, &id.0)
            .with_context(|| format!("Invalid output for CHP {id}"))?;
        if !unit.p.contains(output.p) {
            violations += 1;
            warn!(
                "{id} power violation: P={} MW (limits: [{}, {}])",
                output.p, unit.p.min, unit.p.max
            );
        }
        if !unit.h.contains(output.h) {
            violations += 1;
            warn!(
                "{id} heat violation: H={} MW (limits: [{}, {}])",
                output.h, unit.h.min, unit.h.max
            );
        }
        if !unit.in_coupled_region(output.p, output.h) {
            violations += 1;
            warn!(
                "{id} feasible region violation: P={}, H={}",
                output.p, output.h
            );
        }
    }

    for (id, p) in &outputs.dg {
        let unit = get_by_str(&units.generators, &id.0)
            .with_context(|| format!("Invalid output for DG {id}"))?;
        if !unit.p.contains(*p) {
            violations += 1;
            warn!("{id} violation: P={p} MW (limits: [{}, {}])", unit.p.min, unit.p.max);
        }
    }

    for (id, p) in &outputs.eb {
        let unit = get_by_str(&units.boilers, &id.0)
            .with_context(|| format!("Invalid output for EB {id}"))?;
        if !unit.p.contains(*p) {
            violations += 1;
            warn!("{id} violation: P={p} MW (limits: [{}, {}])", unit.p.min, unit.p.max);
        }
    }

    Ok(violations)
}

/// Count the nodes at which load is both increased and decreased
pub fn dr_violations(outputs: &UnitOutputs) -> usize {
    outputs
        .dr
        .iter()
        .filter(|(id, output)| {
            let bidirectional = output.is_bidirectional();
            if bidirectional {
                warn!("{id}: simultaneous up and down");
            }
            bidirectional
        })
        .count()
}
