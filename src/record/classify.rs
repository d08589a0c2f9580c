//! Best-effort classification passes: science vs standard type guessing, and
//! fixed vs moving targets. Neither pass fails; thin evidence leaves the safe
//! default (`target`, `fixed`).

use crate::record::{Beam, Mode, Motion, ObservationRecord, TargetType};
use crate::rules::{
    MOVING_MAX_RATE_ARCSEC_PER_HOUR, MOVING_MAX_SEPARATION_ARCSEC, MOVING_MIN_ELAPSED_HOURS,
    standard_integration_ceiling,
};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Type of one exposure after the first (guessing) phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeGuess {
    /// Taken from the header or the lamp file name.
    Declared(TargetType),
    /// Short exposure in a mode with a standard ceiling.
    PresumedStandard,
    /// Nothing pointed elsewhere.
    PresumedTarget,
}

/// Outcome of validating the guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeResolution {
    /// Guesses kept; `standards` exposures were presumed standards.
    Accepted { standards: usize },
    /// Presuming standards would have left no science targets, so all
    /// `reverted` presumed standards became targets again.
    Reverted { reverted: usize },
}

/// First phase: guess one exposure's type.
pub fn guess_type(declared: Option<TargetType>, mode: &Mode, integration: Option<f64>) -> TypeGuess {
    if let Some(t) = declared {
        return TypeGuess::Declared(t);
    }
    match (standard_integration_ceiling(mode), integration) {
        (Some(ceiling), Some(itime)) if itime <= ceiling => TypeGuess::PresumedStandard,
        _ => TypeGuess::PresumedTarget,
    }
}

/// Second phase: settle every guess to a concrete type.
///
/// The integration-time prior is coarse; if it would eliminate every science
/// target, the presumed standards are reverted.
pub fn resolve_types(guesses: &[TypeGuess]) -> (Vec<TargetType>, TypeResolution) {
    let presumed = guesses
        .iter()
        .filter(|g| **g == TypeGuess::PresumedStandard)
        .count();
    let any_target = guesses.iter().any(|g| {
        matches!(
            g,
            TypeGuess::Declared(TargetType::Target) | TypeGuess::PresumedTarget
        )
    });
    let revert = presumed > 0 && !any_target;

    let types = guesses
        .iter()
        .map(|g| match g {
            TypeGuess::Declared(t) => *t,
            TypeGuess::PresumedStandard if !revert => TargetType::Standard,
            TypeGuess::PresumedStandard | TypeGuess::PresumedTarget => TargetType::Target,
        })
        .collect::<Vec<_>>();

    let resolution = if revert {
        warn!(
            "integration-time heuristic marked every science frame as a standard; reverted {} frames to target",
            presumed
        );
        TypeResolution::Reverted { reverted: presumed }
    } else {
        TypeResolution::Accepted { standards: presumed }
    };

    if !types.contains(&TargetType::Standard) {
        warn!("no standards present; check the driver file carefully");
    }
    (types, resolution)
}

/// Separation and baseline between the first and last A-beam frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    pub separation_arcsec: f64,
    pub elapsed_hours: f64,
}

impl MotionEstimate {
    pub fn motion(&self) -> Motion {
        if self.separation_arcsec > MOVING_MAX_SEPARATION_ARCSEC {
            return Motion::Moving;
        }
        // The rate is only meaningful over a long enough baseline.
        if self.elapsed_hours > MOVING_MIN_ELAPSED_HOURS
            && self.separation_arcsec / self.elapsed_hours > MOVING_MAX_RATE_ARCSEC_PER_HOUR
        {
            return Motion::Moving;
        }
        Motion::Fixed
    }
}

pub fn estimate_motion(
    first: &ObservationRecord,
    last: &ObservationRecord,
) -> Option<MotionEstimate> {
    let a = first.position()?;
    let b = last.position()?;
    Some(MotionEstimate {
        separation_arcsec: a.separation_arcsec(&b),
        elapsed_hours: (last.mjd - first.mjd) * 24.0,
    })
}

/// Set `fixed_or_moving` for every non-lamp target name.
pub fn classify_motion(records: &mut [ObservationRecord]) {
    let names: BTreeSet<String> = records
        .iter()
        .filter(|r| !r.is_lamp())
        .map(|r| r.target_name.clone())
        .collect();
    if names.is_empty() {
        warn!("no science frames identified");
        return;
    }

    for name in names {
        let mut a_beam: Vec<&ObservationRecord> = records
            .iter()
            .filter(|r| r.target_name == name && r.beam == Beam::A)
            .collect();
        if a_beam.len() < 2 {
            continue;
        }
        a_beam.sort_by(|x, y| x.mjd.total_cmp(&y.mjd));

        let motion = match estimate_motion(a_beam[0], a_beam[a_beam.len() - 1]) {
            Some(est) => {
                let motion = est.motion();
                debug!(
                    "{}: dx={:.1} arcsec, dt={:.2} hr = {}",
                    name, est.separation_arcsec, est.elapsed_hours, motion
                );
                motion
            }
            None => {
                warn!("{}: unreadable coordinates, leaving as fixed", name);
                Motion::Fixed
            }
        };

        for r in records.iter_mut().filter(|r| r.target_name == name) {
            r.fixed_or_moving = motion;
        }
    }
}
