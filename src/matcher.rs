//! Pick the telluric standard for a science run.
//!
//! The closest standard exposure in airmass plus time wins; its name's frames
//! are segmented and one run is chosen for the driver.

use crate::record::{ObservationRecord, median};
use crate::segment::{FileRange, segment};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Summary of the science run a standard is matched against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    pub median_airmass: Option<f64>,
    pub median_mjd: f64,
}

impl RunStats {
    pub fn of<'a, I>(records: I) -> Option<RunStats>
    where
        I: IntoIterator<Item = &'a ObservationRecord>,
    {
        let records: Vec<&ObservationRecord> = records.into_iter().collect();
        let median_mjd = median(records.iter().map(|r| r.mjd))?;
        Some(RunStats {
            median_airmass: median(records.iter().filter_map(|r| r.airmass)),
            median_mjd,
        })
    }

    /// `|Δairmass| + |ΔMJD|`; a missing airmass on either side contributes 0.
    pub fn distance(&self, candidate: &ObservationRecord) -> f64 {
        let airmass = match (self.median_airmass, candidate.airmass) {
            (Some(m), Some(a)) => (a - m).abs(),
            _ => 0.0,
        };
        airmass + (candidate.mjd - self.median_mjd).abs()
    }
}

/// Which segmented run of the chosen standard goes into the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunTieBreak {
    /// The run holding the closest exposure; the earliest run if none does.
    #[default]
    Containing,
    /// The run whose first frame is numerically nearest the closest exposure.
    NearestStart,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnknownStandard {
    NoCandidates,
    /// The closest standard had fewer than two distinct frames.
    InsufficientFiles { name: String, files: usize },
}

impl fmt::Display for UnknownStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownStandard::NoCandidates => f.write_str("no standard observed in this mode"),
            UnknownStandard::InsufficientFiles { name, files } => write!(
                f,
                "standard {} has {} frame(s); at least 2 are needed",
                name, files
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StandardMatch {
    Found {
        name: String,
        prefix: String,
        run: FileRange,
    },
    Unknown(UnknownStandard),
}

/// Match a science run against standard exposures of the same mode.
///
/// Ties in distance keep the earliest candidate in input order.
pub fn match_standard(
    candidates: &[&ObservationRecord],
    stats: &RunStats,
    tie_break: RunTieBreak,
) -> StandardMatch {
    let mut best: Option<(&ObservationRecord, f64)> = None;
    for &c in candidates {
        let d = stats.distance(c);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((c, d));
        }
    }
    let Some((closest, distance)) = best else {
        return StandardMatch::Unknown(UnknownStandard::NoCandidates);
    };
    debug!(
        "closest standard {} ({}), distance {:.4}",
        closest.target_name, closest.file_name, distance
    );

    let same_name: Vec<&ObservationRecord> = candidates
        .iter()
        .copied()
        .filter(|c| c.target_name == closest.target_name)
        .collect();
    let runs = segment(same_name.iter().map(|c| c.file_number));
    let files: usize = runs.iter().map(|r| (r.end - r.start) as usize + 1).sum();
    if files < 2 {
        return StandardMatch::Unknown(UnknownStandard::InsufficientFiles {
            name: closest.target_name.clone(),
            files,
        });
    }

    let n = closest.file_number;
    let run = match tie_break {
        RunTieBreak::Containing => runs.iter().find(|r| r.contains(n)).or(runs.first()),
        RunTieBreak::NearestStart => runs.iter().min_by_key(|r| r.start.abs_diff(n)),
    };
    let Some(run) = run.copied() else {
        return StandardMatch::Unknown(UnknownStandard::NoCandidates);
    };

    let prefix = if run.contains(n) {
        closest.prefix.clone()
    } else {
        same_name
            .iter()
            .find(|c| run.contains(c.file_number))
            .map_or_else(|| closest.prefix.clone(), |c| c.prefix.clone())
    };

    StandardMatch::Found {
        name: closest.target_name.clone(),
        prefix,
        run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TargetType;
    use crate::record::fixtures::record;
    use pretty_assertions::assert_eq;

    fn standard(name: &str, n: u32, airmass: f64) -> ObservationRecord {
        let mut r = record(&format!("spc{:04}.a.fits", n), name, n);
        r.target_type = TargetType::Standard;
        r.airmass = Some(airmass);
        r.mjd = 52780.0;
        r
    }

    fn stats() -> RunStats {
        RunStats {
            median_airmass: Some(1.10),
            median_mjd: 52780.0,
        }
    }

    #[test]
    fn picks_minimum_distance() {
        let a = standard("HD 1", 10, 1.15);
        let b = standard("HD 2", 20, 1.30);
        let c = standard("HD 3", 30, 1.11);
        let mut c2 = standard("HD 3", 31, 1.12);
        c2.mjd = 52780.001;
        let got = match_standard(&[&a, &b, &c, &c2], &stats(), RunTieBreak::default());
        assert_eq!(
            got,
            StandardMatch::Found {
                name: "HD 3".into(),
                prefix: "spc".into(),
                run: FileRange::new(30, 31)
            }
        );
    }

    #[test]
    fn no_candidates_is_unknown() {
        assert_eq!(
            match_standard(&[], &stats(), RunTieBreak::default()),
            StandardMatch::Unknown(UnknownStandard::NoCandidates)
        );
    }

    #[test]
    fn single_frame_is_insufficient() {
        let a = standard("HD 1", 10, 1.1);
        assert_eq!(
            match_standard(&[&a], &stats(), RunTieBreak::default()),
            StandardMatch::Unknown(UnknownStandard::InsufficientFiles {
                name: "HD 1".into(),
                files: 1
            })
        );
    }

    #[test]
    fn equal_distance_keeps_earliest() {
        let a = standard("HD 1", 10, 1.3);
        let a2 = standard("HD 1", 11, 1.3);
        let b = standard("HD 2", 20, 1.3);
        let b2 = standard("HD 2", 21, 1.3);
        match match_standard(&[&a, &a2, &b, &b2], &stats(), RunTieBreak::default()) {
            StandardMatch::Found { name, .. } => assert_eq!(name, "HD 1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn tie_break_policies_choose_runs() {
        // Runs 10-11 and 18-21; the closest exposure is frame 19.
        let mut recs: Vec<ObservationRecord> = [10, 11, 18, 20, 21]
            .into_iter()
            .map(|n| standard("HD 5", n, 1.5))
            .collect();
        recs.push(standard("HD 5", 19, 1.1));
        let refs: Vec<&ObservationRecord> = recs.iter().collect();

        let run_of = |tb| match match_standard(&refs, &stats(), tb) {
            StandardMatch::Found { run, .. } => run,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(run_of(RunTieBreak::Containing), FileRange::new(18, 21));
        // Start 18 is 1 away from 19; start 10 is 9 away.
        assert_eq!(run_of(RunTieBreak::NearestStart), FileRange::new(18, 21));
    }

    #[test]
    fn nearest_start_can_leave_the_closest_run() {
        // Runs 8-20 and 22-23; frame 20 is closest.
        let mut recs: Vec<ObservationRecord> = (8..=19)
            .chain([22, 23])
            .map(|n| standard("HD 6", n, 1.5))
            .collect();
        recs.push(standard("HD 6", 20, 1.1));
        let refs: Vec<&ObservationRecord> = recs.iter().collect();

        let run_of = |tb| match match_standard(&refs, &stats(), tb) {
            StandardMatch::Found { run, .. } => run,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(run_of(RunTieBreak::Containing), FileRange::new(8, 20));
        assert_eq!(run_of(RunTieBreak::NearestStart), FileRange::new(22, 23));
    }

    #[test]
    fn missing_airmass_contributes_nothing() {
        let mut a = standard("HD 1", 10, 1.1);
        a.airmass = None;
        a.mjd = 52780.5;
        assert!((stats().distance(&a) - 0.5).abs() < 1e-9);
    }
}
