//! Walk a driver document and hand each reduction step to a `Reducer`.
//!
//! Order: every calibration set (flat, then wavecal), then every observation
//! set (target and standard extraction, combination, telluric correction).
//! The numerical work lives behind the trait.

use crate::driver::{DriverDocument, ExtractionType, ObservationSet, OptionalParameters};
use crate::record::{Instrument, Motion};
use crate::segment::{FileRange, FileRanges};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Name of a product written by a reducer (e.g. `flat1-4.fits`).
pub type ArtifactId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Target,
    Standard,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Target => "target",
            Role::Standard => "standard",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub set: String,
    pub role: Role,
    pub prefix: String,
    pub frames: Vec<u32>,
    /// The first pair of a run; apertures are defined from it.
    pub seed: bool,
    pub flat_file: String,
    pub wavecal_file: String,
    pub extraction: ExtractionType,
    pub options: OptionalParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    pub set: String,
    pub role: Role,
    pub spectra_prefix: String,
    pub frames: FileRanges,
    pub output: ArtifactId,
    /// Standards are shape-corrected before combining.
    pub correct_spectral_shape: bool,
    pub scale_range: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelluricCorrection {
    pub set: String,
    pub motion: Motion,
    pub target: ArtifactId,
    pub standard: ArtifactId,
    pub standard_name: String,
    pub output: ArtifactId,
}

/// The numerical reduction primitives.
pub trait Reducer {
    fn build_flat(&mut self, prefix: &str, frames: FileRange, output: &str) -> Result<ArtifactId>;

    fn build_wavecal(
        &mut self,
        prefix: &str,
        frames: FileRange,
        flat: &ArtifactId,
        output: &str,
    ) -> Result<ArtifactId>;

    fn extract(&mut self, request: &Extraction) -> Result<()>;

    fn combine(&mut self, request: &Combination) -> Result<ArtifactId>;

    fn telluric_correct(&mut self, request: &TelluricCorrection) -> Result<ArtifactId>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub calibration_sets: usize,
    pub observation_sets: usize,
    /// Sets whose standard is unknown; telluric correction was skipped.
    pub skipped_telluric: Vec<String>,
}

pub fn dispatch<R: Reducer + ?Sized>(doc: &DriverDocument, reducer: &mut R) -> Result<DispatchSummary> {
    let p = &doc.parameters;
    let mut summary = DispatchSummary::default();

    // 1) Lamp calibrations
    for cs in doc.calibration_sets.iter().copied() {
        let output = format!("flat{}.fits", cs);
        let frames = resolve_raw_frames(&p.data_folder, &p.flat_file_prefix, cs, p.instrument)?;
        let flat = reducer.build_flat(&p.flat_file_prefix, frames, &output)?;

        let output = format!("wavecal{}.fits", cs);
        let frames = resolve_raw_frames(&p.data_folder, &p.arc_file_prefix, cs, p.instrument)?;
        reducer.build_wavecal(&p.arc_file_prefix, frames, &flat, &output)?;
        summary.calibration_sets += 1;
    }

    // 2) Science
    for (id, set) in &doc.sets {
        let id = id.to_string();
        info!("{}: {} ({})", id, set.target_name, set.target_type());
        extract_run(reducer, &id, set, Role::Target)?;
        if set.has_standard() {
            extract_run(reducer, &id, set, Role::Standard)?;
        }
        let target = reducer.combine(&combination(doc, &id, set, Role::Target))?;

        if !set.has_standard() {
            warn!(
                "{}: standard is {}; skipping telluric correction",
                id, set.standard_name
            );
            summary.skipped_telluric.push(id);
            summary.observation_sets += 1;
            continue;
        }
        let standard = reducer.combine(&combination(doc, &id, set, Role::Standard))?;

        reducer.telluric_correct(&TelluricCorrection {
            set: id,
            motion: set.motion,
            target,
            standard,
            standard_name: set.standard_name.clone(),
            output: format!("{}{}.fits", p.calibrated_file_prefix, set.target_files),
        })?;
        summary.observation_sets += 1;
    }
    Ok(summary)
}

/// Extract the first pair of a run, then the rest with the same apertures.
fn extract_run<R: Reducer + ?Sized>(reducer: &mut R, id: &str, set: &ObservationSet, role: Role) -> Result<()> {
    let (prefix, ranges) = match role {
        Role::Target => (&set.target_prefix, &set.target_files),
        Role::Standard => (&set.standard_prefix, &set.standard_files),
    };
    let mut frames = ranges.frames();
    let seed: Vec<u32> = frames.by_ref().take(2).collect();
    let rest: Vec<u32> = frames.collect();
    for (part, is_seed) in [(seed, true), (rest, false)] {
        if part.is_empty() {
            continue;
        }
        reducer.extract(&Extraction {
            set: id.to_string(),
            role,
            prefix: prefix.clone(),
            frames: part,
            seed: is_seed,
            flat_file: set.flat_file.clone(),
            wavecal_file: set.wavecal_file.clone(),
            extraction: set.extraction,
            options: set.options.clone(),
        })?;
    }
    Ok(())
}

fn combination(doc: &DriverDocument, id: &str, set: &ObservationSet, role: Role) -> Combination {
    let p = &doc.parameters;
    let frames = match role {
        Role::Target => set.target_files.clone(),
        Role::Standard => set.standard_files.clone(),
    };
    Combination {
        set: id.to_string(),
        role,
        spectra_prefix: p.spectra_file_prefix.clone(),
        output: format!("{}{}.fits", p.combined_file_prefix, frames),
        frames,
        correct_spectral_shape: role == Role::Standard,
        scale_range: set.options.scale_range.clone(),
    }
}

/// Raw file names a frame may have on disk.
pub fn raw_file_candidates(prefix: &str, frame: u32, instrument: Instrument) -> Vec<String> {
    let stem = format!("{}{:0width$}", prefix, frame, width = instrument.frame_digits());
    [".a.fits", ".b.fits", ".fits"]
        .into_iter()
        .flat_map(|ext| [format!("{}{}", stem, ext), format!("{}{}.gz", stem, ext)])
        .collect()
}

/// Narrow `range` to the frames present in `folder`.
pub fn resolve_raw_frames(
    folder: &Path,
    prefix: &str,
    range: FileRange,
    instrument: Instrument,
) -> Result<FileRange> {
    let present: Vec<u32> = range
        .frames()
        .filter(|&n| {
            raw_file_candidates(prefix, n, instrument)
                .iter()
                .any(|name| folder.join(name).is_file())
        })
        .collect();
    let (Some(&first), Some(&last)) = (present.first(), present.last()) else {
        return Err(Error::NotFound(format!(
            "no {} frames {} in {}",
            prefix,
            range,
            folder.display()
        )));
    };
    if present.len() as u32 != range.end - range.start + 1 {
        debug!(
            "{} frames {}: {} of {} present",
            prefix,
            range,
            present.len(),
            range.end - range.start + 1
        );
    }
    Ok(FileRange::new(first, last))
}

/// One step as a `Reducer` would receive it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReductionStep {
    BuildFlat {
        prefix: String,
        frames: FileRange,
        output: ArtifactId,
    },
    BuildWavecal {
        prefix: String,
        frames: FileRange,
        flat: ArtifactId,
        output: ArtifactId,
    },
    Extract(Extraction),
    Combine(Combination),
    TelluricCorrect(TelluricCorrection),
}

impl fmt::Display for ReductionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionStep::BuildFlat { prefix, frames, output } => {
                write!(f, "flat      {}{} -> {}", prefix, frames, output)
            }
            ReductionStep::BuildWavecal { prefix, frames, flat, output } => {
                write!(f, "wavecal   {}{} (flat {}) -> {}", prefix, frames, flat, output)
            }
            ReductionStep::Extract(e) => {
                let frames: Vec<String> = e.frames.iter().map(u32::to_string).collect();
                write!(
                    f,
                    "extract   {} {} {}[{}]{} {}",
                    e.set,
                    e.role,
                    e.prefix,
                    frames.join(","),
                    if e.seed { " seed" } else { "" },
                    e.extraction
                )
            }
            ReductionStep::Combine(c) => write!(
                f,
                "combine   {} {} {}{} -> {}{}",
                c.set,
                c.role,
                c.spectra_prefix,
                c.frames,
                c.output,
                if c.correct_spectral_shape { " (shape corrected)" } else { "" }
            ),
            ReductionStep::TelluricCorrect(t) => write!(
                f,
                "telluric  {} {} {} / {} ({}) -> {}",
                t.set, t.motion, t.target, t.standard, t.standard_name, t.output
            ),
        }
    }
}

/// A `Reducer` that records the plan instead of reducing anything.
#[derive(Debug, Clone, Default)]
pub struct PlanRecorder {
    pub steps: Vec<ReductionStep>,
}

impl PlanRecorder {
    fn push(&mut self, step: ReductionStep) {
        debug!("{}", step);
        self.steps.push(step);
    }
}

impl Reducer for PlanRecorder {
    fn build_flat(&mut self, prefix: &str, frames: FileRange, output: &str) -> Result<ArtifactId> {
        self.push(ReductionStep::BuildFlat {
            prefix: prefix.to_string(),
            frames,
            output: output.to_string(),
        });
        Ok(output.to_string())
    }

    fn build_wavecal(
        &mut self,
        prefix: &str,
        frames: FileRange,
        flat: &ArtifactId,
        output: &str,
    ) -> Result<ArtifactId> {
        self.push(ReductionStep::BuildWavecal {
            prefix: prefix.to_string(),
            frames,
            flat: flat.clone(),
            output: output.to_string(),
        });
        Ok(output.to_string())
    }

    fn extract(&mut self, request: &Extraction) -> Result<()> {
        self.push(ReductionStep::Extract(request.clone()));
        Ok(())
    }

    fn combine(&mut self, request: &Combination) -> Result<ArtifactId> {
        self.push(ReductionStep::Combine(request.clone()));
        Ok(request.output.clone())
    }

    fn telluric_correct(&mut self, request: &TelluricCorrection) -> Result<ArtifactId> {
        self.push(ReductionStep::TelluricCorrect(request.clone()));
        Ok(request.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BatchParameters, ObservationSet, SetId};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn document(data: &Path) -> DriverDocument {
        let mut parameters = BatchParameters::default();
        parameters.data_folder = data.to_path_buf();
        let mut doc = DriverDocument {
            parameters,
            calibration_sets: "1-4".parse().unwrap(),
            ..Default::default()
        };
        doc.push_set(ObservationSet {
            target_name: "1104+1959".into(),
            target_files: "5-10".parse().unwrap(),
            flat_file: "flat1-4.fits".into(),
            wavecal_file: "wavecal1-4.fits".into(),
            standard_name: "HD 1234".into(),
            standard_files: "11-12".parse().unwrap(),
            ..Default::default()
        });
        doc
    }

    fn touch(dir: &Path, names: &[&str]) {
        for n in names {
            fs::write(dir.join(n), b"").unwrap();
        }
    }

    #[test]
    fn steps_follow_reduction_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["flat0001.a.fits", "flat0002.a.fits", "arc0003.fits", "arc0004.fits.gz"],
        );
        let doc = document(dir.path());
        let mut rec = PlanRecorder::default();
        let summary = dispatch(&doc, &mut rec).unwrap();
        assert_eq!(summary.calibration_sets, 1);
        assert_eq!(summary.observation_sets, 1);
        assert!(summary.skipped_telluric.is_empty());

        let kinds: Vec<String> = rec.steps.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            kinds,
            vec![
                "flat      flat1-2 -> flat1-4.fits",
                "wavecal   arc3-4 (flat flat1-4.fits) -> wavecal1-4.fits",
                "extract   OBS_SET0001 target spc[5,6] seed ps",
                "extract   OBS_SET0001 target spc[7,8,9,10] ps",
                "extract   OBS_SET0001 standard spc[11,12] seed ps",
                "combine   OBS_SET0001 target spectra5-10 -> combspec5-10.fits",
                "combine   OBS_SET0001 standard spectra11-12 -> combspec11-12.fits (shape corrected)",
                "telluric  OBS_SET0001 fixed combspec5-10.fits / combspec11-12.fits (HD 1234) -> calspec5-10.fits",
            ]
        );
    }

    #[test]
    fn unknown_standard_skips_telluric() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["flat0001.a.fits", "arc0003.a.fits"]);
        let mut doc = document(dir.path());
        let set = doc.sets.get_mut(&SetId(1)).unwrap();
        set.standard_name = "UNKNOWN".into();
        set.standard_files = FileRanges::unknown();

        let mut rec = PlanRecorder::default();
        let summary = dispatch(&doc, &mut rec).unwrap();
        assert_eq!(summary.skipped_telluric, vec!["OBS_SET0001".to_string()]);
        assert!(rec.steps.iter().all(|s| !matches!(s, ReductionStep::TelluricCorrect(_))));
        assert!(rec.steps.iter().all(|s| match s {
            ReductionStep::Extract(e) => e.role == Role::Target,
            _ => true,
        }));
    }

    #[test]
    fn missing_lamp_frames_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["flat0001.a.fits"]);
        let doc = document(dir.path());
        let err = dispatch(&doc, &mut PlanRecorder::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("arc")), "{}", err);
    }

    #[test]
    fn candidates_are_zero_padded_per_instrument() {
        let names = raw_file_candidates("spc", 7, Instrument::Uspex);
        assert_eq!(names[0], "spc00007.a.fits");
        assert!(names.contains(&"spc00007.fits.gz".to_string()));
        assert_eq!(names.len(), 6);
    }
}
