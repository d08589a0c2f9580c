//! Build a driver document from classified observation records.

use crate::driver::{
    BatchParameters, DriverDocument, ExtractionType, ObservationSet, baseline_options,
};
use crate::matcher::{RunStats, RunTieBreak, StandardMatch, match_standard};
use crate::record::{ObservationRecord, TargetType, median};
use crate::rules::{ARC_NAME, FLAT_NAME, UNKNOWN_STANDARD};
use crate::segment::{FileRange, FileRanges, segment};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    /// Globals to start from (user overrides already applied).
    pub parameters: BatchParameters,
    /// Create missing cals/proc/qa folders instead of failing.
    pub create_folders: bool,
    pub tie_break: RunTieBreak,
}

/// Make `DATA_FOLDER` absolute and fill in the output folders.
///
/// Blank output folders become siblings of the data folder named `cals`,
/// `proc` and `qa`.
pub fn resolve_folders(params: &mut BatchParameters, create: bool) -> Result<()> {
    if params.data_folder.as_os_str().is_empty() {
        return Err(Error::Config(
            "DATA_FOLDER is not set (pass the raw data folder)".to_string(),
        ));
    }
    if !params.data_folder.is_dir() {
        return Err(Error::NotFound(format!(
            "data folder {}",
            params.data_folder.display()
        )));
    }
    params.data_folder = std::path::absolute(&params.data_folder)?;
    let parent = params
        .data_folder
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| params.data_folder.clone());

    for (key, sibling, slot) in [
        ("CALS_FOLDER", "cals", &mut params.cals_folder),
        ("PROC_FOLDER", "proc", &mut params.proc_folder),
        ("QA_FOLDER", "qa", &mut params.qa_folder),
    ] {
        if slot.as_os_str().is_empty() {
            *slot = parent.join(sibling);
        }
        if !slot.is_dir() {
            if !create {
                return Err(Error::Config(format!(
                    "{} {} does not exist (create it or pass --create-folders)",
                    key,
                    slot.display()
                )));
            }
            fs::create_dir_all(&*slot)?;
            info!("created {} {}", key, slot.display());
        }
        *slot = std::path::absolute(&*slot)?;
    }
    Ok(())
}

/// Synthesize a driver document.
pub fn synthesize(records: &[ObservationRecord], options: &SynthesisOptions) -> Result<DriverDocument> {
    let Some(first) = records.first() else {
        return Err(Error::NotFound("observation records (the log is empty)".to_string()));
    };

    // 1) Globals
    let mut params = options.parameters.clone();
    resolve_folders(&mut params, options.create_folders)?;
    params.instrument = first.instrument;
    params.ut_date = first.ut_date.clone();
    params.program = first.program.clone();
    params.observer = first.observer.clone();

    for (name, label, slot) in [
        (FLAT_NAME, "flat", &mut params.flat_file_prefix),
        (ARC_NAME, "arc", &mut params.arc_file_prefix),
    ] {
        match records.iter().find(|r| r.target_name == name) {
            Some(r) => *slot = r.prefix.clone(),
            None => warn!("no {} frames found; keeping prefix {:?}", label, slot),
        }
    }
    match records.iter().find(|r| !r.is_lamp()) {
        Some(r) => params.science_file_prefix = r.prefix.clone(),
        None => warn!("no science frames found"),
    }

    // 2) Calibration sets
    let calibrations: Vec<&ObservationRecord> = records
        .iter()
        .filter(|r| r.target_type == TargetType::Calibration)
        .collect();
    let calibration_sets = FileRanges(segment(calibrations.iter().map(|r| r.file_number)));
    if calibration_sets.is_empty() {
        warn!("no calibration frames found");
    }

    let mut doc = DriverDocument {
        parameters: params,
        calibration_sets,
        sets: Default::default(),
    };

    // 3) One set per science target
    let names: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.target_type == TargetType::Target)
        .map(|r| r.target_name.as_str())
        .collect();
    for name in names {
        let run: Vec<&ObservationRecord> = records
            .iter()
            .filter(|r| r.target_type == TargetType::Target && r.target_name == name)
            .collect();
        let set = build_set(&run, &calibrations, records, &doc, options.tie_break)?;
        let id = doc.push_set(set);
        debug!("{}: {}", id, name);
    }
    if doc.sets.is_empty() {
        warn!("no science targets; the driver has no observation sets");
    }
    Ok(doc)
}

fn build_set(
    run: &[&ObservationRecord],
    calibrations: &[&ObservationRecord],
    records: &[ObservationRecord],
    doc: &DriverDocument,
    tie_break: RunTieBreak,
) -> Result<ObservationSet> {
    let lead = run[0];
    let params = &doc.parameters;
    let numbers: Vec<u32> = run.iter().map(|r| r.file_number).collect();

    // Calibrations of the same mode, nearest start to the median frame number.
    let centre = median(numbers.iter().map(|&n| n as f64)).unwrap_or(0.0);
    let cal = doc
        .calibration_sets
        .iter()
        .filter(|cs| {
            calibrations
                .iter()
                .any(|c| c.mode == lead.mode && cs.contains(c.file_number))
        })
        .min_by(|a, b| {
            (a.start as f64 - centre)
                .abs()
                .total_cmp(&(b.start as f64 - centre).abs())
        })
        .copied();
    let cal = cal.unwrap_or_else(|| {
        warn!(
            "{}: no {} calibration set; writing {}",
            lead.target_name,
            lead.mode,
            FileRange::UNKNOWN
        );
        FileRange::UNKNOWN
    });

    let standards: Vec<&ObservationRecord> = records
        .iter()
        .filter(|r| r.target_type == TargetType::Standard && r.mode == lead.mode)
        .collect();
    let (standard_name, standard_prefix, standard_files) = match RunStats::of(run.iter().copied()) {
        Some(stats) => match match_standard(&standards, &stats, tie_break) {
            StandardMatch::Found { name, prefix, run } => (name, prefix, FileRanges(vec![run])),
            StandardMatch::Unknown(reason) => {
                warn!("{}: {}; standard left unknown", lead.target_name, reason);
                unknown_standard(params)
            }
        },
        None => unknown_standard(params),
    };

    let options = baseline_options(params, params.instrument, &lead.mode)
        .map_err(|msg| Error::Config(format!("global extraction parameters: {}", msg)))?;

    Ok(ObservationSet {
        mode: lead.mode.clone(),
        motion: lead.fixed_or_moving,
        extraction: ExtractionType::Ps,
        target_name: lead.target_name.clone(),
        target_prefix: lead.prefix.clone(),
        target_files: FileRanges(segment(numbers)),
        flat_file: format!("flat{}.fits", cal),
        wavecal_file: format!("wavecal{}.fits", cal),
        standard_name,
        standard_prefix,
        standard_files,
        options,
    })
}

fn unknown_standard(params: &BatchParameters) -> (String, String, FileRanges) {
    (
        UNKNOWN_STANDARD.to_string(),
        params.science_file_prefix.clone(),
        FileRanges::unknown(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{lamp, record};
    use crate::driver::SetId;
    use crate::record::{Mode, Motion};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn workspace() -> (tempfile::TempDir, SynthesisOptions) {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        fs::create_dir(&data).unwrap();
        let mut parameters = BatchParameters::default();
        parameters.data_folder = data;
        let options = SynthesisOptions {
            parameters,
            create_folders: true,
            tie_break: RunTieBreak::default(),
        };
        (root, options)
    }

    fn standard(n: u32, airmass: f64) -> ObservationRecord {
        let mut r = record(&format!("spc{:04}.a.fits", n), "HD 1234", n);
        r.target_type = TargetType::Standard;
        r.airmass = Some(airmass);
        r
    }

    fn science(n: u32) -> ObservationRecord {
        record(&format!("spc{:04}.a.fits", n), "1104+1959", n)
    }

    #[test]
    fn plans_one_set_per_target() {
        let (_root, options) = workspace();
        let records = vec![
            lamp("flat", 1),
            lamp("flat", 2),
            lamp("arc", 3),
            science(5),
            science(6),
            standard(7, 1.1),
            standard(8, 1.1),
        ];
        let doc = synthesize(&records, &options).unwrap();

        assert_eq!(doc.calibration_sets.to_string(), "1-3");
        assert_eq!(doc.parameters.flat_file_prefix, "flat");
        assert_eq!(doc.parameters.arc_file_prefix, "arc");
        assert_eq!(doc.parameters.science_file_prefix, "spc");
        assert!(doc.parameters.cals_folder.ends_with("cals"));
        assert!(doc.parameters.qa_folder.is_dir());

        assert_eq!(doc.sets.len(), 1);
        let set = &doc.sets[&SetId(1)];
        assert_eq!(set.target_name, "1104+1959");
        assert_eq!(set.target_files.to_string(), "5-6");
        assert_eq!(set.flat_file, "flat1-3.fits");
        assert_eq!(set.wavecal_file, "wavecal1-3.fits");
        assert_eq!(set.standard_name, "HD 1234");
        assert_eq!(set.standard_files.to_string(), "7-8");
        assert_eq!(set.target_type(), "fixed ps");
        assert_eq!(set.options.orders, "3-8");
    }

    #[test]
    fn nearest_calibration_set_by_median_frame() {
        let (_root, options) = workspace();
        let mut records = vec![lamp("flat", 1), lamp("arc", 2)];
        records.extend((3..=6).map(science));
        records.extend((10..=13).map(|n| record(&format!("spc{:04}.a.fits", n), "Other", n)));
        records.extend([lamp("flat", 20), lamp("arc", 21)]);
        let mut ceres = record("spc0030.a.fits", "Ceres", 30);
        ceres.fixed_or_moving = Motion::Moving;
        records.push(ceres.clone());
        ceres.file_name = "spc0031.a.fits".into();
        ceres.file_number = 31;
        records.push(ceres);

        let doc = synthesize(&records, &options).unwrap();
        assert_eq!(doc.calibration_sets.to_string(), "1-2,20-21");
        // 1104+1959: median 4.5 is 3.5 from 1 and 15.5 from 20.
        let near = &doc.sets[&SetId(1)];
        assert_eq!(near.target_name, "1104+1959");
        assert_eq!(near.flat_file, "flat1-2.fits");
        // Other: median 11.5 is 8.5 from 20 and 10.5 from 1, so the set taken
        // after the run wins over the one preceding it.
        let other = &doc.sets[&SetId(3)];
        assert_eq!(other.target_name, "Other");
        assert_eq!(other.flat_file, "flat20-21.fits");
        assert_eq!(other.wavecal_file, "wavecal20-21.fits");
        let ceres = &doc.sets[&SetId(2)];
        assert_eq!(ceres.target_name, "Ceres");
        assert_eq!(ceres.flat_file, "flat20-21.fits");
        assert_eq!(ceres.target_type(), "moving ps");
        assert_eq!(ceres.standard_name, UNKNOWN_STANDARD);
        assert_eq!(ceres.standard_files, FileRanges::unknown());
    }

    #[test]
    fn calibrations_must_share_the_mode() {
        let (_root, options) = workspace();
        let mut flat = lamp("flat", 1);
        flat.mode = Mode::Prism;
        let records = vec![flat, science(5), science(6)];
        let doc = synthesize(&records, &options).unwrap();
        assert_eq!(doc.sets[&SetId(1)].flat_file, "flat0-0.fits");
    }

    #[test]
    fn broken_runs_are_comma_joined() {
        let (_root, options) = workspace();
        let records = vec![science(5), science(6), science(9), science(10)];
        let doc = synthesize(&records, &options).unwrap();
        assert_eq!(doc.sets[&SetId(1)].target_files.to_string(), "5-6,9-10");
    }

    #[test]
    fn missing_output_folder_without_create_is_config_error() {
        let (_root, mut options) = workspace();
        options.create_folders = false;
        let err = synthesize(&[science(5)], &options).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{}", err);
    }

    #[test]
    fn missing_data_folder_is_not_found() {
        let mut params = BatchParameters::default();
        params.data_folder = PathBuf::from("/nonexistent/data");
        assert!(matches!(
            resolve_folders(&mut params, true),
            Err(Error::NotFound(_))
        ));
        params.data_folder = PathBuf::new();
        assert!(matches!(
            resolve_folders(&mut params, true),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn globals_seed_every_set() {
        let (_root, mut options) = workspace();
        options.parameters.set("APERTURE", "2.5").unwrap();
        let doc = synthesize(&[science(5), science(6)], &options).unwrap();
        assert_eq!(doc.sets[&SetId(1)].options.aperture_radius, 2.5);
    }
}
