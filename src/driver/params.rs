//! Global batch parameters and the per-set optional extraction block.
//!
//! Both are fixed-schema structs; values arrive as text (driver lines, CLI
//! overrides, TOML) and are validated on the way in. Keys that are not part of
//! a schema are kept verbatim in `extra`.

use crate::record::Instrument;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Key of the calibration-set list. Derived from the data, never a plain parameter.
pub const CAL_SETS_KEY: &str = "CAL_SETS";

/// Global scalars of a reduction campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchParameters {
    pub instrument: Instrument,
    pub ut_date: String,
    pub program: String,
    pub observer: String,
    pub data_folder: PathBuf,
    pub cals_folder: PathBuf,
    pub proc_folder: PathBuf,
    pub qa_folder: PathBuf,
    pub flat_file_prefix: String,
    pub arc_file_prefix: String,
    pub science_file_prefix: String,
    pub spectra_file_prefix: String,
    pub combined_file_prefix: String,
    pub calibrated_file_prefix: String,
    pub stitched_file_prefix: String,
    pub qa_file: bool,
    pub qa_plot: bool,
    pub plot_type: String,
    /// Any other global key, including optional-block keys used as defaults for every set.
    pub extra: BTreeMap<String, String>,
}

impl Default for BatchParameters {
    fn default() -> Self {
        Self {
            instrument: Instrument::Spex,
            ut_date: String::new(),
            program: String::new(),
            observer: String::new(),
            data_folder: PathBuf::new(),
            cals_folder: PathBuf::new(),
            proc_folder: PathBuf::new(),
            qa_folder: PathBuf::new(),
            flat_file_prefix: "flat".to_string(),
            arc_file_prefix: "arc".to_string(),
            science_file_prefix: "spc".to_string(),
            spectra_file_prefix: "spectra".to_string(),
            combined_file_prefix: "combspec".to_string(),
            calibrated_file_prefix: "calspec".to_string(),
            stitched_file_prefix: "stitched".to_string(),
            qa_file: true,
            qa_plot: false,
            plot_type: ".pdf".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl BatchParameters {
    pub const OBSERVATION_KEYS: [&'static str; 4] = ["INSTRUMENT", "UT_DATE", "PROGRAM", "OBSERVER"];
    pub const FOLDER_KEYS: [&'static str; 4] =
        ["DATA_FOLDER", "CALS_FOLDER", "PROC_FOLDER", "QA_FOLDER"];
    pub const OUTPUT_PREFIX_KEYS: [&'static str; 5] = [
        "SCIENCE_FILE_PREFIX",
        "SPECTRA_FILE_PREFIX",
        "COMBINED_FILE_PREFIX",
        "CALIBRATED_FILE_PREFIX",
        "STITCHED_FILE_PREFIX",
    ];
    pub const LAMP_PREFIX_KEYS: [&'static str; 2] = ["FLAT_FILE_PREFIX", "ARC_FILE_PREFIX"];
    pub const QA_KEYS: [&'static str; 3] = ["QA_FILE", "QA_PLOT", "PLOT_TYPE"];

    /// Apply one textual override. Keys are case-insensitive.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        match key.as_str() {
            "INSTRUMENT" => self.instrument = value.parse()?,
            "UT_DATE" => self.ut_date = value.to_string(),
            "PROGRAM" => self.program = value.to_string(),
            "OBSERVER" => self.observer = value.to_string(),
            "DATA_FOLDER" => self.data_folder = PathBuf::from(value),
            "CALS_FOLDER" => self.cals_folder = PathBuf::from(value),
            "PROC_FOLDER" => self.proc_folder = PathBuf::from(value),
            "QA_FOLDER" => self.qa_folder = PathBuf::from(value),
            "FLAT_FILE_PREFIX" => self.flat_file_prefix = value.to_string(),
            "ARC_FILE_PREFIX" => self.arc_file_prefix = value.to_string(),
            "SCIENCE_FILE_PREFIX" => self.science_file_prefix = value.to_string(),
            "SPECTRA_FILE_PREFIX" => self.spectra_file_prefix = value.to_string(),
            "COMBINED_FILE_PREFIX" => self.combined_file_prefix = value.to_string(),
            "CALIBRATED_FILE_PREFIX" => self.calibrated_file_prefix = value.to_string(),
            "STITCHED_FILE_PREFIX" => self.stitched_file_prefix = value.to_string(),
            "QA_FILE" => self.qa_file = parse_bool(value)?,
            "QA_PLOT" => self.qa_plot = parse_bool(value)?,
            "PLOT_TYPE" => self.plot_type = value.to_string(),
            CAL_SETS_KEY => {
                return Err(format!(
                    "{} is derived from the calibration frames and cannot be set here",
                    CAL_SETS_KEY
                ));
            }
            "" => return Err("empty parameter name".to_string()),
            _ => {
                if OptionalParameters::is_key(&key) {
                    OptionalParameters::default().set(&key, value)?;
                }
                self.extra.insert(key, value.to_string());
            }
        }
        Ok(())
    }

    /// Textual value of a schema key, as written to the driver.
    pub fn get(&self, key: &str) -> Option<String> {
        let v = match key {
            "INSTRUMENT" => self.instrument.to_string(),
            "UT_DATE" => self.ut_date.clone(),
            "PROGRAM" => self.program.clone(),
            "OBSERVER" => self.observer.clone(),
            "DATA_FOLDER" => self.data_folder.display().to_string(),
            "CALS_FOLDER" => self.cals_folder.display().to_string(),
            "PROC_FOLDER" => self.proc_folder.display().to_string(),
            "QA_FOLDER" => self.qa_folder.display().to_string(),
            "FLAT_FILE_PREFIX" => self.flat_file_prefix.clone(),
            "ARC_FILE_PREFIX" => self.arc_file_prefix.clone(),
            "SCIENCE_FILE_PREFIX" => self.science_file_prefix.clone(),
            "SPECTRA_FILE_PREFIX" => self.spectra_file_prefix.clone(),
            "COMBINED_FILE_PREFIX" => self.combined_file_prefix.clone(),
            "CALIBRATED_FILE_PREFIX" => self.calibrated_file_prefix.clone(),
            "STITCHED_FILE_PREFIX" => self.stitched_file_prefix.clone(),
            "QA_FILE" => self.qa_file.to_string(),
            "QA_PLOT" => self.qa_plot.to_string(),
            "PLOT_TYPE" => self.plot_type.clone(),
            other => return self.extra.get(other).cloned(),
        };
        Some(v)
    }
}

/// Textual booleans; the driver writes `true`/`false`.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" | "" => Ok(false),
        other => Err(format!("expected a boolean (true/false), got {:?}", other)),
    }
}

/// Extraction parameters of one observation set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionalParameters {
    pub orders: String,
    pub reduction_mode: String,
    pub n_positions: u32,
    pub aperture_positions: Vec<f64>,
    pub aperture_method: String,
    pub aperture_radius: f64,
    pub psf_radius: f64,
    pub background_radius: f64,
    pub background_width: f64,
    pub scale_range: Vec<f64>,
    /// Free-form per-set `key=value` overrides outside the schema.
    pub extra: BTreeMap<String, String>,
}

impl Default for OptionalParameters {
    fn default() -> Self {
        Self {
            orders: "3-9".to_string(),
            reduction_mode: "A-B".to_string(),
            n_positions: 2,
            aperture_positions: vec![3.7, 11.2],
            aperture_method: "auto".to_string(),
            aperture_radius: 1.5,
            psf_radius: 1.5,
            background_radius: 2.5,
            background_width: 4.0,
            scale_range: vec![1.0, 1.5],
            extra: BTreeMap::new(),
        }
    }
}

impl OptionalParameters {
    pub const KEYS: [&'static str; 10] = [
        "ORDERS",
        "REDUCTION_MODE",
        "NPOSITIONS",
        "APERTURE_POSITIONS",
        "APERTURE_METHOD",
        "APERTURE",
        "PSF_RADIUS",
        "BACKGROUND_RADIUS",
        "BACKGROUND_WIDTH",
        "SCALE_RANGE",
    ];

    pub fn is_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }

    /// Built-in defaults overlaid with any global value sharing a key.
    pub fn with_globals(globals: &BatchParameters) -> Result<Self, String> {
        let mut out = Self::default();
        for key in Self::KEYS {
            if let Some(v) = globals.extra.get(key) {
                out.set(key, v)?;
            }
        }
        Ok(out)
    }

    /// Apply one textual override; unknown keys land in `extra`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        let number = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| format!("{} expects a number, got {:?}", key, v))
        };
        match key.as_str() {
            "ORDERS" => self.orders = value.to_string(),
            "REDUCTION_MODE" => self.reduction_mode = value.to_string(),
            "NPOSITIONS" => {
                self.n_positions = value
                    .parse()
                    .map_err(|_| format!("NPOSITIONS expects an integer, got {:?}", value))?
            }
            "APERTURE_POSITIONS" => self.aperture_positions = parse_list(&key, value)?,
            "APERTURE_METHOD" => self.aperture_method = value.to_string(),
            "APERTURE" => self.aperture_radius = number(value)?,
            "PSF_RADIUS" => self.psf_radius = number(value)?,
            "BACKGROUND_RADIUS" => self.background_radius = number(value)?,
            "BACKGROUND_WIDTH" => self.background_width = number(value)?,
            "SCALE_RANGE" => self.scale_range = parse_list(&key, value)?,
            "" => return Err("empty parameter name".to_string()),
            _ => {
                self.extra.insert(key, value.to_string());
            }
        }
        Ok(())
    }

    /// All values in driver order, schema keys first.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("ORDERS".to_string(), self.orders.clone()),
            ("REDUCTION_MODE".to_string(), self.reduction_mode.clone()),
            ("NPOSITIONS".to_string(), self.n_positions.to_string()),
            (
                "APERTURE_POSITIONS".to_string(),
                join_list(&self.aperture_positions),
            ),
            ("APERTURE_METHOD".to_string(), self.aperture_method.clone()),
            ("APERTURE".to_string(), self.aperture_radius.to_string()),
            ("PSF_RADIUS".to_string(), self.psf_radius.to_string()),
            (
                "BACKGROUND_RADIUS".to_string(),
                self.background_radius.to_string(),
            ),
            (
                "BACKGROUND_WIDTH".to_string(),
                self.background_width.to_string(),
            ),
            ("SCALE_RANGE".to_string(), join_list(&self.scale_range)),
        ];
        out.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Entries whose value differs from `baseline`.
    pub fn diff(&self, baseline: &OptionalParameters) -> Vec<(String, String)> {
        let base: BTreeMap<String, String> = baseline.entries().into_iter().collect();
        self.entries()
            .into_iter()
            .filter(|(k, v)| base.get(k) != Some(v))
            .collect()
    }
}

/// `3.7,11.2`, also accepting `[3.7, 11.2]` and whitespace separators.
fn parse_list(key: &str, value: &str) -> Result<Vec<f64>, String> {
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| format!("{} expects a list of numbers, got {:?}", key, value))
        })
        .collect()
}

fn join_list(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
