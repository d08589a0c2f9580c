//! The batch driver document: global parameters, calibration sets, and one
//! observation set per science target.
//!
//! `synth` builds a document from observation records, `write` renders the
//! tab-separated text form and `parse` reads it back (possibly hand-edited).

pub mod params;
pub mod parse;
pub mod synth;
pub mod write;

pub use params::{BatchParameters, OptionalParameters};
pub use parse::{parse, read_driver};
pub use synth::{SynthesisOptions, resolve_folders, synthesize};
pub use write::write_driver;

use crate::record::{Instrument, Mode, Motion};
use crate::rules::{OBSERVATION_SET_KEYWORD, adjust_orders};
use crate::segment::FileRanges;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Point-source or extended-source extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    #[default]
    Ps,
    Xs,
}

impl fmt::Display for ExtractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtractionType::Ps => "ps",
            ExtractionType::Xs => "xs",
        })
    }
}

impl FromStr for ExtractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ps" => Ok(ExtractionType::Ps),
            "xs" => Ok(ExtractionType::Xs),
            other => Err(format!("unknown extraction type {:?} (expected ps or xs)", other)),
        }
    }
}

/// One unit of science work: a target run, its calibrations, and its standard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSet {
    pub mode: Mode,
    pub motion: Motion,
    pub extraction: ExtractionType,
    pub target_name: String,
    pub target_prefix: String,
    pub target_files: FileRanges,
    pub flat_file: String,
    pub wavecal_file: String,
    pub standard_name: String,
    pub standard_prefix: String,
    pub standard_files: FileRanges,
    pub options: OptionalParameters,
}

impl Default for ObservationSet {
    fn default() -> Self {
        Self {
            mode: Mode::Sxd,
            motion: Motion::Fixed,
            extraction: ExtractionType::Ps,
            target_name: "target".to_string(),
            target_prefix: "spc".to_string(),
            target_files: FileRanges::default(),
            flat_file: "flat.fits".to_string(),
            wavecal_file: "wavecal.fits".to_string(),
            standard_name: "standard".to_string(),
            standard_prefix: "spc".to_string(),
            standard_files: FileRanges::default(),
            options: OptionalParameters::default(),
        }
    }
}

impl ObservationSet {
    /// Positional columns of a set line, in order.
    pub const REQUIRED_KEYS: [&'static str; 10] = [
        "MODE",
        "TARGET_TYPE",
        "TARGET_NAME",
        "TARGET_PREFIX",
        "TARGET_FILES",
        "FLAT_FILE",
        "WAVECAL_FILE",
        "STD_NAME",
        "STD_PREFIX",
        "STD_FILES",
    ];

    /// `fixed ps`, `moving xs`, ...
    pub fn target_type(&self) -> String {
        format!("{} {}", self.motion, self.extraction)
    }

    /// Set a required column or an optional parameter by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();
        match key.as_str() {
            "MODE" => self.mode = Mode::from(value.to_string()),
            "TARGET_TYPE" => {
                let mut words = value.split_whitespace();
                self.motion = words
                    .next()
                    .ok_or_else(|| "TARGET_TYPE is empty (expected e.g. \"fixed ps\")".to_string())?
                    .parse()?;
                self.extraction = match words.next() {
                    Some(w) => w.parse()?,
                    None => ExtractionType::Ps,
                };
            }
            "TARGET_NAME" => self.target_name = value.to_string(),
            "TARGET_PREFIX" => self.target_prefix = value.to_string(),
            "TARGET_FILES" => self.target_files = value.parse()?,
            "FLAT_FILE" => self.flat_file = value.to_string(),
            "WAVECAL_FILE" => self.wavecal_file = value.to_string(),
            "STD_NAME" => self.standard_name = value.to_string(),
            "STD_PREFIX" => self.standard_prefix = value.to_string(),
            "STD_FILES" => self.standard_files = value.parse()?,
            _ => self.options.set(&key, value)?,
        }
        Ok(())
    }

    /// Required column values, in `REQUIRED_KEYS` order.
    pub fn required_values(&self) -> [String; 10] {
        [
            self.mode.to_string(),
            self.target_type(),
            self.target_name.clone(),
            self.target_prefix.clone(),
            self.target_files.to_string(),
            self.flat_file.clone(),
            self.wavecal_file.clone(),
            self.standard_name.clone(),
            self.standard_prefix.clone(),
            self.standard_files.to_string(),
        ]
    }

    pub fn has_standard(&self) -> bool {
        !self.standard_files.is_unknown()
    }
}

/// Optional parameters a set starts from: built-ins, then globals, then the
/// instrument/mode order rules.
pub fn baseline_options(
    params: &BatchParameters,
    instrument: Instrument,
    mode: &Mode,
) -> Result<OptionalParameters, String> {
    let mut options = OptionalParameters::with_globals(params)?;
    options.orders = adjust_orders(instrument, mode, &options.orders);
    Ok(options)
}

/// Ordinal of an observation set. Orders numerically and prints as
/// `OBS_SET0001`; the padding widens past 9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SetId(pub usize);

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", OBSERVATION_SET_KEYWORD, self.0)
    }
}

impl Serialize for SetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DriverDocument {
    pub parameters: BatchParameters,
    pub calibration_sets: FileRanges,
    /// In file order, starting at 1.
    pub sets: BTreeMap<SetId, ObservationSet>,
}

impl DriverDocument {
    pub fn push_set(&mut self, set: ObservationSet) -> SetId {
        let id = SetId(self.sets.len() + 1);
        self.sets.insert(id, set);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn target_type_column() {
        let mut set = ObservationSet::default();
        set.set("TARGET_TYPE", "moving xs").unwrap();
        assert_eq!(set.motion, Motion::Moving);
        assert_eq!(set.extraction, ExtractionType::Xs);
        assert_eq!(set.target_type(), "moving xs");

        set.set("TARGET_TYPE", "fixed").unwrap();
        assert_eq!(set.target_type(), "fixed ps");
        assert!(set.set("TARGET_TYPE", "drifting ps").is_err());
        assert!(set.set("TARGET_TYPE", "").is_err());
    }

    #[test]
    fn set_routes_unknown_keys_to_options() {
        let mut set = ObservationSet::default();
        set.set("STD_FILES", "11-15").unwrap();
        set.set("psf_radius", "2.0").unwrap();
        assert_eq!(set.standard_files.to_string(), "11-15");
        assert_eq!(set.options.psf_radius, 2.0);
    }

    #[test]
    fn set_ids_are_zero_padded() {
        let mut doc = DriverDocument::default();
        assert_eq!(doc.push_set(ObservationSet::default()).to_string(), "OBS_SET0001");
        assert_eq!(doc.push_set(ObservationSet::default()), SetId(2));
        assert_eq!(SetId(10000).to_string(), "OBS_SET10000");
    }

    #[test]
    fn set_ids_sort_numerically_past_four_digits() {
        let mut sets = BTreeMap::new();
        for n in [10000, 2000, 9999, 1] {
            sets.insert(SetId(n), ObservationSet::default());
        }
        let order: Vec<String> = sets.keys().map(SetId::to_string).collect();
        assert_eq!(
            order,
            ["OBS_SET0001", "OBS_SET2000", "OBS_SET9999", "OBS_SET10000"]
        );

        let doc = DriverDocument {
            sets,
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["sets"]["OBS_SET10000"].is_object());
    }

    #[test]
    fn baseline_applies_order_rules() {
        let params = BatchParameters::default();
        let sxd = baseline_options(&params, Instrument::Spex, &Mode::Sxd).unwrap();
        assert_eq!(sxd.orders, "3-8");
        let prism = baseline_options(&params, Instrument::Uspex, &Mode::Prism).unwrap();
        assert_eq!(prism.orders, "1");
        let uspex = baseline_options(&params, Instrument::Uspex, &Mode::Sxd).unwrap();
        assert_eq!(uspex.orders, "3-9");
    }
}
