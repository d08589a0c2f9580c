//! Per-exposure observation records.
//!
//! Records are built once by the ingestor, get their fixed/moving flag from
//! the classifier, and are read-only input to driver synthesis after that.

pub mod classify;
pub mod ingest;
pub mod kinds;

pub use classify::{TypeResolution, classify_motion};
pub use ingest::{ingest, ingest_with};
pub use kinds::{Beam, Instrument, Mode, Motion, TargetType};

use crate::rules::{ARC_NAME, FLAT_NAME};
use crate::sky::SkyPosition;
use serde::{Deserialize, Serialize};

/// One raw exposure. Serialized field names are the log column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    #[serde(rename = "FILE")]
    pub file_name: String,
    /// Position in the time-ordered collection.
    #[serde(rename = "INDEX")]
    pub index: usize,
    #[serde(rename = "BEAM")]
    pub beam: Beam,
    #[serde(rename = "TARGET_NAME")]
    pub target_name: String,
    #[serde(rename = "TARGET_TYPE")]
    pub target_type: TargetType,
    #[serde(rename = "FIXED-MOVING")]
    pub fixed_or_moving: Motion,
    #[serde(rename = "RA")]
    pub right_ascension: String,
    #[serde(rename = "DEC")]
    pub declination: String,
    #[serde(rename = "HA")]
    pub hour_angle: String,
    #[serde(rename = "PA")]
    pub position_angle: String,
    #[serde(rename = "UT_DATE")]
    pub ut_date: String,
    #[serde(rename = "UT_TIME")]
    pub ut_time: String,
    #[serde(rename = "DATETIME")]
    pub datetime: String,
    #[serde(rename = "MJD")]
    pub mjd: f64,
    #[serde(rename = "AIRMASS")]
    pub airmass: Option<f64>,
    #[serde(rename = "INTEGRATION")]
    pub integration_time: Option<f64>,
    #[serde(rename = "COADDS")]
    pub coadds: Option<u32>,
    #[serde(rename = "INSTRUMENT")]
    pub instrument: Instrument,
    #[serde(rename = "SLIT")]
    pub slit: String,
    #[serde(rename = "MODE")]
    pub mode: Mode,
    #[serde(rename = "PROGRAM")]
    pub program: String,
    #[serde(rename = "OBSERVER")]
    pub observer: String,
    #[serde(rename = "PREFIX")]
    pub prefix: String,
    #[serde(rename = "FILE_NUMBER")]
    pub file_number: u32,
}

impl ObservationRecord {
    /// Flat or arc lamp frame.
    pub fn is_lamp(&self) -> bool {
        self.target_name == ARC_NAME || self.target_name == FLAT_NAME
    }

    pub fn position(&self) -> Option<SkyPosition> {
        SkyPosition::parse(&self.right_ascension, &self.declination)
    }
}

/// Median ignoring missing values; `None` for an empty input.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut v: Vec<f64> = values.into_iter().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 1 {
        Some(v[mid])
    } else {
        Some((v[mid - 1] + v[mid]) / 2.0)
    }
}
