//! Closed vocabularies used by observation records and driver entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rules::INSTRUMENT_TRANSITION_MJD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Calibration,
    Standard,
    Target,
}

impl TargetType {
    /// Interpret a raw `DATATYPE`-style header value. Unrecognized values stay unresolved.
    pub fn from_header(raw: &str) -> Option<TargetType> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "calibration" | "cal" | "arc" | "flat" => Some(TargetType::Calibration),
            "standard" | "std" | "telluric" => Some(TargetType::Standard),
            "target" | "object" | "science" => Some(TargetType::Target),
            _ => None,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetType::Calibration => "calibration",
            TargetType::Standard => "standard",
            TargetType::Target => "target",
        })
    }
}

/// Nod position of an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Beam {
    A,
    B,
    #[default]
    #[serde(rename = "")]
    Unknown,
}

impl Beam {
    pub fn from_header(raw: &str) -> Beam {
        match raw.trim() {
            "A" | "a" => Beam::A,
            "B" | "b" => Beam::B,
            _ => Beam::Unknown,
        }
    }

    /// `spc0001.a.fits` style nod markers.
    pub fn from_file_name(name: &str) -> Beam {
        if name.contains(".a.") {
            Beam::A
        } else if name.contains(".b.") {
            Beam::B
        } else {
            Beam::Unknown
        }
    }
}

impl fmt::Display for Beam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Beam::A => "A",
            Beam::B => "B",
            Beam::Unknown => "",
        })
    }
}

/// Instrument observing mode. Unrecognized gratings keep their raw name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Mode {
    Sxd,
    Lxd,
    Prism,
    Other(String),
}

impl Mode {
    /// Normalize a raw grating name (`GRAT` header) to a mode.
    pub fn from_grating(raw: &str) -> Mode {
        let upper = raw.to_ascii_uppercase();
        if upper.contains("SHORTXD") {
            Mode::Sxd
        } else if upper.contains("LOWRES") {
            Mode::Prism
        } else if upper.contains("LONGXD") {
            Mode::Lxd
        } else {
            Mode::from(raw.trim().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::Sxd => "SXD",
            Mode::Lxd => "LXD",
            Mode::Prism => "Prism",
            Mode::Other(s) => s,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SXD" => Mode::Sxd,
            "LXD" => Mode::Lxd,
            "Prism" => Mode::Prism,
            _ => Mode::Other(s),
        }
    }
}

impl From<Mode> for String {
    fn from(m: Mode) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Spex,
    Uspex,
}

impl Instrument {
    /// Frames taken after the upgrade epoch come from uSpeX.
    pub fn from_mjd(mjd: f64) -> Instrument {
        if mjd > INSTRUMENT_TRANSITION_MJD {
            Instrument::Uspex
        } else {
            Instrument::Spex
        }
    }

    /// Width of the zero-padded frame number in raw file names.
    pub fn frame_digits(self) -> usize {
        match self {
            Instrument::Spex => 4,
            Instrument::Uspex => 5,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Instrument::Spex => "spex",
            Instrument::Uspex => "uspex",
        })
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spex" => Ok(Instrument::Spex),
            "uspex" => Ok(Instrument::Uspex),
            other => Err(format!("unknown instrument {:?} (expected spex or uspex)", other)),
        }
    }
}

/// Sidereal vs solar-system source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Motion {
    #[default]
    Fixed,
    Moving,
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Motion::Fixed => "fixed",
            Motion::Moving => "moving",
        })
    }
}

impl FromStr for Motion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Motion::Fixed),
            "moving" => Ok(Motion::Moving),
            other => Err(format!("unknown target motion {:?} (expected fixed or moving)", other)),
        }
    }
}
