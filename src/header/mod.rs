//! Metadata source: header cards of raw exposures, resolved through a
//! canonical field table with fallback keywords.

pub mod fits;

pub use fits::FitsHeaderSource;

use crate::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Raw header keyword -> value, as read from one exposure.
pub type HeaderCards = BTreeMap<String, String>;

/// Canonical per-exposure fields the ingestor asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    UtDate,
    UtTime,
    TargetName,
    Ra,
    Dec,
    HourAngle,
    PositionAngle,
    Airmass,
    Integration,
    Coadds,
    Slit,
    Mode,
    Beam,
    Parallactic,
    Program,
    Observer,
    TargetType,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::UtDate => "UT_DATE",
            Field::UtTime => "UT_TIME",
            Field::TargetName => "TARGET_NAME",
            Field::Ra => "RA",
            Field::Dec => "DEC",
            Field::HourAngle => "HA",
            Field::PositionAngle => "PA",
            Field::Airmass => "AIRMASS",
            Field::Integration => "INTEGRATION",
            Field::Coadds => "COADDS",
            Field::Slit => "SLIT",
            Field::Mode => "MODE",
            Field::Beam => "BEAM",
            Field::Parallactic => "PARALLACTIC",
            Field::Program => "PROGRAM",
            Field::Observer => "OBSERVER",
            Field::TargetType => "TARGET_TYPE",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of acceptable raw keywords per canonical field; the first present wins.
#[derive(Debug, Clone)]
pub struct FieldTable(pub Vec<(Field, Vec<String>)>);

impl Default for FieldTable {
    /// Keywords used by SpeX and uSpeX headers over the instrument's lifetime.
    fn default() -> Self {
        let table: &[(Field, &[&str])] = &[
            (Field::UtDate, &["DATE_OBS"]),
            (Field::UtTime, &["TIME_OBS"]),
            (Field::TargetName, &["OBJECT", "TCS_OBJ"]),
            (Field::Ra, &["RA", "TCS_RA"]),
            (Field::Dec, &["DEC", "TCS_DEC"]),
            (Field::HourAngle, &["HA", "TCS_HA"]),
            (Field::PositionAngle, &["POSANGLE"]),
            (Field::Airmass, &["AIRMASS", "TCS_AM"]),
            (Field::Integration, &["ITIME"]),
            (Field::Coadds, &["CO_ADDS"]),
            (Field::Slit, &["SLIT"]),
            (Field::Mode, &["GRAT"]),
            (Field::Beam, &["BEAM"]),
            (Field::Parallactic, &["TCS_PA"]),
            (Field::Program, &["PROG_ID"]),
            (Field::Observer, &["OBSERVER"]),
            (Field::TargetType, &["DATATYPE"]),
        ];
        FieldTable(
            table
                .iter()
                .map(|(f, keys)| (*f, keys.iter().map(|k| k.to_string()).collect()))
                .collect(),
        )
    }
}

impl FieldTable {
    /// Pick each field's value from the first keyword present in `cards`.
    pub fn resolve(&self, cards: &HeaderCards) -> HeaderFields {
        self.resolve_with(|key| cards.get(key).cloned())
    }

    /// Same as [`FieldTable::resolve`], asking `lookup` for one keyword at a time.
    pub fn resolve_with<F>(&self, mut lookup: F) -> HeaderFields
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = HeaderFields::default();
        for (field, keys) in &self.0 {
            match keys.iter().find_map(|k| lookup(k)) {
                Some(v) => {
                    out.values.insert(*field, v);
                }
                None => out.missing.push(*field),
            }
        }
        out
    }

    pub fn keys_for(&self, field: Field) -> &[String] {
        self.0
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, keys)| keys.as_slice())
            .unwrap_or(&[])
    }
}

/// Canonical field values of one exposure. Absent fields read as blank.
#[derive(Debug, Clone, Default)]
pub struct HeaderFields {
    values: BTreeMap<Field, String>,
    /// Fields for which none of the keywords was present.
    pub missing: Vec<Field>,
}

impl HeaderFields {
    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.missing.retain(|f| *f != field);
        self.values.insert(field, value.into());
    }
}

/// Anything that can resolve the canonical fields of an exposure path.
pub trait MetadataSource {
    fn read_fields(&self, path: &Path, table: &FieldTable) -> Result<HeaderFields>;
}
