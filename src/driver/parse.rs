//! Read a (possibly hand-edited) driver file back into a document.
//!
//! Grammar, line by line:
//! - blank lines and lines starting with `#` are skipped
//! - `OBS_SET...` lines are tab-separated: the keyword, the 10 required
//!   columns, then any number of `key=value` tokens
//! - every other line is `KEY = VALUE`
//!
//! Scopes layer as built-in defaults, then `base`, then global lines, then a
//! set's positional columns and tokens.

use crate::driver::params::CAL_SETS_KEY;
use crate::driver::{BatchParameters, DriverDocument, ObservationSet, OptionalParameters};
use crate::rules::{OBSERVATION_SET_KEYWORD, adjust_orders};
use crate::segment::FileRanges;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

const REQUIRED_COLUMNS: usize = ObservationSet::REQUIRED_KEYS.len();

pub fn read_driver(path: &Path, base: &BatchParameters) -> Result<DriverDocument> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(format!("driver file {}", path.display())),
        _ => Error::Io(e),
    })?;
    parse_at(&text, base, &path.display().to_string())
}

/// Parse driver text. Errors are located as `<driver>:<line>`.
pub fn parse(text: &str, base: &BatchParameters) -> Result<DriverDocument> {
    parse_at(text, base, "<driver>")
}

pub fn parse_at(text: &str, base: &BatchParameters, source: &str) -> Result<DriverDocument> {
    let mut doc = DriverDocument {
        parameters: base.clone(),
        ..Default::default()
    };
    let mut set_lines: Vec<(usize, &str)> = Vec::new();

    // 1) Globals; set lines wait until every global is known.
    for (i, raw) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let at = || format!("{}:{}", source, lineno);

        if trimmed.starts_with(OBSERVATION_SET_KEYWORD) {
            set_lines.push((lineno, line.trim_start()));
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(Error::parse(
                at(),
                line,
                "expected `KEY = VALUE` or an OBS_SET line",
            ));
        };
        let key = key.trim().to_ascii_uppercase();
        if key == CAL_SETS_KEY {
            doc.calibration_sets = value
                .parse::<FileRanges>()
                .map_err(|msg| Error::parse(at(), line, msg))?;
        } else {
            doc.parameters
                .set(&key, value)
                .map_err(|msg| Error::parse(at(), line, msg))?;
        }
    }

    // 2) Observation sets
    for (lineno, line) in set_lines {
        let at = format!("{}:{}", source, lineno);
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 1 + REQUIRED_COLUMNS {
            return Err(Error::parse(
                at,
                line,
                format!(
                    "observation set has {} tab-separated fields; expected the keyword and {} columns ({})",
                    fields.len(),
                    REQUIRED_COLUMNS,
                    ObservationSet::REQUIRED_KEYS.join(", ")
                ),
            ));
        }

        let params = &doc.parameters;
        let mut set = ObservationSet {
            options: OptionalParameters::with_globals(params)
                .map_err(|msg| Error::parse(&at, line, msg))?,
            ..Default::default()
        };
        for (key, value) in ObservationSet::REQUIRED_KEYS
            .iter()
            .zip(&fields[1..=REQUIRED_COLUMNS])
        {
            set.set(key, value)
                .map_err(|msg| Error::parse(&at, line, format!("{}: {}", key, msg)))?;
        }
        for token in &fields[1 + REQUIRED_COLUMNS..] {
            if token.is_empty() {
                continue;
            }
            let Some((key, value)) = token.split_once('=') else {
                return Err(Error::parse(
                    &at,
                    line,
                    format!("expected key=value after the required columns, got {:?}", token),
                ));
            };
            set.set(key, value)
                .map_err(|msg| Error::parse(&at, line, msg))?;
        }
        set.options.orders = adjust_orders(params.instrument, &set.mode, &set.options.orders);
        doc.push_set(set);
    }
    Ok(doc)
}
