//! Record ingestion: a folder of raw exposures -> time-ordered records.

use crate::epoch;
use crate::header::{Field, FieldTable, FitsHeaderSource, HeaderFields, MetadataSource};
use crate::record::classify::{self, TypeGuess};
use crate::record::{Beam, Instrument, Mode, Motion, ObservationRecord, TargetType};
use crate::rules::{ARC_NAME, FLAT_NAME};
use crate::{Error, Result};

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static FRAME_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d+)$").expect("frame stem pattern is valid"));

/// Ingest every FITS exposure in `dir` using the default header keywords.
pub fn ingest(dir: &Path) -> Result<Vec<ObservationRecord>> {
    ingest_with(dir, &FitsHeaderSource, &FieldTable::default())
}

/// Ingest with an explicit metadata source and keyword table.
pub fn ingest_with<S: MetadataSource>(
    dir: &Path,
    source: &S,
    table: &FieldTable,
) -> Result<Vec<ObservationRecord>> {
    let files = discover_exposures(dir)?;
    info!("reading {} exposure headers from {}", files.len(), dir.display());

    let mut warned: BTreeSet<Field> = BTreeSet::new();
    let mut drafts = Vec::with_capacity(files.len());
    for path in &files {
        let fields = source.read_fields(path, table)?;
        for field in &fields.missing {
            if warned.insert(*field) {
                warn!(
                    "could not find keywords {:?} for {} in {}",
                    table.keys_for(*field),
                    field,
                    path.display()
                );
            }
        }
        drafts.push(Draft::new(path, fields));
    }

    let guesses: Vec<TypeGuess> = drafts
        .iter()
        .map(|d| classify::guess_type(d.declared_type, &d.mode, d.integration()))
        .collect();
    let (types, resolution) = classify::resolve_types(&guesses);
    debug!("target type resolution: {:?}", resolution);

    let mut records = drafts
        .into_iter()
        .zip(types)
        .map(|(d, t)| d.finish(t))
        .collect::<Result<Vec<_>>>()?;

    records.sort_by(|a, b| {
        a.mjd
            .total_cmp(&b.mjd)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    for (i, r) in records.iter_mut().enumerate() {
        r.index = i;
    }
    check_unique_frames(&records)?;

    classify::classify_motion(&mut records);
    Ok(records)
}

/// `*.fits` files in `dir`, falling back to `*.fits.gz` when there are none.
pub fn discover_exposures(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("data folder {}", dir.display())));
    }

    let mut plain = Vec::new();
    let mut gzipped = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".fits") {
            plain.push(path);
        } else if name.ends_with(".fits.gz") {
            gzipped.push(path);
        }
    }

    let mut files = if plain.is_empty() { gzipped } else { plain };
    if files.is_empty() {
        return Err(Error::NotFound(format!(
            "no .fits or .fits.gz exposures in {}",
            dir.display()
        )));
    }
    files.sort();
    Ok(files)
}

/// Split a raw file name into its prefix and frame number.
///
/// `spc0012.a.fits` -> (`spc`, 12) with 4-digit SpeX numbering; uSpeX uses 5.
/// Stems with fewer digits than the instrument width use all trailing digits.
pub fn split_frame_name(file_name: &str, instrument: Instrument) -> Result<(String, u32)> {
    let mut stem = file_name;
    for suffix in [".gz", ".fits", ".a", ".b"] {
        stem = stem.strip_suffix(suffix).unwrap_or(stem);
    }

    let bad = || {
        Error::parse(
            file_name,
            file_name,
            "cannot derive frame number (expected <prefix><digits>[.a|.b].fits)",
        )
    };
    let caps = FRAME_STEM_RE.captures(stem).ok_or_else(bad)?;
    let (head, digits) = match (caps.get(1), caps.get(2)) {
        (Some(h), Some(d)) => (h.as_str(), d.as_str()),
        _ => return Err(bad()),
    };

    let width = instrument.frame_digits();
    let (prefix, number) = if digits.len() > width {
        let split = digits.len() - width;
        (format!("{}{}", head, &digits[..split]), &digits[split..])
    } else {
        (head.to_string(), digits)
    };
    let number = number.parse::<u32>().map_err(|_| bad())?;
    Ok((prefix, number))
}

fn check_unique_frames(records: &[ObservationRecord]) -> Result<()> {
    let mut seen: BTreeMap<(&str, u32), &str> = BTreeMap::new();
    for r in records {
        if let Some(prev) = seen.insert((r.prefix.as_str(), r.file_number), &r.file_name) {
            return Err(Error::parse(
                &r.file_name,
                &r.file_name,
                format!(
                    "frame {}{} appears twice (also {}); frame numbers must be unique per prefix",
                    r.prefix, r.file_number, prev
                ),
            ));
        }
    }
    Ok(())
}

/// Header fields of one file with lamp and mode normalization applied, before
/// its type is settled.
struct Draft {
    file_name: String,
    fields: HeaderFields,
    mode: Mode,
    declared_type: Option<TargetType>,
}

impl Draft {
    fn new(path: &Path, mut fields: HeaderFields) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mode = Mode::from_grating(fields.get(Field::Mode));
        let mut declared_type = TargetType::from_header(fields.get(Field::TargetType));

        if file_name.contains("arc") {
            fields.set(Field::TargetName, ARC_NAME);
            declared_type = Some(TargetType::Calibration);
        }
        if file_name.contains("flat") {
            fields.set(Field::TargetName, FLAT_NAME);
            declared_type = Some(TargetType::Calibration);
        }

        Draft {
            file_name,
            fields,
            mode,
            declared_type,
        }
    }

    fn integration(&self) -> Option<f64> {
        self.fields.get(Field::Integration).trim().parse().ok()
    }

    fn finish(self, target_type: TargetType) -> Result<ObservationRecord> {
        let f = &self.fields;
        let date = f.get(Field::UtDate);
        let time = f.get(Field::UtTime);
        let (datetime, instant) = epoch::parse_ut(date, time).ok_or_else(|| {
            Error::parse(
                &self.file_name,
                format!("{}T{}", date, time),
                "cannot read UT date/time (expected YYYY-MM-DD and HH:MM:SS[.ffffff])",
            )
        })?;
        let mjd = epoch::mjd(&instant);
        let instrument = Instrument::from_mjd(mjd);
        let (prefix, file_number) = split_frame_name(&self.file_name, instrument)?;

        let beam = match Beam::from_header(f.get(Field::Beam)) {
            Beam::Unknown => Beam::from_file_name(&self.file_name),
            b => b,
        };
        let coadds = f.get(Field::Coadds).trim();
        let coadds = coadds
            .parse::<u32>()
            .ok()
            .or_else(|| coadds.parse::<f64>().ok().map(|c| c.round() as u32));

        Ok(ObservationRecord {
            index: 0,
            beam,
            target_name: f.get(Field::TargetName).trim().to_string(),
            target_type,
            fixed_or_moving: Motion::Fixed,
            right_ascension: f.get(Field::Ra).trim().to_string(),
            declination: f.get(Field::Dec).trim().to_string(),
            hour_angle: f.get(Field::HourAngle).trim().to_string(),
            position_angle: f.get(Field::PositionAngle).trim().to_string(),
            ut_date: date.trim().to_string(),
            ut_time: time.trim().to_string(),
            datetime,
            mjd,
            airmass: f.get(Field::Airmass).trim().parse().ok(),
            integration_time: self.integration(),
            coadds,
            instrument,
            slit: f.get(Field::Slit).trim().to_string(),
            mode: self.mode.clone(),
            program: f.get(Field::Program).trim().to_string(),
            observer: f.get(Field::Observer).trim().to_string(),
            prefix,
            file_number,
            file_name: self.file_name,
        })
    }
}
