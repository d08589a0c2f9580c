//! Render a driver document as the editable text file.

use crate::Result;
use crate::driver::{BatchParameters, DriverDocument, OptionalParameters, baseline_options};
use crate::driver::params::CAL_SETS_KEY;
use crate::record::Instrument;
use std::fmt;
use std::fs;
use std::path::Path;

/// Driver text with an optional free-form comment under the banner.
pub struct DriverText<'a> {
    pub doc: &'a DriverDocument,
    pub comment: Option<&'a str>,
}

impl DriverDocument {
    pub fn to_text(&self, comment: Option<&str>) -> String {
        DriverText { doc: self, comment }.to_string()
    }
}

pub fn write_driver(path: &Path, doc: &DriverDocument, comment: Option<&str>) -> Result<()> {
    fs::write(path, doc.to_text(comment))?;
    Ok(())
}

impl fmt::Display for DriverText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let doc = self.doc;
        let p = &doc.parameters;

        writeln!(
            f,
            "# Batch reduction driver file for {} observations on {}",
            instrument_label(p),
            p.ut_date
        )?;
        if let Some(comment) = self.comment.filter(|c| !c.trim().is_empty()) {
            for line in comment.lines() {
                writeln!(f, "# {}", line)?;
            }
        }

        section(f, "Observational information")?;
        keys(f, p, &BatchParameters::OBSERVATION_KEYS)?;

        section(f, "Folders and files")?;
        keys(f, p, &BatchParameters::FOLDER_KEYS)?;
        keys(f, p, &BatchParameters::OUTPUT_PREFIX_KEYS)?;

        section(f, "Lamp calibrations")?;
        keys(f, p, &BatchParameters::LAMP_PREFIX_KEYS)?;
        writeln!(f, "{} = {}", CAL_SETS_KEY, doc.calibration_sets)?;

        section(f, "Reduction options")?;
        keys(f, p, &BatchParameters::QA_KEYS)?;
        for (k, v) in &p.extra {
            writeln!(f, "{} = {}", k, v)?;
        }

        section(f, "Science observations")?;
        writeln!(
            f,
            "#\tMode\tTarget Type\tTarget Name\tPrefix\tFiles\tFlat File\tWavecal File\tStd Name\tStd Prefix\tStd Files\tOptions (key=value)"
        )?;
        writeln!(f)?;
        for (id, set) in &doc.sets {
            let baseline = baseline_options(p, p.instrument, &set.mode)
                .unwrap_or_else(|_| OptionalParameters::default());
            write!(f, "{}", id)?;
            for value in set.required_values() {
                write!(f, "\t{}", value)?;
            }
            for (k, v) in set.options.diff(&baseline) {
                write!(f, "\t{}={}", k, v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn instrument_label(p: &BatchParameters) -> &'static str {
    match p.instrument {
        Instrument::Spex => "SpeX",
        Instrument::Uspex => "uSpeX",
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "# {}", title)?;
    writeln!(f)
}

fn keys(f: &mut fmt::Formatter<'_>, p: &BatchParameters, keys: &[&str]) -> fmt::Result {
    for key in keys {
        writeln!(f, "{} = {}", key, p.get(key).unwrap_or_default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ObservationSet, SetId};
    use crate::segment::FileRanges;

    fn doc() -> DriverDocument {
        let mut doc = DriverDocument::default();
        doc.parameters.ut_date = "2003-05-21".into();
        doc.calibration_sets = "1-4".parse().unwrap();
        let mut set = ObservationSet::default();
        set.target_name = "1104+1959".into();
        set.target_files = "5-6".parse().unwrap();
        set.flat_file = "flat1-4.fits".into();
        set.wavecal_file = "wavecal1-4.fits".into();
        set.standard_name = "HD 1234".into();
        set.standard_files = FileRanges::unknown();
        set.options.orders = "3-8".into();
        doc.push_set(set);
        doc
    }

    #[test]
    fn banner_sections_and_set_line() {
        let text = doc().to_text(Some("night one\nclouds after 3h"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "# Batch reduction driver file for SpeX observations on 2003-05-21"
        );
        assert_eq!(lines[1], "# night one");
        assert_eq!(lines[2], "# clouds after 3h");
        assert!(text.contains("\n# Lamp calibrations\n\nFLAT_FILE_PREFIX = flat\nARC_FILE_PREFIX = arc\nCAL_SETS = 1-4\n"));
        assert!(text.contains("QA_FILE = true\n"));
        assert_eq!(
            *lines.last().unwrap(),
            "OBS_SET0001\tSXD\tfixed ps\t1104+1959\tspc\t5-6\tflat1-4.fits\twavecal1-4.fits\tHD 1234\tspc\t0-0"
        );
    }

    #[test]
    fn only_differing_options_become_tokens() {
        let mut d = doc();
        let set = d.sets.get_mut(&SetId(1)).unwrap();
        set.options.set("APERTURE", "2.25").unwrap();
        set.options.set("SMOOTH", "3").unwrap();
        let text = d.to_text(None);
        let last = text.lines().last().unwrap();
        assert!(last.ends_with("\t0-0\tAPERTURE=2.25\tSMOOTH=3"), "{}", last);
    }

    #[test]
    fn global_extras_are_written() {
        let mut d = doc();
        d.parameters.set("APERTURE", "2.0").unwrap();
        let text = d.to_text(None);
        assert!(text.contains("\nAPERTURE = 2.0\n"));
        // The set kept the built-in 1.5, which now differs from the global.
        assert!(text.lines().last().unwrap().ends_with("\tAPERTURE=1.5"));
    }
}
