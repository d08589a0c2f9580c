use crate::log::LogFormat;
use crate::record::ObservationRecord;
use crate::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Load an observation log written by `write_log` (or edited by hand).
///
/// Rows keep the types and fixed/moving flags written in the table, so a
/// corrected log can drive synthesis without re-reading the raw headers.
pub fn load_log(path: &Path) -> Result<Vec<ObservationRecord>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(format!("log file {}", path.display())),
        _ => Error::Io(e),
    })?;

    let mut records: Vec<ObservationRecord> = match LogFormat::from_path(path)? {
        LogFormat::Delimited(delimiter) => {
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .trim(csv::Trim::All)
                .from_reader(BufReader::new(file));
            let mut out = Vec::new();
            for row in rdr.deserialize() {
                out.push(row.map_err(|e| row_error(path, e))?);
            }
            out
        }
        LogFormat::Json => serde_json::from_reader(BufReader::new(file))?,
        LogFormat::Html => {
            return Err(Error::Config(format!(
                "{} is a rendered report; load the .csv/.tsv/.psv/.json log instead",
                path.display()
            )));
        }
    };

    for (i, r) in records.iter_mut().enumerate() {
        r.index = i;
    }
    Ok(records)
}

fn row_error(path: &Path, e: csv::Error) -> Error {
    match e.position() {
        Some(pos) => Error::parse(
            format!("{}:{}", path.display(), pos.line()),
            "",
            e.to_string(),
        ),
        None => Error::Table(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LOG_COLUMNS;
    use std::fs;

    #[test]
    fn bad_row_reports_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut row = vec!["x"; LOG_COLUMNS.len()];
        row[13] = "not-a-number";
        fs::write(&path, format!("{}\n{}\n", LOG_COLUMNS.join(","), row.join(","))).unwrap();
        match load_log(&path) {
            Err(Error::Parse { location, .. }) => assert!(location.ends_with("log.csv:2"), "{}", location),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn missing_log_is_not_found() {
        assert!(matches!(
            load_log(Path::new("/nonexistent/log.csv")),
            Err(Error::NotFound(_))
        ));
    }
}
