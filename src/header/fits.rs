//! Primary-HDU header reader for FITS exposures, plain or `.fits.gz`.

use crate::header::{FieldTable, HeaderFields, MetadataSource};
use crate::{Error, Result};
use fitsio::FitsFile;
use fitsio::hdu::FitsHdu;
use std::path::Path;
use tracing::trace;

/// Reads the header keywords of a raw exposure's primary HDU.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsHeaderSource;

impl MetadataSource for FitsHeaderSource {
    fn read_fields(&self, path: &Path, table: &FieldTable) -> Result<HeaderFields> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("exposure {}", path.display())));
        }
        let mut fptr = FitsFile::open(path)?;
        let hdu = fptr.primary_hdu()?;
        let fields = table.resolve_with(|key| read_card(&mut fptr, &hdu, key));
        trace!("{}: {} fields missing", path.display(), fields.missing.len());
        Ok(fields)
    }
}

/// Value of one keyword as text. Quoted values come back unquoted; numeric
/// values keep their header literal. An absent keyword reads as `None`.
fn read_card(fptr: &mut FitsFile, hdu: &FitsHdu, key: &str) -> Option<String> {
    match hdu.read_key::<String>(fptr, key) {
        Ok(value) => Some(value.trim().to_string()),
        Err(_) => hdu.read_key::<f64>(fptr, key).ok().map(|v| v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Field;

    enum Card<'a> {
        Text(&'a str, &'a str),
        Number(&'a str, f64),
    }

    fn write_exposure(path: &Path, cards: &[Card]) {
        let mut fptr = FitsFile::create(path).open().unwrap();
        let hdu = fptr.primary_hdu().unwrap();
        for card in cards {
            match *card {
                Card::Text(key, value) => hdu.write_key(&mut fptr, key, value).unwrap(),
                Card::Number(key, value) => hdu.write_key(&mut fptr, key, value).unwrap(),
            }
        }
    }

    #[test]
    fn reads_text_and_numeric_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spc0001.a.fits");
        write_exposure(
            &path,
            &[
                Card::Text("OBJECT", "1104+1959"),
                Card::Text("OBSERVER", "O'Neil"),
                Card::Text("GRAT", "ShortXD"),
                Card::Number("ITIME", 30.0),
                Card::Number("AIRMASS", 1.125),
            ],
        );

        let fields = FitsHeaderSource
            .read_fields(&path, &FieldTable::default())
            .unwrap();
        assert_eq!(fields.get(Field::TargetName), "1104+1959");
        assert_eq!(fields.get(Field::Observer), "O'Neil");
        assert_eq!(fields.get(Field::Mode), "ShortXD");
        let itime: f64 = fields.get(Field::Integration).parse().unwrap();
        let airmass: f64 = fields.get(Field::Airmass).parse().unwrap();
        assert_eq!(itime, 30.0);
        assert_eq!(airmass, 1.125);
        assert!(fields.missing.contains(&Field::Slit));
    }

    #[test]
    fn falls_back_to_secondary_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spc0002.b.fits");
        write_exposure(
            &path,
            &[Card::Text("TCS_OBJ", "Ceres"), Card::Number("TCS_AM", 1.5)],
        );

        let fields = FitsHeaderSource
            .read_fields(&path, &FieldTable::default())
            .unwrap();
        assert_eq!(fields.get(Field::TargetName), "Ceres");
        assert_eq!(fields.get(Field::Airmass).parse::<f64>().unwrap(), 1.5);
        assert!(!fields.missing.contains(&Field::TargetName));
    }

    #[test]
    fn rejects_non_fits_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.fits");
        std::fs::write(&path, vec![b'x'; 2880]).unwrap();
        let err = FitsHeaderSource
            .read_fields(&path, &FieldTable::default())
            .unwrap_err();
        assert!(matches!(err, Error::Fitsio(_)), "{}", err);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = FitsHeaderSource
            .read_fields(
                Path::new("/nonexistent/spc0001.a.fits"),
                &FieldTable::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
