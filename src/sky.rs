//! Sky positions from sexagesimal header strings, and their separations.

use regex::Regex;
use std::sync::LazyLock;

static SEXAGESIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?)\s*(\d+(?:\.\d*)?)(?:[:\s]+(\d+(?:\.\d*)?))?(?:[:\s]+(\d+(?:\.\d*)?))?\s*$")
        .expect("sexagesimal pattern is valid")
});

/// Equatorial position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    /// Parse an RA in hours (`11:04:01.12`) and a Dec in degrees (`+19:59:12.3`).
    pub fn parse(ra: &str, dec: &str) -> Option<SkyPosition> {
        Some(SkyPosition {
            ra_deg: parse_sexagesimal(ra)? * 15.0,
            dec_deg: parse_sexagesimal(dec)?,
        })
    }

    /// Great-circle separation in arcseconds (haversine form).
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        let (ra1, dec1) = (self.ra_deg.to_radians(), self.dec_deg.to_radians());
        let (ra2, dec2) = (other.ra_deg.to_radians(), other.dec_deg.to_radians());
        let sin_ddec = ((dec2 - dec1) / 2.0).sin();
        let sin_dra = ((ra2 - ra1) / 2.0).sin();
        let h = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
        2.0 * h.sqrt().min(1.0).asin().to_degrees() * 3600.0
    }
}

/// `[+-]D[:M[:S]]` with `:` or whitespace separators; the sign applies to the whole value.
pub fn parse_sexagesimal(s: &str) -> Option<f64> {
    let caps = SEXAGESIMAL_RE.captures(s)?;
    let field = |i: usize| -> Option<f64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<f64>().ok(),
            None => Some(0.0),
        }
    };
    let value = field(2)? + field(3)? / 60.0 + field(4)? / 3600.0;
    if caps.get(1).map(|m| m.as_str()) == Some("-") {
        Some(-value)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn parses_hours_and_degrees() {
        let p = SkyPosition::parse("11:04:01.12", "+19:59:12.0").unwrap();
        assert!(close(p.ra_deg, 166.004_666_7, 1e-6));
        assert!(close(p.dec_deg, 19.986_666_7, 1e-6));
    }

    #[test]
    fn negative_zero_degrees_keeps_sign() {
        assert!(close(parse_sexagesimal("-00:30:00").unwrap(), -0.5, 1e-12));
        assert!(close(parse_sexagesimal("-12 30 00").unwrap(), -12.5, 1e-12));
    }

    #[test]
    fn decimal_values_accepted() {
        assert!(close(parse_sexagesimal("12.5").unwrap(), 12.5, 1e-12));
        assert!(parse_sexagesimal("").is_none());
        assert!(parse_sexagesimal("north").is_none());
    }

    #[test]
    fn separation_along_declination() {
        let a = SkyPosition::parse("10:00:00", "+20:00:00").unwrap();
        let b = SkyPosition::parse("10:00:00", "+20:00:20").unwrap();
        assert!(close(a.separation_arcsec(&b), 20.0, 1e-6));
    }

    #[test]
    fn separation_along_ra_scales_with_cos_dec() {
        // One second of time is 15 arcsec on the equator.
        let a = SkyPosition::parse("10:00:00", "+00:00:00").unwrap();
        let b = SkyPosition::parse("10:00:01", "+00:00:00").unwrap();
        assert!(close(a.separation_arcsec(&b), 15.0, 1e-6));
    }
}
