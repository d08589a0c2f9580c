//! Fixed domain constants and instrument/mode rules.
//!
//! None of these are user-configurable; driver overrides never reach them.

use crate::record::{Instrument, Mode};

/// Above this first-to-last A-beam separation a target is moving.
pub const MOVING_MAX_SEPARATION_ARCSEC: f64 = 15.0;
/// Apparent rate above which a target is moving, once the baseline is long enough.
pub const MOVING_MAX_RATE_ARCSEC_PER_HOUR: f64 = 10.0;
/// Shorter baselines never trigger the rate test.
pub const MOVING_MIN_ELAPSED_HOURS: f64 = 0.1;

/// MJD of 2014-07-01, when SpeX was upgraded to uSpeX.
pub const INSTRUMENT_TRANSITION_MJD: f64 = 56839.0;

pub const ARC_NAME: &str = "arc lamp";
pub const FLAT_NAME: &str = "flat lamp";

/// Leading keyword of a science entry line in the driver.
pub const OBSERVATION_SET_KEYWORD: &str = "OBS_SET";

/// Standard name written when no usable standard run exists.
pub const UNKNOWN_STANDARD: &str = "UNKNOWN";

/// Short exposures in these modes are presumed to be telluric standards.
pub fn standard_integration_ceiling(mode: &Mode) -> Option<f64> {
    match mode {
        Mode::Sxd => Some(30.0),
        Mode::Prism => Some(10.0),
        _ => None,
    }
}

/// Apply the instrument/mode order-list rules.
///
/// Prism data has a single order; legacy SpeX SXD lacks order 9. Applying
/// this twice is the same as applying it once.
pub fn adjust_orders(instrument: Instrument, mode: &Mode, orders: &str) -> String {
    match (instrument, mode) {
        (_, Mode::Prism) => "1".to_string(),
        (Instrument::Spex, Mode::Sxd) if orders.ends_with('9') => {
            format!("{}8", &orders[..orders.len() - 1])
        }
        _ => orders.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_rules() {
        assert_eq!(adjust_orders(Instrument::Uspex, &Mode::Prism, "3-9"), "1");
        assert_eq!(adjust_orders(Instrument::Spex, &Mode::Sxd, "3-9"), "3-8");
        assert_eq!(adjust_orders(Instrument::Uspex, &Mode::Sxd, "3-9"), "3-9");
        assert_eq!(adjust_orders(Instrument::Spex, &Mode::Lxd, "3-9"), "3-9");
    }

    #[test]
    fn order_rules_are_idempotent() {
        let once = adjust_orders(Instrument::Spex, &Mode::Sxd, "3-9");
        assert_eq!(adjust_orders(Instrument::Spex, &Mode::Sxd, &once), once);
    }

    #[test]
    fn ceilings_by_mode() {
        assert_eq!(standard_integration_ceiling(&Mode::Sxd), Some(30.0));
        assert_eq!(standard_integration_ceiling(&Mode::Prism), Some(10.0));
        assert_eq!(standard_integration_ceiling(&Mode::Lxd), None);
    }
}
