//! Batch-reduction planning for SpeX and uSpeX spectra.
//!
//! A night's raw exposures are ingested into observation records, classified
//! (science vs standard, fixed vs moving), grouped into contiguous frame runs,
//! matched with a telluric standard, and written out as an editable driver
//! file. A driver file can be read back and dispatched step by step to a
//! reduction backend.

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod epoch;
pub mod error;
pub mod header;
pub mod log;
pub mod matcher;
pub mod record;
pub mod render;
pub mod rules;
pub mod segment;
pub mod sky;

pub use error::{Error, Result};
