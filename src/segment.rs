//! Contiguous runs of frame numbers.
//!
//! Calibration sets, science runs and standard runs are all written as
//! inclusive `start-end` ranges, joined with commas when a run is broken.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Most frames one range may span. Frame numbers are at most five digits.
pub const MAX_RANGE_FRAMES: u32 = 100_000;

/// Inclusive range of frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileRange {
    pub start: u32,
    pub end: u32,
}

impl FileRange {
    /// `0-0`, written when no real frames could be assigned.
    pub const UNKNOWN: FileRange = FileRange { start: 0, end: 0 };

    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, n: u32) -> bool {
        self.start <= n && n <= self.end
    }

    pub fn frames(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for FileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for FileRange {
    type Err = String;

    /// Accepts `start-end` or a single frame number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (a, b) = s.split_once('-').unwrap_or((s, s));
        let start = a
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("bad frame range {:?} (expected start-end)", s))?;
        let end = b
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("bad frame range {:?} (expected start-end)", s))?;
        if end < start {
            return Err(format!("frame range {:?} ends before it starts", s));
        }
        if end - start >= MAX_RANGE_FRAMES {
            return Err(format!(
                "frame range {:?} spans more than {} frames",
                s, MAX_RANGE_FRAMES
            ));
        }
        Ok(FileRange { start, end })
    }
}

/// Ordered list of ranges, written comma-separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FileRanges(pub Vec<FileRange>);

impl FileRanges {
    pub fn unknown() -> Self {
        FileRanges(vec![FileRange::UNKNOWN])
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty() || self.0 == [FileRange::UNKNOWN]
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRange> {
        self.0.iter()
    }

    /// Every frame number, in order.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().flat_map(|r| r.frames())
    }
}

impl fmt::Display for FileRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

impl FromStr for FileRanges {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(FileRanges::default());
        }
        s.split(',')
            .map(str::parse::<FileRange>)
            .collect::<Result<Vec<_>, _>>()
            .map(FileRanges)
    }
}

impl From<FileRanges> for String {
    fn from(r: FileRanges) -> Self {
        r.to_string()
    }
}

impl TryFrom<String> for FileRanges {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Vec<FileRange>> for FileRanges {
    fn from(v: Vec<FileRange>) -> Self {
        FileRanges(v)
    }
}

/// Partition frame numbers into maximal runs of consecutive integers.
///
/// Duplicates collapse; the output is ordered and covers every input number once.
pub fn segment<I>(numbers: I) -> Vec<FileRange>
where
    I: IntoIterator<Item = u32>,
{
    let sorted: BTreeSet<u32> = numbers.into_iter().collect();
    let mut runs: Vec<FileRange> = Vec::new();
    for n in sorted {
        match runs.last_mut() {
            Some(run) if run.end.checked_add(1) == Some(n) => run.end = n,
            _ => runs.push(FileRange::new(n, n)),
        }
    }
    runs
}
