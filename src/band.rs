//! Amateur radio band plans per IARU region.
//!
//! Each region has its own table mapping a band name like `"20m"` to an
//! inclusive frequency range in kHz.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An inclusive frequency range in kHz.
pub type BandRange = (f64, f64);

/// Band names in ascending frequency order.
const BAND_NAMES: [&str; 12] = [
    "160m", "80m", "60m", "40m", "30m", "20m", "17m", "15m", "12m", "10m", "6m", "2m",
];

/// Region 1: Europe, Africa, Middle East.
const REGION_1: [BandRange; 12] = [
    (1810.0, 2000.0),
    (3500.0, 3800.0),
    (5351.5, 5366.5),
    (7000.0, 7200.0),
    (10100.0, 10150.0),
    (14000.0, 14350.0),
    (18068.0, 18168.0),
    (21000.0, 21450.0),
    (24890.0, 24990.0),
    (28000.0, 29700.0),
    (50000.0, 52000.0),
    (144000.0, 146000.0),
];

/// Region 2: the Americas.
const REGION_2: [BandRange; 12] = [
    (1800.0, 2000.0),
    (3500.0, 4000.0),
    (5330.5, 5403.5),
    (7000.0, 7300.0),
    (10100.0, 10150.0),
    (14000.0, 14350.0),
    (18068.0, 18168.0),
    (21000.0, 21450.0),
    (24890.0, 24990.0),
    (28000.0, 29700.0),
    (50000.0, 54000.0),
    (144000.0, 148000.0),
];

/// Region 3: Asia-Pacific.
const REGION_3: [BandRange; 12] = [
    (1800.0, 2000.0),
    (3500.0, 3900.0),
    (5351.5, 5366.5),
    (7000.0, 7200.0),
    (10100.0, 10150.0),
    (14000.0, 14350.0),
    (18068.0, 18168.0),
    (21000.0, 21450.0),
    (24890.0, 24990.0),
    (28000.0, 29700.0),
    (50000.0, 54000.0),
    (144000.0, 146000.0),
];

/// Error returned when a region string is not one of `"1"`, `"2"`, `"3"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid IARU region: {0:?} (expected \"1\", \"2\" or \"3\")")]
pub struct InvalidRegion(pub String);

/// An IARU region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Region {
    /// Europe, Africa, Middle East
    One,
    /// The Americas
    #[default]
    Two,
    /// Asia-Pacific
    Three,
}

impl Region {
    /// Resolve a region for a band lookup.
    ///
    /// Unlike [`FromStr`], anything unrecognized falls back to region 2.
    pub fn lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// The region's short name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::One => "1",
            Region::Two => "2",
            Region::Three => "3",
        }
    }

    fn table(&self) -> &'static [BandRange; 12] {
        match self {
            Region::One => &REGION_1,
            Region::Two => &REGION_2,
            Region::Three => &REGION_3,
        }
    }
}

impl FromStr for Region {
    type Err = InvalidRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Region::One),
            "2" => Ok(Region::Two),
            "3" => Ok(Region::Three),
            other => Err(InvalidRegion(other.to_string())),
        }
    }
}

impl TryFrom<String> for Region {
    type Error = InvalidRegion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.as_str().to_string()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All known band names, lowest frequency first.
pub fn bands() -> &'static [&'static str] {
    &BAND_NAMES
}

/// Look up the frequency range of `band` in `region`.
pub fn range_for(band: &str, region: Region) -> Option<BandRange> {
    BAND_NAMES
        .iter()
        .position(|name| *name == band)
        .map(|i| region.table()[i])
}

/// Whether `band` is a known band name in `region`.
pub fn is_valid(band: &str, region: Region) -> bool {
    range_for(band, region).is_some()
}

/// Find the band containing `frequency_khz` in `region`, if any.
pub fn band_for_frequency(frequency_khz: f64, region: Region) -> Option<&'static str> {
    region
        .table()
        .iter()
        .position(|&(min, max)| min <= frequency_khz && frequency_khz <= max)
        .map(|i| BAND_NAMES[i])
}
