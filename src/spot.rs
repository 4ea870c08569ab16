//! Data structures representing DX cluster spots.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::band::{self, Region};

/// A single spot reported through a DX cluster.
///
/// A raw spot like:
/// ```text
/// DX de W1AW:     14074.0  K1ABC     FT8 signal                    1234Z
/// ```
///
/// Would be parsed into a `DxSpot` with:
/// - `spotter`: "W1AW"
/// - `frequency`: 14074.0
/// - `callsign`: "K1ABC"
/// - `comment`: "FT8 signal"
/// - `time`: "1234Z"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DxSpot {
    /// The callsign of the station that was heard, as received.
    pub callsign: String,

    /// Frequency in kHz. Always positive.
    pub frequency: f64,

    /// The callsign of the station reporting the spot.
    pub spotter: String,

    /// UTC time of the spot as `HHMMZ`. The protocol carries no date.
    pub time: String,

    /// Free text, usually mode and signal report. May be empty.
    #[serde(default)]
    pub comment: String,
}

impl DxSpot {
    /// Returns the band this spot falls in under the given region's band plan.
    pub fn band(&self, region: Region) -> Option<&'static str> {
        band::band_for_frequency(self.frequency, region)
    }
}

impl fmt::Display for DxSpot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} kHz spotted by {} at {}",
            self.callsign, self.frequency, self.spotter, self.time
        )?;
        if !self.comment.is_empty() {
            write!(f, " - {}", self.comment)?;
        }
        Ok(())
    }
}
