//! Helpers for front-ends that expose spot queries to users.
//!
//! The store itself does no argument checking; these functions hold the
//! limits and validation that a tool or HTTP layer applies before querying.

use crate::band::{self, Region};
use crate::spot::DxSpot;

/// Number of spots returned when the caller does not ask for a count.
pub const DEFAULT_SPOTS_COUNT: usize = 10;

/// Upper bound on spots returned by a single query.
pub const MAX_SPOTS_PER_QUERY: usize = 100;

/// Number of spots in the "recent spots" export.
pub const RECENT_RESOURCE_COUNT: usize = 20;

/// Apply the default and the per-query cap to a requested count.
pub fn clamp_count(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_SPOTS_COUNT)
        .min(MAX_SPOTS_PER_QUERY)
}

/// Whether `min..=max` is a usable frequency range (`0 < min < max`).
pub fn validate_frequency_range(min: f64, max: f64) -> bool {
    0.0 < min && min < max
}

/// Whether `band` names a known band (band names are shared by all regions).
pub fn validate_band(band: &str) -> bool {
    band::is_valid(band, Region::default())
}

/// Format spots as a bulleted list under an optional title.
pub fn format_spot_list(spots: &[DxSpot], title: &str) -> String {
    if spots.is_empty() {
        return "No spots found.".to_string();
    }

    let mut lines = Vec::with_capacity(spots.len() + 2);
    if !title.is_empty() {
        lines.push(title.to_string());
        lines.push(String::new());
    }
    lines.extend(spots.iter().map(|spot| format!("• {}", spot)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_spot(callsign: &str) -> DxSpot {
        DxSpot {
            callsign: callsign.to_string(),
            frequency: 14025.0,
            spotter: "W1AW".to_string(),
            time: "0000Z".to_string(),
            comment: "CW".to_string(),
        }
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(None), DEFAULT_SPOTS_COUNT);
        assert_eq!(clamp_count(Some(5)), 5);
        assert_eq!(clamp_count(Some(0)), 0);
        assert_eq!(clamp_count(Some(1000)), MAX_SPOTS_PER_QUERY);
    }

    #[test]
    fn test_validate_frequency_range() {
        assert!(validate_frequency_range(14000.0, 14350.0));
        assert!(!validate_frequency_range(14350.0, 14000.0));
        assert!(!validate_frequency_range(14000.0, 14000.0));
        assert!(!validate_frequency_range(0.0, 100.0));
        assert!(!validate_frequency_range(-5.0, 100.0));
    }

    #[test]
    fn test_validate_band() {
        assert!(validate_band("20m"));
        assert!(validate_band("160m"));
        assert!(!validate_band("11m"));
    }

    #[test]
    fn test_format_spot_list() {
        assert_eq!(format_spot_list(&[], "Title"), "No spots found.");

        let text = format_spot_list(&[make_spot("K1ABC"), make_spot("K2DEF")], "Found 2 spots:");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Found 2 spots:");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "• K1ABC on 14025 kHz spotted by W1AW at 0000Z - CW");
        assert_eq!(lines.len(), 4);

        let untitled = format_spot_list(&[make_spot("K1ABC")], "");
        assert!(untitled.starts_with("• K1ABC"));
    }
}
