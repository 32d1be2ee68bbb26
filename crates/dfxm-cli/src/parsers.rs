//! Parsers for command-line argument strings.

use dfxm_core::segmentation::Connectivity;
use dfxm_core::MomentKind;

/// Background subtraction method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMethod {
    /// Per-pixel median across frames
    Median,
    /// No background subtraction
    None,
}

/// Parse a background method ("median" or "none").
pub fn parse_background(method: &str) -> Result<BackgroundMethod, String> {
    match method.to_lowercase().as_str() {
        "median" => Ok(BackgroundMethod::Median),
        "none" => Ok(BackgroundMethod::None),
        other => Err(format!(
            "Invalid background method '{}' (expected 'median' or 'none')",
            other
        )),
    }
}

/// Parse a threshold range "BOTTOM,TOP"; either side may be empty to leave
/// that bound open (e.g. ",500" removes only high intensities).
pub fn parse_threshold(threshold: &str) -> Result<(Option<f32>, Option<f32>), String> {
    let parts: Vec<&str> = threshold.split(',').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid threshold '{}' (expected BOTTOM,TOP)",
            threshold
        ));
    }

    let parse_bound = |s: &str| -> Result<Option<f32>, String> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<f32>()
            .map(Some)
            .map_err(|_| format!("Invalid threshold bound '{}'", s))
    };

    let bottom = parse_bound(parts[0])?;
    let top = parse_bound(parts[1])?;
    if let (Some(lo), Some(hi)) = (bottom, top) {
        if lo > hi {
            return Err(format!("Threshold bottom {} exceeds top {}", lo, hi));
        }
    }
    Ok((bottom, top))
}

/// Parse a moment kind key ("com", "fwhm", "skewness", "kurtosis").
pub fn parse_kind(kind: &str) -> Result<MomentKind, String> {
    MomentKind::from_key(&kind.to_lowercase())
}

/// Parse a connectivity given as its neighbor count (6, 18 or 26).
pub fn parse_connectivity(connectivity: usize) -> Result<Connectivity, String> {
    Connectivity::from_neighbors(connectivity)
}
