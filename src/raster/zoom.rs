use std::fmt;

/// A zoom level rounded to two decimals.
///
/// Stored as integer hundredths so it can be hashed and compared exactly.
/// Rounding is half-up: `1.994 -> 1.99`, `1.995 -> 2.00`, `2.006 -> 2.01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoomKey(i64);

impl ZoomKey {
    pub fn from_zoom(zoom: f64) -> Self {
        // Scale and nudge by an epsilon so values like 1.005 that are stored
        // slightly below the half mark still round up.
        let scaled = zoom * 100.0;
        let nudge = 1e-9 * scaled.abs().max(1.0);
        ZoomKey((scaled + nudge + 0.5).floor() as i64)
    }

    /// The zoom in hundredths (`2.00 -> 200`).
    pub fn hundredths(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl From<f64> for ZoomKey {
    fn from(zoom: f64) -> Self {
        ZoomKey::from_zoom(zoom)
    }
}

impl fmt::Display for ZoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}
