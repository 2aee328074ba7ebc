//! Signal series: the point history and derived values of one
//! measured quantity.
//!
//! The run executor appends points as they are acquired and updates
//! the regressed `value`; the automation engines only read. Statistics
//! that would need more points than are available return `None`
//! ("indeterminate") rather than a made-up number.

use serde::{Deserialize, Serialize};

/// A single acquired point: `x` is the acquisition time (or count),
/// `y` the measured intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// One named measured quantity (e.g. `Ar40` regressed intensity).
///
/// `points` is append-only for the duration of a run; `value` holds
/// the latest regressed intensity, `baseline` the measured baseline
/// for this signal's detector. `deflection` is the detector deflection
/// readback, when the hardware exposes one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSeries {
    pub name: String,
    points: Vec<DataPoint>,
    pub value: f64,
    pub baseline: f64,
    pub deflection: Option<f64>,
}

impl SignalSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the regressed value (builder form, for executor/test setup).
    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline = baseline;
        self
    }

    #[must_use]
    pub fn with_deflection(mut self, deflection: f64) -> Self {
        self.deflection = Some(deflection);
        self
    }

    /// Append an acquired point. Points are never rewritten.
    pub fn push(&mut self, x: f64, y: f64) {
        self.points.push(DataPoint { x, y });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Latest raw point, if any has been acquired.
    pub fn current(&self) -> Option<f64> {
        self.points.last().map(|p| p.y)
    }

    /// Regressed value minus baseline.
    pub fn baseline_corrected(&self) -> f64 {
        self.value - self.baseline
    }

    /// The last `window` points, or all points when no window is
    /// requested. `None` when fewer points than the window exist.
    fn tail(&self, window: Option<usize>) -> Option<&[DataPoint]> {
        match window {
            Some(w) => {
                if w == 0 || self.points.len() < w {
                    None
                } else {
                    Some(&self.points[self.points.len() - w..])
                }
            }
            None => {
                if self.points.is_empty() {
                    None
                } else {
                    Some(&self.points)
                }
            }
        }
    }

    /// Mean intensity over the window.
    pub fn mean(&self, window: Option<usize>) -> Option<f64> {
        let pts = self.tail(window)?;
        Some(pts.iter().map(|p| p.y).sum::<f64>() / pts.len() as f64)
    }

    /// Minimum intensity over the window.
    pub fn min(&self, window: Option<usize>) -> Option<f64> {
        let pts = self.tail(window)?;
        pts.iter().map(|p| p.y).reduce(f64::min)
    }

    /// Maximum intensity over the window.
    pub fn max(&self, window: Option<usize>) -> Option<f64> {
        let pts = self.tail(window)?;
        pts.iter().map(|p| p.y).reduce(f64::max)
    }

    /// Ordinary least-squares slope of intensity against time over the
    /// window. Needs at least two points.
    pub fn slope(&self, window: Option<usize>) -> Option<f64> {
        let pts = self.tail(window)?;
        if pts.len() < 2 {
            return None;
        }
        let n = pts.len() as f64;
        let sx: f64 = pts.iter().map(|p| p.x).sum();
        let sy: f64 = pts.iter().map(|p| p.y).sum();
        let sxx: f64 = pts.iter().map(|p| p.x * p.x).sum();
        let sxy: f64 = pts.iter().map(|p| p.x * p.y).sum();
        let denom = n * sxx - sx * sx;
        if denom == 0.0 {
            return None;
        }
        Some((n * sxy - sx * sy) / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_series(n: usize, slope: f64, intercept: f64) -> SignalSeries {
        let mut s = SignalSeries::new("Ar40");
        for i in 0..n {
            let x = i as f64;
            s.push(x, slope * x + intercept);
        }
        s
    }

    #[test]
    fn test_current_is_latest_point() {
        let mut s = SignalSeries::new("Ar40");
        assert_eq!(s.current(), None);
        s.push(0.0, 1.5);
        s.push(1.0, 2.5);
        assert_eq!(s.current(), Some(2.5));
    }

    #[test]
    fn test_baseline_corrected() {
        let s = SignalSeries::new("Ar40").with_value(10.0).with_baseline(0.25);
        assert!((s.baseline_corrected() - 9.75).abs() < 1e-12);
    }

    #[test]
    fn test_slope_of_linear_data() {
        let s = linear_series(10, 0.5, 3.0);
        let m = s.slope(None).unwrap();
        assert!((m - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_slope_needs_two_points() {
        let s = linear_series(1, 0.5, 3.0);
        assert_eq!(s.slope(None), None);
        let empty = SignalSeries::new("Ar40");
        assert_eq!(empty.slope(None), None);
    }

    #[test]
    fn test_window_larger_than_history_is_indeterminate() {
        let s = linear_series(3, 1.0, 0.0);
        assert_eq!(s.mean(Some(5)), None);
        assert_eq!(s.min(Some(5)), None);
        assert_eq!(s.slope(Some(5)), None);
    }

    #[test]
    fn test_windowed_stats_use_tail() {
        let mut s = SignalSeries::new("Ar39");
        for (x, y) in [(0.0, 100.0), (1.0, 2.0), (2.0, 4.0)] {
            s.push(x, y);
        }
        assert_eq!(s.mean(Some(2)), Some(3.0));
        assert_eq!(s.max(Some(2)), Some(4.0));
        assert_eq!(s.min(None), Some(2.0));
        assert_eq!(s.max(None), Some(100.0));
    }
}
