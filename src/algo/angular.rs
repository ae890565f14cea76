//! Circular Statistics for Wind Direction
//!
//! Wind direction wraps at 0°/360°, so plain arithmetic means are wrong
//! near north (the mean of 350° and 10° is 0°, not 180°). Every average or
//! difference of directions in this crate goes through these helpers:
//! angles are decomposed into sine/cosine components, the components are
//! averaged, and the direction is reconstructed from the resultant vector.

/// Normalize an angle into [0, 360)
pub fn normalize_angle(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(360.0);
    if a >= 360.0 { 0.0 } else { a }
}

/// Shortest signed arc from `b` to `a`, in (-180, 180].
///
/// Non-finite inputs yield 0.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    if !a.is_finite() || !b.is_finite() {
        return 0.0;
    }
    let d = (normalize_angle(a) - normalize_angle(b) + 180.0).rem_euclid(360.0) - 180.0;
    if d <= -180.0 { 180.0 } else { d }
}

/// Summary of a set of angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularStats {
    /// Mean direction in [0, 360)
    pub mean: f64,
    /// Circular standard deviation in degrees, `sqrt(-2 ln R)`
    pub std: f64,
    /// Mean resultant length R in [0, 1]
    pub resultant: f64,
    pub count: usize,
}

impl CircularStats {
    /// Stats over a slice; `None` when no finite angle is present
    pub fn of(angles: &[f64]) -> Option<Self> {
        Self::weighted(angles.iter().map(|&a| (a, 1.0)))
    }

    /// Stats with per-angle weights (non-positive weights are skipped)
    pub fn weighted<I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (mut s, mut c, mut w_sum) = (0.0, 0.0, 0.0);
        let mut count = 0usize;
        for (angle, weight) in pairs {
            if !angle.is_finite() || !weight.is_finite() || weight <= 0.0 {
                continue;
            }
            let r = angle.to_radians();
            s += weight * r.sin();
            c += weight * r.cos();
            w_sum += weight;
            count += 1;
        }
        if count == 0 || w_sum <= 0.0 {
            return None;
        }

        let (s, c) = (s / w_sum, c / w_sum);
        let resultant = (s * s + c * c).sqrt().min(1.0);
        let mean = normalize_angle(s.atan2(c).to_degrees());
        let std = if resultant >= 1.0 {
            0.0
        } else {
            (-2.0 * resultant.max(1e-12).ln()).sqrt().to_degrees()
        };

        Some(Self {
            mean,
            std,
            resultant,
            count,
        })
    }
}

/// Circular mean in [0, 360), `None` for an empty slice
pub fn circular_mean(angles: &[f64]) -> Option<f64> {
    CircularStats::of(angles).map(|s| s.mean)
}

/// Circular standard deviation in degrees, 0 for fewer than two angles
pub fn circular_std(angles: &[f64]) -> f64 {
    match CircularStats::of(angles) {
        Some(stats) if stats.count > 1 => stats.std,
        _ => 0.0,
    }
}

/// Centered circular moving average, window truncated at the edges
pub fn circular_smooth(angles: &[f64], window: usize) -> Vec<f64> {
    let w = window.max(1);
    let n = angles.len();
    let half = w / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + w - half).min(n);
            circular_mean(&angles[start..end]).unwrap_or(angles[i])
        })
        .collect()
}

/// Remove 360° jumps so consecutive values differ by their shortest arc
pub fn unwrap_angles(angles: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(angles.len());
    let mut iter = angles.iter();
    if let Some(&first) = iter.next() {
        let mut acc = first;
        out.push(acc);
        let mut prev = first;
        for &a in iter {
            acc += angle_diff(a, prev);
            out.push(acc);
            prev = a;
        }
    }
    out
}

/// Least-squares slope of `ys` against `xs`.
///
/// `None` when fewer than two points or the abscissa is constant.
pub fn linear_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx < 1e-12 || !sxy.is_finite() {
        return None;
    }
    Some(sxy / sxx)
}

/// Slope of direction against time (degrees per second) on unwrapped angles
pub fn direction_slope(times: &[f64], directions: &[f64]) -> Option<f64> {
    linear_slope(times, &unwrap_angles(directions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_diff_wraps() {
        assert!((angle_diff(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((angle_diff(350.0, 10.0) + 20.0).abs() < 1e-9);
        assert!((angle_diff(720.0 + 5.0, -5.0) - 10.0).abs() < 1e-9);
        assert_eq!(angle_diff(0.0, 180.0), 180.0);
        assert_eq!(angle_diff(180.0, 0.0), 180.0);
    }

    #[test]
    fn test_angle_diff_non_finite_is_zero() {
        assert_eq!(angle_diff(f64::NAN, 10.0), 0.0);
        assert_eq!(angle_diff(10.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_angle_diff_range_and_antisymmetry() {
        let mut a = 0.0;
        while a < 360.0 {
            let mut b = 0.0;
            while b < 360.0 {
                let d = angle_diff(a, b);
                assert!(d > -180.0 && d <= 180.0, "out of range: {} for {} {}", d, a, b);
                if d.abs() < 180.0 - 1e-9 {
                    assert!(
                        (d + angle_diff(b, a)).abs() < 1e-9,
                        "not antisymmetric for {} {}",
                        a,
                        b
                    );
                }
                b += 7.3;
            }
            a += 11.9;
        }
    }

    #[test]
    fn test_circular_mean_across_north() {
        let mean = circular_mean(&[350.0, 10.0, 355.0, 5.0]).unwrap();
        assert!(angle_diff(mean, 0.0).abs() < 1e-9, "mean was {}", mean);
        assert!(circular_mean(&[]).is_none());
    }

    #[test]
    fn test_circular_std() {
        assert_eq!(circular_std(&[42.0]), 0.0);
        assert!(circular_std(&[90.0, 90.0, 90.0]) < 1e-6);
        // Small spreads behave like the linear standard deviation
        let std = circular_std(&[170.0, 190.0]);
        assert!((std - 10.0).abs() < 0.2, "std was {}", std);
    }

    #[test]
    fn test_weighted_mean_leans_to_heavier_angle() {
        let stats = CircularStats::weighted([(0.0, 3.0), (90.0, 1.0)]).unwrap();
        assert!(stats.mean > 0.0 && stats.mean < 45.0);
        assert!(CircularStats::weighted([(10.0, 0.0)]).is_none());
    }

    #[test]
    fn test_smoothing_keeps_constant_series() {
        let smoothed = circular_smooth(&[359.0; 12], 5);
        assert!(smoothed.iter().all(|s| angle_diff(*s, 359.0).abs() < 1e-9));
    }

    #[test]
    fn test_slope_of_rotating_wind_across_north() {
        let times: Vec<f64> = (0..10).map(|i| i as f64 * 10.0).collect();
        let dirs: Vec<f64> = (0..10).map(|i| normalize_angle(340.0 + i as f64 * 5.0)).collect();
        let slope = direction_slope(&times, &dirs).unwrap();
        assert!((slope - 0.5).abs() < 1e-9, "slope was {}", slope);
        assert!(linear_slope(&[1.0, 1.0], &[0.0, 5.0]).is_none());
    }
}
