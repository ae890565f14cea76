//! Digital Filters and Peak Finding
//!
//! Numeric building blocks for the signal-processing detector:
//! - Savitzky-Golay polynomial smoothing (edges fitted, not padded)
//! - Centered moving average
//! - Local peak search with prominence and half-prominence width
//! - Low-order harmonic amplitudes via a direct DFT
//! - Normalized autocorrelation at a single lag

use std::f64::consts::PI;

/// Centered moving average, window truncated at the edges
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    let w = window.max(1);
    let n = data.len();
    let mut result = Vec::with_capacity(n);

    for i in 0..n {
        let start = i.saturating_sub(w / 2);
        let end = (i + w / 2 + 1).min(n);
        let avg = data[start..end].iter().sum::<f64>() / (end - start) as f64;
        result.push(avg);
    }

    result
}

/// Solve `m x = b` in place by Gaussian elimination with partial pivoting
fn solve_linear(mut m: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &r| {
            m[a][col]
                .abs()
                .partial_cmp(&m[r][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| m[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / m[row][row];
    }
    Some(x)
}

/// Savitzky-Golay weights for a window of `window` samples.
///
/// The polynomial of degree `order` is fitted to the whole window and
/// evaluated at `offset` samples from the window center (0 = center).
pub fn savgol_coefficients(window: usize, order: usize, offset: f64) -> Option<Vec<f64>> {
    if window == 0 || order >= window {
        return None;
    }
    let half = (window as f64 - 1.0) / 2.0;
    let scale = half.max(1.0);
    let xs: Vec<f64> = (0..window).map(|j| (j as f64 - half) / scale).collect();
    let terms = order + 1;

    let mut normal = vec![vec![0.0; terms]; terms];
    for x in &xs {
        for r in 0..terms {
            for c in 0..terms {
                normal[r][c] += x.powi((r + c) as i32);
            }
        }
    }
    let x0 = offset / scale;
    let rhs: Vec<f64> = (0..terms).map(|k| x0.powi(k as i32)).collect();
    let z = solve_linear(normal, rhs)?;

    Some(
        xs.iter()
            .map(|x| (0..terms).map(|k| x.powi(k as i32) * z[k]).sum())
            .collect(),
    )
}

/// Savitzky-Golay smoothing.
///
/// An even window is reduced to the next odd size and a window longer than
/// the data shrinks to fit. Returns `None` when the fitted window is not
/// larger than the polynomial order.
pub fn savgol_filter(data: &[f64], window: usize, order: usize) -> Option<Vec<f64>> {
    let n = data.len();
    let mut w = window.min(n);
    if w % 2 == 0 {
        w = w.saturating_sub(1);
    }
    if w <= order {
        return None;
    }
    let half = w / 2;

    let center = savgol_coefficients(w, order, 0.0)?;
    let mut out = vec![0.0; n];

    for i in half..(n - half) {
        out[i] = center
            .iter()
            .zip(&data[i - half..=i + half])
            .map(|(c, x)| c * x)
            .sum();
    }

    // Edges: evaluate the polynomial fitted to the first/last full window
    for i in 0..half {
        let head = savgol_coefficients(w, order, i as f64 - half as f64)?;
        out[i] = head.iter().zip(&data[..w]).map(|(c, x)| c * x).sum();

        let tail = savgol_coefficients(w, order, half as f64 - i as f64)?;
        out[n - 1 - i] = tail.iter().zip(&data[n - w..]).map(|(c, x)| c * x).sum();
    }

    Some(out)
}

/// A local maximum with its shape measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub height: f64,
    pub prominence: f64,
    /// Width at half prominence, in samples
    pub width: f64,
}

/// Indices of local maxima; flat tops report their (left-)middle sample
fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    let mut i = 1;
    while i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of a peak above the higher of its two surrounding valleys.
///
/// Returns the prominence and the indices of the left and right bases.
fn prominence(signal: &[f64], peak: usize) -> (f64, usize, usize) {
    let peak_val = signal[peak];

    let mut left_min = peak_val;
    let mut left_base = peak;
    for i in (0..peak).rev() {
        if signal[i] > peak_val {
            break;
        }
        if signal[i] < left_min {
            left_min = signal[i];
            left_base = i;
        }
    }

    let mut right_min = peak_val;
    let mut right_base = peak;
    for i in (peak + 1)..signal.len() {
        if signal[i] > peak_val {
            break;
        }
        if signal[i] < right_min {
            right_min = signal[i];
            right_base = i;
        }
    }

    (peak_val - left_min.max(right_min), left_base, right_base)
}

/// Width of a peak where the signal crosses half its prominence
fn half_prominence_width(
    signal: &[f64],
    peak: usize,
    prom: f64,
    left_base: usize,
    right_base: usize,
) -> f64 {
    let line = signal[peak] - prom / 2.0;

    let mut i = peak;
    while i > left_base && signal[i] > line {
        i -= 1;
    }
    let left = if signal[i] < line && i < peak {
        let (a, b) = (signal[i], signal[i + 1]);
        i as f64 + (line - a) / (b - a)
    } else {
        i as f64
    };

    let mut j = peak;
    while j < right_base && signal[j] > line {
        j += 1;
    }
    let right = if signal[j] < line && j > peak {
        let (a, b) = (signal[j], signal[j - 1]);
        j as f64 - (line - a) / (b - a)
    } else {
        j as f64
    };

    right - left
}

/// Local maxima whose prominence and width reach the given minimums
pub fn find_peaks(signal: &[f64], min_prominence: f64, min_width: f64) -> Vec<Peak> {
    local_maxima(signal)
        .into_iter()
        .filter_map(|index| {
            let (prom, left_base, right_base) = prominence(signal, index);
            if prom < min_prominence {
                return None;
            }
            let width = half_prominence_width(signal, index, prom, left_base, right_base);
            (width >= min_width).then_some(Peak {
                index,
                height: signal[index],
                prominence: prom,
                width,
            })
        })
        .collect()
}

/// Drop peaks closer than `distance` samples to a higher peak.
///
/// Higher peaks are kept first; the survivors come back in index order.
pub fn enforce_distance(peaks: Vec<Peak>, distance: usize) -> Vec<Peak> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks;
    }
    let mut by_height = peaks;
    by_height.sort_by(|a, b| {
        b.height
            .partial_cmp(&a.height)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });

    let mut kept: Vec<Peak> = Vec::with_capacity(by_height.len());
    for peak in by_height {
        if kept.iter().all(|k| k.index.abs_diff(peak.index) >= distance) {
            kept.push(peak);
        }
    }
    kept.sort_by_key(|p| p.index);
    kept
}

/// Amplitudes of harmonics 1..=count of a mean-removed window
///
/// Harmonic k completes k cycles over the window. Harmonics at or above
/// the Nyquist index are reported as 0.
pub fn harmonic_amplitudes(values: &[f64], count: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; count];
    }
    let mean = values.iter().sum::<f64>() / n as f64;

    (1..=count)
        .map(|k| {
            if 2 * k >= n {
                return 0.0;
            }
            let (mut re, mut im) = (0.0, 0.0);
            for (i, &x) in values.iter().enumerate() {
                let angle = -2.0 * PI * (k as f64) * (i as f64) / (n as f64);
                re += (x - mean) * angle.cos();
                im += (x - mean) * angle.sin();
            }
            2.0 * (re * re + im * im).sqrt() / n as f64
        })
        .collect()
}

/// Normalized autocorrelation at `lag`; `None` for constant or too-short data
pub fn autocorrelation(data: &[f64], lag: usize) -> Option<f64> {
    let n = data.len();
    if n <= lag || n < 2 {
        return None;
    }
    let mean = data.iter().sum::<f64>() / n as f64;
    let var = data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if var < 1e-15 {
        return None;
    }
    let sum: f64 = (0..(n - lag))
        .map(|i| (data[i] - mean) * (data[i + lag] - mean))
        .sum();
    Some(sum / (n as f64 * var))
}
