//! 1D and 2D histograms with Gaussian smoothing and local-maximum
//! extraction, used to seed horizontal-plane and wall segmentation.

use anyhow::{ensure, Result};
use opencv::core::{Mat, Scalar, Size, BORDER_DEFAULT, CV_32F};
use opencv::imgproc;
use opencv::prelude::*;
use tracing::trace;

/// A local maximum of a 1D histogram.
///
/// Peaks are selected by `support`: the strongest peak is the one with the
/// largest vote count, not the one with the largest bin value.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakInfo {
    /// Bin index of the maximum.
    pub pos: usize,
    /// Center value of the bin (the quantity being histogrammed).
    pub value: f64,
    /// Raw vote count of the bin.
    pub support: f64,
}

/// A local maximum of a 2D (theta, distance) histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakInfo2D {
    /// Bin position as (theta bin, distance bin).
    pub pos: (usize, usize),
    /// Center of the theta bin.
    pub x_value: f64,
    /// Center of the distance bin.
    pub y_value: f64,
    /// Raw vote count of the bin.
    pub support: f64,
}

/// 1D histogram over a fixed [min, max) range.
#[derive(Debug)]
pub struct Histogram1D {
    bins: usize,
    range: (f64, f64),
    /// bins x 1 CV_32F vote counts.
    counts: Mat,
}

impl Histogram1D {
    pub fn new(bins: usize, range: (f64, f64)) -> Result<Self> {
        ensure!(bins > 0, "histogram needs at least one bin");
        ensure!(
            range.0 < range.1,
            "inconsistent histogram range [{}, {})",
            range.0,
            range.1
        );
        let counts = Mat::new_rows_cols_with_default(bins as i32, 1, CV_32F, Scalar::all(0.0))?;
        Ok(Self {
            bins,
            range,
            counts,
        })
    }

    /// Rebuilds the vote counts from a batch of samples, replacing prior
    /// state. Samples outside [min, max) are dropped.
    pub fn calculate(&mut self, samples: &[f64]) -> Result<()> {
        self.counts =
            Mat::new_rows_cols_with_default(self.bins as i32, 1, CV_32F, Scalar::all(0.0))?;
        let (min, max) = self.range;
        let width = (max - min) / self.bins as f64;
        for &sample in samples {
            if !(sample >= min && sample < max) {
                continue;
            }
            let bin = (((sample - min) / width) as usize).min(self.bins - 1);
            *self.counts.at_2d_mut::<f32>(bin as i32, 0)? += 1.0;
        }
        Ok(())
    }

    /// Center value of bin `bin`.
    pub fn bin_center(&self, bin: usize) -> f64 {
        let (min, max) = self.range;
        min + (bin as f64 + 0.5) * (max - min) / self.bins as f64
    }

    /// Finds local maxima of the Gaussian-smoothed histogram.
    ///
    /// A bin is a local maximum when its smoothed value dominates a sliding
    /// window of `window_size` bins. Of those, only peaks with smoothed
    /// height >= `peak_fraction` times the strongest peak and raw support
    /// >= `min_support` are kept. Peaks are returned in bin order.
    pub fn local_maxima_1d(
        &self,
        gaussian_kernel_size: i32,
        window_size: usize,
        peak_fraction: f64,
        min_support: f64,
    ) -> Result<Vec<PeakInfo>> {
        ensure!(
            gaussian_kernel_size >= 1 && gaussian_kernel_size % 2 == 1,
            "gaussian kernel size must be odd and >= 1, got {gaussian_kernel_size}"
        );

        let mut smoothed = Mat::default();
        imgproc::gaussian_blur(
            &self.counts,
            &mut smoothed,
            Size::new(1, gaussian_kernel_size),
            0.0,
            0.0,
            BORDER_DEFAULT,
        )?;

        let mut values = Vec::with_capacity(self.bins);
        for i in 0..self.bins {
            values.push(f64::from(*smoothed.at_2d::<f32>(i as i32, 0)?));
        }

        // Candidate maxima over the sliding window (ties admitted, so a
        // flat plateau yields one candidate per bin).
        let half = window_size / 2;
        let mut candidates = Vec::new();
        for (i, &v) in values.iter().enumerate() {
            if v <= 0.0 {
                continue;
            }
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(self.bins - 1);
            if values[lo..=hi].iter().all(|&w| w <= v) {
                candidates.push((i, v));
            }
        }

        let max_peak_value = candidates.iter().map(|&(_, v)| v).fold(0.0, f64::max);
        let threshold = peak_fraction * max_peak_value;

        let mut peaks = Vec::new();
        for (bin, smoothed_value) in candidates {
            let support = f64::from(*self.counts.at_2d::<f32>(bin as i32, 0)?);
            if smoothed_value >= threshold && support >= min_support {
                peaks.push(PeakInfo {
                    pos: bin,
                    value: self.bin_center(bin),
                    support,
                });
            }
        }
        trace!(n_peaks = peaks.len(), "1D histogram local maxima");
        Ok(peaks)
    }
}

/// 2D histogram over (theta, distance), theta on rows and distance on
/// columns.
#[derive(Debug)]
pub struct Histogram2D {
    theta_bins: usize,
    distance_bins: usize,
    theta_range: (f64, f64),
    distance_range: (f64, f64),
    /// theta_bins x distance_bins CV_32F vote counts.
    counts: Mat,
}

impl Histogram2D {
    pub fn new(
        bins: (usize, usize),
        theta_range: (f64, f64),
        distance_range: (f64, f64),
    ) -> Result<Self> {
        let (theta_bins, distance_bins) = bins;
        ensure!(
            theta_bins > 0 && distance_bins > 0,
            "histogram needs at least one bin per dimension"
        );
        ensure!(
            theta_range.0 < theta_range.1 && distance_range.0 < distance_range.1,
            "inconsistent 2D histogram ranges"
        );
        let counts = Mat::new_rows_cols_with_default(
            theta_bins as i32,
            distance_bins as i32,
            CV_32F,
            Scalar::all(0.0),
        )?;
        Ok(Self {
            theta_bins,
            distance_bins,
            theta_range,
            distance_range,
            counts,
        })
    }

    /// Rebuilds the vote counts from (theta, distance) samples, replacing
    /// prior state. Samples outside either range are dropped.
    pub fn calculate(&mut self, samples: &[(f64, f64)]) -> Result<()> {
        self.counts = Mat::new_rows_cols_with_default(
            self.theta_bins as i32,
            self.distance_bins as i32,
            CV_32F,
            Scalar::all(0.0),
        )?;
        for &(theta, distance) in samples {
            let Some(theta_bin) = Self::bin_of(theta, self.theta_range, self.theta_bins) else {
                continue;
            };
            let Some(distance_bin) =
                Self::bin_of(distance, self.distance_range, self.distance_bins)
            else {
                continue;
            };
            *self
                .counts
                .at_2d_mut::<f32>(theta_bin as i32, distance_bin as i32)? += 1.0;
        }
        Ok(())
    }

    fn bin_of(value: f64, range: (f64, f64), bins: usize) -> Option<usize> {
        let (min, max) = range;
        if !(value >= min && value < max) {
            return None;
        }
        Some((((value - min) / (max - min) * bins as f64) as usize).min(bins - 1))
    }

    fn center_of(bin: usize, range: (f64, f64), bins: usize) -> f64 {
        let (min, max) = range;
        min + (bin as f64 + 0.5) * (max - min) / bins as f64
    }

    pub fn theta_bin_center(&self, bin: usize) -> f64 {
        Self::center_of(bin, self.theta_range, self.theta_bins)
    }

    pub fn distance_bin_center(&self, bin: usize) -> f64 {
        Self::center_of(bin, self.distance_range, self.distance_bins)
    }

    /// Finds up to `nr_of_local_max` peaks of the Gaussian-blurred
    /// histogram.
    ///
    /// Candidates must be strictly greater than every 8-neighbor and carry
    /// raw support >= `min_support`. Candidates are taken in descending
    /// smoothed height, skipping any closer than
    /// `min_distance_between_maxima` (Euclidean, in bin units) to an
    /// already-selected peak.
    pub fn local_maxima_2d(
        &self,
        gaussian_kernel_size: i32,
        nr_of_local_max: usize,
        min_support: f64,
        min_distance_between_maxima: f64,
    ) -> Result<Vec<PeakInfo2D>> {
        ensure!(
            gaussian_kernel_size >= 1 && gaussian_kernel_size % 2 == 1,
            "gaussian kernel size must be odd and >= 1, got {gaussian_kernel_size}"
        );

        let mut smoothed = Mat::default();
        imgproc::gaussian_blur(
            &self.counts,
            &mut smoothed,
            Size::new(gaussian_kernel_size, gaussian_kernel_size),
            0.0,
            0.0,
            BORDER_DEFAULT,
        )?;

        // Strict local maxima over the 8-neighborhood.
        let mut candidates: Vec<(usize, usize, f64, f64)> = Vec::new();
        for r in 0..self.theta_bins {
            for c in 0..self.distance_bins {
                let v = f64::from(*smoothed.at_2d::<f32>(r as i32, c as i32)?);
                if v <= 0.0 {
                    continue;
                }
                let mut is_max = true;
                'neighbors: for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = r as i64 + dr;
                        let nc = c as i64 + dc;
                        if nr < 0
                            || nc < 0
                            || nr >= self.theta_bins as i64
                            || nc >= self.distance_bins as i64
                        {
                            continue;
                        }
                        let w = f64::from(*smoothed.at_2d::<f32>(nr as i32, nc as i32)?);
                        if w >= v {
                            is_max = false;
                            break 'neighbors;
                        }
                    }
                }
                if !is_max {
                    continue;
                }
                let support = f64::from(*self.counts.at_2d::<f32>(r as i32, c as i32)?);
                if support >= min_support {
                    candidates.push((r, c, v, support));
                }
            }
        }

        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut peaks: Vec<PeakInfo2D> = Vec::new();
        for (r, c, _, support) in candidates {
            if peaks.len() >= nr_of_local_max {
                break;
            }
            let far_enough = peaks.iter().all(|peak| {
                let dr = peak.pos.0 as f64 - r as f64;
                let dc = peak.pos.1 as f64 - c as f64;
                (dr * dr + dc * dc).sqrt() >= min_distance_between_maxima
            });
            if far_enough {
                peaks.push(PeakInfo2D {
                    pos: (r, c),
                    x_value: self.theta_bin_center(r),
                    y_value: self.distance_bin_center(c),
                    support,
                });
            }
        }
        trace!(n_peaks = peaks.len(), "2D histogram local maxima");
        Ok(peaks)
    }
}
