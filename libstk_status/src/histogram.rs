use ndarray::Array2;

use super::config::HistogramRange;
use super::error::HistogramError;
use super::series::{Statistic, TimeSeries};

fn check_binning(min: f64, max: f64, bins: usize) -> Result<(), HistogramError> {
    if bins == 0 {
        return Err(HistogramError::NoBins);
    }
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(HistogramError::BadRange(min, max));
    }
    Ok(())
}

/// Index of the bin holding value in the uniform binning [min, max)
fn bin_index(value: f64, min: f64, max: f64, bins: usize) -> Option<usize> {
    if value.is_nan() || value < min || value >= max {
        return None;
    }
    let idx = ((value - min) / (max - min) * bins as f64) as usize;
    Some(idx.min(bins - 1))
}

/// Uniformly binned 1D histogram over [min, max)
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<u64>,
    pub underflow: u64,
    pub overflow: u64,
}

impl Histogram1D {
    pub fn new(min: f64, max: f64, bins: usize) -> Result<Self, HistogramError> {
        check_binning(min, max, bins)?;
        Ok(Self {
            min,
            max,
            counts: vec![0; bins],
            underflow: 0,
            overflow: 0,
        })
    }

    pub fn from_range(range: &HistogramRange) -> Result<Self, HistogramError> {
        Self::new(range.min, range.max, range.bins)
    }

    /// Fill a value. NaN is ignored, values outside the range go to under/overflow.
    pub fn fill(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        match bin_index(value, self.min, self.max, self.counts.len()) {
            Some(idx) => self.counts[idx] += 1,
            None if value < self.min => self.underflow += 1,
            None => self.overflow += 1,
        }
    }

    pub fn fill_all(&mut self, values: impl IntoIterator<Item = f64>) {
        for value in values {
            self.fill(value);
        }
    }

    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Lower edges of every bin plus the upper edge of the last one
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.counts.len())
            .map(|i| self.min + i as f64 * width)
            .collect()
    }

    /// Entries inside the range
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Bin contents normalised so the histogram integrates to one over its range
    pub fn density(&self) -> Vec<f64> {
        let norm = self.entries() as f64 * self.bin_width();
        if norm == 0.0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts.iter().map(|c| *c as f64 / norm).collect()
    }
}

/// Uniformly binned 2D histogram, counts indexed as `[x_bin, y_bin]`
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram2D {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub counts: Array2<u64>,
}

impl Histogram2D {
    pub fn new(
        (x_min, x_max, x_bins): (f64, f64, usize),
        (y_min, y_max, y_bins): (f64, f64, usize),
    ) -> Result<Self, HistogramError> {
        check_binning(x_min, x_max, x_bins)?;
        check_binning(y_min, y_max, y_bins)?;
        Ok(Self {
            x_min,
            x_max,
            y_min,
            y_max,
            counts: Array2::zeros((x_bins, y_bins)),
        })
    }

    /// Fill a point; points outside the ranges are dropped
    pub fn fill(&mut self, x: f64, y: f64) {
        let (x_bins, y_bins) = self.counts.dim();
        if let (Some(ix), Some(iy)) = (
            bin_index(x, self.x_min, self.x_max, x_bins),
            bin_index(y, self.y_min, self.y_max, y_bins),
        ) {
            self.counts[[ix, iy]] += 1;
        }
    }

    pub fn x_bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.counts.dim().0 as f64
    }

    pub fn y_bin_width(&self) -> f64 {
        (self.y_max - self.y_min) / self.counts.dim().1 as f64
    }

    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Smallest and largest finite value, widened if they coincide
pub fn finite_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return None;
    }
    if min == max {
        return Some((min - 0.5, max + 0.5));
    }
    // The upper edge is exclusive; pad it so the largest value lands in the last bin
    Some((min, max + (max - min) * 1e-6))
}

/// Distribution of a statistic's per-day values over the configured range
pub fn distribution(
    series: &TimeSeries,
    stat: Statistic,
    range: &HistogramRange,
) -> Result<Histogram1D, HistogramError> {
    let mut hist = Histogram1D::from_range(range)?;
    hist.fill_all(series.values(stat).iter().copied());
    Ok(hist)
}

/// 2D time/value histogram of the per-ladder values of a statistic.
///
/// The x axis is the Julian day number with one bin per calendar day of the series span; the
/// value range follows the data. Returns None for statistics without per-ladder values or when
/// there is no finite value.
pub fn ladder_density(
    series: &TimeSeries,
    stat: Statistic,
    value_bins: usize,
) -> Result<Option<Histogram2D>, HistogramError> {
    let (Some(ladders), Some(first), Some(last)) = (
        series.ladder_values(stat),
        series.first_day(),
        series.last_day(),
    ) else {
        return Ok(None);
    };
    let Some((y_min, y_max)) = finite_range(ladders.iter().flat_map(|l| l.iter().copied())) else {
        return Ok(None);
    };

    let x_min = first.date().to_julian_day() as f64;
    let x_max = last.date().to_julian_day() as f64 + 1.0;
    let x_bins = (x_max - x_min) as usize;
    let mut hist = Histogram2D::new((x_min, x_max, x_bins), (y_min, y_max, value_bins))?;
    for (day, values) in series.days().iter().zip(ladders.iter()) {
        let x = day.date().to_julian_day() as f64 + 0.5;
        for value in values.iter() {
            hist.fill(x, *value);
        }
    }
    Ok(Some(hist))
}

/// Per-day histograms of every retained channel sigma
pub fn channel_sigma_histograms(
    series: &TimeSeries,
    min: f64,
    max: f64,
    bins: usize,
) -> Result<Vec<Histogram1D>, HistogramError> {
    series
        .channel_sigmas()
        .iter()
        .map(|sigmas| {
            let mut hist = Histogram1D::new(min, max, bins)?;
            hist.fill_all(sigmas.iter().copied());
            Ok(hist)
        })
        .collect()
}
