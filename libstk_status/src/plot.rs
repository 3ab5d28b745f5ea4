use plotters::prelude::*;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::Date;

use super::config::PlotConfig;
use super::error::PlotError;
use super::histogram::{distribution, ladder_density, Histogram1D, Histogram2D};
use super::series::{Statistic, TimeSeries};

const PLOT_SIZE: (u32, u32) = (1280, 720);
const FONT_SIZE: i32 = 20;
const AXIS_FONT_SIZE: i32 = 24;
const AVERAGE_MONTH_DAYS: f64 = 30.44;
const DEFAULT_X_LABELS: usize = 10;

const FRACTION_COLORS: [RGBColor; 3] = [BLUE, GREEN, RED];

fn plotters_error<E: std::fmt::Display>(name: &str) -> impl Fn(E) -> PlotError + '_ {
    move |e| PlotError::Plotters(name.to_string(), e.to_string())
}

/// Format a Julian day number as a year-month axis label
fn date_label(julian_day: f64) -> String {
    Date::from_julian_day(julian_day.floor() as i32)
        .ok()
        .and_then(|date| date.format(format_description!("[year]-[month]")).ok())
        .unwrap_or_default()
}

/// Number of x labels for a span of days so labels fall roughly every `interval_months`
fn x_label_count(span_days: f64, interval_months: u32) -> usize {
    if interval_months == 0 {
        return DEFAULT_X_LABELS;
    }
    let months = span_days / AVERAGE_MONTH_DAYS;
    (months / interval_months as f64).ceil() as usize + 1
}

/// Lower and upper y bounds with a margin, never an empty range
fn padded_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 0.5 };
    (lo - pad, hi + pad)
}

/// Linear blue to red ramp for heat map bins
fn heat_color(fraction: f64) -> HSLColor {
    let fraction = fraction.clamp(0.0, 1.0);
    HSLColor(0.66 * (1.0 - fraction), 1.0, 0.5)
}

/// Writes the SVG plots of one monitoring pass into an output directory
#[derive(Debug, Clone)]
pub struct Plotter<'a> {
    output_dir: PathBuf,
    config: &'a PlotConfig,
}

impl<'a> Plotter<'a> {
    pub fn new(output_dir: &Path, config: &'a PlotConfig) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            config,
        }
    }

    /// Write every enabled plot for the series. Returns the paths of the written files.
    pub fn plot_all(&self, series: &TimeSeries) -> Result<Vec<PathBuf>, PlotError> {
        if series.is_empty() {
            return Err(PlotError::NoData);
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let mut written = Vec::new();
        for stat in Statistic::ALL {
            if !self.config.is_enabled(stat) {
                continue;
            }
            written.push(self.plot_time_evolution(series, stat)?);
            if let Some(range) = self.config.distribution_range(stat) {
                let hist = distribution(series, stat, &range)?;
                written.push(self.plot_distribution(&hist, stat)?);
            }
            if let Some(hist) = ladder_density(series, stat, self.config.value_bins)? {
                written.push(self.plot_density(&hist, stat)?);
            }
        }
        if self.config.is_enabled(Statistic::FracLowNoise) {
            written.push(self.plot_channel_fractions(series)?);
        }
        log::info!(
            "Wrote {} plots to {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(written)
    }

    fn day_axis(series: &TimeSeries) -> Vec<f64> {
        series
            .days()
            .iter()
            .map(|day| day.date().to_julian_day() as f64)
            .collect()
    }

    fn x_range(x_vals: &[f64]) -> (f64, f64) {
        match (x_vals.first(), x_vals.last()) {
            (Some(first), Some(last)) => (first - 0.5, last + 0.5),
            _ => (0.0, 1.0),
        }
    }

    /// Line plot of a statistic's per-day values against the date
    pub fn plot_time_evolution(
        &self,
        series: &TimeSeries,
        stat: Statistic,
    ) -> Result<PathBuf, PlotError> {
        let path = self.output_dir.join(format!("{}_time.svg", stat.name()));
        let x_vals = Self::day_axis(series);
        let values = series.values(stat);
        self.draw_lines(&path, &x_vals, &[(values, BLUE, stat.label())], stat.label())?;
        Ok(path)
    }

    /// The three channel fractions on shared axes
    pub fn plot_channel_fractions(&self, series: &TimeSeries) -> Result<PathBuf, PlotError> {
        let path = self.output_dir.join("chfrac_time.svg");
        let x_vals = Self::day_axis(series);
        let lines: Vec<(&[f64], RGBColor, &str)> = Statistic::CHANNEL_FRACTIONS
            .iter()
            .zip(FRACTION_COLORS)
            .map(|(stat, color)| (series.values(*stat), color, stat.label()))
            .collect();
        self.draw_lines(&path, &x_vals, &lines, "Channel fraction")?;
        Ok(path)
    }

    fn draw_lines(
        &self,
        path: &Path,
        x_vals: &[f64],
        lines: &[(&[f64], RGBColor, &str)],
        y_label: &str,
    ) -> Result<(), PlotError> {
        let name = path.display().to_string();
        let err = plotters_error(&name);

        let (x_min, x_max) = Self::x_range(x_vals);
        let (y_min, y_max) = padded_range(lines.iter().flat_map(|(v, _, _)| v.iter().copied()));

        let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(&err)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(&err)?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc(y_label)
            .x_labels(x_label_count(x_max - x_min, self.config.x_interval_months))
            .x_label_formatter(&|x| date_label(*x))
            .label_style(("sans-serif", FONT_SIZE))
            .axis_desc_style(("sans-serif", AXIS_FONT_SIZE))
            .light_line_style(WHITE.mix(0.0))
            .draw()
            .map_err(&err)?;

        for (values, color, label) in lines {
            let color = *color;
            let points = || x_vals.iter().copied().zip(values.iter().copied());
            chart
                .draw_series(LineSeries::new(points(), color))
                .map_err(&err)?
                .label(*label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
            chart
                .draw_series(PointSeries::of_element(
                    points(),
                    3,
                    color.filled(),
                    &|coord, size, style| EmptyElement::at(coord) + Circle::new((0, 0), size, style),
                ))
                .map_err(&err)?;
        }

        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .label_font(("sans-serif", FONT_SIZE))
            .draw()
            .map_err(&err)?;
        root.present().map_err(&err)?;
        Ok(())
    }

    /// Density-normalised distribution of a statistic over the window
    pub fn plot_distribution(
        &self,
        hist: &Histogram1D,
        stat: Statistic,
    ) -> Result<PathBuf, PlotError> {
        let path = self
            .output_dir
            .join(format!("{}_distribution.svg", stat.name()));
        let name = path.display().to_string();
        let err = plotters_error(&name);

        let density = hist.density();
        let edges = hist.bin_edges();
        let y_max = density.iter().copied().fold(0.0, f64::max).max(1.0) * 1.1;

        // The backend borrows the path until it is dropped
        {
            let root = SVGBackend::new(&path, PLOT_SIZE).into_drawing_area();
            root.fill(&WHITE).map_err(&err)?;
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .x_label_area_size(50)
                .y_label_area_size(80)
                .build_cartesian_2d(hist.min..hist.max, 0.0..y_max)
                .map_err(&err)?;
            chart
                .configure_mesh()
                .x_desc(stat.label())
                .y_desc("Density")
                .label_style(("sans-serif", FONT_SIZE))
                .axis_desc_style(("sans-serif", AXIS_FONT_SIZE))
                .draw()
                .map_err(&err)?;
            chart
                .draw_series(density.iter().zip(edges.windows(2)).map(|(d, edge)| {
                    Rectangle::new([(edge[0], 0.0), (edge[1], *d)], BLUE.mix(0.6).filled())
                }))
                .map_err(&err)?;
            root.present().map_err(&err)?;
        }
        Ok(path)
    }

    /// Heat map of the per-ladder values of a statistic against the date
    pub fn plot_density(&self, hist: &Histogram2D, stat: Statistic) -> Result<PathBuf, PlotError> {
        let path = self
            .output_dir
            .join(format!("{}_time_density.svg", stat.name()));
        let name = path.display().to_string();
        let err = plotters_error(&name);

        let max_count = hist.max_count().max(1) as f64;
        let x_width = hist.x_bin_width();
        let y_width = hist.y_bin_width();

        // The backend borrows the path until it is dropped
        {
            let root = SVGBackend::new(&path, PLOT_SIZE).into_drawing_area();
            root.fill(&WHITE).map_err(&err)?;
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .x_label_area_size(50)
                .y_label_area_size(80)
                .build_cartesian_2d(hist.x_min..hist.x_max, hist.y_min..hist.y_max)
                .map_err(&err)?;
            chart
                .configure_mesh()
                .x_desc("Date")
                .y_desc(stat.label())
                .x_labels(x_label_count(
                    hist.x_max - hist.x_min,
                    self.config.x_interval_months,
                ))
                .x_label_formatter(&|x| date_label(*x))
                .label_style(("sans-serif", FONT_SIZE))
                .axis_desc_style(("sans-serif", AXIS_FONT_SIZE))
                .disable_mesh()
                .draw()
                .map_err(&err)?;
            chart
                .draw_series(
                    hist.counts
                        .indexed_iter()
                        .filter(|(_, count)| **count > 0)
                        .map(|((ix, iy), count)| {
                            let x0 = hist.x_min + ix as f64 * x_width;
                            let y0 = hist.y_min + iy as f64 * y_width;
                            Rectangle::new(
                                [(x0, y0), (x0 + x_width, y0 + y_width)],
                                heat_color(*count as f64 / max_count).filled(),
                            )
                        }),
                )
                .map_err(&err)?;
            root.present().map_err(&err)?;
        }
        Ok(path)
    }
}
