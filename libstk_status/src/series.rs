use std::fmt::Display;

use super::cal_day::CalDay;
use super::reduction::{DayAggregate, LadderValues};

/// The scalar statistics carried by a [`TimeSeries`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Sigma,
    RawSigma,
    Pedestal,
    CommonNoise,
    FracLowNoise,
    FracMidNoise,
    FracHighNoise,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Sigma,
        Statistic::RawSigma,
        Statistic::Pedestal,
        Statistic::CommonNoise,
        Statistic::FracLowNoise,
        Statistic::FracMidNoise,
        Statistic::FracHighNoise,
    ];

    /// Statistics that are means of per-ladder values (and so have a per-ladder collection)
    pub const LADDER_MEANS: [Statistic; 4] = [
        Statistic::Sigma,
        Statistic::RawSigma,
        Statistic::Pedestal,
        Statistic::CommonNoise,
    ];

    pub const CHANNEL_FRACTIONS: [Statistic; 3] = [
        Statistic::FracLowNoise,
        Statistic::FracMidNoise,
        Statistic::FracHighNoise,
    ];

    /// Short machine name, used for file and dataset names
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sigma => "sigma",
            Self::RawSigma => "sigma_raw",
            Self::Pedestal => "pedestal",
            Self::CommonNoise => "cn",
            Self::FracLowNoise => "chfrac_s5",
            Self::FracMidNoise => "chfrac_s510",
            Self::FracHighNoise => "chfrac_s10",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sigma => "sigma",
            Self::RawSigma => "sigma raw",
            Self::Pedestal => "pedestal",
            Self::CommonNoise => "common noise",
            Self::FracLowNoise => "ch frac sigma < 5",
            Self::FracMidNoise => "ch frac 5 <= sigma <= 10",
            Self::FracHighNoise => "ch frac sigma > 10",
        }
    }

    pub fn is_ladder_mean(&self) -> bool {
        Self::LADDER_MEANS.contains(self)
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The date-ordered evolution of the calibration statistics.
///
/// Every collection is aligned by position with [`TimeSeries::days`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    days: Vec<CalDay>,
    sigma: Vec<f64>,
    raw_sigma: Vec<f64>,
    pedestal: Vec<f64>,
    common_noise: Vec<f64>,
    frac_low_noise: Vec<f64>,
    frac_mid_noise: Vec<f64>,
    frac_high_noise: Vec<f64>,
    channel_sigmas: Vec<Vec<f64>>,
    ladders: Vec<LadderValues>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the reduction of a day. Days are expected in ascending order.
    pub fn push(&mut self, day: CalDay, aggregate: DayAggregate) {
        if let Some(last) = self.days.last() {
            if *last > day {
                log::warn!("Calibration day {day} appended after {last}; series is out of order");
            }
        }
        self.days.push(day);
        self.sigma.push(aggregate.sigma);
        self.raw_sigma.push(aggregate.raw_sigma);
        self.pedestal.push(aggregate.pedestal);
        self.common_noise.push(aggregate.common_noise);
        self.frac_low_noise.push(aggregate.frac_low_noise);
        self.frac_mid_noise.push(aggregate.frac_mid_noise);
        self.frac_high_noise.push(aggregate.frac_high_noise);
        self.channel_sigmas.push(aggregate.channel_sigmas);
        self.ladders.push(aggregate.ladders);
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[CalDay] {
        &self.days
    }

    pub fn first_day(&self) -> Option<&CalDay> {
        self.days.first()
    }

    pub fn last_day(&self) -> Option<&CalDay> {
        self.days.last()
    }

    /// The per-day values of a statistic
    pub fn values(&self, stat: Statistic) -> &[f64] {
        match stat {
            Statistic::Sigma => &self.sigma,
            Statistic::RawSigma => &self.raw_sigma,
            Statistic::Pedestal => &self.pedestal,
            Statistic::CommonNoise => &self.common_noise,
            Statistic::FracLowNoise => &self.frac_low_noise,
            Statistic::FracMidNoise => &self.frac_mid_noise,
            Statistic::FracHighNoise => &self.frac_high_noise,
        }
    }

    /// The per-ladder values of a statistic for every day, or None for channel fractions
    pub fn ladder_values(&self, stat: Statistic) -> Option<Vec<&[f64]>> {
        let select: fn(&LadderValues) -> &[f64] = match stat {
            Statistic::Sigma => |l| l.sigma.as_slice(),
            Statistic::RawSigma => |l| l.raw_sigma.as_slice(),
            Statistic::Pedestal => |l| l.pedestal.as_slice(),
            Statistic::CommonNoise => |l| l.common_noise.as_slice(),
            _ => return None,
        };
        Some(self.ladders.iter().map(select).collect())
    }

    /// Every retained channel sigma, per day
    pub fn channel_sigmas(&self) -> &[Vec<f64>] {
        &self.channel_sigmas
    }
}
