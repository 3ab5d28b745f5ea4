use super::cal_file::LadderStats;
use super::constants::DetectorGeometry;
use super::error::CalDayError;

/// Per-ladder values of the mean-type statistics for one day, flattened in (group, slot) order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LadderValues {
    pub sigma: Vec<f64>,
    pub raw_sigma: Vec<f64>,
    pub pedestal: Vec<f64>,
    pub common_noise: Vec<f64>,
}

/// The reduction of one calibration day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAggregate {
    pub sigma: f64,
    pub raw_sigma: f64,
    pub pedestal: f64,
    pub common_noise: f64,
    pub frac_low_noise: f64,
    pub frac_mid_noise: f64,
    pub frac_high_noise: f64,
    /// Every retained channel sigma of the day
    pub channel_sigmas: Vec<f64>,
    pub ladders: LadderValues,
}

/// Two-level mean: the mean of each group's mean, so every group weighs the same
pub fn grand_mean(groups: &[Vec<f64>]) -> f64 {
    let group_means: Vec<f64> = groups
        .iter()
        .map(|g| g.iter().sum::<f64>() / g.len() as f64)
        .collect();
    group_means.iter().sum::<f64>() / group_means.len() as f64
}

/// Flat fraction of channels: all counts over (channels per ladder x groups x ladders in group 0)
pub fn channel_fraction(groups: &[Vec<usize>], channels_per_ladder: usize) -> f64 {
    let selected: usize = groups.iter().flatten().sum();
    let reference_ladders = groups.first().map(|g| g.len()).unwrap_or(0);
    selected as f64 / (channels_per_ladder * groups.len() * reference_ladders) as f64
}

fn per_group<T>(ladders: &[Vec<LadderStats>], value: impl Fn(&LadderStats) -> T) -> Vec<Vec<T>> {
    ladders
        .iter()
        .map(|group| group.iter().map(&value).collect())
        .collect()
}

impl DayAggregate {
    /// Reduce the ladder statistics of a day, indexed as `ladders[group][slot]`.
    ///
    /// Every board group must hold at least one ladder, and all groups the same number of ladders.
    pub fn reduce(
        ladders: &[Vec<LadderStats>],
        geometry: &DetectorGeometry,
    ) -> Result<Self, CalDayError> {
        if ladders.len() != geometry.n_board_groups {
            return Err(CalDayError::BadGroupCount(
                ladders.len(),
                geometry.n_board_groups,
            ));
        }
        if let Some(group) = ladders.iter().position(|g| g.is_empty()) {
            return Err(CalDayError::EmptyBoardGroup(group));
        }
        let expected = ladders.first().map(|g| g.len()).unwrap_or(0);
        if let Some(group) = ladders.iter().position(|g| g.len() != expected) {
            return Err(CalDayError::UnevenBoardGroups {
                group,
                found: ladders[group].len(),
                expected,
            });
        }

        let sigma = per_group(ladders, |l| l.sigma_mean);
        let raw_sigma = per_group(ladders, |l| l.raw_sigma_mean);
        let pedestal = per_group(ladders, |l| l.pedestal_mean);
        let common_noise = per_group(ladders, |l| l.common_noise);
        let channels = geometry.channels_per_ladder;

        Ok(Self {
            sigma: grand_mean(&sigma),
            raw_sigma: grand_mean(&raw_sigma),
            pedestal: grand_mean(&pedestal),
            common_noise: grand_mean(&common_noise),
            frac_low_noise: channel_fraction(&per_group(ladders, |l| l.n_low_noise), channels),
            frac_mid_noise: channel_fraction(&per_group(ladders, |l| l.n_mid_noise), channels),
            frac_high_noise: channel_fraction(&per_group(ladders, |l| l.n_high_noise), channels),
            channel_sigmas: ladders
                .iter()
                .flatten()
                .flat_map(|l| l.sigmas.iter().copied())
                .collect(),
            ladders: LadderValues {
                sigma: sigma.into_iter().flatten().collect(),
                raw_sigma: raw_sigma.into_iter().flatten().collect(),
                pedestal: pedestal.into_iter().flatten().collect(),
                common_noise: common_noise.into_iter().flatten().collect(),
            },
        })
    }
}
