/// The stage of a monitoring pass a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Idle,
    Fetching,
    Aggregating,
    Plotting,
    Done,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Fetching => "Downloading",
            Self::Aggregating => "Aggregating",
            Self::Plotting => "Plotting",
            Self::Done => "Done",
        }
    }
}

/// Progress message sent from the worker running a pass to the front end
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
    /// The calibration day (YYYYMMDD) last handled, if any
    pub day: Option<String>,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage, day: Option<String>) -> Self {
        Self {
            progress,
            stage,
            day,
        }
    }
}
