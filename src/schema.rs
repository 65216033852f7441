use anyhow::{Result, anyhow};

/// How one workout is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreUnit {
    Reps,
    Weight,
    /// Finishers log a time, everyone else a rep count (capped workouts).
    TimeOrReps,
}

/// Which shape the leaderboard endpoint returns for a given year.
///
/// 2017 reports `totalpages` and a flat `athletes` array; 2018 moved to
/// `pagination.totalPages` with athlete identity nested under `entrant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLayout {
    Flat,
    EntrantNested,
}

#[derive(Debug, Clone)]
pub struct Workout {
    /// Score column label, e.g. "17.3".
    pub label: &'static str,
    pub unit: ScoreUnit,
    /// Whether cross-type time/reps predictions are derived for this workout.
    pub predictions: bool,
    pub time_cap_secs: Option<u32>,
    pub target_reps: Option<u32>,
}

/// Static per-year workout and response-shape parameters, built once at job
/// start and passed through every stage.
#[derive(Debug, Clone)]
pub struct WorkoutSchema {
    pub year: u16,
    pub layout: ResponseLayout,
    pub workouts: Vec<Workout>,
}

impl WorkoutSchema {
    pub fn for_year(year: u16) -> Result<Self> {
        match year {
            2017 => Ok(Self {
                year,
                layout: ResponseLayout::Flat,
                workouts: vec![
                    Workout {
                        label: "17.1",
                        unit: ScoreUnit::TimeOrReps,
                        predictions: true,
                        time_cap_secs: Some(20 * 60),
                        target_reps: Some(225),
                    },
                    Workout {
                        label: "17.2",
                        unit: ScoreUnit::Reps,
                        predictions: false,
                        time_cap_secs: None,
                        target_reps: None,
                    },
                    Workout {
                        label: "17.3",
                        unit: ScoreUnit::TimeOrReps,
                        predictions: true,
                        time_cap_secs: Some(24 * 60),
                        target_reps: Some(216),
                    },
                    Workout {
                        label: "17.4",
                        unit: ScoreUnit::Reps,
                        predictions: false,
                        time_cap_secs: None,
                        target_reps: None,
                    },
                    Workout {
                        label: "17.5",
                        unit: ScoreUnit::TimeOrReps,
                        predictions: true,
                        time_cap_secs: Some(40 * 60),
                        target_reps: Some(440),
                    },
                ],
            }),
            2018 => Ok(Self {
                year,
                layout: ResponseLayout::EntrantNested,
                workouts: vec![
                    Workout {
                        label: "18.1",
                        unit: ScoreUnit::Reps,
                        predictions: false,
                        time_cap_secs: None,
                        target_reps: None,
                    },
                    Workout {
                        label: "18.2",
                        unit: ScoreUnit::TimeOrReps,
                        predictions: true,
                        time_cap_secs: Some(12 * 60),
                        target_reps: Some(110),
                    },
                    Workout {
                        label: "18.2a",
                        unit: ScoreUnit::Weight,
                        predictions: false,
                        time_cap_secs: None,
                        target_reps: None,
                    },
                ],
            }),
            other => Err(anyhow!("unsupported competition year {other}")),
        }
    }

    pub fn workout_count(&self) -> usize {
        self.workouts.len()
    }
}

/// Numeric division code (1-19) to directory name.
pub fn division_name(division: u8) -> Result<&'static str> {
    let name = match division {
        1 => "Men",
        2 => "Women",
        3 => "Men_45-49",
        4 => "Women_45-49",
        5 => "Men_50-54",
        6 => "Women_50-54",
        7 => "Men_55-59",
        8 => "Women_55-59",
        9 => "Men_60+",
        10 => "Women_60+",
        11 => "Team",
        12 => "Men_40-44",
        13 => "Women_40-44",
        14 => "Boys_14-15",
        15 => "Girls_14-15",
        16 => "Boys_16-17",
        17 => "Girls_16-17",
        18 => "Men_35-39",
        19 => "Women_35-39",
        other => return Err(anyhow!("unknown division code {other}")),
    };
    Ok(name)
}

pub fn scaled_name(scaled: u8) -> Result<&'static str> {
    match scaled {
        0 => Ok("Rx"),
        1 => Ok("Sc"),
        other => Err(anyhow!("scaled flag must be 0 or 1, got {other}")),
    }
}
