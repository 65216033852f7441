use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::leaderboard::AthleteRow;
use crate::schema::WorkoutSchema;

/// A parsed workout score.
///
/// Raw leaderboard scores are heterogeneous strings: clock times ("8:32"),
/// rep counts ("145 reps"), weights ("225 lb"), scaled markers ("... - s"),
/// and no-attempt sentinels ("" / "0"). Times and counts never compare equal
/// to each other, which the percentile tie handling relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Clock time in seconds.
    Time(u32),
    /// Rep count or weight.
    Count(i64),
    Absent,
}

impl Score {
    pub fn is_absent(&self) -> bool {
        matches!(self, Score::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanWorkout {
    pub rank: Option<u64>,
    pub score: Score,
    pub percentile: Option<f64>,
    pub predicted_time_secs: Option<u32>,
    pub predicted_reps: Option<u32>,
}

/// One athlete of the typed, comparable table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRow {
    pub competitor_id: Option<u64>,
    pub name: String,
    pub height_m: Option<f64>,
    pub weight_kg: Option<f64>,
    pub age: Option<u32>,
    pub region_id: Option<u32>,
    pub region_name: String,
    pub affiliate_id: Option<u32>,
    pub overall_rank: u64,
    pub overall_score: Option<i64>,
    pub overall_percentile: f64,
    pub workouts: Vec<CleanWorkout>,
}

/// Year/division facts recovered from a raw table's artifact name,
/// e.g. "Men_Rx_2017_raw".
#[derive(Debug, Clone, Copy)]
pub struct CleanJob {
    pub year: u16,
    pub scaled: bool,
    pub team: bool,
}

pub fn clean_job_from_key(key: &str) -> Result<CleanJob> {
    let stem = key
        .strip_suffix("_raw")
        .ok_or_else(|| anyhow!("raw table name must end in _raw, got {key:?}"))?;
    let mut parts = stem.rsplitn(3, '_');
    let year = parts
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| anyhow!("no year in table name {key:?}"))?;
    let scaled = match parts.next() {
        Some("Rx") => false,
        Some("Sc") => true,
        other => bail!("table name {key:?} has no Rx/Sc part ({other:?})"),
    };
    let team = parts.next() == Some("Team");
    Ok(CleanJob { year, scaled, team })
}

/// Turn an assembled raw table into the typed clean table.
///
/// Refuses tables whose first row is not overall rank 1: every percentile
/// below would be silently wrong on a mis-ordered table.
pub fn clean_table(
    raw: &[AthleteRow],
    schema: &WorkoutSchema,
    job: CleanJob,
) -> Result<Vec<CleanRow>> {
    let first = raw.first().ok_or_else(|| anyhow!("raw table is empty"))?;
    let first_rank: u64 = first
        .overall_rank
        .trim()
        .parse()
        .context("first row has a non-numeric overall rank")?;
    if first_rank != 1 {
        bail!("table is not sorted ascending by rank (first row has rank {first_rank})");
    }
    let wod_count = schema.workout_count();
    for row in raw {
        if row.workouts.len() != wod_count {
            bail!(
                "row for {:?} has {} workout scores, schema for {} expects {wod_count}",
                row.name,
                row.workouts.len(),
                schema.year
            );
        }
    }

    // The raw table is rank-ordered, so athletes who never logged a score sit
    // in one block at the bottom with arbitrary rank numbers. Trim them off
    // before parsing (Rx only; scaled tables keep every row).
    let mut rows: &[AthleteRow] = raw;
    if !job.scaled {
        let mut end = rows.len();
        while end > 0 && rows[end - 1].workouts.iter().all(|w| is_no_attempt(&w.score)) {
            end -= 1;
        }
        rows = &rows[..end];
    }

    let mut out: Vec<CleanRow> = Vec::with_capacity(rows.len());
    for row in rows {
        let scores: Vec<Score> = row
            .workouts
            .iter()
            .map(|w| parse_score(&w.score, job.scaled))
            .collect();
        if !job.scaled && scores.iter().all(Score::is_absent) {
            // Registered but never attempted anything in this division.
            continue;
        }
        let overall_rank: u64 = row
            .overall_rank
            .trim()
            .parse()
            .with_context(|| format!("row for {:?} has a non-numeric overall rank", row.name))?;
        let workouts = scores
            .into_iter()
            .zip(&row.workouts)
            .map(|(score, w)| CleanWorkout {
                rank: parse_int(&w.rank),
                score,
                percentile: None,
                predicted_time_secs: None,
                predicted_reps: None,
            })
            .collect();
        out.push(CleanRow {
            competitor_id: parse_int(&row.competitor_id),
            name: row.name.clone(),
            height_m: height_to_meters(&row.height),
            weight_kg: weight_to_kg(&row.weight),
            age: if job.team { None } else { parse_int(&row.age) },
            region_id: parse_int(&row.region_id),
            region_name: row.region_name.clone(),
            affiliate_id: parse_int(&row.affiliate_id),
            overall_rank,
            overall_score: parse_int(&row.overall_score),
            overall_percentile: 0.0,
            workouts,
        });
    }

    let ranks: Vec<u64> = out.iter().map(|r| r.overall_rank).collect();
    let mut pct = spaced_percentiles(out.len());
    inherit_tied_percentiles(&ranks, &mut pct);
    for (row, p) in out.iter_mut().zip(&pct) {
        row.overall_percentile = *p;
    }

    for j in 0..wod_count {
        apply_workout_percentiles(&mut out, j);
        let workout = &schema.workouts[j];
        if workout.predictions && !job.team {
            if let (Some(cap), Some(target)) = (workout.time_cap_secs, workout.target_reps) {
                let any_time = out
                    .iter()
                    .any(|r| matches!(r.workouts[j].score, Score::Time(_)));
                if any_time {
                    apply_predictions(&mut out, j, cap, target);
                }
            }
        }
    }

    Ok(out)
}

fn is_no_attempt(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty() || s == "0"
}

/// Classify one raw score string.
///
/// In an Rx table a scaled marker means the value belongs to the wrong
/// division and becomes absent; in a scaled table the marker is stripped and
/// the value kept, while unmarked values are the foreign ones.
pub fn parse_score(raw: &str, scaled: bool) -> Score {
    let s = raw.trim();
    let s = if scaled {
        match s.strip_suffix("- s") {
            Some(stripped) => stripped.trim(),
            None => return Score::Absent,
        }
    } else {
        if s.ends_with("- s") {
            return Score::Absent;
        }
        s
    };
    if s.is_empty() || s == "0" {
        return Score::Absent;
    }
    if s.contains(':') {
        return match parse_duration_secs(s) {
            Some(secs) => Score::Time(secs),
            None => Score::Absent,
        };
    }
    let lead = s.split_whitespace().next().unwrap_or("");
    match lead.parse::<i64>() {
        Ok(v) if v > 0 => Score::Count(v),
        _ => Score::Absent,
    }
}

/// Parse "MM:SS" or "H:MM:SS" (team scores use the latter) to seconds.
pub fn parse_duration_secs(s: &str) -> Option<u32> {
    let fields: Option<Vec<u32>> = s
        .split(':')
        .map(|f| f.trim().parse::<u32>().ok())
        .collect();
    match fields?.as_slice() {
        [m, sec] => Some(m * 60 + sec),
        [h, m, sec] => Some(h * 3600 + m * 60 + sec),
        _ => None,
    }
}

pub fn format_duration(secs: u32) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Height string ("5'9\"", "175 cm", "69 in") to meters.
pub fn height_to_meters(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Some(rest) = s.strip_suffix('"') {
        let (feet, inches) = rest.split_once('\'')?;
        let feet: u32 = feet.trim().parse().ok()?;
        let inches: u32 = inches.trim().parse().ok()?;
        return Some(round2(f64::from(feet * 12 + inches) * 2.54 / 100.0));
    }
    if let Some(rest) = s.strip_suffix("cm") {
        return rest.trim().parse::<f64>().ok().map(|cm| cm / 100.0);
    }
    if let Some(rest) = s.strip_suffix("in") {
        return rest
            .trim()
            .parse::<f64>()
            .ok()
            .map(|inches| round2(inches * 2.54 / 100.0));
    }
    None
}

/// Weight string ("124 lb", "84 kg") to whole kilograms.
pub fn weight_to_kg(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Some(rest) = s.strip_suffix("kg") {
        return rest.trim().parse::<f64>().ok().map(f64::round);
    }
    if let Some(rest) = s.strip_suffix("lb") {
        return rest.trim().parse::<f64>().ok().map(|lb| (lb / 2.2046).round());
    }
    None
}

/// Percentiles evenly spaced from 100 (best) down to 0 (worst), rounded to
/// four decimals. A population of one gets 0.0.
pub fn spaced_percentiles(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.0];
    }
    (0..n)
        .map(|i| round4(100.0 * (n - 1 - i) as f64 / (n - 1) as f64))
        .collect()
}

/// A value equal to its predecessor in best-to-worst order inherits the
/// predecessor's percentile instead of its own evenly-spaced slot.
pub fn inherit_tied_percentiles<T: PartialEq>(values: &[T], pct: &mut [f64]) {
    for i in 1..values.len().min(pct.len()) {
        if values[i] == values[i - 1] {
            pct[i] = pct[i - 1];
        }
    }
}

/// Percentiles for workout `j`: times sorted ascending come first (finishing
/// beats any rep count), then counts sorted descending. Absent scores are
/// excluded from the population and keep a null percentile.
fn apply_workout_percentiles(rows: &mut [CleanRow], j: usize) {
    let mut times: Vec<(usize, u32)> = Vec::new();
    let mut counts: Vec<(usize, i64)> = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        match row.workouts[j].score {
            Score::Time(t) => times.push((idx, t)),
            Score::Count(c) => counts.push((idx, c)),
            Score::Absent => {}
        }
    }
    times.sort_by_key(|&(_, t)| t);
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let ordered: Vec<(usize, Score)> = times
        .into_iter()
        .map(|(idx, t)| (idx, Score::Time(t)))
        .chain(counts.into_iter().map(|(idx, c)| (idx, Score::Count(c))))
        .collect();
    let values: Vec<Score> = ordered.iter().map(|&(_, s)| s).collect();
    let mut pct = spaced_percentiles(ordered.len());
    inherit_tied_percentiles(&values, &mut pct);
    for (&(idx, _), p) in ordered.iter().zip(&pct) {
        rows[idx].workouts[j].percentile = Some(*p);
    }
}

/// Constant-pace extrapolation across the two completion modes of a capped
/// workout, so capped and uncapped performances land on one scale. Assumes
/// rep pace holds to the end, which flatters nobody in particular.
fn apply_predictions(rows: &mut [CleanRow], j: usize, cap: u32, target: u32) {
    for row in rows.iter_mut() {
        let w = &mut row.workouts[j];
        match w.score {
            Score::Time(t) => {
                w.predicted_time_secs = Some(t);
                if t > 0 {
                    let more =
                        ((f64::from(cap) - f64::from(t)) * f64::from(target) / f64::from(t))
                            .round() as i64;
                    w.predicted_reps = Some((i64::from(target) + more).max(0) as u32);
                }
            }
            Score::Count(c) => {
                w.predicted_reps = Some(c.max(0) as u32);
                let more =
                    ((f64::from(target) - c as f64) * f64::from(cap) / c as f64).round() as i64;
                w.predicted_time_secs = Some((i64::from(cap) + more).max(0) as u32);
            }
            Score::Absent => {}
        }
    }
}

fn parse_int<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}
