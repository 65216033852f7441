use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::CheckpointDir;
use crate::fetch;
use crate::http_client::http_client;
use crate::persist;
use crate::schema::{ResponseLayout, WorkoutSchema, division_name, scaled_name};

const LEADERBOARD_URL_BASE: &str =
    "https://games.crossfit.com/competitions/api/v1/competitions/open";

/// One competitor's record for one competition year, kept as the endpoint
/// sent it. Typing happens in the clean stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthleteRow {
    pub competitor_id: String,
    pub name: String,
    pub height: String,
    pub weight: String,
    pub age: String,
    pub region_id: String,
    pub region_name: String,
    pub affiliate_id: String,
    pub overall_rank: String,
    pub overall_score: String,
    pub workouts: Vec<WorkoutScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutScore {
    pub rank: String,
    pub score: String,
}

impl AthleteRow {
    /// Overall rank as a number for sorting; unparseable ranks sort last.
    pub fn overall_rank_num(&self) -> u64 {
        self.overall_rank.trim().parse().unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub table_key: String,
    pub pages: u32,
    pub batches: usize,
    pub rows: usize,
}

/// Download one division's leaderboard for one year: probe the page count,
/// fetch in sequential batches with bounded fan-out inside each batch,
/// checkpoint every batch, then assemble and persist the canonical raw table.
pub fn download_leaderboard(
    year: u16,
    division: u8,
    scaled: u8,
    ddir: &Path,
    batch_override: Option<u32>,
) -> Result<DownloadReport> {
    let schema = WorkoutSchema::for_year(year)?;
    let table_key = format!(
        "{}_{}_{}_raw",
        division_name(division)?,
        scaled_name(scaled)?,
        year
    );

    let client = http_client()?;
    let url = format!("{LEADERBOARD_URL_BASE}/{year}/leaderboards");
    let query = leaderboard_query(division, scaled);

    // The endpoint reports its own total-page count in-band.
    let mut probe_query = query.clone();
    probe_query.push(("page", "1".to_string()));
    let probe = fetch::fetch_json(client, &url, &probe_query)
        .context("leaderboard page-count probe failed")?;
    let npages = total_pages(&probe, schema.layout)?;
    if npages == 0 {
        bail!("leaderboard for {table_key} reports zero pages");
    }

    let batch = match batch_override {
        Some(0) => bail!("batch size must be at least 1"),
        Some(b) if b > npages => bail!(
            "batch size {b} exceeds page count {npages} for {table_key}"
        ),
        Some(b) => b,
        None => default_batch_pages(npages),
    };

    let ckpt = CheckpointDir::create(ddir, &table_key)?;
    let mut start = 1u32;
    let mut batches = 0usize;
    let mut rows_total = 0usize;
    while start <= npages {
        let count = batch.min(npages - start + 1);
        println!(
            "[{}] getting pages {start}-{} of {npages}",
            Utc::now().format("%H:%M:%S"),
            start + count - 1
        );
        let begun = Instant::now();
        let pages = fetch::fetch_pages(client, &url, &query, "page", start, count)?;
        let mut rows = Vec::new();
        for page in &pages {
            rows.extend(
                extract_rows(&page.body, &schema)
                    .with_context(|| format!("page {} has unexpected shape", page.page))?,
            );
        }
        ckpt.write_batch(batches, &rows)?;
        println!(
            "that took {:.2} minutes",
            begun.elapsed().as_secs_f64() / 60.0
        );
        rows_total += rows.len();
        batches += 1;
        start += count;
    }

    let table = ckpt.assemble(|row: &AthleteRow| row.overall_rank_num())?;
    persist::save_raw_table(ddir, &table_key, &schema, &table)?;

    Ok(DownloadReport {
        table_key,
        pages: npages,
        batches,
        rows: rows_total,
    })
}

fn leaderboard_query(division: u8, scaled: u8) -> Vec<(&'static str, String)> {
    vec![
        ("division", division.to_string()),
        ("scaled", scaled.to_string()),
        ("sort", "0".to_string()),
        ("fittest", "1".to_string()),
        ("fittest1", "0".to_string()),
        ("occupation", "0".to_string()),
        ("competition", "1".to_string()),
    ]
}

/// Small result sets fetch in one or two gulps; large ones cap peak memory
/// and in-flight work per batch.
pub fn default_batch_pages(npages: u32) -> u32 {
    if npages <= 10 {
        npages
    } else if npages <= 100 {
        10
    } else if npages <= 1000 {
        50
    } else {
        100
    }
}

/// Pull the total-page count out of a leaderboard payload.
pub fn total_pages(body: &Value, layout: ResponseLayout) -> Result<u32> {
    let raw = match layout {
        ResponseLayout::Flat => body.get("totalpages"),
        ResponseLayout::EntrantNested => body
            .get("pagination")
            .and_then(|p| p.get("totalPages")),
    };
    let raw = raw.ok_or_else(|| anyhow!("leaderboard response has no page count"))?;
    match raw {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| anyhow!("page count {n} out of range")),
        Value::String(s) => s
            .trim()
            .parse::<u32>()
            .with_context(|| format!("page count {s:?} is not a number")),
        other => Err(anyhow!("page count has unexpected type: {other}")),
    }
}

/// Flatten one decoded leaderboard page into athlete rows.
pub fn extract_rows(body: &Value, schema: &WorkoutSchema) -> Result<Vec<AthleteRow>> {
    match schema.layout {
        ResponseLayout::Flat => extract_rows_flat(body, schema.workout_count()),
        ResponseLayout::EntrantNested => extract_rows_nested(body, schema.workout_count()),
    }
}

fn extract_rows_flat(body: &Value, workout_count: usize) -> Result<Vec<AthleteRow>> {
    let athletes = body
        .get("athletes")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing athletes array"))?;
    let mut rows = Vec::with_capacity(athletes.len());
    for athlete in athletes {
        let workouts = extract_scores(
            athlete.get("scores"),
            workout_count,
            "workoutrank",
            "scoredisplay",
        )?;
        rows.push(AthleteRow {
            competitor_id: text(athlete.get("userid")),
            name: text(athlete.get("name")),
            height: text(athlete.get("height")),
            weight: text(athlete.get("weight")),
            age: text(athlete.get("age")),
            region_id: text(athlete.get("regionid")),
            region_name: text(athlete.get("region")),
            affiliate_id: text(athlete.get("affiliateid")),
            overall_rank: text(athlete.get("overallrank")),
            overall_score: text(athlete.get("overallscore")),
            workouts,
        });
    }
    Ok(rows)
}

fn extract_rows_nested(body: &Value, workout_count: usize) -> Result<Vec<AthleteRow>> {
    let entries = body
        .get("leaderboardRows")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing leaderboardRows array"))?;
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let entrant = entry
            .get("entrant")
            .ok_or_else(|| anyhow!("leaderboard row has no entrant"))?;
        let workouts =
            extract_scores(entry.get("scores"), workout_count, "rank", "scoreDisplay")?;
        rows.push(AthleteRow {
            competitor_id: text(entrant.get("competitorId")),
            name: text(entrant.get("competitorName")),
            height: text(entrant.get("height")),
            weight: text(entrant.get("weight")),
            age: text(entrant.get("age")),
            region_id: text(entrant.get("regionId")),
            region_name: text(entrant.get("regionName")),
            affiliate_id: text(entrant.get("affiliateId")),
            overall_rank: text(entry.get("overallRank")),
            overall_score: text(entry.get("overallScore")),
            workouts,
        });
    }
    Ok(rows)
}

fn extract_scores(
    scores: Option<&Value>,
    workout_count: usize,
    rank_key: &str,
    score_key: &str,
) -> Result<Vec<WorkoutScore>> {
    let scores = scores
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("athlete record has no scores array"))?;
    if scores.len() < workout_count {
        bail!(
            "athlete has {} scores, schema expects {workout_count}",
            scores.len()
        );
    }
    Ok(scores[..workout_count]
        .iter()
        .map(|s| WorkoutScore {
            rank: text(s.get(rank_key)),
            score: text(s.get(score_key)),
        })
        .collect())
}

/// String/number-agnostic field read; missing and null become "".
fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
