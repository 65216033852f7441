use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::affiliates::AffiliateRecord;
use crate::clean::{CleanRow, Score, format_duration};
use crate::leaderboard::AthleteRow;
use crate::schema::WorkoutSchema;

/// Write `contents` to `path` via a sibling tmp file and rename, so a crash
/// never leaves a torn table on disk.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to swap {}", path.display()))?;
    Ok(())
}

pub fn table_path(ddir: &Path, key: &str) -> PathBuf {
    ddir.join(format!("{key}.json"))
}

/// Canonical raw table: JSON plus a CSV mirror.
pub fn save_raw_table(
    ddir: &Path,
    key: &str,
    schema: &WorkoutSchema,
    rows: &[AthleteRow],
) -> Result<()> {
    let json = serde_json::to_string(rows).context("serialize raw table")?;
    write_atomic(&table_path(ddir, key), &json)?;

    let mut header = vec![
        "Competitor_id".to_string(),
        "Name".to_string(),
        "Height".to_string(),
        "Weight".to_string(),
        "Age".to_string(),
        "Region_id".to_string(),
        "Region_name".to_string(),
        "Affiliate_id".to_string(),
        "Overall_rank".to_string(),
        "Overall_score".to_string(),
    ];
    for w in &schema.workouts {
        header.push(format!("{}_rank", w.label));
        header.push(format!("{}_score", w.label));
    }

    let mut csv = String::new();
    push_csv_line(&mut csv, &header);
    for row in rows {
        let mut fields = vec![
            row.competitor_id.clone(),
            row.name.clone(),
            row.height.clone(),
            row.weight.clone(),
            row.age.clone(),
            row.region_id.clone(),
            row.region_name.clone(),
            row.affiliate_id.clone(),
            row.overall_rank.clone(),
            row.overall_score.clone(),
        ];
        for w in &row.workouts {
            fields.push(w.rank.clone());
            fields.push(w.score.clone());
        }
        push_csv_line(&mut csv, &fields);
    }
    write_atomic(&ddir.join(format!("{key}.csv")), &csv)
}

pub fn load_raw_table(path: &Path) -> Result<Vec<AthleteRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read raw table {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid raw table {}", path.display()))
}

/// Clean table under the raw table's key minus the `_raw` suffix.
pub fn save_clean_table(
    ddir: &Path,
    key: &str,
    schema: &WorkoutSchema,
    rows: &[CleanRow],
) -> Result<()> {
    let json = serde_json::to_string(rows).context("serialize clean table")?;
    write_atomic(&table_path(ddir, key), &json)?;

    let mut header = vec![
        "Competitor_id".to_string(),
        "Name".to_string(),
        "Height_(m)".to_string(),
        "Weight_(kg)".to_string(),
        "Age".to_string(),
        "Region_id".to_string(),
        "Region_name".to_string(),
        "Affiliate_id".to_string(),
        "Overall_rank".to_string(),
        "Overall_score".to_string(),
        "Overall_percentile".to_string(),
    ];
    for w in &schema.workouts {
        header.push(format!("{}_rank", w.label));
        header.push(format!("{}_score", w.label));
        header.push(format!("{}_percentile", w.label));
        if w.predictions {
            header.push(format!("{}_predicted_time", w.label));
            header.push(format!("{}_predicted_reps", w.label));
        }
    }

    let mut csv = String::new();
    push_csv_line(&mut csv, &header);
    for row in rows {
        let mut fields = vec![
            opt_str(row.competitor_id),
            row.name.clone(),
            row.height_m.map(|h| format!("{h:.2}")).unwrap_or_default(),
            row.weight_kg.map(|w| format!("{w}")).unwrap_or_default(),
            opt_str(row.age),
            opt_str(row.region_id),
            row.region_name.clone(),
            opt_str(row.affiliate_id),
            row.overall_rank.to_string(),
            opt_str(row.overall_score),
            format!("{}", row.overall_percentile),
        ];
        for (w, wod) in row.workouts.iter().zip(&schema.workouts) {
            fields.push(opt_str(w.rank));
            fields.push(score_str(w.score));
            fields.push(w.percentile.map(|p| format!("{p}")).unwrap_or_default());
            if wod.predictions {
                fields.push(
                    w.predicted_time_secs
                        .map(format_duration)
                        .unwrap_or_default(),
                );
                fields.push(opt_str(w.predicted_reps));
            }
        }
        push_csv_line(&mut csv, &fields);
    }
    write_atomic(&ddir.join(format!("{key}.csv")), &csv)
}

pub fn save_affiliate_table(ddir: &Path, rows: &[AffiliateRecord]) -> Result<()> {
    let json = serde_json::to_string(rows).context("serialize affiliate table")?;
    write_atomic(&table_path(ddir, "Affiliate_list"), &json)?;

    let header = [
        "Affiliate_id",
        "Affiliate_name",
        "Address",
        "City",
        "State",
        "Zip",
        "Country",
        "Website",
        "Phone",
        "Latitude",
        "Longitude",
    ]
    .map(String::from);

    let mut csv = String::new();
    push_csv_line(&mut csv, &header);
    for row in rows {
        let (lat, lon) = match row.coords {
            Some((lat, lon)) => (format!("{lat}"), format!("{lon}")),
            None => (String::new(), String::new()),
        };
        let fields = [
            row.affiliate_id.to_string(),
            row.name.clone(),
            row.address.clone(),
            row.city.clone(),
            row.state.clone(),
            row.zip.clone(),
            row.country.clone(),
            row.website.clone(),
            row.phone.clone(),
            lat,
            lon,
        ];
        push_csv_line(&mut csv, &fields);
    }
    write_atomic(&ddir.join("Affiliate_list.csv"), &csv)
}

fn score_str(score: Score) -> String {
    match score {
        Score::Time(secs) => format_duration(secs),
        Score::Count(n) => n.to_string(),
        Score::Absent => String::new(),
    }
}

fn opt_str<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

fn push_csv_line(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(field));
    }
    out.push('\n');
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
