use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::CheckpointDir;
use crate::fetch;
use crate::http_client::http_client;
use crate::persist;

const MAP_URL_BASE: &str = "https://map.crossfit.com";
// The id range the directory endpoint answers for; see
// map.crossfit.com/getAllAffiliates.php for the full roster.
const FIRST_AFFILIATE_ID: u32 = 3;
const LAST_AFFILIATE_ID: u32 = 21363;
const AFFILIATE_BATCH: u32 = 100;

/// One gym of the affiliate directory. Coordinates stay absent unless the
/// gym appears in the bulk coordinate feed; (0, 0) is a valid coordinate and
/// never used as a missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateRecord {
    pub affiliate_id: u32,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub website: String,
    pub phone: String,
    pub coords: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct AffiliateReport {
    pub total: usize,
    pub geocoded: usize,
}

/// Download the whole affiliate directory over the numeric id range, batch
/// by batch with per-batch checkpoints, then join coordinates from the bulk
/// feed and persist `Affiliate_list`.
pub fn download_affiliate_list(ddir: &Path) -> Result<AffiliateReport> {
    let client = http_client()?;
    let url = format!("{MAP_URL_BASE}/getAffiliateInfo");
    let ckpt = CheckpointDir::create(ddir, "Affiliate_list")?;

    let mut start = FIRST_AFFILIATE_ID;
    let mut batches = 0usize;
    while start <= LAST_AFFILIATE_ID {
        let count = AFFILIATE_BATCH.min(LAST_AFFILIATE_ID - start + 1);
        println!(
            "[{}] getting affiliate ids {start}-{} of {FIRST_AFFILIATE_ID}-{LAST_AFFILIATE_ID}",
            Utc::now().format("%H:%M:%S"),
            start + count - 1
        );
        let begun = Instant::now();
        let pages = fetch::fetch_pages(client, &url, &[], "aid", start, count)?;
        let rows: Vec<AffiliateRecord> = pages
            .iter()
            .filter_map(|p| parse_affiliate_info(p.page, &p.body))
            .collect();
        ckpt.write_batch(batches, &rows)?;
        println!(
            "that took {:.2} minutes",
            begun.elapsed().as_secs_f64() / 60.0
        );
        batches += 1;
        start += count;
    }

    let mut table = ckpt.assemble(|r: &AffiliateRecord| r.affiliate_id)?;

    let feed = fetch::fetch_json(client, &format!("{MAP_URL_BASE}/getAllAffiliates.php"), &[])
        .context("affiliate coordinate feed fetch failed")?;
    let coords = parse_coordinate_feed(&feed)?;
    let mut geocoded = 0usize;
    for row in &mut table {
        if let Some(&c) = coords.get(&row.affiliate_id) {
            row.coords = Some(c);
            geocoded += 1;
        }
    }

    persist::save_affiliate_table(ddir, &table)?;
    Ok(AffiliateReport {
        total: table.len(),
        geocoded,
    })
}

/// Parse one `getAffiliateInfo` payload. A "not found" response carries a
/// null name; those ids yield no record.
pub fn parse_affiliate_info(aid: u32, body: &Value) -> Option<AffiliateRecord> {
    let name = body.get("name")?.as_str()?;
    Some(AffiliateRecord {
        affiliate_id: aid,
        name: name.to_string(),
        address: field(body, "address"),
        city: field(body, "city"),
        state: field(body, "state"),
        zip: field(body, "zip"),
        country: field(body, "country"),
        website: field(body, "website"),
        phone: field(body, "phone"),
        coords: None,
    })
}

/// The bulk feed is an array of `[lat, lon, _, affiliate_id, ...]` tuples.
/// Malformed entries are skipped rather than failing the join.
pub fn parse_coordinate_feed(feed: &Value) -> Result<HashMap<u32, (f64, f64)>> {
    let rows = feed
        .as_array()
        .ok_or_else(|| anyhow!("coordinate feed is not an array"))?;
    let mut out = HashMap::with_capacity(rows.len());
    for row in rows {
        let Some(items) = row.as_array() else {
            continue;
        };
        let (Some(lat), Some(lon), Some(aid)) = (
            items.first().and_then(number),
            items.get(1).and_then(number),
            items.get(3).and_then(number),
        ) else {
            continue;
        };
        if aid < 0.0 || aid.fract() != 0.0 {
            continue;
        }
        out.insert(aid as u32, (lat, lon));
    }
    Ok(out)
}

fn field(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
