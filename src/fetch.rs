use std::env;

use anyhow::{Context, Result};
use rayon::prelude::*;
use reqwest::blocking::Client;
use serde_json::Value;

/// One decoded page of a paginated endpoint.
#[derive(Debug, Clone)]
pub struct FetchPage {
    pub page: u32,
    pub body: Value,
}

/// GET a single URL with fixed query parameters and decode the body as JSON.
pub fn fetch_json(client: &Client, url: &str, query: &[(&str, String)]) -> Result<Value> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("empty response body"));
    }
    serde_json::from_str(trimmed).context("invalid json body")
}

/// Fetch pages `[start, start + count)` with bounded fan-out.
///
/// Every page in the range is attempted exactly once; at most
/// `FETCH_PARALLELISM` requests are in flight at any instant. Results come
/// back in no particular page order and any single page failure fails the
/// whole range.
pub fn fetch_pages(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    page_param: &str,
    start: u32,
    count: u32,
) -> Result<Vec<FetchPage>> {
    let pages: Vec<u32> = (start..start + count).collect();
    with_fetch_pool(count as usize, || {
        pages
            .par_iter()
            .map(|&page| {
                let mut q: Vec<(&str, String)> = query.to_vec();
                q.push((page_param, page.to_string()));
                let body = fetch_json(client, url, &q)
                    .with_context(|| format!("{page_param} {page} fetch failed"))?;
                Ok(FetchPage { page, body })
            })
            .collect::<Result<Vec<_>>>()
    })
}

fn with_fetch_pool<T>(pending: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    let threads = fetch_parallelism().min(pending.max(1));
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

pub fn fetch_parallelism() -> usize {
    env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(6)
        .clamp(2, 32)
}
