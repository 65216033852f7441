use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use cfopen::clean::{clean_job_from_key, clean_table};
use cfopen::schema::WorkoutSchema;
use cfopen::{affiliates, leaderboard, persist};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("download") => run_download(&args[1..]),
        Some("clean") => run_clean(&args[1..]),
        Some("affiliates") => run_affiliates(&args[1..]),
        _ => {
            eprintln!("usage:");
            eprintln!("  cfopen download <year> <division 1-19> <scaled 0|1> <ddir> [batch-pages]");
            eprintln!("  cfopen clean <path/to/TABLE_raw.json>");
            eprintln!("  cfopen affiliates <ddir>");
            bail!("missing or unknown subcommand");
        }
    }
}

fn run_download(args: &[String]) -> Result<()> {
    let [year, division, scaled, ddir, rest @ ..] = args else {
        bail!("download needs <year> <division> <scaled> <ddir> [batch-pages]");
    };
    let year: u16 = year.parse().context("year must be a number, e.g. 2017")?;
    let division: u8 = division.parse().context("division must be a number 1-19")?;
    let scaled: u8 = scaled.parse().context("scaled must be 0 (Rx) or 1 (Sc)")?;
    let batch = match rest {
        [] => None,
        [b] => Some(b.parse::<u32>().context("batch-pages must be a number")?),
        _ => bail!("too many arguments for download"),
    };
    let ddir = PathBuf::from(ddir);
    fs::create_dir_all(&ddir)
        .with_context(|| format!("failed to create data dir {}", ddir.display()))?;

    let report = leaderboard::download_leaderboard(year, division, scaled, &ddir, batch)?;
    println!("Download complete");
    println!("Table: {}", report.table_key);
    println!(
        "Pages: {} in {} batches, {} athletes",
        report.pages, report.batches, report.rows
    );
    Ok(())
}

fn run_clean(args: &[String]) -> Result<()> {
    let [path] = args else {
        bail!("clean needs exactly one raw table path");
    };
    let path = Path::new(path);
    let key = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("bad raw table path {}", path.display()))?;
    let job = clean_job_from_key(key)?;
    let schema = WorkoutSchema::for_year(job.year)?;
    let ddir = path.parent().unwrap_or_else(|| Path::new("."));

    let raw = persist::load_raw_table(path)?;
    println!("Cleaning {} ({} rows)", key, raw.len());
    let cleaned = clean_table(&raw, &schema, job)?;

    let clean_key = key.strip_suffix("_raw").unwrap_or(key);
    persist::save_clean_table(ddir, clean_key, &schema, &cleaned)?;
    println!("Clean complete");
    println!("Table: {clean_key}");
    println!("Rows: {} kept of {}", cleaned.len(), raw.len());
    Ok(())
}

fn run_affiliates(args: &[String]) -> Result<()> {
    let [ddir] = args else {
        bail!("affiliates needs exactly one data dir");
    };
    let ddir = PathBuf::from(ddir);
    fs::create_dir_all(&ddir)
        .with_context(|| format!("failed to create data dir {}", ddir.display()))?;

    let report = affiliates::download_affiliate_list(&ddir)?;
    println!("Affiliate download complete");
    println!(
        "Affiliates: {} total, {} with coordinates",
        report.total, report.geocoded
    );
    Ok(())
}
