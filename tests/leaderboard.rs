use std::fs;
use std::path::PathBuf;

use cfopen::leaderboard::{default_batch_pages, extract_rows, total_pages};
use cfopen::schema::{ResponseLayout, WorkoutSchema};

fn read_fixture(name: &str) -> serde_json::Value {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    let raw = fs::read_to_string(path).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

#[test]
fn flat_layout_reports_total_pages() {
    let body = read_fixture("leaderboard_flat.json");
    assert_eq!(
        total_pages(&body, ResponseLayout::Flat).expect("page count should parse"),
        4297
    );
}

#[test]
fn nested_layout_reports_total_pages() {
    let body = read_fixture("leaderboard_nested.json");
    assert_eq!(
        total_pages(&body, ResponseLayout::EntrantNested).expect("page count should parse"),
        6151
    );
}

#[test]
fn wrong_layout_is_an_error() {
    let body = read_fixture("leaderboard_flat.json");
    assert!(total_pages(&body, ResponseLayout::EntrantNested).is_err());
}

#[test]
fn flat_rows_extract() {
    let body = read_fixture("leaderboard_flat.json");
    let schema = WorkoutSchema::for_year(2017).expect("2017 is supported");
    let rows = extract_rows(&body, &schema).expect("fixture should extract");
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.competitor_id, "504121");
    assert_eq!(first.name, "Mat Fraser");
    assert_eq!(first.overall_rank, "1");
    assert_eq!(first.workouts.len(), 5);
    assert_eq!(first.workouts[0].score, "17:02");
    assert_eq!(first.workouts[1].rank, "6");

    // Numeric and string ids both come through as text.
    let second = &rows[1];
    assert_eq!(second.competitor_id, "153604");
    assert_eq!(second.region_id, "11");
    assert_eq!(second.affiliate_id, "0");
}

#[test]
fn nested_rows_extract() {
    let body = read_fixture("leaderboard_nested.json");
    let schema = WorkoutSchema::for_year(2018).expect("2018 is supported");
    let rows = extract_rows(&body, &schema).expect("fixture should extract");
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.competitor_id, "469656");
    assert_eq!(first.name, "Willy Georges");
    assert_eq!(first.region_name, "Europe Central");
    assert_eq!(first.workouts.len(), 3);
    assert_eq!(first.workouts[1].score, "7:35");
    assert_eq!(first.workouts[2].score, "350 lb");

    let second = &rows[1];
    assert_eq!(second.height, "");
    assert_eq!(second.overall_rank, "2");
}

#[test]
fn short_score_arrays_are_an_error() {
    // A 2017 schema expects five scores per athlete.
    let schema = WorkoutSchema::for_year(2017).expect("2017 is supported");
    let flat_shaped = serde_json::json!({
        "athletes": [{
            "userid": 1,
            "name": "Short Row",
            "scores": [{"workoutrank": "1", "scoredisplay": "8:32"}]
        }]
    });
    assert!(extract_rows(&flat_shaped, &schema).is_err());
}

#[test]
fn unsupported_years_are_rejected() {
    assert!(WorkoutSchema::for_year(2016).is_err());
    assert!(WorkoutSchema::for_year(2024).is_err());
}

#[test]
fn batch_sizes_scale_with_page_count() {
    assert_eq!(default_batch_pages(4), 4);
    assert_eq!(default_batch_pages(60), 10);
    assert_eq!(default_batch_pages(500), 50);
    assert_eq!(default_batch_pages(6151), 100);
}
