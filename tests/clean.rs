use cfopen::clean::{
    CleanJob, Score, clean_job_from_key, clean_table, format_duration, height_to_meters,
    inherit_tied_percentiles, parse_duration_secs, parse_score, spaced_percentiles, weight_to_kg,
};
use cfopen::leaderboard::{AthleteRow, WorkoutScore};
use cfopen::schema::{ResponseLayout, ScoreUnit, Workout, WorkoutSchema};

fn row(rank: u64, scores: &[&str]) -> AthleteRow {
    AthleteRow {
        competitor_id: format!("{}", 1000 + rank),
        name: format!("Athlete {rank}"),
        height: "5'9\"".to_string(),
        weight: "165 lb".to_string(),
        age: "30".to_string(),
        region_id: "14".to_string(),
        region_name: "North East".to_string(),
        affiliate_id: "4".to_string(),
        overall_rank: rank.to_string(),
        overall_score: rank.to_string(),
        workouts: scores
            .iter()
            .map(|s| WorkoutScore {
                rank: "1".to_string(),
                score: (*s).to_string(),
            })
            .collect(),
    }
}

/// Single capped time/reps workout, 10 minute cap, 100 reps to finish.
fn capped_schema() -> WorkoutSchema {
    WorkoutSchema {
        year: 2017,
        layout: ResponseLayout::Flat,
        workouts: vec![Workout {
            label: "17.1",
            unit: ScoreUnit::TimeOrReps,
            predictions: true,
            time_cap_secs: Some(600),
            target_reps: Some(100),
        }],
    }
}

fn rx() -> CleanJob {
    CleanJob {
        year: 2017,
        scaled: false,
        team: false,
    }
}

fn sc() -> CleanJob {
    CleanJob {
        year: 2017,
        scaled: true,
        team: false,
    }
}

#[test]
fn durations_parse_and_format() {
    assert_eq!(parse_duration_secs("8:32"), Some(512));
    assert_eq!(parse_duration_secs("1:02:15"), Some(3735));
    assert_eq!(parse_duration_secs("not:a:time"), None);
    assert_eq!(format_duration(512), "8:32");
    assert_eq!(format_duration(3735), "1:02:15");
}

#[test]
fn untied_percentiles_are_evenly_spaced() {
    assert_eq!(spaced_percentiles(5), vec![100.0, 75.0, 50.0, 25.0, 0.0]);
    assert_eq!(spaced_percentiles(2), vec![100.0, 0.0]);
    assert!(spaced_percentiles(0).is_empty());
}

#[test]
fn tied_value_inherits_predecessor_percentile() {
    let values = [10i64, 9, 9, 8];
    let mut pct = spaced_percentiles(values.len());
    inherit_tied_percentiles(&values, &mut pct);
    assert_eq!(pct, vec![100.0, 66.6667, 66.6667, 0.0]);
}

#[test]
fn height_and_weight_convert_to_si() {
    assert_eq!(height_to_meters("5'9\""), Some(1.75));
    assert_eq!(height_to_meters("175 cm"), Some(1.75));
    assert_eq!(height_to_meters("69 in"), Some(1.75));
    assert_eq!(height_to_meters(""), None);
    assert_eq!(height_to_meters("tall"), None);

    assert_eq!(weight_to_kg("124 lb"), Some(56.0));
    assert_eq!(weight_to_kg("84 kg"), Some(84.0));
    assert_eq!(weight_to_kg(""), None);
}

#[test]
fn scores_classify_by_shape() {
    assert_eq!(parse_score("8:32", false), Score::Time(512));
    assert_eq!(parse_score("145 reps", false), Score::Count(145));
    assert_eq!(parse_score("225 lb", false), Score::Count(225));
    assert_eq!(parse_score("", false), Score::Absent);
    assert_eq!(parse_score("0", false), Score::Absent);
    assert_eq!(parse_score("0 reps", false), Score::Absent);
    assert_eq!(parse_score("garbled", false), Score::Absent);
}

#[test]
fn scaled_marker_is_wrong_division_in_rx() {
    assert_eq!(parse_score("12:01 - s", false), Score::Absent);
    assert_eq!(parse_score("95 reps - s", false), Score::Absent);
}

#[test]
fn scaled_tables_keep_marked_scores_only() {
    assert_eq!(parse_score("12:01 - s", true), Score::Time(721));
    assert_eq!(parse_score("95 reps - s", true), Score::Count(95));
    // An unmarked score in a scaled table came from the Rx division.
    assert_eq!(parse_score("12:01", true), Score::Absent);
    assert_eq!(parse_score("0 - s", true), Score::Absent);
}

#[test]
fn capped_workout_predictions_use_constant_pace() {
    let rows = vec![row(1, &["8:00"]), row(2, &["80 reps"])];
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    assert_eq!(cleaned.len(), 2);

    // Finisher at 8:00 of a 10:00 cap: 125 predicted reps at that pace.
    let finisher = &cleaned[0].workouts[0];
    assert_eq!(finisher.score, Score::Time(480));
    assert_eq!(finisher.predicted_time_secs, Some(480));
    assert_eq!(finisher.predicted_reps, Some(125));

    // Capped at 80 of 100 reps: 150 more seconds at that pace.
    let capped = &cleaned[1].workouts[0];
    assert_eq!(capped.score, Score::Count(80));
    assert_eq!(capped.predicted_time_secs, Some(750));
    assert_eq!(capped.predicted_reps, Some(80));
}

#[test]
fn times_always_beat_rep_counts_in_percentiles() {
    let rows = vec![
        row(1, &["10:00"]),
        row(2, &["12:00"]),
        row(3, &["95 reps"]),
        row(4, &["90 reps"]),
    ];
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    let pct: Vec<Option<f64>> = cleaned.iter().map(|r| r.workouts[0].percentile).collect();
    assert_eq!(
        pct,
        vec![Some(100.0), Some(66.6667), Some(33.3333), Some(0.0)]
    );
}

#[test]
fn absent_scores_get_no_percentile() {
    // Scaled job so the all-absent row survives to keep a null percentile.
    let rows = vec![
        row(1, &["10:00 - s"]),
        row(2, &["8:00 - s"]),
        row(3, &[""]),
    ];
    let cleaned = clean_table(&rows, &capped_schema(), sc()).expect("table should clean");
    assert_eq!(cleaned.len(), 3);
    assert_eq!(cleaned[0].workouts[0].percentile, Some(0.0));
    assert_eq!(cleaned[1].workouts[0].percentile, Some(100.0));
    assert_eq!(cleaned[2].workouts[0].percentile, None);
    assert_eq!(cleaned[2].workouts[0].score, Score::Absent);
}

#[test]
fn rx_drops_all_absent_rows_scaled_keeps_them() {
    let rows = vec![
        row(1, &["8:00"]),
        row(2, &["95 reps - s"]),
        row(3, &["7:30"]),
    ];
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    // Row 2 only had a scaled score, which is absent in an Rx table.
    assert_eq!(cleaned.len(), 2);
    assert_eq!(cleaned[0].overall_rank, 1);
    assert_eq!(cleaned[1].overall_rank, 3);

    let scaled_rows = vec![row(1, &["8:00"]), row(2, &["95 reps - s"])];
    let cleaned = clean_table(&scaled_rows, &capped_schema(), sc()).expect("table should clean");
    assert_eq!(cleaned.len(), 2);
    assert_eq!(cleaned[0].workouts[0].score, Score::Absent);
    assert_eq!(cleaned[1].workouts[0].score, Score::Count(95));
}

#[test]
fn trailing_no_attempt_rows_are_trimmed() {
    let rows = vec![
        row(1, &["8:00"]),
        row(2, &[""]),
        row(3, &["7:30"]),
        row(4, &["0"]),
        row(5, &[""]),
    ];
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    // Ranks 4 and 5 are the trailing never-attempted block; rank 2 is a
    // mid-table no-show removed by the all-absent rule.
    assert_eq!(cleaned.len(), 2);
    let ranks: Vec<u64> = cleaned.iter().map(|r| r.overall_rank).collect();
    assert_eq!(ranks, vec![1, 3]);
}

#[test]
fn overall_percentile_ties_share_a_value() {
    let mut rows = vec![
        row(1, &["8:00"]),
        row(2, &["9:00"]),
        row(2, &["9:00"]),
        row(4, &["10:00"]),
    ];
    // Same rank twice is a tie on overall score.
    rows[2].name = "Athlete 2b".to_string();
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    let pct: Vec<f64> = cleaned.iter().map(|r| r.overall_percentile).collect();
    assert_eq!(pct, vec![100.0, 66.6667, 66.6667, 0.0]);
}

#[test]
fn misordered_table_is_fatal() {
    let rows = vec![row(5, &["8:00"]), row(6, &["9:00"])];
    let err = clean_table(&rows, &capped_schema(), rx()).unwrap_err();
    assert!(err.to_string().contains("rank"));
}

#[test]
fn empty_table_is_fatal() {
    assert!(clean_table(&[], &capped_schema(), rx()).is_err());
}

#[test]
fn attributes_are_typed() {
    let rows = vec![row(1, &["8:00"])];
    let cleaned = clean_table(&rows, &capped_schema(), rx()).expect("table should clean");
    let athlete = &cleaned[0];
    assert_eq!(athlete.competitor_id, Some(1001));
    assert_eq!(athlete.height_m, Some(1.75));
    assert_eq!(athlete.weight_kg, Some(75.0));
    assert_eq!(athlete.age, Some(30));
    assert_eq!(athlete.region_id, Some(14));
    assert_eq!(athlete.affiliate_id, Some(4));
    assert_eq!(athlete.overall_percentile, 0.0);
}

#[test]
fn clean_jobs_derive_from_table_keys() {
    let job = clean_job_from_key("Men_Rx_2017_raw").expect("key should parse");
    assert_eq!(job.year, 2017);
    assert!(!job.scaled);
    assert!(!job.team);

    let job = clean_job_from_key("Team_Sc_2018_raw").expect("key should parse");
    assert_eq!(job.year, 2018);
    assert!(job.scaled);
    assert!(job.team);

    let job = clean_job_from_key("Women_45-49_Rx_2017_raw").expect("key should parse");
    assert_eq!(job.year, 2017);
    assert!(!job.scaled);

    assert!(clean_job_from_key("Men_2017").is_err());
    assert!(clean_job_from_key("Men_Open_2017_raw").is_err());
}
