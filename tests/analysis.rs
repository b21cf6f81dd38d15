//! Integration tests for the wave analysis pipeline.
//!
//! These run the public API end to end: ingestion, date filtering, detection,
//! enumeration, Fibonacci evaluation and simulation.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wavefib::prelude::*;

fn day(d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 2, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

const FIVE_ROWS: [&str; 6] = [
    "Date,Open,High,Low,Close,Volume",
    "2021-02-01,10,12,9,11,100",
    "2021-02-02,11,15,10,14,100",
    "2021-02-03,14,14,11,12,100",
    "2021-02-04,12,13,8,9,100",
    "2021-02-05,9,10,7,8,100",
];

/// The five-row fixture plus one bar so the low at index 4 has a right neighbour
fn extended() -> Series {
    let mut rows = FIVE_ROWS.to_vec();
    rows.push("2021-02-06,8,11,7.5,10,100");
    Series::ingest(rows).series
}

/// Two swings: up to 2/2, down to 2/5, up to 2/9, down to 2/12
fn swings() -> Series {
    Series::ingest([
        "Date Open High Low Close Volume",
        "2021-02-01 10 11 9 10.5 1000",
        "2021-02-02 10.5 14 10 13 1000",
        "2021-02-03 13 13.5 11 11.5 1000",
        "2021-02-04 11.5 12 9 9.5 1000",
        "2021-02-05 9.5 10 8 9 1000",
        "2021-02-06 9 11 8.5 10.5 1000",
        "2021-02-07 10.5 13 10 12.5 1000",
        "2021-02-08 12.5 15 12 14.5 1000",
        "2021-02-09 14.5 16 13 13.5 1000",
        "2021-02-10 13.5 14 11 11.5 1000",
        "2021-02-11 11.5 12 10 10.5 1000",
        "2021-02-12 10.5 11 9.5 10 1000",
        "2021-02-13 10 12 10 11.5 1000",
    ])
    .series
}

fn analyzer(margin: usize) -> WaveAnalyzer {
    AnalyzerBuilder::new().margin(Margin::new(margin).unwrap()).build().unwrap()
}

// ============================================================
// INGESTION
// ============================================================

#[test]
fn test_unparseable_high_ingests_as_zero() {
    let ingest = Series::ingest(["Date,Open,High,Low,Close,Volume", "2021-02-01,10,abc,9,11,100"]);
    assert_eq!(ingest.series.len(), 1);
    assert_eq!(ingest.series.bars()[0].high, Decimal::ZERO);
    assert_eq!(ingest.rows_dropped, 0);
}

#[test]
fn test_unparseable_date_is_dropped() {
    let mut rows = FIVE_ROWS.to_vec();
    rows.insert(3, "notadate,10,12,9,11,100");
    let ingest = Series::ingest(rows.iter());

    assert_eq!(ingest.series.len(), rows.len() - 1 - 1);
    assert_eq!(ingest.rows_dropped, 1);
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("wavefib-{}.csv", std::process::id()));
    std::fs::write(&path, FIVE_ROWS.join("\n")).unwrap();

    let ingest = Series::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(ingest.series.len(), 5);
    assert_eq!(ingest.delimiter, Some(Delimiter::Comma));
}

// ============================================================
// DETECTION
// ============================================================

#[test]
fn test_five_row_scenario() {
    let series = Series::ingest(FIVE_ROWS).series;
    let analysis = analyzer(1).analyze_all(&series);

    let peaks: Vec<usize> = analysis.extrema.peaks.iter().map(|p| p.index).collect();
    assert_eq!(peaks, vec![1]);
    assert_eq!(analysis.extrema.peaks[0].price, dec!(15));
    // index 4 sits on the boundary
    assert!(analysis.extrema.valleys.is_empty());
}

#[test]
fn test_valley_needs_right_context() {
    let series = extended();
    let analysis = analyzer(1).analyze_all(&series);

    assert_eq!(analysis.extrema.valleys.len(), 1);
    assert_eq!(analysis.extrema.valleys[0].index, 4);
    assert_eq!(analysis.extrema.valleys[0].price, dec!(7));
    assert_eq!(analysis.extrema.valleys[0].date, day(5));
}

#[test]
fn test_swings_with_default_margin() {
    let series = swings();
    let analysis = WaveAnalyzer::default().analyze_all(&series);

    let peaks: Vec<usize> = analysis.extrema.peaks.iter().map(|p| p.index).collect();
    let valleys: Vec<usize> = analysis.extrema.valleys.iter().map(|p| p.index).collect();
    assert_eq!(peaks, vec![8]);
    assert_eq!(valleys, vec![4]);

    let descriptions: Vec<String> =
        analysis.waves.iter().map(|w| w.describe(&analysis.view).unwrap()).collect();
    assert_eq!(descriptions, vec!["2/5/2021 - 2/9/2021"]);
}

#[test]
fn test_date_filter_reindexes() {
    let series = swings();
    let analysis = analyzer(1).analyze(&series, day(4), day(13));

    assert_eq!(analysis.view.len(), 10);
    assert_eq!(analysis.view.source_len(), 13);
    // 2/5 is position 1 in the filtered view
    assert!(analysis.extrema.valleys.iter().any(|v| v.index == 1 && v.date == day(5)));
}

// ============================================================
// FIBONACCI
// ============================================================

#[test]
fn test_up_wave_levels_and_confirmations() {
    let series = swings();
    let analyzer = analyzer(2);
    let analysis = analyzer.analyze_all(&series);
    let wave = analysis.find_wave("2/5/2021 - 2/9/2021").unwrap();
    assert!(wave.is_up());

    // start high 10, end low 13: direction comes from the prices
    let levels = analyzer.levels(&wave, &analysis.view, None).unwrap();
    let prices: Vec<Decimal> = levels.iter().map(|l| l.price).collect();
    assert_eq!(
        prices,
        vec![dec!(10), dec!(10.708), dec!(11.146), dec!(11.5), dec!(11.854), dec!(12.292), dec!(13)]
    );

    let hits = analyzer.confirmations(&wave, &analysis.view, &levels).unwrap();
    assert_eq!(hits.len(), analysis.view.len());
    assert!(hits.iter().all(|c| levels.contains(&c.level)));
}

#[test]
fn test_outside_wave_scope_from_builder() {
    let series = swings();
    let analyzer = AnalyzerBuilder::new()
        .margin(Margin::new(2).unwrap())
        .confirmation_scope(ConfirmationScope::OutsideWave)
        .build()
        .unwrap();
    let analysis = analyzer.analyze_all(&series);
    let wave = analysis.waves[0];

    let levels = analyzer.levels(&wave, &analysis.view, None).unwrap();
    let hits = analyzer.confirmations(&wave, &analysis.view, &levels).unwrap();
    assert!(hits.iter().all(|c| !wave.contains(c.index)));
    assert!(!hits.is_empty());
}

// ============================================================
// SIMULATION
// ============================================================

#[test]
fn test_simulation_scenario() {
    let series = extended();
    let analyzer = AnalyzerBuilder::new()
        .margin(Margin::new(1).unwrap())
        .simulation_range(Ratio::new(dec!(0.5)).unwrap())
        .max_steps(StepCount::new(4).unwrap())
        .build()
        .unwrap();
    let analysis = analyzer.analyze_all(&series);
    let wave = *analysis.down_waves().next().unwrap();

    let mut clock = SimulationClock::default();
    analyzer.start(&mut clock, wave, &analysis.view).unwrap();
    assert_eq!(clock.state(), ClockState::Running);

    for expected in 1..=4 {
        match clock.tick().unwrap() {
            Tick::Advanced { step, .. } => assert_eq!(step, expected),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(clock.step(), 4);
    assert_eq!(clock.price(), clock.target_price());

    assert_eq!(clock.tick().unwrap(), Tick::Completed { step: 4 });
    assert_eq!(clock.state(), ClockState::Paused);
    assert_eq!(clock.step(), 4);
}

#[test]
fn test_simulation_reveals_levels_progressively() {
    let series = extended();
    let analyzer = analyzer(1);
    let analysis = analyzer.analyze_all(&series);
    let wave = analysis.waves[0];

    let mut clock = SimulationClock::default();
    analyzer.select(&mut clock, wave, &analysis.view).unwrap();
    clock.step_by(8).unwrap();

    let retracement = Retracement::simulated(&wave, &analysis.view, &clock).unwrap();
    assert_eq!(retracement.end_price(), clock.price());
    let partial = retracement.levels(Some(clock.completion()));
    let full = retracement.levels(None);
    assert!(partial.len() < full.len());
    assert!(partial.iter().zip(&full).all(|(a, b)| a == b));
}

// ============================================================
// SERIALIZATION
// ============================================================

#[test]
fn test_report_json_shape() {
    let a = swings();
    let b = extended();
    let instruments: Vec<(&str, &Series)> = vec![("SWING", &a), ("EXT", &b)];
    let reports = analyze_parallel(&analyzer(1), instruments, day(1), day(28));

    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[0]["symbol"], "SWING");
    assert_eq!(json[0]["status"]["status"], "ready");
    assert_eq!(json[0]["status"]["bars"], 13);
    assert_eq!(json[1]["waves"][0]["direction"], "down");
    assert!(json[1]["extrema"]["peaks"].is_array());
}
