//! Benchmarks for extrema detection, wave enumeration and confirmation scans.

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use wavefib::prelude::*;

/// Deterministic zigzag bars
fn generate_series(n: usize) -> Series {
  let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
  let mut price = Decimal::from(100);

  (0..n)
    .map(|i| {
      let change = Decimal::new(((i * 7 + 13) % 100) as i64 - 50, 2); // Deterministic "random"
      let volatility = Decimal::new(100 + ((i * 3) % 10) as i64 * 20, 2);

      let o = price;
      let c = price + change;
      let h = o.max(c) + volatility / Decimal::TWO;
      let l = o.min(c) - volatility / Decimal::TWO;
      price = c;

      let ts = (start + Days::new(i as u64)).and_hms_opt(0, 0, 0).unwrap();
      Bar::new(ts, o, h, l, c, 1000)
    })
    .collect()
}

fn generate_rows(n: usize) -> Vec<String> {
  let series = generate_series(n);
  std::iter::once("Date,Open,High,Low,Close,Volume".to_string())
    .chain(series.bars().iter().map(|bar| to_row(bar, Delimiter::Comma)))
    .collect()
}

fn bench_ingest(c: &mut Criterion) {
  let rows = generate_rows(1000);

  c.bench_function("ingest_1000_rows", |b| {
    b.iter(|| {
      let _ = black_box(Series::ingest(black_box(&rows)));
    })
  });
}

fn bench_detect(c: &mut Criterion) {
  let series = generate_series(1000);
  let analyzer = WaveAnalyzer::default();

  c.bench_function("detect_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(analyzer.detect(black_box(series.bars())));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let analyzer = WaveAnalyzer::default();

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let series = generate_series(*size);

    group.bench_with_input(BenchmarkId::new("analyze", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(analyzer.analyze_all(black_box(&series)));
      })
    });
  }

  group.finish();
}

fn bench_margins(c: &mut Criterion) {
  let series = generate_series(1000);

  let mut group = c.benchmark_group("margin");

  for margin in [1, 2, 4, 8].iter() {
    let analyzer = AnalyzerBuilder::new().margin(Margin::new(*margin).unwrap()).build().unwrap();

    group.bench_with_input(BenchmarkId::new("detect", margin), margin, |b, _| {
      b.iter(|| {
        let _ = black_box(analyzer.detect(black_box(series.bars())));
      })
    });
  }

  group.finish();
}

fn bench_confirmations(c: &mut Criterion) {
  let series = generate_series(1000);
  let analyzer = WaveAnalyzer::default();
  let analysis = analyzer.analyze_all(&series);
  let wave = analysis.waves[analysis.waves.len() / 2];
  let levels = analyzer.levels(&wave, &analysis.view, None).unwrap();

  c.bench_function("confirmations_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(analyzer.confirmations(black_box(&wave), &analysis.view, &levels));
    })
  });
}

fn bench_parallel_analysis(c: &mut Criterion) {
  let s1 = generate_series(1000);
  let s2 = generate_series(1000);
  let s3 = generate_series(1000);
  let s4 = generate_series(1000);

  let analyzer = WaveAnalyzer::default();
  let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
  let end = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

  let instruments: Vec<(&str, &Series)> =
    vec![("SYM1", &s1), ("SYM2", &s2), ("SYM3", &s3), ("SYM4", &s4)];

  c.bench_function("parallel_analysis_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(analyze_parallel(black_box(&analyzer), instruments.clone(), start, end));
    })
  });
}

criterion_group!(
  benches,
  bench_ingest,
  bench_detect,
  bench_scaling,
  bench_margins,
  bench_confirmations,
  bench_parallel_analysis,
);

criterion_main!(benches);
