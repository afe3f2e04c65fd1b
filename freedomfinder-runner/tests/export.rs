//! Integration tests for result export.

use chrono::{TimeZone, Utc};
use freedomfinder_core::{
    DataRange, EvaluationError, OutcomeRecord, ParameterSet, PolicyRegistry, Timeframe, Window,
};
use freedomfinder_runner::export::{
    export_params_csv, export_stats_csv, params_file_name, stats_file_name, write_json,
};
use freedomfinder_runner::{emit, run_multitest, CsvResultSink, MemorySink, SearchConfig, SearchOutcome};

fn search(num_results: u32) -> (SearchConfig, SearchOutcome) {
    let mut config = SearchConfig::new("ETHUSDT", "ichimoku", Timeframe::H4);
    config.test_days = 10;
    config.test_hours = 12;
    config.trials = 8;
    config.num_results = num_results;

    let eval = |w: &Window, _: &ParameterSet, _: f64| {
        let pnl = (w.start.timestamp() / 3600 % 5) as f64 + 1.0;
        Ok::<_, EvaluationError>(OutcomeRecord {
            pnl,
            max_drawdown: 4.0,
            win_rate: 50.0,
            mod_win_rate: 50.0,
            num_trades: 6.0,
            trades_won: 3.0,
            trades_lost: 3.0,
            breakeven_trades: 0.0,
            max_wins: 2.0,
            max_losses: 2.0,
            profit_factor: 1.1,
            rr_long: 2.0,
            rr_short: 2.0,
        })
    };
    let range = DataRange::new(
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
    );
    let outcome = run_multitest(
        &config,
        &PolicyRegistry::with_builtin(),
        &eval,
        range,
        None,
        None,
    )
    .unwrap();
    (config, outcome)
}

#[test]
fn csv_sink_writes_both_files() {
    let (config, outcome) = search(2);
    let dir = tempfile::tempdir().unwrap();

    let mut sink = CsvResultSink::create(dir.path(), &config).unwrap();
    emit(&outcome, &mut sink).unwrap();

    let stats_path = dir
        .path()
        .join(stats_file_name("ETHUSDT", Timeframe::H4, 10, 12));
    let params_path = dir
        .path()
        .join(params_file_name("ETHUSDT", Timeframe::H4, 10, 12));
    assert_eq!(sink.stats_path(), stats_path.as_path());

    let stats = std::fs::read_to_string(&stats_path).unwrap();
    let params = std::fs::read_to_string(&params_path).unwrap();
    assert_eq!(stats.lines().count(), 3);
    assert_eq!(params.lines().count(), 3);
    assert!(stats.starts_with("result,from,to,pnl,pnl_avg,pnl_std,pnl_cv,max_dd,"));
    assert!(params.starts_with("result,kijun,tenkan"));
    assert!(stats.lines().nth(1).unwrap().starts_with("1,"));
    assert!(stats.lines().nth(2).unwrap().starts_with("2,"));
}

#[test]
fn in_memory_csv_matches_sink_rows() {
    let (_, outcome) = search(2);

    let stats = export_stats_csv(&outcome.accepted).unwrap();
    let params = export_params_csv(&outcome.accepted).unwrap();

    let row: Vec<&str> = stats.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(row.last().copied(), Some(outcome.accepted[0].fingerprint.as_str()));
    let first = &outcome.accepted[0].params;
    let expected = format!(
        "1,{},{}",
        first.get("kijun").unwrap(),
        first.get("tenkan").unwrap()
    );
    assert_eq!(params.lines().nth(1).unwrap(), expected);
}

#[test]
fn memory_sink_keeps_acceptance_order() {
    let (_, outcome) = search(3);
    let mut sink = MemorySink::default();
    emit(&outcome, &mut sink).unwrap();

    let indices: Vec<u32> = sink.candidates.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[test]
fn json_export_carries_counters_and_results() {
    let (_, outcome) = search(1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outcome.json");

    write_json(&outcome, &path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["instrument"], "ETHUSDT");
    assert_eq!(value["timeframe"], "4h");
    assert_eq!(value["pool"], "full");
    assert_eq!(value["counters"]["candidates_sampled"], 1);
    assert_eq!(value["accepted"].as_array().unwrap().len(), 1);
    assert_eq!(value["accepted"][0]["history"].as_array().unwrap().len(), 8);
}
