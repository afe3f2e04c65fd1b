//! Result export: CSV statistics, CSV parameters, and JSON.
//!
//! Two CSV files per search:
//! - **Statistics:** one row per accepted candidate with the final value,
//!   running mean, std and cv of every metric plus percent positive and the
//!   realized risk:reward of the last trial.
//! - **Parameters:** one row per accepted candidate with every parameter value.
//!
//! Rows are written as candidates are accepted, so a cancelled search still
//! leaves valid files behind.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use freedomfinder_core::{Metric, ParameterSet, Timeframe};

use crate::config::SearchConfig;
use crate::multitest::{AcceptedCandidate, SearchOutcome};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Sink trait ─────────────────────────────────────────────────────

/// Receives accepted candidates in acceptance order.
pub trait ResultSink {
    fn record(&mut self, candidate: &AcceptedCandidate) -> Result<()>;

    /// Flush anything buffered. Called once, after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects candidates in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub candidates: Vec<AcceptedCandidate>,
}

impl ResultSink for MemorySink {
    fn record(&mut self, candidate: &AcceptedCandidate) -> Result<()> {
        self.candidates.push(candidate.clone());
        Ok(())
    }
}

/// Feed every accepted candidate of `outcome` to `sink`, then finish it.
pub fn emit(outcome: &SearchOutcome, sink: &mut dyn ResultSink) -> Result<()> {
    for candidate in &outcome.accepted {
        sink.record(candidate)?;
    }
    sink.finish()
}

// ─── File naming ────────────────────────────────────────────────────

fn file_suffix(instrument: &str, timeframe: Timeframe, days: u32, hours: u32) -> String {
    format!("{instrument}_{timeframe}_{days}d_{hours}h.csv")
}

/// `FreedomFinder_Multitest_<instrument>_<tf>_<d>d_<h>h.csv`
pub fn stats_file_name(instrument: &str, timeframe: Timeframe, days: u32, hours: u32) -> String {
    format!(
        "FreedomFinder_Multitest_{}",
        file_suffix(instrument, timeframe, days, hours)
    )
}

/// `FreedomFinder_Parameters_<instrument>_<tf>_<d>d_<h>h.csv`
pub fn params_file_name(instrument: &str, timeframe: Timeframe, days: u32, hours: u32) -> String {
    format!(
        "FreedomFinder_Parameters_{}",
        file_suffix(instrument, timeframe, days, hours)
    )
}

// ─── Row layout ─────────────────────────────────────────────────────

/// Columns: result, from, to, then `<m>`, `<m>_avg`, `<m>_std`, `<m>_cv` for
/// every metric, then %_positive, rr_long, rr_short, fingerprint.
pub fn stats_header() -> Vec<String> {
    let mut header = vec!["result".to_string(), "from".to_string(), "to".to_string()];
    for metric in Metric::ALL {
        let name = metric.name();
        header.push(name.to_string());
        header.push(format!("{name}_avg"));
        header.push(format!("{name}_std"));
        header.push(format!("{name}_cv"));
    }
    header.extend(
        ["%_positive", "rr_long", "rr_short", "fingerprint"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

fn stats_record(candidate: &AcceptedCandidate) -> Vec<String> {
    let stats = &candidate.stats;
    let mut record = vec![
        candidate.index.to_string(),
        stats.from.format(DATE_FORMAT).to_string(),
        stats.to.format(DATE_FORMAT).to_string(),
    ];
    for metric in Metric::ALL {
        match stats.stats(metric) {
            Some(m) => {
                record.push(format!("{:.3}", m.value));
                record.push(format!("{:.3}", m.mean));
                record.push(format!("{:.3}", m.std));
                record.push(format!("{:.3}", m.cv));
            }
            None => record.extend(std::iter::repeat(String::new()).take(4)),
        }
    }
    record.push(format!("{:.3}", stats.percent_positive));
    record.push(format!("{:.3}", stats.rr_long));
    record.push(format!("{:.3}", stats.rr_short));
    record.push(candidate.fingerprint.clone());
    record
}

fn params_header(params: &ParameterSet) -> Vec<String> {
    let mut header = vec!["result".to_string()];
    header.extend(params.names().map(str::to_string));
    header
}

fn params_record(candidate: &AcceptedCandidate) -> Vec<String> {
    let mut record = vec![candidate.index.to_string()];
    record.extend(candidate.params.iter().map(|(_, v)| v.to_string()));
    record
}

// ─── In-memory export ───────────────────────────────────────────────

/// Statistics CSV for `candidates`.
pub fn export_stats_csv(candidates: &[AcceptedCandidate]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(stats_header())?;
    for candidate in candidates {
        wtr.write_record(stats_record(candidate))?;
    }
    let bytes = wtr.into_inner().context("failed to flush stats CSV")?;
    String::from_utf8(bytes).context("stats CSV is not valid UTF-8")
}

/// Parameters CSV for `candidates`. Empty when there are none.
pub fn export_params_csv(candidates: &[AcceptedCandidate]) -> Result<String> {
    let Some(first) = candidates.first() else {
        return Ok(String::new());
    };
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(params_header(&first.params))?;
    for candidate in candidates {
        wtr.write_record(params_record(candidate))?;
    }
    let bytes = wtr.into_inner().context("failed to flush parameters CSV")?;
    String::from_utf8(bytes).context("parameters CSV is not valid UTF-8")
}

/// Pretty JSON of a whole search outcome.
pub fn export_json(outcome: &SearchOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize SearchOutcome to JSON")
}

/// Write the pretty JSON of `outcome` to `path`.
pub fn write_json(outcome: &SearchOutcome, path: &Path) -> Result<()> {
    let json = export_json(outcome)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

// ─── CSV file sink ──────────────────────────────────────────────────

/// Streams accepted candidates into the statistics and parameters CSVs.
pub struct CsvResultSink {
    stats_path: PathBuf,
    params_path: PathBuf,
    stats: csv::Writer<File>,
    params: csv::Writer<File>,
    params_header_written: bool,
}

impl CsvResultSink {
    /// Create both files in `dir` (created if missing) and write the
    /// statistics header.
    pub fn create(dir: &Path, config: &SearchConfig) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;

        let stats_path = dir.join(stats_file_name(
            &config.instrument,
            config.timeframe,
            config.test_days,
            config.test_hours,
        ));
        let params_path = dir.join(params_file_name(
            &config.instrument,
            config.timeframe,
            config.test_days,
            config.test_hours,
        ));

        let mut stats = csv::Writer::from_path(&stats_path)
            .with_context(|| format!("failed to create {}", stats_path.display()))?;
        stats.write_record(stats_header())?;
        let params = csv::Writer::from_path(&params_path)
            .with_context(|| format!("failed to create {}", params_path.display()))?;

        Ok(Self {
            stats_path,
            params_path,
            stats,
            params,
            params_header_written: false,
        })
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }

    pub fn params_path(&self) -> &Path {
        &self.params_path
    }
}

impl ResultSink for CsvResultSink {
    fn record(&mut self, candidate: &AcceptedCandidate) -> Result<()> {
        self.stats
            .write_record(stats_record(candidate))
            .with_context(|| format!("failed to write {}", self.stats_path.display()))?;
        if !self.params_header_written {
            self.params.write_record(params_header(&candidate.params))?;
            self.params_header_written = true;
        }
        self.params
            .write_record(params_record(candidate))
            .with_context(|| format!("failed to write {}", self.params_path.display()))?;
        // Keep the files valid if the process is interrupted between results.
        self.stats.flush()?;
        self.params.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.stats.flush()?;
        self.params.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_the_report_convention() {
        assert_eq!(
            stats_file_name("BTCUSDT", Timeframe::H1, 7, 0),
            "FreedomFinder_Multitest_BTCUSDT_1h_7d_0h.csv"
        );
        assert_eq!(
            params_file_name("ETHUSDT", Timeframe::M15, 2, 12),
            "FreedomFinder_Parameters_ETHUSDT_15m_2d_12h.csv"
        );
    }

    #[test]
    fn stats_header_has_four_columns_per_metric() {
        let header = stats_header();
        assert_eq!(header.len(), 3 + 4 * Metric::ALL.len() + 4);
        assert_eq!(&header[3..7], ["pnl", "pnl_avg", "pnl_std", "pnl_cv"]);
        assert_eq!(header.last().map(String::as_str), Some("fingerprint"));
        assert!(header.contains(&"%_positive".to_string()));
    }

    #[test]
    fn empty_params_export_is_empty() {
        assert_eq!(export_params_csv(&[]).unwrap(), "");
    }

    #[test]
    fn empty_stats_export_is_header_only() {
        let csv = export_stats_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("result,from,to,pnl,"));
    }
}
