//! Strategy evaluator backed by an external process.
//!
//! Each evaluation spawns the configured command, writes one JSON request to
//! its stdin and reads one `OutcomeRecord` JSON object from its stdout:
//!
//! ```text
//! {"instrument": "BTCUSDT", "timeframe": "1h",
//!  "window": {"start": "...", "end": "...", "pool": "full"},
//!  "params": {"macd_fast": 12, ...}, "initial_capital": 100.0,
//!  "data_dir": "data"}
//! ```

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::debug;

use freedomfinder_core::{
    EvaluationError, OutcomeRecord, ParameterSet, StrategyEvaluator, Timeframe, Window,
};

#[derive(Serialize)]
struct EvaluationRequest<'a> {
    instrument: &'a str,
    timeframe: Timeframe,
    window: &'a Window,
    params: &'a ParameterSet,
    initial_capital: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_dir: Option<&'a PathBuf>,
}

/// Runs one child process per evaluation.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
    instrument: String,
    timeframe: Timeframe,
    data_dir: Option<PathBuf>,
}

impl ProcessEvaluator {
    /// `command[0]` is the program, the rest are its arguments.
    pub fn new(command: &[String], instrument: &str, timeframe: Timeframe) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            instrument: instrument.to_string(),
            timeframe,
            data_dir: None,
        })
    }

    /// Forward the candle directory so the child can load the series itself.
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }
}

impl StrategyEvaluator for ProcessEvaluator {
    fn evaluate(
        &self,
        window: &Window,
        params: &ParameterSet,
        initial_capital: f64,
    ) -> Result<OutcomeRecord, EvaluationError> {
        if window.end <= window.start {
            return Err(EvaluationError::MalformedWindow(format!(
                "end {} is not after start {}",
                window.end, window.start
            )));
        }

        let request = EvaluationRequest {
            instrument: &self.instrument,
            timeframe: self.timeframe,
            window,
            params,
            initial_capital,
            data_dir: self.data_dir.as_ref(),
        };
        let payload = serde_json::to_vec(&request)
            .map_err(|e| EvaluationError::Failed(format!("failed to encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EvaluationError::Failed(format!("failed to spawn {}: {e}", self.program)))?;

        // Stdin is dropped at the end of this statement so the child sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&payload),
            None => Ok(()),
        };

        // Always reap the child, even when the request could not be written.
        let output = child
            .wait_with_output()
            .map_err(|e| EvaluationError::Failed(format!("evaluator did not finish: {e}")))?;

        // A child that exits without reading its request closes the pipe early;
        // its exit status and output decide the result.
        if let Err(e) = written {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(EvaluationError::Failed(format!("failed to write request: {e}")));
            }
            debug!(program = %self.program, "evaluator closed stdin before reading the request");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvaluationError::Failed(format!(
                "evaluator exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let outcome: OutcomeRecord = serde_json::from_slice(&output.stdout).map_err(|e| {
            EvaluationError::Failed(format!("evaluator returned malformed outcome: {e}"))
        })?;
        debug!(start = %window.start, pnl = outcome.pnl, "external evaluation");
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use freedomfinder_core::Pool;

    fn window() -> Window {
        let start = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
        Window {
            start,
            end: start + Duration::days(7),
            pool: Pool::Full,
        }
    }

    fn shell(script: &str) -> ProcessEvaluator {
        let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        ProcessEvaluator::new(&command, "BTCUSDT", Timeframe::H1).unwrap()
    }

    const OUTCOME: &str = r#"{"pnl":4.5,"max_drawdown":1.0,"win_rate":50.0,"mod_win_rate":55.0,"num_trades":6.0,"trades_won":3.0,"trades_lost":3.0,"breakeven_trades":0.0,"max_wins":2.0,"max_losses":1.0,"profit_factor":1.3,"rr_long":2.0,"rr_short":2.5}"#;

    #[test]
    fn parses_outcome_from_stdout() {
        let eval = shell(&format!("cat > /dev/null; echo '{OUTCOME}'"));
        let outcome = eval.evaluate(&window(), &ParameterSet::new(), 100.0).unwrap();
        assert_eq!(outcome.pnl, 4.5);
        assert_eq!(outcome.rr_short, 2.5);
    }

    #[test]
    fn request_reaches_stdin() {
        // Echo back a pnl only if the request names the instrument.
        let script = format!(
            "if grep -q '\"instrument\":\"BTCUSDT\"'; then echo '{OUTCOME}'; else exit 3; fi"
        );
        let eval = shell(&script);
        assert!(eval.evaluate(&window(), &ParameterSet::new(), 100.0).is_ok());
    }

    #[test]
    fn non_zero_exit_is_an_evaluation_error() {
        let eval = shell("cat > /dev/null; echo 'no data' >&2; exit 2");
        let err = eval.evaluate(&window(), &ParameterSet::new(), 100.0).unwrap_err();
        match err {
            EvaluationError::Failed(msg) => assert!(msg.contains("no data"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn garbage_output_is_an_evaluation_error() {
        let eval = shell("cat > /dev/null; echo 'not json'");
        assert!(matches!(
            eval.evaluate(&window(), &ParameterSet::new(), 100.0),
            Err(EvaluationError::Failed(_))
        ));
    }

    /// Parameters large enough to overflow a pipe buffer.
    fn bulky_params() -> ParameterSet {
        let mut params = ParameterSet::new();
        for i in 0..50_000 {
            params.set_int(&format!("p{i:05}"), i);
        }
        params
    }

    #[test]
    fn exit_without_reading_reports_status_and_stderr() {
        let eval = shell("echo 'no data for window' >&2; exit 4");
        let err = eval.evaluate(&window(), &bulky_params(), 100.0).unwrap_err();
        match err {
            EvaluationError::Failed(msg) => {
                assert!(msg.contains("exited with"), "{msg}");
                assert!(msg.contains("no data for window"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn closed_stdin_with_valid_outcome_is_accepted() {
        let eval = shell(&format!("exec 0<&-; echo '{OUTCOME}'"));
        let outcome = eval.evaluate(&window(), &bulky_params(), 100.0).unwrap();
        assert_eq!(outcome.pnl, 4.5);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(ProcessEvaluator::new(&[], "BTCUSDT", Timeframe::H1).is_none());
    }
}
