//! Case report rendering: a text table or one JSON object per line.

use std::fmt::Write as _;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use schedperf_harness::{CasePhase, CaseReport, CleanupReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Flat, serializable view of a [`CaseReport`].
#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    pub name: String,
    pub nodes: usize,
    pub existing_pods: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured_pods: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pods_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<CasePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cleanup: CleanupReport,
}

impl From<&CaseReport> for CaseRecord {
    fn from(report: &CaseReport) -> Self {
        let mut record = CaseRecord {
            name: report.name.clone(),
            nodes: report.case.node_count,
            existing_pods: report.case.existing_pod_count,
            status: "ok",
            measured_pods: None,
            warmup_ms: None,
            measured_ms: None,
            total_ms: None,
            pods_per_second: None,
            phase: None,
            error: None,
            cleanup: CleanupReport::default(),
        };
        match &report.outcome {
            Ok(timing) => {
                record.measured_pods = Some(timing.measured_pods);
                record.warmup_ms = Some(millis(timing.warmup));
                record.measured_ms = Some(millis(timing.measured));
                record.total_ms = Some(millis(timing.total));
                record.pods_per_second = Some(timing.pods_per_second());
                record.cleanup = timing.cleanup;
            }
            Err(failure) => {
                record.status = "failed";
                record.phase = Some(failure.phase);
                record.error = Some(failure.error.to_string());
                record.cleanup = failure.cleanup;
            }
        }
        record
    }
}

pub fn render(reports: &[CaseReport], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(reports)),
        OutputFormat::Json => render_json_lines(reports),
    }
}

/// Fixed-width table, one row per case.
pub fn render_text(reports: &[CaseReport]) -> String {
    let width = reports
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("CASE".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>6}  {:>10}  {:>10}  {:>10}",
        "CASE", "PODS", "WARMUP", "MEASURED", "PODS/S"
    );
    for report in reports {
        match &report.outcome {
            Ok(timing) => {
                let _ = writeln!(
                    out,
                    "{:<width$}  {:>6}  {:>10}  {:>10}  {:>10.1}",
                    report.name,
                    timing.measured_pods,
                    format_duration(timing.warmup),
                    format_duration(timing.measured),
                    timing.pods_per_second(),
                );
            }
            Err(failure) => {
                let _ = writeln!(
                    out,
                    "{:<width$}  FAILED in {}: {}",
                    report.name, failure.phase, failure.error
                );
            }
        }
    }
    out
}

/// One JSON object per case, newline separated.
pub fn render_json_lines(reports: &[CaseReport]) -> anyhow::Result<String> {
    let mut out = String::new();
    for report in reports {
        out.push_str(&serde_json::to_string(&CaseRecord::from(report))?);
        out.push('\n');
    }
    Ok(out)
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{:.1}ms", millis(d))
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedperf_harness::{BenchmarkCase, CaseFailure, CaseTiming, HarnessError, WaitStats};

    fn success() -> CaseReport {
        let case = BenchmarkCase::new(100, 0, 100);
        CaseReport {
            name: case.name(),
            case,
            outcome: Ok(CaseTiming {
                measured_pods: 100,
                nodes_created: 100,
                pods_created: 100,
                warmup: Duration::from_millis(3),
                measured: Duration::from_millis(500),
                total: Duration::from_millis(900),
                warmup_stats: WaitStats::default(),
                measured_stats: WaitStats::default(),
                cleanup: CleanupReport {
                    deleted: 200,
                    ..CleanupReport::default()
                },
            }),
        }
    }

    fn failure() -> CaseReport {
        let case = BenchmarkCase::new(1000, 1000, 100);
        CaseReport {
            name: case.name(),
            case,
            outcome: Err(CaseFailure {
                phase: CasePhase::Warmup,
                error: HarnessError::ConvergenceTimeout {
                    target: 1000,
                    observed: 12,
                    waited: Duration::from_secs(600),
                },
                cleanup: CleanupReport {
                    deleted: 2000,
                    ..CleanupReport::default()
                },
            }),
        }
    }

    #[test]
    fn text_table_has_a_row_per_case() {
        let text = render_text(&[success(), failure()]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("CASE"));
        assert!(lines[1].starts_with("100Nodes/0Pods"));
        assert!(lines[1].contains("500.0ms"));
        assert!(lines[1].contains("200.0"));
        assert!(lines[2].starts_with("1000Nodes/1000Pods"));
        assert!(lines[2].contains("FAILED in warm-up"));
    }

    #[test]
    fn json_lines_parse_back() {
        let out = render_json_lines(&[success(), failure()]).unwrap();
        let values: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["status"], "ok");
        assert_eq!(values[0]["measured_pods"], 100);
        assert_eq!(values[0]["pods_per_second"], 200.0);
        assert!(values[0].get("error").is_none());

        assert_eq!(values[1]["status"], "failed");
        assert_eq!(values[1]["phase"], "warmup");
        assert_eq!(values[1]["cleanup"]["deleted"], 2000);
        assert!(values[1]["error"].as_str().unwrap().contains("1000"));
    }
}
