//! schedperf.toml configuration.
//!
//! Every field has a default, so an empty file (or no file) runs the stock
//! matrix: five cases from 100 to 5000 nodes, controller-owned pods, a
//! 1s warm-up cadence and a 100ms measured cadence.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::{BenchmarkCase, DriverSettings};
use crate::error::{HarnessError, HarnessResult};
use crate::poller::{PollPolicy, RetryPolicy};
use crate::strategy::{NodeStrategy, PodStrategy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Requested measured pods per case; raised to each case's `min_pods`.
    pub iterations: usize,
    pub node_prefix: String,
    /// Namespace the pods are created in.
    pub namespace: String,
    pub warmup: PhaseConfig,
    pub measured: PhaseConfig,
    pub retry: RetryConfig,
    pub strategies: StrategyConfig,
    pub cases: Vec<BenchmarkCase>,
}

/// Poll cadence for one phase, as human durations (`"1s"`, `"100ms"`).
///
/// An omitted field keeps the phase's stock value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhaseConfig {
    pub interval: Option<String>,
    /// `"none"` waits without a deadline.
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_backoff: String,
    pub max_backoff: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub node: NodeStrategy,
    pub setup_pods: PodStrategy,
    pub measured_pods: PodStrategy,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            node_prefix: "scheduler-perf-".to_string(),
            namespace: "sched-test".to_string(),
            warmup: PhaseConfig {
                interval: Some("1s".to_string()),
                deadline: Some("10m".to_string()),
            },
            measured: PhaseConfig {
                interval: Some("100ms".to_string()),
                deadline: Some("10m".to_string()),
            },
            retry: RetryConfig::default(),
            strategies: StrategyConfig::default(),
            cases: vec![
                BenchmarkCase::new(100, 0, 100),
                BenchmarkCase::new(100, 1000, 100),
                BenchmarkCase::new(1000, 0, 100),
                BenchmarkCase::new(1000, 1000, 100),
                BenchmarkCase::new(5000, 1000, 1000),
            ],
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: "50ms".to_string(),
            max_backoff: "2s".to_string(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            node: NodeStrategy::Trivial,
            setup_pods: PodStrategy::controller_owned("rc1"),
            measured_pods: PodStrategy::controller_owned("rc2"),
        }
    }
}

impl PhaseConfig {
    /// Resolve into a policy, taking omitted fields from `stock`.
    pub fn policy(&self, stock: PollPolicy) -> HarnessResult<PollPolicy> {
        let interval = match self.interval.as_deref() {
            Some(s) => parse_duration(s)?,
            None => stock.interval,
        };
        if interval.is_zero() {
            return Err(HarnessError::Config("poll interval must be non-zero".to_string()));
        }
        let deadline = match self.deadline.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("none") => None,
            Some(s) => Some(parse_duration(s)?),
            None => stock.deadline,
        };
        Ok(PollPolicy { interval, deadline })
    }
}

impl RetryConfig {
    pub fn policy(&self) -> HarnessResult<RetryPolicy> {
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: parse_duration(&self.base_backoff)?,
            max_backoff: parse_duration(&self.max_backoff)?,
        })
    }
}

impl BenchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BenchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the matrix and every duration.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.cases.is_empty() {
            return Err(HarnessError::Config("case matrix is empty".to_string()));
        }
        if self.namespace.is_empty() {
            return Err(HarnessError::Config("namespace must not be empty".to_string()));
        }
        self.driver_settings().map(|_| ())
    }

    /// Resolve the durations into driver settings.
    pub fn driver_settings(&self) -> HarnessResult<DriverSettings> {
        Ok(DriverSettings {
            namespace: self.namespace.clone(),
            node_prefix: self.node_prefix.clone(),
            warmup: self.warmup.policy(PollPolicy::warmup())?,
            measured: self.measured.policy(PollPolicy::measured())?,
            retry: self.retry.policy()?,
        })
    }
}

/// Parse a human duration: `"250ms"`, `"2s"`, `"10m"`, `"1h"`.
pub fn parse_duration(s: &str) -> HarnessResult<Duration> {
    let s = s.trim();
    let invalid = || HarnessError::Config(format!("invalid duration: {s:?}"));

    let (digits, unit_ms): (&str, u64) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else {
        return Err(invalid());
    };

    let value: u64 = digits.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matrix_matches_stock_cases() {
        let config = BenchConfig::default();
        let names: Vec<String> = config.cases.iter().map(BenchmarkCase::name).collect();
        assert_eq!(
            names,
            vec![
                "100Nodes/0Pods",
                "100Nodes/1000Pods",
                "1000Nodes/0Pods",
                "1000Nodes/1000Pods",
                "5000Nodes/1000Pods",
            ]
        );
        assert_eq!(config.cases[4].min_measured_pods, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn default_policies() {
        let settings = BenchConfig::default().driver_settings().unwrap();
        assert_eq!(settings.warmup.interval, Duration::from_secs(1));
        assert_eq!(settings.measured.interval, Duration::from_millis(100));
        assert_eq!(settings.measured.deadline, Some(Duration::from_secs(600)));
        assert_eq!(settings.retry.max_retries, 5);
    }

    #[test]
    fn parse_minimal() {
        let config: BenchConfig = toml::from_str(
            r#"
iterations = 50

[[cases]]
nodes = 10
existing_pods = 5
min_pods = 20
"#,
        )
        .unwrap();
        assert_eq!(config.iterations, 50);
        assert_eq!(config.cases, vec![BenchmarkCase::new(10, 5, 20)]);
        assert_eq!(config.namespace, "sched-test");
    }

    #[test]
    fn toml_round_trip() {
        let config = BenchConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("scheduler-perf-"));
        let parsed: BenchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn explicit_none_deadline_waits_forever() {
        let phase = PhaseConfig {
            interval: Some("250ms".to_string()),
            deadline: Some("none".to_string()),
        };
        let policy = phase.policy(PollPolicy::warmup()).unwrap();
        assert_eq!(policy.interval, Duration::from_millis(250));
        assert_eq!(policy.deadline, None);
    }

    #[test]
    fn partial_phase_keeps_stock_deadline() {
        let config: BenchConfig = toml::from_str("[warmup]\ninterval = \"2s\"\n").unwrap();
        let settings = config.driver_settings().unwrap();
        assert_eq!(settings.warmup.interval, Duration::from_secs(2));
        assert_eq!(settings.warmup.deadline, Some(Duration::from_secs(600)));
    }

    #[test]
    fn deadline_only_phase_keeps_stock_interval() {
        let config: BenchConfig = toml::from_str("[measured]\ndeadline = \"1m\"\n").unwrap();
        let settings = config.driver_settings().unwrap();
        assert_eq!(settings.measured.interval, Duration::from_millis(100));
        assert_eq!(settings.measured.deadline, Some(Duration::from_secs(60)));
        assert_eq!(settings.warmup, PollPolicy::warmup());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = BenchConfig::default();
        config.cases.clear();
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

        let mut config = BenchConfig::default();
        config.measured.interval = Some("0ms".to_string());
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));

        let mut config = BenchConfig::default();
        config.retry.base_backoff = "soon".to_string();
        assert!(matches!(config.validate(), Err(HarnessError::Config(_))));
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration(" 1h ").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("-1s").is_err());
    }
}
