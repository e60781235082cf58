//! Runner configuration: the benchmark settings plus the `[scheduler]`
//! section for the bundled reference scheduler.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use schedperf_harness::{BenchConfig, parse_duration};
use schedperf_scheduler::{SchedulerConfig, ScoringWeights};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(flatten)]
    pub bench: BenchConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerSection {
    /// Pods bound per scheduling cycle.
    pub batch_size: usize,
    /// Pause between cycles when no pod was bound.
    pub idle_interval: String,
    pub weights: ScoringWeights,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            batch_size: 100,
            idle_interval: "10ms".to_string(),
            weights: ScoringWeights::default(),
        }
    }
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.bench.validate()?;
        self.scheduler_config()?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        if self.scheduler.batch_size == 0 {
            anyhow::bail!("scheduler.batch_size must be at least 1");
        }
        Ok(SchedulerConfig {
            batch_size: self.scheduler.batch_size,
            idle_interval: parse_duration(&self.scheduler.idle_interval)?,
            weights: self.scheduler.weights.clone(),
        })
    }
}
