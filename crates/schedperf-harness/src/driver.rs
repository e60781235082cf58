//! Benchmark driver: runs the case matrix.
//!
//! Each case runs in its own environment, strictly one after another:
//!
//! ```text
//! acquire env
//!   prepare nodes ─► create "setup" pods ─► warm-up wait (coarse)
//!   ── timer reset ──
//!   create "measured" pods ─► measured wait (fine) ─► record elapsed
//!   cleanup pods, cleanup nodes
//! teardown env
//! ```
//!
//! A failure in any phase aborts that case only. Cleanup and teardown run
//! on every path, and the report says how much was cleaned up.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::control_plane::ControlPlane;
use crate::error::{HarnessError, HarnessResult};
use crate::nodes::{CleanupReport, NodePreparer};
use crate::pods::PodInjector;
use crate::poller::{CompletionPoller, PollPolicy, RetryPolicy, WaitStats};
use crate::strategy::{NodeStrategy, PodStrategy};
use schedperf_state::LabelSelector;

/// Group label of the pods created before the timer starts.
pub const SETUP_GROUP: &str = "setup";
/// Group label of the pods whose scheduling is timed.
pub const MEASURED_GROUP: &str = "measured";

/// One entry of the case matrix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BenchmarkCase {
    #[serde(rename = "nodes")]
    pub node_count: usize,
    /// Pods scheduled during warm-up, before measuring.
    #[serde(rename = "existing_pods")]
    pub existing_pod_count: usize,
    /// Floor for the measured batch size.
    #[serde(rename = "min_pods")]
    pub min_measured_pods: usize,
}

impl BenchmarkCase {
    pub fn new(node_count: usize, existing_pod_count: usize, min_measured_pods: usize) -> Self {
        Self {
            node_count,
            existing_pod_count,
            min_measured_pods,
        }
    }

    /// Human-readable case name, e.g. `1000Nodes/1000Pods`.
    pub fn name(&self) -> String {
        format!("{}Nodes/{}Pods", self.node_count, self.existing_pod_count)
    }

    /// Measured batch size: the requested count, never below the floor.
    pub fn measured_pods(&self, iterations: usize) -> usize {
        iterations.max(self.min_measured_pods)
    }
}

/// A scheduler environment for one case: a control plane plus whatever
/// scheduler is binding pods in it.
pub trait Environment {
    type Plane: ControlPlane;

    fn control_plane(&self) -> &Self::Plane;

    /// Release the environment. Called exactly once, on every exit path.
    fn teardown(self) -> impl Future<Output = ()>;
}

/// Hands out a fresh [`Environment`] per case.
pub trait EnvironmentFactory {
    type Env: Environment;

    fn acquire(&mut self, case: &BenchmarkCase) -> impl Future<Output = anyhow::Result<Self::Env>>;
}

/// Where a case stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePhase {
    NotStarted,
    Environment,
    PrepareNodes,
    SetupPods,
    Warmup,
    MeasuredPods,
    Measured,
}

impl fmt::Display for CasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CasePhase::NotStarted => "not started",
            CasePhase::Environment => "environment",
            CasePhase::PrepareNodes => "prepare nodes",
            CasePhase::SetupPods => "setup pods",
            CasePhase::Warmup => "warm-up",
            CasePhase::MeasuredPods => "measured pods",
            CasePhase::Measured => "measured wait",
        };
        f.write_str(s)
    }
}

/// Timing of a successful case.
#[derive(Debug, Clone)]
pub struct CaseTiming {
    /// N, the number of pods whose scheduling was timed.
    pub measured_pods: usize,
    pub nodes_created: usize,
    pub pods_created: usize,
    pub warmup: Duration,
    /// From timer reset until the measured target was observed.
    pub measured: Duration,
    /// Wall-clock time of the whole case, teardown included.
    pub total: Duration,
    pub warmup_stats: WaitStats,
    pub measured_stats: WaitStats,
    pub cleanup: CleanupReport,
}

impl CaseTiming {
    /// Measured throughput in pods per second.
    pub fn pods_per_second(&self) -> f64 {
        let secs = self.measured.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.measured_pods as f64 / secs
    }
}

/// A case that did not finish.
#[derive(Debug)]
pub struct CaseFailure {
    pub phase: CasePhase,
    pub error: HarnessError,
    /// What was removed of the partial state.
    pub cleanup: CleanupReport,
}

/// Result of one matrix entry.
#[derive(Debug)]
pub struct CaseReport {
    pub name: String,
    pub case: BenchmarkCase,
    pub outcome: Result<CaseTiming, CaseFailure>,
}

impl CaseReport {
    fn failed(case: &BenchmarkCase, phase: CasePhase, error: HarnessError) -> Self {
        Self {
            name: case.name(),
            case: *case,
            outcome: Err(CaseFailure {
                phase,
                error,
                cleanup: CleanupReport::default(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Namespacing, cadence, and retry settings for every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub namespace: String,
    pub node_prefix: String,
    pub warmup: PollPolicy,
    pub measured: PollPolicy,
    pub retry: RetryPolicy,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            namespace: "sched-test".to_string(),
            node_prefix: "scheduler-perf-".to_string(),
            warmup: PollPolicy::warmup(),
            measured: PollPolicy::measured(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs benchmark cases one at a time against fresh environments.
pub struct BenchmarkDriver<F: EnvironmentFactory> {
    factory: F,
    node_strategy: NodeStrategy,
    setup_strategy: PodStrategy,
    test_strategy: PodStrategy,
    settings: DriverSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<F: EnvironmentFactory> BenchmarkDriver<F> {
    pub fn new(
        factory: F,
        node_strategy: NodeStrategy,
        setup_strategy: PodStrategy,
        test_strategy: PodStrategy,
        settings: DriverSettings,
    ) -> Self {
        Self {
            factory,
            node_strategy,
            setup_strategy,
            test_strategy,
            settings,
            shutdown: None,
        }
    }

    /// Build a driver from a validated configuration.
    pub fn from_config(factory: F, config: &BenchConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self::new(
            factory,
            config.strategies.node.clone(),
            config.strategies.setup_pods.clone(),
            config.strategies.measured_pods.clone(),
            config.driver_settings()?,
        ))
    }

    /// Stop the running wait and skip remaining cases once `shutdown` flips.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Run every case in order and report each one.
    ///
    /// Cases never overlap: case k is torn down before case k+1 is set up.
    pub async fn run_matrix(&mut self, cases: &[BenchmarkCase], iterations: usize) -> Vec<CaseReport> {
        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            if self.is_cancelled() {
                warn!(case = %case.name(), "skipping case after shutdown");
                reports.push(CaseReport::failed(case, CasePhase::NotStarted, HarnessError::Cancelled));
                continue;
            }
            reports.push(self.run_case(case, iterations).await);
        }
        reports
    }

    /// Run a single case in a fresh environment.
    pub async fn run_case(&mut self, case: &BenchmarkCase, iterations: usize) -> CaseReport {
        let name = case.name();
        let case_start = Instant::now();
        info!(
            case = %name,
            nodes = case.node_count,
            existing_pods = case.existing_pod_count,
            measured_pods = case.measured_pods(iterations),
            "case starting"
        );

        let env = match self.factory.acquire(case).await {
            Ok(env) => env,
            Err(e) => {
                warn!(case = %name, error = %e, "failed to acquire environment");
                return CaseReport::failed(case, CasePhase::Environment, HarnessError::Environment(e));
            }
        };

        let outcome = self
            .run_phases(env.control_plane(), case, iterations)
            .await;
        env.teardown().await;

        let outcome = outcome.map(|mut timing| {
            timing.total = case_start.elapsed();
            timing
        });

        match &outcome {
            Ok(timing) => info!(
                case = %name,
                measured_pods = timing.measured_pods,
                measured_ms = timing.measured.as_millis() as u64,
                warmup_ms = timing.warmup.as_millis() as u64,
                pods_per_second = timing.pods_per_second(),
                "case finished"
            ),
            Err(failure) => warn!(
                case = %name,
                phase = %failure.phase,
                error = %failure.error,
                cleaned_up = failure.cleanup.deleted,
                "case failed"
            ),
        }

        CaseReport {
            name,
            case: *case,
            outcome,
        }
    }

    /// Run the phases of a case, then clean up whatever was created.
    async fn run_phases<P: ControlPlane>(
        &self,
        plane: &P,
        case: &BenchmarkCase,
        iterations: usize,
    ) -> Result<CaseTiming, CaseFailure> {
        let mut preparer = NodePreparer::new(plane, &self.settings.node_prefix);
        let mut injector = PodInjector::new(plane, &self.settings.namespace);
        let mut poller = CompletionPoller::new(plane, self.settings.retry);
        if let Some(rx) = &self.shutdown {
            poller = poller.with_shutdown(rx.clone());
        }

        let result = self
            .measure(&mut preparer, &mut injector, &mut poller, case, iterations)
            .await;

        let cleanup = injector.cleanup_pods().merge(preparer.cleanup_nodes());
        match result {
            Ok(mut timing) => {
                timing.cleanup = cleanup;
                Ok(timing)
            }
            Err((phase, error)) => Err(CaseFailure {
                phase,
                error,
                cleanup,
            }),
        }
    }

    async fn measure<P: ControlPlane>(
        &self,
        preparer: &mut NodePreparer<&P>,
        injector: &mut PodInjector<&P>,
        poller: &mut CompletionPoller<&P>,
        case: &BenchmarkCase,
        iterations: usize,
    ) -> Result<CaseTiming, (CasePhase, HarnessError)> {
        let all = LabelSelector::everything();

        let nodes_created = preparer
            .prepare_nodes(case.node_count, &self.node_strategy)
            .map_err(|e| (CasePhase::PrepareNodes, e))?;

        let setup_pods = injector
            .create_pods(SETUP_GROUP, case.existing_pod_count, &self.setup_strategy)
            .map_err(|e| (CasePhase::SetupPods, e))?;

        let warmup_start = Instant::now();
        let warmup_stats = poller
            .wait_for_scheduled_count(case.existing_pod_count, &all, self.settings.warmup)
            .await
            .map_err(|e| (CasePhase::Warmup, e))?;
        let warmup = warmup_start.elapsed();

        // Timer reset: everything above is excluded from the result.
        let timer = Instant::now();

        let measured_pods = case.measured_pods(iterations);
        injector
            .create_pods(MEASURED_GROUP, measured_pods, &self.test_strategy)
            .map_err(|e| (CasePhase::MeasuredPods, e))?;

        let measured_stats = poller
            .wait_for_scheduled_count(
                case.existing_pod_count + measured_pods,
                &all,
                self.settings.measured,
            )
            .await
            .map_err(|e| (CasePhase::Measured, e))?;
        let measured = timer.elapsed();

        Ok(CaseTiming {
            measured_pods,
            nodes_created,
            pods_created: setup_pods + measured_pods,
            warmup,
            measured,
            total: Duration::ZERO,
            warmup_stats,
            measured_stats,
            cleanup: CleanupReport::default(),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
