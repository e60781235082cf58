//! End-to-end runs against local clusters.
//!
//! Drives small matrices through `LocalClusterFactory`, in memory and on
//! disk, and renders the reports the way the binary does.

use std::time::Duration;

use schedperf::{FileConfig, LocalClusterFactory, OutputFormat, render};
use schedperf_harness::{BenchmarkCase, BenchmarkDriver, CasePhase, HarnessError};
use tokio::sync::watch;

fn quick_config(cases: Vec<BenchmarkCase>, iterations: usize) -> FileConfig {
    let mut config: FileConfig = toml::from_str(
        r#"
[warmup]
interval = "20ms"
deadline = "60s"

[measured]
interval = "5ms"
deadline = "60s"

[scheduler]
batch_size = 200
idle_interval = "2ms"
"#,
    )
    .unwrap();
    config.bench.cases = cases;
    config.bench.iterations = iterations;
    config
}

#[tokio::test]
async fn in_memory_matrix_reports_every_case() {
    let config = quick_config(
        vec![BenchmarkCase::new(100, 0, 100), BenchmarkCase::new(50, 100, 20)],
        50,
    );
    let factory = LocalClusterFactory::new(None, config.scheduler_config().unwrap());
    let mut driver = BenchmarkDriver::from_config(factory, &config.bench).unwrap();

    let reports = driver.run_matrix(&config.bench.cases, config.bench.iterations).await;

    assert_eq!(driver.factory().acquired(), 2);
    assert!(reports.iter().all(|r| r.is_success()));
    let first = reports[0].outcome.as_ref().unwrap();
    assert_eq!(first.measured_pods, 100);
    let second = reports[1].outcome.as_ref().unwrap();
    assert_eq!(second.measured_pods, 50);
    assert!(second.measured < second.total);

    let text = render(&reports, OutputFormat::Text).unwrap();
    assert!(text.contains("100Nodes/0Pods"));
    assert!(text.contains("50Nodes/100Pods"));
}

#[tokio::test]
async fn on_disk_stores_are_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = quick_config(vec![BenchmarkCase::new(20, 10, 10)], 10);
    let factory = LocalClusterFactory::new(
        Some(dir.path().to_path_buf()),
        config.scheduler_config().unwrap(),
    );
    let mut driver = BenchmarkDriver::from_config(factory, &config.bench).unwrap();

    let reports = driver.run_matrix(&config.bench.cases, config.bench.iterations).await;
    assert!(reports[0].is_success());

    let leftover: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftover.is_empty());

    let json = render(&reports, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
    assert_eq!(value["name"], "20Nodes/10Pods");
    assert_eq!(value["cleanup"]["deleted"], 20 + 20);
}

#[tokio::test]
async fn shutdown_mid_run_cancels_and_skips() {
    // A single node fits 40 pods, so the warm-up below never completes.
    let config = quick_config(
        vec![BenchmarkCase::new(1, 100, 10), BenchmarkCase::new(1, 0, 10)],
        10,
    );
    let factory = LocalClusterFactory::new(None, config.scheduler_config().unwrap());
    let (tx, rx) = watch::channel(false);
    let mut driver = BenchmarkDriver::from_config(factory, &config.bench)
        .unwrap()
        .with_shutdown(rx);

    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let reports = driver.run_matrix(&config.bench.cases, config.bench.iterations).await;
    cancel.abort();

    assert_eq!(reports.len(), 2);
    let first = reports[0].outcome.as_ref().unwrap_err();
    assert_eq!(first.phase, CasePhase::Warmup);
    assert!(matches!(first.error, HarnessError::Cancelled));
    assert_eq!(first.cleanup.deleted, 101);

    let second = reports[1].outcome.as_ref().unwrap_err();
    assert_eq!(second.phase, CasePhase::NotStarted);
    assert_eq!(driver.factory().acquired(), 1);
}
