use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::StageState;

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageMetrics>,
    pub total_duration_ms: f64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StageMetrics {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_state: Option<StageState>,
}

#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_stage(&self, stage_name: &str) -> StageTimer {
        StageTimer {
            stage: stage_name.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
        }
    }

    pub fn record_outcome(&self, stage_name: &str, state: StageState) {
        if let Ok(mut guard) = self.inner.lock() {
            match state {
                StageState::Succeeded => guard.succeeded += 1,
                StageState::Skipped => guard.skipped += 1,
                StageState::Failed => guard.failed += 1,
                StageState::Pending | StageState::Defaulted => {}
            }
            guard
                .stages
                .entry(stage_name.to_string())
                .or_default()
                .last_state = Some(state);
        }
    }

    pub fn record_total_duration(&self, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.total_duration_ms = duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

/// Records the elapsed time of one stage when dropped.
pub struct StageTimer {
    stage: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let duration_ms = self.started_at.elapsed().as_secs_f64() * 1_000.0;
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.stages.entry(self.stage.clone()).or_default();
            metrics.calls += 1;
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        debug!(stage = self.stage.as_str(), duration_ms, "Stage duration recorded");
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        total_duration_ms = snapshot.total_duration_ms,
        succeeded = snapshot.succeeded,
        skipped = snapshot.skipped,
        failed = snapshot.failed,
        "Release metrics summary"
    );
    for (stage, metrics) in &snapshot.stages {
        info!(
            stage = stage.as_str(),
            calls = metrics.calls,
            total_ms = metrics.total_duration_ms,
            max_ms = metrics.max_duration_ms,
            state = ?metrics.last_state,
            "Stage metrics"
        );
    }
}

impl MetricsSnapshot {
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();
        output.push_str("# HELP shipyard_stage_outcomes_total Stage outcomes by state\n");
        output.push_str("# TYPE shipyard_stage_outcomes_total counter\n");
        for (state, count) in [
            ("succeeded", self.succeeded),
            ("skipped", self.skipped),
            ("failed", self.failed),
        ] {
            let _ = writeln!(output, "shipyard_stage_outcomes_total{{state=\"{state}\"}} {count}");
        }
        output.push_str("# HELP shipyard_stage_calls_total Stage invocation count\n");
        output.push_str("# TYPE shipyard_stage_calls_total counter\n");
        output.push_str(
            "# HELP shipyard_stage_duration_seconds_total Accumulated stage duration in seconds\n",
        );
        output.push_str("# TYPE shipyard_stage_duration_seconds_total counter\n");
        output.push_str(
            "# HELP shipyard_stage_duration_seconds_max Maximum stage duration in seconds\n",
        );
        output.push_str("# TYPE shipyard_stage_duration_seconds_max gauge\n");
        for (stage, metrics) in &self.stages {
            let _ = writeln!(
                output,
                "shipyard_stage_calls_total{{stage=\"{stage}\"}} {}",
                metrics.calls
            );
            let _ = writeln!(
                output,
                "shipyard_stage_duration_seconds_total{{stage=\"{stage}\"}} {:.6}",
                metrics.total_duration_ms / 1_000.0
            );
            let _ = writeln!(
                output,
                "shipyard_stage_duration_seconds_max{{stage=\"{stage}\"}} {:.6}",
                metrics.max_duration_ms / 1_000.0
            );
        }
        output.push_str("# HELP shipyard_release_duration_seconds Total release duration\n");
        output.push_str("# TYPE shipyard_release_duration_seconds gauge\n");
        let _ = writeln!(
            output,
            "shipyard_release_duration_seconds {:.6}",
            self.total_duration_ms / 1_000.0
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes_and_timings() {
        let metrics = MetricsCollector::new();
        drop(metrics.start_stage("git"));
        metrics.record_outcome("git", StageState::Succeeded);
        metrics.record_outcome("snapshot", StageState::Skipped);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.succeeded, 1);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.stages["git"].calls, 1);
        assert_eq!(snapshot.stages["snapshot"].last_state, Some(StageState::Skipped));

        let prom = snapshot.to_prometheus();
        assert!(prom.contains("shipyard_stage_calls_total{stage=\"git\"} 1"));
        assert!(prom.contains("shipyard_stage_outcomes_total{state=\"skipped\"} 1"));
    }
}
