use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::context::ReleaseContext;
use crate::errlog;
use crate::errors::{Op, ReleaseError, Result, Wrap};
use crate::observability::MetricsCollector;

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Human readable line logged when the stage starts.
    fn describe(&self) -> &'static str;

    /// Fills unset configuration. Runs for every stage before any of them
    /// runs, so it must not depend on state other stages produce.
    fn apply_defaults(&self, _ctx: &mut ReleaseContext) -> Result<()> {
        Ok(())
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Defaulted,
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub name: &'static str,
    pub state: StageState,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct RunReport {
    pub stages: Vec<StageOutcome>,
    error: Option<ReleaseError>,
}

impl RunReport {
    pub fn state_of(&self, name: &str) -> Option<StageState> {
        self.stages
            .iter()
            .find(|outcome| outcome.name == name)
            .map(|outcome| outcome.state)
    }

    pub fn error(&self) -> Option<&ReleaseError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<StageOutcome>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.stages),
        }
    }
}

pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
    metrics: MetricsCollector,
}

impl PipelineExecutor {
    pub fn new(stages: Vec<Box<dyn Stage>>, metrics: MetricsCollector) -> Self {
        Self { stages, metrics }
    }

    /// Applies every stage's defaults, then runs the stages in order.
    /// Skips are logged and the run continues; the first hard failure stops
    /// the run and later stages stay pending.
    #[instrument(skip_all)]
    pub fn run(&self, ctx: &mut ReleaseContext) -> RunReport {
        self.metrics.reset();
        let total_start = Instant::now();
        let mut outcomes: Vec<StageOutcome> = self
            .stages
            .iter()
            .map(|stage| StageOutcome {
                name: stage.name(),
                state: StageState::Pending,
                duration: Duration::ZERO,
            })
            .collect();

        let error = self
            .apply_defaults(ctx, &mut outcomes)
            .and_then(|()| self.run_stages(ctx, &mut outcomes))
            .err();

        self.metrics.record_total_duration(total_start.elapsed());
        RunReport {
            stages: outcomes,
            error,
        }
    }

    fn apply_defaults(
        &self,
        ctx: &mut ReleaseContext,
        outcomes: &mut [StageOutcome],
    ) -> Result<()> {
        const OP: Op = Op("pipeline.Defaults");
        for (stage, outcome) in self.stages.iter().zip(outcomes.iter_mut()) {
            debug!(stage = stage.name(), "applying defaults");
            match stage.apply_defaults(ctx) {
                Ok(()) => {}
                Err(err) if err.is_skip() => {
                    errlog::report(&err);
                }
                Err(err) => {
                    outcome.state = StageState::Failed;
                    self.metrics.record_outcome(stage.name(), StageState::Failed);
                    return Err(Wrap::new(OP)
                        .cause(err)
                        .message(format!("{}: failed to set defaults", stage.describe()))
                        .build());
                }
            }
            outcome.state = StageState::Defaulted;
        }
        Ok(())
    }

    fn run_stages(
        &self,
        ctx: &mut ReleaseContext,
        outcomes: &mut [StageOutcome],
    ) -> Result<()> {
        const OP: Op = Op("pipeline.Run");
        for (stage, outcome) in self.stages.iter().zip(outcomes.iter_mut()) {
            let span = tracing::span!(tracing::Level::DEBUG, "stage", stage = stage.name());
            let _span_guard = span.enter();
            info!(stage = stage.name(), "{}", stage.describe());

            let started = Instant::now();
            let result = {
                let _timer = self.metrics.start_stage(stage.name());
                stage.run(ctx)
            };
            outcome.duration = started.elapsed();

            match result {
                Ok(()) => outcome.state = StageState::Succeeded,
                Err(err) if err.is_skip() => {
                    errlog::report(&err);
                    outcome.state = StageState::Skipped;
                }
                Err(err) => {
                    outcome.state = StageState::Failed;
                    self.metrics.record_outcome(stage.name(), StageState::Failed);
                    return Err(Wrap::new(OP)
                        .cause(err)
                        .message(format!("{} failed", stage.describe()))
                        .build());
                }
            }
            self.metrics.record_outcome(stage.name(), outcome.state);
        }
        Ok(())
    }
}
