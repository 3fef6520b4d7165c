use std::sync::{Arc, Mutex};

use shipyard::config::Config;
use shipyard::context::ReleaseContext;
use shipyard::errors::{Kind, Op, ReleaseError, Result, skip};
use shipyard::observability::MetricsCollector;
use shipyard::pipeline::{PipelineExecutor, Stage, StageState};

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    Skip,
    Fail,
    FailDefaults,
}

struct Recording {
    name: &'static str,
    behaviour: Behaviour,
    log: Arc<Mutex<Vec<String>>>,
}

impl Stage for Recording {
    fn name(&self) -> &'static str {
        self.name
    }

    fn describe(&self) -> &'static str {
        self.name
    }

    fn apply_defaults(&self, _ctx: &mut ReleaseContext) -> Result<()> {
        self.log.lock().unwrap().push(format!("defaults:{}", self.name));
        match self.behaviour {
            Behaviour::FailDefaults => Err(ReleaseError::new(Op("defaults.broken"), "bad config")),
            _ => Ok(()),
        }
    }

    fn run(&self, ctx: &mut ReleaseContext) -> Result<()> {
        self.log.lock().unwrap().push(format!("run:{}", self.name));
        match self.behaviour {
            Behaviour::Succeed => {
                ctx.version = format!("{}-ran", self.name);
                Ok(())
            }
            Behaviour::Skip => Err(skip(Op("b.Run"), "nothing to do")),
            Behaviour::Fail => {
                Err(ReleaseError::new(Op("c.Run"), "boom").with_kind(Kind::BuildError))
            }
            Behaviour::FailDefaults => Ok(()),
        }
    }
}

fn stage(
    name: &'static str,
    behaviour: Behaviour,
    log: &Arc<Mutex<Vec<String>>>,
) -> Box<dyn Stage> {
    Box::new(Recording {
        name,
        behaviour,
        log: log.clone(),
    })
}

#[test]
fn hard_failure_stops_later_stages() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = PipelineExecutor::new(
        vec![
            stage("a", Behaviour::Succeed, &log),
            stage("b", Behaviour::Skip, &log),
            stage("c", Behaviour::Fail, &log),
            stage("d", Behaviour::Succeed, &log),
        ],
        MetricsCollector::new(),
    );
    let mut ctx = ReleaseContext::new(Config::default(), ".");
    let report = executor.run(&mut ctx);

    assert_eq!(
        *log.lock().unwrap(),
        [
            "defaults:a",
            "defaults:b",
            "defaults:c",
            "defaults:d",
            "run:a",
            "run:b",
            "run:c"
        ]
    );
    assert_eq!(report.state_of("a"), Some(StageState::Succeeded));
    assert_eq!(report.state_of("b"), Some(StageState::Skipped));
    assert_eq!(report.state_of("c"), Some(StageState::Failed));
    assert_eq!(report.state_of("d"), Some(StageState::Defaulted));
    assert_eq!(ctx.version, "a-ran");

    let err = report.into_result().unwrap_err();
    assert_eq!(err.ops(), vec![Op("pipeline.Run"), Op("c.Run")]);
    assert_eq!(err.kind(), Kind::BuildError);
    assert_eq!(err.to_string(), "c failed: boom");
}

#[test]
fn skips_alone_are_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let metrics = MetricsCollector::new();
    let executor = PipelineExecutor::new(
        vec![stage("a", Behaviour::Skip, &log), stage("b", Behaviour::Succeed, &log)],
        metrics.clone(),
    );
    let mut ctx = ReleaseContext::new(Config::default(), ".");
    let report = executor.run(&mut ctx);
    assert!(report.is_success());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.skipped, 1);
    assert_eq!(snapshot.succeeded, 1);
    assert_eq!(snapshot.failed, 0);
    assert_eq!(snapshot.stages["b"].calls, 1);
}

#[test]
fn defaults_failure_prevents_every_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let executor = PipelineExecutor::new(
        vec![
            stage("a", Behaviour::Succeed, &log),
            stage("broken", Behaviour::FailDefaults, &log),
            stage("c", Behaviour::Succeed, &log),
        ],
        MetricsCollector::new(),
    );
    let mut ctx = ReleaseContext::new(Config::default(), ".");
    let report = executor.run(&mut ctx);

    assert_eq!(*log.lock().unwrap(), ["defaults:a", "defaults:broken"]);
    assert_eq!(report.state_of("broken"), Some(StageState::Failed));
    assert_eq!(report.state_of("c"), Some(StageState::Pending));
    let err = report.error().unwrap();
    assert_eq!(err.ops()[0], Op("pipeline.Defaults"));
    assert!(err.to_string().contains("bad config"));
}
