//! Bounded fan-out that never cancels siblings.
//!
//! Tasks queue up via [`Group::submit`] and run on a dedicated rayon pool
//! when [`Group::wait`] is called. Every task runs to completion regardless
//! of how the others fare; the aggregate error keeps the first failure (in
//! submission order) as its cause and lists the rest in its message.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::debug;

use crate::errors::{Op, ReleaseError, Result, ResultExt, Wrap};

type Task<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

pub struct Group<'a> {
    parallelism: usize,
    tasks: Vec<Task<'a>>,
}

impl<'a> Group<'a> {
    /// `parallelism <= 0` means one worker per task.
    pub fn new(parallelism: i64) -> Self {
        Self {
            parallelism: usize::try_from(parallelism).unwrap_or(0),
            tasks: Vec::new(),
        }
    }

    pub fn submit<F>(&mut self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'a,
    {
        self.tasks.push(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn wait(self) -> Result<()> {
        const OP: Op = Op("group.Wait");
        let total = self.tasks.len();
        if total == 0 {
            return Ok(());
        }
        let workers = match self.parallelism {
            0 => total,
            limit => limit.min(total),
        };
        debug!(tasks = total, workers, "starting fan-out");

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("fanout-{idx}"))
            .build()
            .wrap_op_msg(OP, "failed to start worker pool")?;
        let tasks = self.tasks;
        let results: Vec<Result<()>> =
            pool.install(|| tasks.into_par_iter().map(|task| task()).collect());

        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first) = failures.next() else {
            return Ok(());
        };
        let others: Vec<ReleaseError> = failures.collect();
        if others.is_empty() {
            return Err(ReleaseError::caused_by(OP, first));
        }
        let failed = others.len() + 1;
        let listed = others
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(Wrap::new(OP)
            .cause(first)
            .message(format!("{failed} of {total} tasks failed ({listed})"))
            .build())
    }
}
