//! Cooperative multi-process driver
//!
//! Each job runs as its own tokio task: `run(steps_per_tick)`, collect the
//! printed lines, yield, repeat. Processes share nothing but their
//! read-only scripts, so interleaving them needs no locking.

use thiserror::Error;
use tracing::{debug, warn};

use crate::interpreter::{Process, ProcessError, RunStatus, Value};

/// A named process to drive
pub struct Job {
    pub name: String,
    pub process: Process,
}

impl Job {
    pub fn new(name: impl Into<String>, process: Process) -> Self {
        Self {
            name: name.into(),
            process,
        }
    }
}

/// What one job produced
#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub output: Vec<String>,
    /// Ticks taken, counting the final one
    pub ticks: usize,
    pub outcome: Result<Value, ProcessError>,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("steps per tick must be at least 1")]
    ZeroSteps,
    #[error("job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Run every job to completion, interleaving them on the tokio runtime
///
/// Reports come back in the order the jobs were given.
pub async fn run_interleaved(
    jobs: Vec<Job>,
    steps_per_tick: usize,
) -> Result<Vec<JobReport>, DriverError> {
    if steps_per_tick == 0 {
        return Err(DriverError::ZeroSteps);
    }

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| tokio::spawn(drive(job, steps_per_tick)))
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await?);
    }
    Ok(reports)
}

async fn drive(mut job: Job, steps_per_tick: usize) -> JobReport {
    let mut output = Vec::new();
    let mut ticks = 0;

    let outcome = loop {
        ticks += 1;
        let status = job.process.run(steps_per_tick);
        output.extend(job.process.take_output());

        match status {
            Ok(RunStatus::Running) => tokio::task::yield_now().await,
            Ok(RunStatus::Finished) => {
                let value = job.process.result().cloned().unwrap_or(Value::None);
                debug!(job = %job.name, ticks, "job finished");
                break Ok(value);
            }
            Err(err) => {
                warn!(job = %job.name, ticks, error = %err, "job failed");
                break Err(err);
            }
        }
    };

    JobReport {
        name: job.name,
        output,
        ticks,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::compile;

    fn job(name: &str, source: &str) -> Job {
        Job::new(name, Process::new(compile(source).unwrap()))
    }

    #[tokio::test]
    async fn test_jobs_report_in_order() {
        let jobs = vec![
            job("count", "i = 0\nwhile i < 3:\n    print i\n    i += 1\nreturn i\n"),
            job("hello", "print 'hello'\n"),
        ];

        let reports = run_interleaved(jobs, 2).await.unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "count");
        assert_eq!(reports[0].output, vec!["0", "1", "2"]);
        assert_eq!(reports[0].outcome.as_ref().unwrap(), &Value::Number(3.0));
        assert!(reports[0].ticks > 1);

        assert_eq!(reports[1].output, vec!["hello"]);
        assert_eq!(reports[1].outcome.as_ref().unwrap(), &Value::None);
    }

    #[tokio::test]
    async fn test_failing_job_does_not_affect_others() {
        let jobs = vec![
            job("bad", "print 1\nthrow 'nope'\n"),
            job("good", "x = 2 * 21\nprint x\n"),
        ];

        let reports = run_interleaved(jobs, 1).await.unwrap();

        assert_eq!(reports[0].output, vec!["1"]);
        assert!(matches!(reports[0].outcome, Err(ProcessError::Unhandled(_))));
        assert_eq!(reports[1].output, vec!["42"]);
        assert!(reports[1].outcome.is_ok());
    }

    #[tokio::test]
    async fn test_zero_steps_rejected() {
        let result = run_interleaved(vec![job("x", "pass\n")], 0).await;
        assert!(matches!(result, Err(DriverError::ZeroSteps)));
    }
}
