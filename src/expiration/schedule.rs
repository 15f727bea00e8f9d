// src/expiration/schedule.rs
//! Fixed-interval background jobs on dedicated threads

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::Result;

pub trait ScheduledTask: Send + Sync {
    fn name(&self) -> &str;

    /// One run. Must return promptly; failures are the task's to log.
    fn run(&self);
}

/// A running periodic job; stopping (or dropping) it ends the thread
#[derive(Debug)]
pub struct JobHandle {
    name: String,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(job = %self.name, "job thread ended abnormally");
            }
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Run `task` after `initial_delay`, then every `interval`
pub fn spawn_periodic(
    task: Arc<dyn ScheduledTask>,
    interval: Duration,
    initial_delay: Duration,
) -> Result<JobHandle> {
    let name = task.name().to_owned();
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let job = name.clone();

    let thread = thread::Builder::new()
        .name(format!("efv-{name}"))
        .spawn(move || {
            let mut wait = initial_delay;
            loop {
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                debug!(job = %job, "running scheduled task");
                if catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
                    error!(job = %job, "scheduled task panicked; schedule continues");
                }
                wait = interval;
            }
            debug!(job = %job, "job stopped");
        })?;

    info!(job = %name, interval_secs = interval.as_secs(), "job scheduled");
    Ok(JobHandle {
        name,
        stop_tx,
        thread: Some(thread),
    })
}

/// Owns a set of periodic jobs
#[derive(Debug, Default)]
pub struct PeriodicScheduler {
    jobs: Mutex<Vec<JobHandle>>,
}

impl PeriodicScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, task: Arc<dyn ScheduledTask>, interval: Duration) -> Result<()> {
        self.schedule_after(task, interval, interval)
    }

    pub fn schedule_after(
        &self,
        task: Arc<dyn ScheduledTask>,
        interval: Duration,
        initial_delay: Duration,
    ) -> Result<()> {
        let handle = spawn_periodic(task, interval, initial_delay)?;
        self.jobs.lock().push(handle);
        Ok(())
    }

    /// Stop every job with this name; returns whether any was running
    pub fn unschedule(&self, name: &str) -> bool {
        let stopped: Vec<JobHandle> = {
            let mut jobs = self.jobs.lock();
            let (stopped, kept): (Vec<JobHandle>, Vec<JobHandle>) =
                jobs.drain(..).partition(|job| job.name() == name);
            *jobs = kept;
            stopped
        };
        !stopped.is_empty()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.lock().iter().map(|job| job.name().to_owned()).collect()
    }

    pub fn shutdown(&self) {
        let jobs: Vec<JobHandle> = self.jobs.lock().drain(..).collect();
        if !jobs.is_empty() {
            info!(jobs = jobs.len(), "scheduler shutting down");
        }
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
