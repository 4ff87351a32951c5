//! Background generation jobs
//!
//! [`JobRunner`] owns one persistent worker thread that runs blocking batch
//! calls. The owner submits a job with [`JobRunner::start`] and collects the
//! single tagged result with [`JobRunner::poll`] on its own schedule; the
//! worker never touches game state.
//!
//! # Design Notes
//!
//! - At most one job is outstanding at a time. The busy flag is taken with
//!   an atomic compare-and-swap in `start` and released only when the owner
//!   consumes the result in `poll`, so concurrent starts reject all but one.
//! - Jobs go through a `crossbeam::channel::bounded(1)`; results come back
//!   on an unbounded channel polled with `try_recv`.
//! - A panicking job is caught on the worker and reported as
//!   [`JobMessage::Error`]; the worker keeps running.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use thiserror::Error;

use crate::dialogue::DialogueLine;
use crate::game::Phase;
use crate::threading::{Thread, ThreadError};

/// Tagged result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMessage {
    Events(Vec<DialogueLine>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// Bookkeeping for the outstanding job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub id: u64,
    pub phase: Phase,
    pub round: u32,
    pub status: JobStatus,
    /// The owner moved on; a successful result is to be discarded
    pub abandoned: bool,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("a generation job is already outstanding")]
    Busy,
    #[error("the job worker has shut down")]
    Shutdown,
    #[error("cannot start the job worker: {0}")]
    Spawn(#[from] ThreadError),
}

type Work = Box<dyn FnOnce() -> JobMessage + Send + 'static>;

struct Envelope {
    id: u64,
    work: Work,
}

/// Runs one blocking job at a time on a dedicated worker
pub struct JobRunner {
    busy: AtomicBool,
    next_id: AtomicU64,
    current: Arc<Mutex<Option<GenerationJob>>>,
    jobs: Mutex<Option<Sender<Envelope>>>,
    results: Receiver<(u64, JobMessage)>,
    worker: Mutex<Option<Thread<()>>>,
}

impl JobRunner {
    /// Spawn the worker thread
    ///
    /// # Errors
    /// Returns `JobError::Spawn` if the worker thread cannot be created
    pub fn new() -> Result<Self, JobError> {
        let (job_tx, job_rx) = channel::bounded::<Envelope>(1);
        let (result_tx, result_rx) = channel::unbounded();
        let current = Arc::new(Mutex::new(None::<GenerationJob>));

        let worker_current = Arc::clone(&current);
        let worker = Thread::spawn("generation-worker", move || {
            worker_loop(job_rx, result_tx, worker_current)
        })?;

        Ok(Self {
            busy: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            current,
            jobs: Mutex::new(Some(job_tx)),
            results: result_rx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Submit a blocking job
    ///
    /// # Errors
    /// `JobError::Busy` while another job's result has not been consumed,
    /// `JobError::Shutdown` after [`JobRunner::shutdown`]
    pub fn start<F>(&self, phase: Phase, round: u32, work: F) -> Result<u64, JobError>
    where
        F: FnOnce() -> JobMessage + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(JobError::Busy);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.current.lock() = Some(GenerationJob {
            id,
            phase,
            round,
            status: JobStatus::Pending,
            abandoned: false,
        });

        let sent = match self.jobs.lock().as_ref() {
            Some(tx) => tx
                .send(Envelope {
                    id,
                    work: Box::new(work),
                })
                .is_ok(),
            None => false,
        };
        if !sent {
            self.current.lock().take();
            self.busy.store(false, Ordering::Release);
            return Err(JobError::Shutdown);
        }

        log::debug!("generation job {} started ({} round {})", id, phase, round);
        Ok(id)
    }

    /// Take the outstanding job's result, if it has arrived
    pub fn poll(&self) -> Option<(GenerationJob, JobMessage)> {
        let (id, message) = match self.results.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
        };

        let job = self.current.lock().take();
        self.busy.store(false, Ordering::Release);

        let mut job = match job {
            Some(job) if job.id == id => job,
            _ => {
                log::warn!("dropping result of unknown generation job {}", id);
                return None;
            }
        };
        job.status = match message {
            JobMessage::Events(_) => JobStatus::Done,
            JobMessage::Error(_) => JobStatus::Failed,
        };
        Some((job, message))
    }

    /// Whether a job's result is still to be consumed
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the outstanding job
    pub fn current(&self) -> Option<GenerationJob> {
        self.current.lock().clone()
    }

    /// Mark the outstanding job abandoned; returns false if there is none
    pub fn abandon_current(&self) -> bool {
        match self.current.lock().as_mut() {
            Some(job) => {
                job.abandoned = true;
                true
            }
            None => false,
        }
    }

    /// Close the job channel and join the worker
    ///
    /// A job already running is allowed to finish. Idempotent.
    pub fn shutdown(&self) {
        self.jobs.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if let Err(err) = worker.join() {
                log::warn!("generation worker: {}", err);
            }
        }
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    jobs: Receiver<Envelope>,
    results: Sender<(u64, JobMessage)>,
    current: Arc<Mutex<Option<GenerationJob>>>,
) {
    for Envelope { id, work } in jobs.iter() {
        if let Some(job) = current.lock().as_mut().filter(|job| job.id == id) {
            job.status = JobStatus::Running;
        }

        let message = panic::catch_unwind(AssertUnwindSafe(work))
            .unwrap_or_else(|payload| JobMessage::Error(panic_reason(payload.as_ref())));

        if results.send((id, message)).is_err() {
            break;
        }
    }
    log::debug!("generation worker exiting");
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("generation job panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("generation job panicked: {s}")
    } else {
        "generation job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for(runner: &JobRunner) -> (GenerationJob, JobMessage) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = runner.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "job never finished");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_job_result_is_delivered_once() {
        let runner = JobRunner::new().unwrap();
        let id = runner
            .start(Phase::DayDiscussion, 1, || {
                JobMessage::Events(vec![DialogueLine::player("Ada", "hi")])
            })
            .unwrap();

        let (job, message) = wait_for(&runner);
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(message, JobMessage::Events(vec![DialogueLine::player("Ada", "hi")]));
        assert!(!runner.is_busy());
        assert!(runner.poll().is_none());
    }

    #[test]
    fn test_second_start_is_rejected_until_result_consumed() {
        let runner = JobRunner::new().unwrap();
        runner
            .start(Phase::DayDiscussion, 2, || JobMessage::Events(Vec::new()))
            .unwrap();
        thread::sleep(Duration::from_millis(20));

        assert!(matches!(
            runner.start(Phase::DayDiscussion, 2, || JobMessage::Events(Vec::new())),
            Err(JobError::Busy)
        ));

        wait_for(&runner);
        assert!(runner
            .start(Phase::DayDiscussion, 2, || JobMessage::Events(Vec::new()))
            .is_ok());
    }

    /// Concurrent starts from many threads admit exactly one job
    #[test]
    fn test_concurrent_starts_admit_one() {
        let runner = Arc::new(JobRunner::new().unwrap());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = Arc::clone(&runner);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    runner
                        .start(Phase::DayDiscussion, 2, || {
                            thread::sleep(Duration::from_millis(20));
                            JobMessage::Events(Vec::new())
                        })
                        .is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_panicking_job_reports_error() {
        let runner = JobRunner::new().unwrap();
        runner
            .start(Phase::DayDiscussion, 1, || panic!("backend exploded"))
            .unwrap();

        let (job, message) = wait_for(&runner);
        assert_eq!(job.status, JobStatus::Failed);
        match message {
            JobMessage::Error(reason) => assert!(reason.contains("backend exploded")),
            other => panic!("unexpected message: {:?}", other),
        }

        runner
            .start(Phase::DayDiscussion, 1, || JobMessage::Events(Vec::new()))
            .unwrap();
        assert_eq!(wait_for(&runner).0.status, JobStatus::Done);
    }

    #[test]
    fn test_abandon_marks_current_job() {
        let runner = JobRunner::new().unwrap();
        assert!(!runner.abandon_current());
        runner
            .start(Phase::DayDiscussion, 3, || JobMessage::Events(Vec::new()))
            .unwrap();
        assert!(runner.abandon_current());
        let (job, _) = wait_for(&runner);
        assert!(job.abandoned);
    }

    #[test]
    fn test_start_after_shutdown_fails() {
        let runner = JobRunner::new().unwrap();
        runner.shutdown();
        assert!(matches!(
            runner.start(Phase::Night, 1, || JobMessage::Events(Vec::new())),
            Err(JobError::Shutdown)
        ));
        assert!(!runner.is_busy());
    }
}
