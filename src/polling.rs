//! Driving an asynchronous job to completion.
//!
//! ```text
//! enqueue ──► sleep(initial_delay) ──► poll ──► Processed ──► Ok(output)
//!                                       │  ▲
//!                                       │  └── sleep(delay) ◄── Waiting | Processing
//!                                       └────► Failed ──► JobFailed
//! ```
//!
//! At most one poll is in flight. Dropping the returned future abandons the
//! job on the client side; a shared cancel flag does the same at the next
//! iteration boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::{MindeeError, Result, NO_DETAIL};
use crate::input::InputSource;
use crate::parsing::{ApiError, Job};

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_RETRIES: u32 = 80;

pub const MIN_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const MIN_DELAY: Duration = Duration::from_secs(1);
pub const MIN_RETRIES: u32 = 1;

/// Delays and retry budget of the poll loop.
///
/// Always valid: every constructor checks the minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingOptions {
    initial_delay: Duration,
    delay: Duration,
    max_retries: u32,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            delay: DEFAULT_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl PollingOptions {
    pub fn new(initial_delay: Duration, delay: Duration, max_retries: u32) -> Result<Self> {
        if initial_delay < MIN_INITIAL_DELAY {
            return Err(MindeeError::Config(format!(
                "initial_delay must be at least {MIN_INITIAL_DELAY:?}, got {initial_delay:?}"
            )));
        }
        if delay < MIN_DELAY {
            return Err(MindeeError::Config(format!(
                "delay must be at least {MIN_DELAY:?}, got {delay:?}"
            )));
        }
        if max_retries < MIN_RETRIES {
            return Err(MindeeError::Config(format!(
                "max_retries must be at least {MIN_RETRIES}, got {max_retries}"
            )));
        }
        Ok(Self {
            initial_delay,
            delay,
            max_retries,
        })
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on the time spent sleeping before giving up.
    pub fn max_wait(&self) -> Duration {
        self.initial_delay + self.delay * self.max_retries.saturating_sub(1)
    }
}

/// What a single poll observed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState<T> {
    Waiting,
    Processing,
    Processed(T),
    Failed(Option<ApiError>),
}

impl<T> JobState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed(_) | Self::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Processing => "processing",
            Self::Processed(_) => "processed",
            Self::Failed(_) => "failed",
        }
    }
}

/// A remote queue of asynchronous jobs.
///
/// `poll` must be idempotent: the poller calls it repeatedly with the
/// same id until the job is terminal.
#[async_trait]
pub trait JobQueue: Send + Sync {
    type Output: Send;

    async fn enqueue(&self, source: &InputSource) -> Result<Job>;

    async fn poll(&self, job_id: &str) -> Result<JobState<Self::Output>>;
}

/// Runs the poll loop against any [`JobQueue`].
#[derive(Debug, Clone, Default)]
pub struct AsyncPoller {
    options: PollingOptions,
    cancel: Option<Arc<AtomicBool>>,
}

impl AsyncPoller {
    pub fn new(options: PollingOptions) -> Self {
        Self {
            options,
            cancel: None,
        }
    }

    /// Stop at the next iteration once `flag` is set.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &PollingOptions {
        &self.options
    }

    fn check_cancelled(&self, job_id: &str) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                warn!(job_id, "Polling cancelled");
                Err(MindeeError::Cancelled(job_id.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Poll `job_id` until it is terminal or the retry budget runs out.
    #[instrument(skip(self, queue), fields(max_retries = self.options.max_retries))]
    pub async fn poll_until_complete<Q>(&self, queue: &Q, job_id: &str) -> Result<Q::Output>
    where
        Q: JobQueue + ?Sized,
    {
        tokio::time::sleep(self.options.initial_delay).await;

        for attempt in 1..=self.options.max_retries {
            self.check_cancelled(job_id)?;

            let state = queue.poll(job_id).await?;
            debug!(job_id, attempt, state = state.name(), "Polled job");
            match state {
                JobState::Processed(output) => {
                    info!(job_id, attempt, "Job processed");
                    return Ok(output);
                }
                JobState::Failed(error) => {
                    let code = error.as_ref().and_then(|e| e.code.clone());
                    let detail = error
                        .as_ref()
                        .and_then(ApiError::detail)
                        .unwrap_or_else(|| NO_DETAIL.to_string());
                    warn!(job_id, attempt, %detail, "Job failed");
                    return Err(MindeeError::JobFailed {
                        job_id: job_id.to_string(),
                        code,
                        detail,
                    });
                }
                JobState::Waiting | JobState::Processing => {
                    if attempt < self.options.max_retries {
                        tokio::time::sleep(self.options.delay).await;
                    }
                }
            }
        }

        Err(MindeeError::Timeout {
            job_id: job_id.to_string(),
            attempts: self.options.max_retries,
        })
    }

    /// Enqueue `source`, then [`poll_until_complete`](Self::poll_until_complete).
    pub async fn enqueue_and_poll<Q>(&self, queue: &Q, source: &InputSource) -> Result<Q::Output>
    where
        Q: JobQueue + ?Sized,
    {
        let job = queue.enqueue(source).await?;
        info!(job_id = %job.id, status = %job.status, "Job enqueued");
        self.poll_until_complete(queue, &job.id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::NaiveDateTime;
    use tokio::time::Instant;

    use super::*;
    use crate::input::UrlInputSource;
    use crate::parsing::JobStatus;

    /// Replays scripted states, then repeats the last one.
    struct ScriptedQueue {
        states: Mutex<VecDeque<JobState<String>>>,
        polls: Mutex<u32>,
    }

    impl ScriptedQueue {
        fn new(states: Vec<JobState<String>>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobQueue for ScriptedQueue {
        type Output = String;

        async fn enqueue(&self, _source: &InputSource) -> Result<Job> {
            Ok(Job {
                id: "job-1".into(),
                status: JobStatus::Waiting,
                issued_at: NaiveDateTime::default(),
                available_at: None,
                error: None,
            })
        }

        async fn poll(&self, _job_id: &str) -> Result<JobState<String>> {
            *self.polls.lock().unwrap() += 1;
            let mut states = self.states.lock().unwrap();
            if states.len() > 1 {
                Ok(states.pop_front().unwrap())
            } else {
                Ok(states.front().cloned().unwrap())
            }
        }
    }

    fn fast() -> PollingOptions {
        PollingOptions::new(Duration::from_secs(1), Duration::from_secs(1), 3).unwrap()
    }

    #[test]
    fn defaults() {
        let o = PollingOptions::default();
        assert_eq!(o.initial_delay(), Duration::from_secs(2));
        assert_eq!(o.delay(), Duration::from_millis(1500));
        assert_eq!(o.max_retries(), 80);
    }

    #[test]
    fn minimums_are_config_errors() {
        let one = Duration::from_secs(1);
        let short = Duration::from_millis(999);
        assert!(matches!(PollingOptions::new(short, one, 3), Err(MindeeError::Config(_))));
        assert!(matches!(PollingOptions::new(one, short, 3), Err(MindeeError::Config(_))));
        assert!(matches!(PollingOptions::new(one, one, 0), Err(MindeeError::Config(_))));
        assert!(PollingOptions::new(one, one, 1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn always_processing_times_out_after_max_retries() {
        let queue = ScriptedQueue::new(vec![JobState::Processing]);
        let err = AsyncPoller::new(fast())
            .poll_until_complete(&queue, "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, MindeeError::Timeout { attempts: 3, .. }));
        assert!(err.to_string().contains("3 attempts"));
        assert_eq!(queue.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_output_once_processed() {
        let queue = ScriptedQueue::new(vec![
            JobState::Waiting,
            JobState::Processing,
            JobState::Processed("done".into()),
        ]);
        let start = Instant::now();
        let out = AsyncPoller::new(fast())
            .poll_until_complete(&queue, "job-1")
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(queue.polls(), 3);
        // initial delay + two retry delays
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_carries_server_detail() {
        let queue = ScriptedQueue::new(vec![JobState::Failed(Some(ApiError {
            code: Some("ServerError".into()),
            message: Some("An error occurred".into()),
            details: Some("Corrupted page 3".into()),
        }))]);
        let err = AsyncPoller::new(fast())
            .poll_until_complete(&queue, "job-1")
            .await
            .unwrap_err();
        match err {
            MindeeError::JobFailed { job_id, code, detail } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(code.as_deref(), Some("ServerError"));
                assert_eq!(detail, "Corrupted page 3");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_detail_uses_placeholder() {
        let queue = ScriptedQueue::new(vec![JobState::Failed(None)]);
        let err = AsyncPoller::new(fast())
            .poll_until_complete(&queue, "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, MindeeError::JobFailed { ref detail, .. } if detail == NO_DETAIL));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_flag_stops_the_loop() {
        let queue = ScriptedQueue::new(vec![JobState::Processing]);
        let flag = Arc::new(AtomicBool::new(true));
        let err = AsyncPoller::new(fast())
            .with_cancel_flag(flag)
            .poll_until_complete(&queue, "job-1")
            .await
            .unwrap_err();
        assert!(matches!(err, MindeeError::Cancelled(ref id) if id == "job-1"));
        assert_eq!(queue.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_then_poll() {
        let queue = ScriptedQueue::new(vec![JobState::Processed("ok".into())]);
        let source = UrlInputSource::new("https://example.com/a.pdf").unwrap().into();
        let out = AsyncPoller::new(fast())
            .enqueue_and_poll(&queue, &source)
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }
}
