//! Refresh Jobs
//!
//! A cache miss on the events endpoint enqueues a [`RefreshJob`]. A pool of
//! workers drains the queue and runs each job through the caching provider,
//! which fetches from upstream and writes the result into the cache store.
//!
//! Delivery is at-least-once. A failed job is re-enqueued with its attempt
//! counter bumped until `max_attempts` is reached; after that it is logged
//! and dropped. Nothing is reported back to the client, which simply polls
//! again and either finds the entry or triggers a new cycle.
//!
//! By default nothing deduplicates jobs for the same key: two misses before
//! the first job lands produce two jobs. Setting `single_flight` adds a
//! per-key lease so that only the first miss enqueues.
//!
//! ```ignore
//! let config = RefreshJobConfig::from_env()?;
//! let (queue, receiver) = JobQueue::channel(&config);
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let pool = RefreshWorkerPool::spawn(provider, queue.clone(), receiver, &config, shutdown_rx);
//!
//! queue.enqueue(55.75, 37.61)?;
//!
//! let _ = shutdown_tx.send(true);
//! pool.join().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cassiopeia_core::{
    AstroError, AstroEvent, CacheKey, CacheKeyBuilder, ConfigError, DEFAULT_JOB_ATTEMPTS,
    DEFAULT_WINDOW_DAYS,
};
use cassiopeia_provider::EventDataProvider;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_REFRESH_LEASE_SECS, DEFAULT_REFRESH_QUEUE_CAPACITY, DEFAULT_REFRESH_RETRY_DELAY_MS,
    DEFAULT_REFRESH_WORKERS,
};
use crate::telemetry::metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the refresh queue and its workers.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshJobConfig {
    /// Number of concurrent worker tasks (default: 4)
    pub workers: usize,

    /// Bounded queue capacity; enqueue fails when full (default: 1024)
    pub queue_capacity: usize,

    /// Attempts per job, including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before a failed job is re-enqueued (default: 1s)
    pub retry_delay: Duration,

    /// Look-ahead window fetched by every job (default: 7 days)
    pub days_ahead: u32,

    /// Coalesce misses for a key while a job for it is in flight (default: false)
    pub single_flight: bool,

    /// How long a single-flight lease lives if its job never finishes (default: 60s)
    pub lease: Duration,
}

impl Default for RefreshJobConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_REFRESH_WORKERS,
            queue_capacity: DEFAULT_REFRESH_QUEUE_CAPACITY,
            max_attempts: DEFAULT_JOB_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_REFRESH_RETRY_DELAY_MS),
            days_ahead: DEFAULT_WINDOW_DAYS,
            single_flight: false,
            lease: Duration::from_secs(DEFAULT_REFRESH_LEASE_SECS),
        }
    }
}

impl RefreshJobConfig {
    /// Create RefreshJobConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CASSIOPEIA_REFRESH_WORKERS`: Worker count (default: 4)
    /// - `CASSIOPEIA_REFRESH_QUEUE_CAPACITY`: Queue bound (default: 1024)
    /// - `CASSIOPEIA_REFRESH_MAX_ATTEMPTS`: Attempts per job (default: 3)
    /// - `CASSIOPEIA_REFRESH_RETRY_DELAY_MS`: Delay before re-enqueue (default: 1000)
    /// - `CASSIOPEIA_REFRESH_SINGLE_FLIGHT`: `true`/`false` (default: false)
    /// - `CASSIOPEIA_REFRESH_LEASE_SECS`: Single-flight lease (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let single_flight = match lookup("CASSIOPEIA_REFRESH_SINGLE_FLIGHT") {
            None => defaults.single_flight,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "CASSIOPEIA_REFRESH_SINGLE_FLIGHT".to_string(),
                        value: raw,
                        reason: "expected true or false".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            workers: positive(&lookup, "CASSIOPEIA_REFRESH_WORKERS", defaults.workers)?,
            queue_capacity: positive(
                &lookup,
                "CASSIOPEIA_REFRESH_QUEUE_CAPACITY",
                defaults.queue_capacity,
            )?,
            max_attempts: positive(
                &lookup,
                "CASSIOPEIA_REFRESH_MAX_ATTEMPTS",
                defaults.max_attempts,
            )?,
            retry_delay: match number::<u64, _>(&lookup, "CASSIOPEIA_REFRESH_RETRY_DELAY_MS")? {
                Some(ms) => Duration::from_millis(ms),
                None => defaults.retry_delay,
            },
            single_flight,
            lease: match number::<u64, _>(&lookup, "CASSIOPEIA_REFRESH_LEASE_SECS")? {
                Some(secs) => Duration::from_secs(secs),
                None => defaults.lease,
            },
            ..defaults
        })
    }
}

fn number<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw.clone(),
                reason: "expected a non-negative integer".to_string(),
            }),
    }
}

fn positive<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default + ToString,
    F: Fn(&str) -> Option<String>,
{
    match number::<T, F>(lookup, name)? {
        None => Ok(default),
        Some(value) if value > T::default() => Ok(value),
        Some(value) => Err(ConfigError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        }),
    }
}

// ============================================================================
// JOB
// ============================================================================

/// One request to refresh the cache entry for a position.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshJob {
    pub job_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub days_ahead: u32,
    /// Cache key as of the first enqueue. Single-flight leases are held
    /// under this key for every attempt, even past UTC midnight.
    pub key: CacheKey,
    /// 1-based
    pub attempt: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl RefreshJob {
    pub fn new(
        keys: &CacheKeyBuilder,
        latitude: f64,
        longitude: f64,
        days_ahead: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            job_id: Uuid::now_v7(),
            key: keys.build_today(latitude, longitude, days_ahead),
            latitude,
            longitude,
            days_ahead,
            attempt: 1,
            max_attempts: max_attempts.max(1),
            enqueued_at: Utc::now(),
        }
    }

    /// The follow-up job after a failure, or `None` once attempts are spent.
    /// Keeps the job id so every attempt of one refresh logs under one id.
    pub fn next_attempt(&self) -> Option<Self> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        Some(Self {
            attempt: self.attempt + 1,
            enqueued_at: Utc::now(),
            ..self.clone()
        })
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Counters for job lifecycle transitions since startup.
#[derive(Debug, Default)]
pub struct JobStats {
    pub enqueued: AtomicU64,
    pub coalesced: AtomicU64,
    pub started: AtomicU64,
    pub succeeded: AtomicU64,
    pub retried: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl JobStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct JobStatsSnapshot {
    pub enqueued: u64,
    pub coalesced: u64,
    pub started: u64,
    pub succeeded: u64,
    pub retried: u64,
    /// Jobs that spent every attempt
    pub failed: u64,
    /// Retries that could not be re-enqueued
    pub dropped: u64,
}

// ============================================================================
// SINGLE-FLIGHT LEASES
// ============================================================================

/// Per-key leases marking a refresh as in flight.
///
/// A lease expires on its own so a job lost to a crash cannot block its key
/// forever.
#[derive(Debug)]
pub struct InFlightRegistry {
    leases: DashMap<CacheKey, Instant>,
    lease: Duration,
}

impl InFlightRegistry {
    pub fn new(lease: Duration) -> Self {
        Self {
            leases: DashMap::new(),
            lease,
        }
    }

    /// Take the lease for `key`. Returns false while another live lease holds it.
    pub fn try_acquire(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        match self.leases.entry(key.clone()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    return false;
                }
                held.insert(now + self.lease);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now + self.lease);
                true
            }
        }
    }

    pub fn release(&self, key: &CacheKey) {
        self.leases.remove(key);
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

// ============================================================================
// QUEUE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("refresh queue is full")]
    Full,

    #[error("refresh queue is closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for EnqueueError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new job is waiting for a worker.
    Queued(Uuid),
    /// A job for the same key is already in flight (single-flight only).
    Coalesced,
}

/// Producer side of the refresh queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<RefreshJob>,
    stats: Arc<JobStats>,
    keys: CacheKeyBuilder,
    in_flight: Option<Arc<InFlightRegistry>>,
    days_ahead: u32,
    max_attempts: u32,
}

impl JobQueue {
    /// Create a queue and the receiver its workers will drain.
    pub fn channel(config: &RefreshJobConfig) -> (Self, mpsc::Receiver<RefreshJob>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let in_flight = config
            .single_flight
            .then(|| Arc::new(InFlightRegistry::new(config.lease)));
        let queue = Self {
            sender,
            stats: Arc::new(JobStats::new()),
            keys: CacheKeyBuilder::default(),
            in_flight,
            days_ahead: config.days_ahead,
            max_attempts: config.max_attempts,
        };
        (queue, receiver)
    }

    /// Enqueue a first-attempt job for `(latitude, longitude)` without waiting.
    pub fn enqueue(&self, latitude: f64, longitude: f64) -> Result<EnqueueOutcome, EnqueueError> {
        let job = RefreshJob::new(
            &self.keys,
            latitude,
            longitude,
            self.days_ahead,
            self.max_attempts,
        );

        let lease_key = match &self.in_flight {
            Some(registry) => {
                let key = job.key.clone();
                if !registry.try_acquire(&key) {
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "Refresh already in flight, not enqueuing");
                    return Ok(EnqueueOutcome::Coalesced);
                }
                Some((registry, key))
            }
            None => None,
        };

        let job_id = job.job_id;
        if let Err(e) = self.sender.try_send(job) {
            if let Some((registry, key)) = lease_key {
                registry.release(&key);
            }
            return Err(e.into());
        }

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(job_id = %job_id, latitude, longitude, "Refresh job enqueued");
        Ok(EnqueueOutcome::Queued(job_id))
    }

    /// Put a follow-up attempt back on the queue after `delay`.
    ///
    /// Runs detached so the worker that saw the failure is free immediately.
    fn schedule_retry(&self, job: RefreshJob, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job_id = job.job_id;
            let attempt = job.attempt;
            if let Err(e) = queue.sender.try_send(job.clone()) {
                let e = EnqueueError::from(e);
                queue.stats.dropped.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = metrics() {
                    m.record_refresh_job("dropped");
                }
                queue.release(&job);
                tracing::error!(
                    job_id = %job_id,
                    attempt,
                    error = %e,
                    "Could not re-enqueue refresh job, dropping"
                );
            }
        });
    }

    /// Release the single-flight lease held by `job`, if any.
    fn release(&self, job: &RefreshJob) {
        if let Some(registry) = &self.in_flight {
            registry.release(&job.key);
        }
    }

    pub fn stats(&self) -> Arc<JobStats> {
        Arc::clone(&self.stats)
    }

    /// Window every job fetches; the read path keys its lookups on it too.
    pub fn days_ahead(&self) -> u32 {
        self.days_ahead
    }

    pub fn single_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

// ============================================================================
// WORKER POOL
// ============================================================================

/// Worker tasks draining the refresh queue.
pub struct RefreshWorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl RefreshWorkerPool {
    /// Start `config.workers` workers sharing `receiver`.
    ///
    /// Workers stop when `shutdown_rx` flips to true or the queue closes. A
    /// job already running is finished first.
    pub fn spawn(
        provider: Arc<dyn EventDataProvider>,
        queue: JobQueue,
        receiver: mpsc::Receiver<RefreshJob>,
        config: &RefreshJobConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = config.workers.max(1);

        tracing::info!(
            workers,
            queue_capacity = config.queue_capacity,
            max_attempts = config.max_attempts,
            retry_delay_ms = config.retry_delay.as_millis() as u64,
            single_flight = config.single_flight,
            provider = provider.name(),
            "Refresh worker pool started"
        );

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&provider),
                    queue.clone(),
                    Arc::clone(&receiver),
                    config.retry_delay,
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Refresh worker panicked");
            }
        }
        tracing::info!("Refresh worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    provider: Arc<dyn EventDataProvider>,
    queue: JobQueue,
    receiver: Arc<Mutex<mpsc::Receiver<RefreshJob>>>,
    retry_delay: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            job = async { receiver.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            tracing::debug!(worker_id, "Refresh queue closed");
            break;
        };

        run_job(worker_id, &provider, &queue, job, retry_delay).await;
    }

    tracing::debug!(worker_id, "Refresh worker exiting");
}

/// Why one attempt produced no events.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error(transparent)]
    Provider(#[from] AstroError),

    #[error("provider task aborted: {0}")]
    Aborted(String),
}

impl AttemptFailure {
    fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::Provider(e) => e.kind(),
            AttemptFailure::Aborted(_) => "aborted",
        }
    }
}

/// Run the provider call on its own task so a panic inside it fails the
/// attempt instead of killing the worker.
async fn run_attempt(
    provider: &Arc<dyn EventDataProvider>,
    job: &RefreshJob,
) -> Result<Vec<AstroEvent>, AttemptFailure> {
    let provider = Arc::clone(provider);
    let (latitude, longitude, days_ahead) = (job.latitude, job.longitude, job.days_ahead);
    let handle =
        tokio::spawn(async move { provider.fetch(latitude, longitude, days_ahead).await });

    match handle.await {
        Ok(result) => Ok(result?),
        Err(e) => Err(AttemptFailure::Aborted(e.to_string())),
    }
}

/// Execute one attempt and decide the job's next state.
async fn run_job(
    worker_id: usize,
    provider: &Arc<dyn EventDataProvider>,
    queue: &JobQueue,
    job: RefreshJob,
    retry_delay: Duration,
) {
    let stats = &queue.stats;
    stats.started.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    tracing::info!(
        job_id = %job.job_id,
        worker_id,
        attempt = job.attempt,
        max_attempts = job.max_attempts,
        latitude = job.latitude,
        longitude = job.longitude,
        "Refresh job started"
    );

    match run_attempt(provider, &job).await {
        Ok(events) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            if let Some(m) = metrics() {
                m.record_refresh_job("succeeded");
            }
            queue.release(&job);
            tracing::info!(
                job_id = %job.job_id,
                attempt = job.attempt,
                events = events.len(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Refresh job succeeded"
            );
        }
        Err(e) => match job.next_attempt() {
            Some(next) => {
                stats.retried.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = metrics() {
                    m.record_refresh_job("retried");
                }
                tracing::warn!(
                    job_id = %job.job_id,
                    attempt = job.attempt,
                    max_attempts = job.max_attempts,
                    error = %e,
                    error_kind = e.kind(),
                    retry_in_ms = retry_delay.as_millis() as u64,
                    "Refresh job failed, retry scheduled"
                );
                queue.schedule_retry(next, retry_delay);
            }
            None => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = metrics() {
                    m.record_refresh_job("failed");
                }
                queue.release(&job);
                tracing::error!(
                    job_id = %job.job_id,
                    attempts = job.attempt,
                    latitude = job.latitude,
                    longitude = job.longitude,
                    error = %e,
                    error_kind = e.kind(),
                    "Refresh job failed permanently"
                );
            }
        },
    }
}
