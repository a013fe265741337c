// Background Job Scheduler
//
// Periodic in-process driver for maintenance jobs with per-run timeout
// and report logging. The HTTP trigger endpoint is the external-cron
// alternative; both paths run the same job code.

use crate::config::RescoreConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job execution failed: {0}")]
    ExecutionError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Job is disabled by configuration")]
    Disabled,
}

impl From<crate::error::FrontpageError> for JobError {
    fn from(err: crate::error::FrontpageError) -> Self {
        JobError::StorageError(err.to_string())
    }
}

/// Report generated after job execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Number of items examined
    pub items_processed: usize,

    /// Number of rows written
    pub changes_made: usize,

    /// Duration of job execution
    #[serde(with = "serde_duration_millis")]
    pub duration: Duration,

    /// Optional error message if the run failed
    pub error_message: Option<String>,
}

// Custom serde module for Duration (serialize/deserialize as milliseconds)
mod serde_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Trait for maintenance jobs
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Job name (for logging and tracking)
    fn name(&self) -> &str;

    /// Run one sweep
    async fn run(&self) -> Result<JobReport, JobError>;
}

/// Record of one job run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: String,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub report: Option<JobReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Success,
    Failed,
    Timeout,
}

/// Periodic driver for registered maintenance jobs
pub struct BackgroundScheduler {
    config: RescoreConfig,
    jobs: Vec<Arc<dyn MaintenanceJob>>,
    running: Arc<AtomicBool>,
}

impl BackgroundScheduler {
    pub fn new(config: RescoreConfig) -> Self {
        Self {
            config,
            jobs: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a job with the scheduler
    pub fn register_job(&mut self, job: Arc<dyn MaintenanceJob>) {
        self.jobs.push(job);
    }

    /// Start the scheduler loop (runs until stopped)
    pub async fn start(&self) -> Result<(), JobError> {
        if !self.config.enabled {
            return Err(JobError::Disabled);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JobError::ExecutionError(
                "scheduler is already running".to_string(),
            ));
        }

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting background job scheduler"
        );

        loop {
            sleep(self.config.interval).await;

            if !self.running.load(Ordering::SeqCst) {
                tracing::info!("Stopping background job scheduler");
                break;
            }

            for job in &self.jobs {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = self.run_job(job.as_ref()).await {
                    tracing::error!("Job {} failed: {}", job.name(), e);
                }
            }
        }

        Ok(())
    }

    /// Stop the scheduler
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run a specific job once, bounded by the configured max duration
    pub async fn run_job(&self, job: &dyn MaintenanceJob) -> Result<JobReport, JobError> {
        let job_name = job.name().to_string();
        let job_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();

        tracing::info!("Starting job {} (id: {})", job_name, job_id);

        let result = timeout(self.config.max_duration, job.run()).await;

        let (status, report) = match result {
            Ok(Ok(report)) => {
                tracing::info!(
                    "Job {} completed: {} changes in {:?}",
                    job_name,
                    report.changes_made,
                    report.duration
                );
                (JobStatus::Success, report)
            }
            Ok(Err(e)) => {
                tracing::error!("Job {} failed: {}", job_name, e);
                (
                    JobStatus::Failed,
                    JobReport {
                        items_processed: 0,
                        changes_made: 0,
                        duration: (Utc::now() - started_at).to_std().unwrap_or_default(),
                        error_message: Some(e.to_string()),
                    },
                )
            }
            Err(_) => {
                tracing::error!(
                    "Job {} timed out after {:?}",
                    job_name,
                    self.config.max_duration
                );
                (
                    JobStatus::Timeout,
                    JobReport {
                        items_processed: 0,
                        changes_made: 0,
                        duration: self.config.max_duration,
                        error_message: Some(format!(
                            "Timeout after {:?}",
                            self.config.max_duration
                        )),
                    },
                )
            }
        };

        let run = JobRun {
            id: job_id,
            job_name,
            started_at,
            completed_at: Some(Utc::now()),
            status: status.clone(),
            report: Some(report.clone()),
        };
        tracing::debug!("Job run recorded: {} - {:?}", run.job_name, run.status);

        match status {
            JobStatus::Success => Ok(report),
            JobStatus::Timeout => Err(JobError::Timeout(self.config.max_duration)),
            JobStatus::Failed => Err(JobError::ExecutionError(
                report
                    .error_message
                    .unwrap_or_else(|| "job failed".to_string()),
            )),
        }
    }
}
