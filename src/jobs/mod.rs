//! Background maintenance jobs
//!
//! The prominence rescore sweep runs either from the in-process scheduler
//! or via the HTTP trigger endpoint called by an external cron.

pub mod rescore;
pub mod scheduler;

pub use rescore::{ProminenceRescorer, RescoreOutcome};
pub use scheduler::{BackgroundScheduler, JobError, JobReport, MaintenanceJob};
