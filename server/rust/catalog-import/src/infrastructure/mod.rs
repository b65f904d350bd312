pub mod config;
pub mod database;
pub mod event_publisher;
pub mod file_store;
pub mod job_lease;
pub mod job_notifier;
pub mod metrics;
pub mod spreadsheet;
pub mod stuck_job_watchdog;
pub mod telemetry;
