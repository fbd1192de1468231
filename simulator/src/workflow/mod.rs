pub mod alert_log;
pub mod config;
pub mod runner;
