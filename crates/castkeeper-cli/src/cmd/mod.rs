pub mod config;
pub mod dashboard;
pub mod schedule;
pub mod status;
pub mod worker;
