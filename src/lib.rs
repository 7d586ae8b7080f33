pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod git;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod rollout;
pub mod trust;
pub mod usage;
