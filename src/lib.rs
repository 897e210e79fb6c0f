// Library for the daemon binary and tests

pub mod action_log;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod patch;
pub mod pup_manager;
pub mod routes;
pub mod sources;
pub mod store;
pub mod version;
