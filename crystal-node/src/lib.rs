pub mod actor;
pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod strategy;
pub mod telemetry;
pub mod upstream;
