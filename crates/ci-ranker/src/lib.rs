pub mod config;
pub mod error;
pub mod grants;
pub mod telemetry;
