pub mod assumptions;
pub mod config;
pub mod drivers;
pub mod error;
pub mod metrics;
pub mod profile;
pub mod run;
pub mod scenario;
pub mod simulation;
pub mod types;
