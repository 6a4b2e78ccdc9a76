//! different utility modules used throughout the project
/// TOML run description parsed into solver settings and a material stack
pub mod config;
/// logger initialization, statistics tables and csv export of observables
pub mod logger;
