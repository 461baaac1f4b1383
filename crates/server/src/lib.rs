pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod state_factory;
pub mod telemetry;
