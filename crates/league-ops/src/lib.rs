//! Core library for the league membership service: configuration, telemetry,
//! and the club-onboarding workflow orchestrator.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
