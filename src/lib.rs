//! Leave decision engine: a rules-driven service that evaluates employee
//! leave requests against a configurable policy catalog and recommends
//! approve/escalate outcomes.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
