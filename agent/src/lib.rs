//! Async tracking runtime for Stride.
//!
//! Wires the sans-IO pieces from `stride-core` to a motion sensor, a step
//! back-end, and a credential store through the traits in [`platform`].

pub mod error;
pub mod platform;
pub mod runtime;
pub mod telemetry;

pub use error::LoginError;
pub use platform::{HomeSummary, Landmark, MotionSensor, StepApi};
pub use runtime::{Agent, AgentCommand, AgentEvent, UploadReport};
