#![no_std]

// Shared logic for the Stride step tracker.
//
// Everything here is sans-IO. The detector, session counters and upload
// bookkeeping are plain state machines driven by the async agent.

pub mod api;
pub mod config;
pub mod credentials;
pub mod motion;
pub mod session;
pub mod sync;
pub mod telemetry;
