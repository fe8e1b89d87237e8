//! Host emulator for the Stride step tracker.
//!
//! Runs the `stride-agent` runtime on an `embassy` executor thread with a
//! simulated accelerometer, an HTTP or loopback step API, and a JSON file
//! credential store, driven from an interactive console.

pub mod backend;
pub mod config;
pub mod console;
pub mod http;
pub mod loopback;
pub mod runtime;
pub mod sensor;
pub mod session;
pub mod store;
pub mod transcript;
