//! End-to-end tests for copilot-session.
//!
//! The suite drives a [`copilot_session::RunningApp`] wired to in-process
//! fakes of every remote capability.

mod harness;
mod integration_tests;

pub use harness::{FakeBackend, FakeOracle, HarnessError, RecordingView, TestHarness, ViewCall};
