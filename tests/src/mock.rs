//! Mock implementations for testing
//!
//! Provides a mock host scheduler core for driving the engine.

pub mod host;

pub use host::MockHost;
