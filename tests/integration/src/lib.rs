//! Integration test utilities for the presence workspace
//!
//! Helpers for driving presence sessions over the in-process transport, the
//! agent's HTTP surface, and a live Redis when one is available.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
