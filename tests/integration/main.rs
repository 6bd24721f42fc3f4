//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the
//! coordinator against mock ports.  Time is synthetic throughout.

mod connection_tests;
mod feed_flow_tests;
mod liveness_tests;
mod schedule_flow_tests;
