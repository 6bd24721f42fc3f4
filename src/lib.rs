//! feederlink library.
//!
//! Device liveness and command-acknowledgment coordinator for a remote
//! fish feeder.  Exposes the pure-logic components, the
//! [`Coordinator`](app::service::Coordinator) session, host adapters and
//! the simulation runtime used by the `feederlink` binary.

#![deny(unused_must_use)]

pub mod app;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod liveness;
pub mod model;
pub mod protocol;
pub mod reconciler;
pub mod schedule;

pub mod adapters;
pub mod cli;
pub mod runtime;

pub use error::{Error, Result};
