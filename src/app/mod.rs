//! Application core — pure domain logic, zero I/O.
//!
//! The [`service::Coordinator`] ties the component state machines
//! together.  All interaction with the transport, the backing store and
//! the operator happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without a live broker.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
