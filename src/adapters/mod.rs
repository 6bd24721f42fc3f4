//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter             | Implements         | Connects to                   |
//! |---------------------|--------------------|-------------------------------|
//! | `channel_transport` | TransportPort      | In-process embassy channels   |
//! | `log_sink`          | NotificationSink   | `log` facade                  |
//! | `memory_store`      | BackingStorePort   | In-memory device records      |
//! | `time`              | ClockPort          | Host system clock             |
//! | `sim_device`        | (device side)      | Simulated feeder firmware     |

pub mod channel_transport;
pub mod log_sink;
pub mod memory_store;
pub mod sim_device;
pub mod time;
