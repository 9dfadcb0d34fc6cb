//! Polled packet transport
//!
//! The [`Driver`] owns the bus port and advances one byte-sized step per
//! [`Driver::tick`]. Higher layers queue requests through its single-slot
//! mailbox and observe its status; they never touch the wire directly.

mod config;
mod driver;

pub use config::DriverConfig;
pub use driver::{Driver, SendStatus};
