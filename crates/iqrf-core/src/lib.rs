//! iqrf-core - Core library for IQRF transceiver modules
//!
//! This crate implements the host side of the IQRF SPI link: a polled packet
//! transport that talks to a TR module one byte per tick, the module
//! identification task run at start-up, and a programming engine that
//! uploads firmware, plugins and configuration through the same transport.
//! It is designed to be `no_std` compatible for use in embedded environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation (boxed bus ports)
//!
//! # Example
//!
//! ```ignore
//! use iqrf_core::port::{BusPort, SliceSource};
//! use iqrf_core::pgm::{FileKind, PgmStatus, Programmer};
//! use iqrf_core::transport::{Driver, DriverConfig};
//!
//! fn upload<P: BusPort>(port: P, image: &[u8]) -> iqrf_core::Result<()> {
//!     let mut driver = Driver::new(port, DriverConfig::default(), |_: &[u8]| {});
//!     driver.init();
//!
//!     let mut file = SliceSource::new(image);
//!     let mut pgm = Programmer::new(FileKind::Hex, image.len() as u32);
//!     loop {
//!         driver.tick();
//!         if let PgmStatus::Success = pgm.write_file(&mut driver, &mut file)? {
//!             return Ok(());
//!         }
//!         driver.wait_tick();
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod module;
pub mod pgm;
pub mod port;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};
