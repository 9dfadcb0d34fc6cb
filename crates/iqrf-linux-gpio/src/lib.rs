//! iqrf-linux-gpio - Linux GPIO port for IQRF TR modules
//!
//! This crate drives a TR module through GPIO lines using the Linux
//! character device interface (gpiocdev). The SPI link is bit-banged, the
//! module supply is switched through a GPIO-controlled power switch, and
//! the programming-mode handshake is performed on the same lines.
//!
//! # Example
//!
//! ```no_run
//! use iqrf_core::transport::{Driver, DriverConfig};
//! use iqrf_linux_gpio::{LinuxGpioBus, LinuxGpioConfig};
//!
//! //                                  device           CS SCK MOSI MISO PWR
//! let config = LinuxGpioConfig::new("/dev/gpiochip0", 8, 11, 10, 9, 25);
//! let bus = LinuxGpioBus::open(&config)?;
//!
//! let mut driver = Driver::new(bus, DriverConfig::default(), |data: &[u8]| {
//!     println!("received {:02X?}", data);
//! });
//! driver.init();
//! println!("{}", driver.identity());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with iqprog CLI
//!
//! ```bash
//! iqprog info -p linux_gpio:dev=/dev/gpiochip0,cs=8,sck=11,mosi=10,miso=9,pwr=25
//!
//! # With custom SPI speed (in kHz, approximate)
//! iqprog write -p linux_gpio:gpiochip=0,cs=8,sck=11,mosi=10,miso=9,pwr=25,spispeed=100 -i app.hex
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | TR Pin | GPIO Function  | Description |
//! |--------|----------------|-------------|
//! | SS     | CS (output)    | Chip select, active low |
//! | SCK    | SCK (output)   | Serial clock |
//! | SDI    | MOSI (output)  | Data to the module |
//! | SDO    | MISO (input)   | Data from the module |
//! | VCC    | PWR (output)   | Enable of the supply switch, low = powered |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioBus, LinuxGpioConfig};
pub use error::{LinuxGpioError, Result};

/// Open a Linux GPIO port and return it boxed
///
/// This is a convenience function for use in the CLI port dispatch.
///
/// # Arguments
///
/// * `options` - Slice of (key, value) pairs from port string parsing
pub fn open_linux_gpio(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn iqrf_core::port::BusPort>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let bus = LinuxGpioBus::open(&config)?;
    Ok(Box::new(bus))
}
