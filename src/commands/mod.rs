//! CLI command implementations
//!
//! Every command that talks to a module opens the port, powers the module
//! through [`Driver::init`] and then polls one of the core state machines
//! between transport ticks.

mod file;
mod info;
mod secret;
mod send;

pub use file::{run_check, run_write};
pub use info::run_info;
pub use secret::run_secret;
pub use send::run_send;

use iqrf_core::port::BusPort;
use iqrf_core::transport::{Driver, DriverConfig};

use crate::ports;

/// Driver over a port chosen at run time
pub type PortDriver<H> = Driver<Box<dyn BusPort>, H>;

/// Open `port` and identify the module attached to it
pub fn open_driver<H: FnMut(&[u8])>(
    port: &str,
    rx_handler: H,
) -> Result<PortDriver<H>, Box<dyn std::error::Error>> {
    let bus = ports::open_port(port)?;
    let mut driver = Driver::new(bus, DriverConfig::default(), rx_handler);
    driver.init();
    if !driver.identity().is_known() {
        return Err(format!(
            "No TR module detected on {} (status {:?})",
            port,
            driver.transport_status()
        )
        .into());
    }
    Ok(driver)
}

/// Parse a byte string given as `0x`-prefixed or plain hex digits
///
/// Whitespace, `:` and `-` between bytes are ignored.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let digits: Vec<char> = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = pair[0].to_digit(16);
            let lo = pair[1].to_digit(16);
            match (hi, lo) {
                (Some(hi), Some(lo)) => Ok((hi << 4 | lo) as u8),
                _ => Err(format!("Invalid hex byte '{}{}'", pair[0], pair[1])),
            }
        })
        .collect()
}

/// List the ports compiled into this binary
pub fn list_ports() {
    println!("Available ports:");
    println!();
    let available = ports::available_ports();
    if available.is_empty() {
        println!("  (none, recompile with port features enabled)");
    }
    for p in &available {
        println!("  {:12} - {}", p.name, p.description);
    }
}
