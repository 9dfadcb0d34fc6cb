//! Send command implementation

use iqrf_core::spi::TransportStatus;
use iqrf_core::transport::SendStatus;

use super::{open_driver, parse_hex_bytes};

/// How long the module gets to report communication mode after start-up
const READY_TIMEOUT_MS: u32 = 2000;

/// Send one packet in communication mode and report what comes back
pub fn run_send(port: &str, data: &str, listen_ms: u32) -> Result<(), Box<dyn std::error::Error>> {
    let data = parse_hex_bytes(data)?;
    let mut driver = open_driver(port, |rx: &[u8]| {
        println!("Received {} bytes: {:02X?}", rx.len(), rx);
    })?;

    let start = driver.now_ms();
    while driver.transport_status() != TransportStatus::CommunicationMode {
        if driver.now_ms().wrapping_sub(start) >= READY_TIMEOUT_MS {
            return Err(format!(
                "TR module not in communication mode (status {:?})",
                driver.transport_status()
            )
            .into());
        }
        driver.tick();
        driver.wait_tick();
    }

    log::info!("Sending {} bytes", data.len());

    loop {
        driver.tick();
        if driver.send(&data)? == SendStatus::Sent {
            break;
        }
        driver.wait_tick();
    }
    println!("Sent {} bytes", data.len());

    let start = driver.now_ms();
    while driver.now_ms().wrapping_sub(start) < listen_ms {
        driver.tick();
        driver.wait_tick();
    }
    Ok(())
}
