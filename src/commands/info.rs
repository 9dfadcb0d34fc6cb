//! Info command implementation

use super::open_driver;

/// Identify the module and print what it reported
pub fn run_info(port: &str) -> Result<(), Box<dyn std::error::Error>> {
    let driver = open_driver(port, |_: &[u8]| {})?;
    let id = driver.identity();

    println!("Module:      {}", id.module_type.name());
    println!("MCU:         {}", id.mcu_type.name());
    println!("Module ID:   {:08X}", id.module_id);
    println!(
        "OS:          {}.{:02} (build {:04X})",
        id.os_major(),
        id.os_minor(),
        id.os_build
    );
    println!("FCC:         {}", if id.fcc { "certified" } else { "no" });
    match &id.ibk {
        Some(ibk) => {
            let hex: Vec<String> = ibk.iter().map(|b| format!("{:02X}", b)).collect();
            println!("IBK:         {}", hex.join(" "));
        }
        None => println!("IBK:         not available"),
    }
    println!(
        "SPI:         {}",
        if driver.is_fast_mode() { "fast" } else { "normal" }
    );

    Ok(())
}
