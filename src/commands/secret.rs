//! Password and user key commands

use indicatif::{ProgressBar, ProgressStyle};
use iqrf_core::pgm::{PgmStatus, SecretKind, SecretWriter, SECRET_LEN};
use std::time::Duration;

use super::{open_driver, parse_hex_bytes};

/// Turn the command-line value into the 16 bytes stored in the module
///
/// `0x`-prefixed values are taken as hex and must be exactly 16 bytes;
/// anything else is text of at most 16 bytes, zero padded.
fn parse_secret(value: &str) -> Result<[u8; SECRET_LEN], String> {
    let mut secret = [0u8; SECRET_LEN];
    if value.starts_with("0x") || value.starts_with("0X") {
        let bytes = parse_hex_bytes(value)?;
        if bytes.len() != SECRET_LEN {
            return Err(format!(
                "Expected {} hex bytes, got {}",
                SECRET_LEN,
                bytes.len()
            ));
        }
        secret.copy_from_slice(&bytes);
    } else {
        let bytes = value.as_bytes();
        if bytes.len() > SECRET_LEN {
            return Err(format!("Text longer than {} bytes", SECRET_LEN));
        }
        secret[..bytes.len()].copy_from_slice(bytes);
    }
    Ok(secret)
}

/// Store the access password or user key
pub fn run_secret(
    port: &str,
    kind: SecretKind,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let secret = parse_secret(value)?;
    let mut driver = open_driver(port, |_: &[u8]| {})?;
    println!("Found: {}", driver.identity());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Writing {:?}", kind));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut writer = SecretWriter::new();
    loop {
        driver.tick();
        match writer.write_key_or_password(&mut driver, kind, &secret) {
            Ok(PgmStatus::InProgress(_)) => {}
            Ok(PgmStatus::Success) => break,
            Err(e) => {
                spinner.abandon_with_message("Failed");
                return Err(e.into());
            }
        }
        driver.wait_tick();
    }

    spinner.finish_with_message(format!("{:?} written", kind));
    Ok(())
}
