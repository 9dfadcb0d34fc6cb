//! Port registration and dispatch
//!
//! Ports are selected on the command line with a string of the form
//! `name` or `name:key1=value1,key2=value2`. Which ports exist depends on
//! the features the binary was built with.

use iqrf_core::port::BusPort;
use thiserror::Error;

/// Errors from selecting a port
#[derive(Debug, Error)]
pub enum PortError {
    #[error("unknown port '{name}' [available: {available}]")]
    UnknownPort { name: String, available: String },

    #[error("invalid parameter format: '{0}' (expected key=value)")]
    BadParameter(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("port '{0}' is not supported in this build")]
    Unsupported(&'static str),
}

/// Information about a port
pub struct PortInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// All ports enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_ports() -> Vec<PortInfo> {
    let mut ports = Vec::new();

    #[cfg(feature = "dummy")]
    ports.push(PortInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated TR-72D module for testing (echo=<on|off>)",
    });

    #[cfg(feature = "linux-gpio")]
    ports.push(PortInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description:
            "Linux GPIO bit-bang (dev=/dev/gpiochipN,cs=N,sck=N,mosi=N,miso=N,pwr=N[,spispeed=<kHz>])",
    });

    ports
}

/// Comma-separated list of port names for CLI help
pub fn port_names_short() -> String {
    let names: Vec<&str> = available_ports().iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve a name or alias to the canonical port name
pub fn find_port(name: &str) -> Option<&'static str> {
    available_ports()
        .into_iter()
        .find(|p| p.name == name || p.aliases.iter().any(|alias| *alias == name))
        .map(|p| p.name)
}

/// Split a port string into its name and `key=value` options
pub fn parse_port_string(s: &str) -> Result<(&str, Vec<(&str, &str)>), PortError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut options = Vec::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            match opt.split_once('=') {
                Some((key, value)) => options.push((key.trim(), value.trim())),
                None => return Err(PortError::BadParameter(opt.to_string())),
            }
        }
    }

    Ok((name, options))
}

/// Open the port described by `port`
#[allow(unused_variables)]
pub fn open_port(port: &str) -> Result<Box<dyn BusPort>, Box<dyn std::error::Error>> {
    let (name, options) = parse_port_string(port)?;

    let canonical = find_port(name).ok_or_else(|| PortError::UnknownPort {
        name: name.to_string(),
        available: port_names_short(),
    })?;
    log::debug!("Opening port {} with {:?}", canonical, options);

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&options),
        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => iqrf_linux_gpio::open_linux_gpio(&options),
        _ => Err(PortError::Unsupported(canonical).into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(options: &[(&str, &str)]) -> Result<Box<dyn BusPort>, Box<dyn std::error::Error>> {
    use iqrf_dummy::{DummyConfig, DummyModule};

    let mut config = DummyConfig::default();
    for &(key, value) in options {
        match key {
            "echo" => {
                config.echo = match value {
                    "on" | "1" | "true" => true,
                    "off" | "0" | "false" => false,
                    _ => {
                        return Err(PortError::InvalidValue {
                            key: "echo",
                            value: value.to_string(),
                        }
                        .into())
                    }
                }
            }
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }
    Ok(Box::new(DummyModule::new(config)))
}
