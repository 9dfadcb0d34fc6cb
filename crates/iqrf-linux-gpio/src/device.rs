//! Linux GPIO bus port implementation
//!
//! The module is driven through five GPIO lines: chip select, clock and
//! the two data lines of a bit-banged SPI bus, plus the enable line of the
//! module power switch. The switch is active low, so PWR high means the
//! module is unpowered.

use std::time::{Duration, Instant};

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use iqrf_core::port::bitbang::{self, BitbangPort};
use iqrf_core::port::BusPort;

/// GPIO line indices
#[derive(Debug, Clone, Copy)]
enum Line {
    Cs = 0,
    Sck = 1,
    Mosi = 2,
    Miso = 3,
    Pwr = 4,
}

const NUM_LINES: usize = 5;

/// Default half-period delay in nanoseconds (for ~250 kHz SPI clock)
const DEFAULT_HALF_PERIOD_NS: u64 = 2000;

/// Configuration for opening a Linux GPIO port
#[derive(Debug, Clone)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS (Chip Select) GPIO line offset
    pub cs: Offset,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI GPIO line offset
    pub mosi: Offset,
    /// MISO GPIO line offset
    pub miso: Offset,
    /// Power switch enable line offset (active low)
    pub pwr: Offset,
    /// Half-period delay in nanoseconds
    pub half_period_ns: u64,
}

impl Default for LinuxGpioConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            cs: 0,
            sck: 0,
            mosi: 0,
            miso: 0,
            pwr: 0,
            half_period_ns: DEFAULT_HALF_PERIOD_NS,
        }
    }
}

impl LinuxGpioConfig {
    /// Create a new configuration with the given device path and pins
    pub fn new(
        device: impl Into<String>,
        cs: Offset,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
        pwr: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            cs,
            sck,
            mosi,
            miso,
            pwr,
            ..Default::default()
        }
    }

    /// Set SPI speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        if hz > 0 {
            self.half_period_ns = 500_000_000 / hz as u64;
        }
        self
    }

    fn offsets(&self) -> [Offset; NUM_LINES] {
        let mut offsets = [0; NUM_LINES];
        offsets[Line::Cs as usize] = self.cs;
        offsets[Line::Sck as usize] = self.sck;
        offsets[Line::Mosi as usize] = self.mosi;
        offsets[Line::Miso as usize] = self.miso;
        offsets[Line::Pwr as usize] = self.pwr;
        offsets
    }
}

/// TR module attached to Linux GPIO lines
pub struct LinuxGpioBus {
    request: Request,
    offsets: [Offset; NUM_LINES],
    half_period_ns: u64,
    epoch: Instant,
}

impl LinuxGpioBus {
    /// Request the GPIO lines; the module stays unpowered until the driver starts
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        let offsets = config.offsets();
        for (i, line) in offsets.iter().enumerate() {
            if offsets[..i].contains(line) {
                return Err(LinuxGpioError::DuplicateLine(*line));
            }
        }

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut req_config = Config::default();
        req_config.with_line(config.pwr).as_output(Value::Active);
        req_config.with_line(config.cs).as_output(Value::Inactive);
        req_config.with_line(config.sck).as_output(Value::Inactive);
        req_config.with_line(config.mosi).as_output(Value::Inactive);
        req_config.with_line(config.miso).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("iqprog")
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (cs={}, sck={}, mosi={}, miso={}, pwr={})",
            config.device,
            config.cs,
            config.sck,
            config.mosi,
            config.miso,
            config.pwr
        );

        Ok(Self {
            request,
            offsets,
            half_period_ns: config.half_period_ns,
            epoch: Instant::now(),
        })
    }

    fn set_line(&self, line: Line, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(self.offsets[line as usize], value) {
            log::error!("Failed to set {:?}: {}", line, e);
        }
    }
}

impl BitbangPort for LinuxGpioBus {
    fn set_cs(&mut self, active: bool) {
        // CS is active low
        self.set_line(Line::Cs, !active);
    }

    fn set_sck(&mut self, high: bool) {
        self.set_line(Line::Sck, high);
    }

    fn set_mosi(&mut self, high: bool) {
        self.set_line(Line::Mosi, high);
    }

    fn get_miso(&self) -> bool {
        match self.request.value(self.offsets[Line::Miso as usize]) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get MISO: {}", e);
                false
            }
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(Duration::from_nanos(self.half_period_ns));
        }
    }
}

impl BusPort for LinuxGpioBus {
    fn transfer_byte(&mut self, tx: u8) -> u8 {
        bitbang::transfer_byte(self, tx)
    }

    fn select(&mut self) {
        BitbangPort::set_cs(self, true);
        self.half_period_delay();
    }

    fn deselect(&mut self) {
        BitbangPort::set_sck(self, false);
        BitbangPort::set_cs(self, false);
    }

    fn power_on(&mut self) {
        BitbangPort::set_cs(self, false);
        self.set_line(Line::Pwr, false);
    }

    fn power_off(&mut self) {
        // SS is held low while the module is unpowered
        BitbangPort::set_cs(self, true);
        self.set_line(Line::Pwr, true);
    }

    fn enter_programming_mode(&mut self) {
        bitbang::programming_handshake(self);
    }

    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}

impl Drop for LinuxGpioBus {
    fn drop(&mut self) {
        BitbangPort::set_cs(self, false);
    }
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value.parse().map_err(|_| LinuxGpioError::InvalidParameter {
        name,
        value: value.to_string(),
    })
}

/// Parse port options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N`, `sck=N`, `mosi=N`, `miso=N` - SPI line offsets (required)
/// - `pwr=N` - power switch line offset (required)
/// - `spispeed=N` - SPI speed in kHz (optional, default ~250 kHz)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioConfig> {
    let mut config = LinuxGpioConfig::default();
    let mut lines: [Option<Offset>; NUM_LINES] = [None; NUM_LINES];
    let mut gpiochip: Option<u32> = None;

    for &(key, value) in options {
        match key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => gpiochip = Some(parse_line("gpiochip", value)?),
            "cs" => lines[Line::Cs as usize] = Some(parse_line("cs", value)?),
            "sck" => lines[Line::Sck as usize] = Some(parse_line("sck", value)?),
            "mosi" => lines[Line::Mosi as usize] = Some(parse_line("mosi", value)?),
            "miso" => lines[Line::Miso as usize] = Some(parse_line("miso", value)?),
            "pwr" => lines[Line::Pwr as usize] = Some(parse_line("pwr", value)?),
            "spispeed" => {
                let speed_khz: u32 = value.parse().map_err(|_| LinuxGpioError::InvalidParameter {
                    name: "spispeed",
                    value: value.to_string(),
                })?;
                config = config.with_speed_hz(speed_khz.saturating_mul(1000));
            }
            _ => log::warn!("linux_gpio: Unknown option: {}={}", key, value),
        }
    }

    if config.device.is_empty() {
        let n = gpiochip.ok_or(LinuxGpioError::NoDevice)?;
        config.device = format!("/dev/gpiochip{}", n);
    } else if gpiochip.is_some() {
        return Err(LinuxGpioError::ConflictingDevice);
    }

    let required = |line: Line, name| lines[line as usize].ok_or(LinuxGpioError::MissingParameter(name));
    config.cs = required(Line::Cs, "cs")?;
    config.sck = required(Line::Sck, "sck")?;
    config.mosi = required(Line::Mosi, "mosi")?;
    config.miso = required(Line::Miso, "miso")?;
    config.pwr = required(Line::Pwr, "pwr")?;

    Ok(config)
}
