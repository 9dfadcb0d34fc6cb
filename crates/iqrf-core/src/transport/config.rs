//! Transport timing and retry configuration

/// Timing and retry parameters of the [`Driver`](super::Driver)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Ticks between two idle status polls
    pub status_poll_ticks: u32,
    /// Multiplier applied to `status_poll_ticks` in fast SPI mode
    pub fast_poll_multiplier: u32,
    /// Tick period in microseconds
    pub tick_us: u32,
    /// Tick period in microseconds in fast SPI mode
    pub fast_tick_us: u32,
    /// Timeout of programming-mode entry and of stalled exchanges
    pub mode_timeout_ms: u32,
    /// Attempts per mailbox packet before it is reported as failed
    pub write_attempts: u8,
    /// Attempts per module-initiated read
    pub read_attempts: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            status_poll_ticks: 10,
            fast_poll_multiplier: 5,
            tick_us: 1000,
            fast_tick_us: 200,
            mode_timeout_ms: 500,
            write_attempts: 3,
            read_attempts: 1,
        }
    }
}

impl DriverConfig {
    /// Ticks between idle status polls in the given mode
    pub fn poll_ticks(&self, fast: bool) -> u32 {
        if fast {
            self.status_poll_ticks.saturating_mul(self.fast_poll_multiplier)
        } else {
            self.status_poll_ticks
        }
    }

    /// Tick period in the given mode
    pub fn tick_period_us(&self, fast: bool) -> u32 {
        if fast {
            self.fast_tick_us
        } else {
            self.tick_us
        }
    }
}
