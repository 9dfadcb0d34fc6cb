//! Bit-banged SPI helpers
//!
//! Host adapters that drive the module through plain GPIO lines implement
//! [`BitbangPort`] and forward their [`BusPort`] byte transfer and
//! programming handshake to the helpers in this module.
//!
//! The IQRF link runs in SPI mode 0, MSB first, full duplex.

use super::BusPort;

/// Duration of the MISO-to-MOSI mirror that puts a module in programming mode
pub const PROGRAMMING_HANDSHAKE_MS: u32 = 500;

/// Low-level line control for bit-banged SPI
pub trait BitbangPort {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&self);
}

/// Exchange one byte in SPI mode 0 (MSB first)
///
/// MOSI is set while SCK is low and MISO is sampled on the rising edge.
pub fn transfer_byte<M: BitbangPort + ?Sized>(port: &mut M, tx: u8) -> u8 {
    let mut rx = 0u8;
    for i in (0..8).rev() {
        port.set_mosi((tx >> i) & 1 != 0);
        port.half_period_delay();
        port.set_sck(true);
        rx <<= 1;
        if port.get_miso() {
            rx |= 1;
        }
        port.half_period_delay();
        port.set_sck(false);
    }
    rx
}

/// Put the module into programming mode
///
/// Drives SCK and MOSI low, power-cycles the module, then asserts chip
/// select and copies MISO onto MOSI for [`PROGRAMMING_HANDSHAKE_MS`].
pub fn programming_handshake<M: BitbangPort + BusPort + ?Sized>(port: &mut M) {
    port.set_sck(false);
    port.set_mosi(false);

    port.power_off();
    port.delay_ms(100);
    port.power_on();
    port.delay_ms(1);

    port.set_cs(true);
    let start = port.now_ms();
    while port.now_ms().wrapping_sub(start) < PROGRAMMING_HANDSHAKE_MS {
        let miso = port.get_miso();
        port.set_mosi(miso);
    }
    port.set_cs(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// MISO wired to MOSI, with a clock that advances on every MISO read
    #[derive(Default)]
    struct Loopback {
        cs: bool,
        sck: bool,
        mosi: bool,
        powered: bool,
        clock: Cell<u32>,
        edges: u32,
    }

    impl BitbangPort for Loopback {
        fn set_cs(&mut self, active: bool) {
            self.cs = active;
        }
        fn set_sck(&mut self, high: bool) {
            if high && !self.sck {
                self.edges += 1;
            }
            self.sck = high;
        }
        fn set_mosi(&mut self, high: bool) {
            self.mosi = high;
        }
        fn get_miso(&self) -> bool {
            self.clock.set(self.clock.get() + 1);
            self.mosi
        }
        fn half_period_delay(&self) {}
    }

    impl BusPort for Loopback {
        fn transfer_byte(&mut self, tx: u8) -> u8 {
            transfer_byte(self, tx)
        }
        fn select(&mut self) {
            self.set_cs(true);
        }
        fn deselect(&mut self) {
            self.set_cs(false);
        }
        fn power_on(&mut self) {
            self.powered = true;
        }
        fn power_off(&mut self) {
            self.powered = false;
        }
        fn enter_programming_mode(&mut self) {
            programming_handshake(self);
        }
        fn now_ms(&self) -> u32 {
            self.clock.get()
        }
        fn delay_ms(&mut self, ms: u32) {
            self.clock.set(self.clock.get() + ms);
        }
    }

    #[test]
    fn test_transfer_loopback() {
        let mut port = Loopback::default();
        assert_eq!(port.transfer_byte(0xA5), 0xA5);
        assert_eq!(port.transfer_byte(0x01), 0x01);
        assert_eq!(port.edges, 16);
        assert!(!port.sck);
    }

    #[test]
    fn test_programming_handshake() {
        let mut port = Loopback::default();
        port.enter_programming_mode();
        assert!(port.powered);
        assert!(!port.cs);
        assert!(port.now_ms() >= 101 + PROGRAMMING_HANDSHAKE_MS);
    }
}
