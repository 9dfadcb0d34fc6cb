//! Packet transport state machine

use heapless::Vec;

use super::DriverConfig;
use crate::error::{Error, Result};
use crate::module::{IdentifyTask, ModuleIdentity};
use crate::port::BusPort;
use crate::spi::{
    opcodes, Frame, LinkStatus, QueueStatus, TransportStatus, MAX_PAYLOAD, PTYPE_WRITE,
};

/// Progress of [`Driver::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The packet was written and acknowledged by the module
    Sent,
    /// Call again after the next tick
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendState {
    Idle,
    Sending,
    AwaitingCompletion,
    Completed,
    Failed,
}

/// Where received payloads go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxRoute {
    Identify,
    User,
}

/// Single-slot outbound request
#[derive(Debug)]
struct Mailbox {
    cmd: u8,
    data: Vec<u8, MAX_PAYLOAD>,
    status: QueueStatus,
}

/// Host side of the IQRF SPI link
///
/// `H` is called with the payload of every packet the module pushes to the
/// host once [`init`](Self::init) has identified the module.
pub struct Driver<P, H> {
    port: P,
    config: DriverConfig,
    rx_handler: H,
    rx_route: RxRoute,
    module_info: Option<Vec<u8, MAX_PAYLOAD>>,
    spi_status: TransportStatus,
    link: LinkStatus,
    mailbox: Mailbox,
    frame: Frame,
    countdown: u32,
    fast: bool,
    selected: bool,
    suspended: bool,
    sender: SendState,
    write_failed: bool,
    identity: ModuleIdentity,
}

impl<P: BusPort, H: FnMut(&[u8])> Driver<P, H> {
    /// Create a driver; nothing touches the bus until [`init`](Self::init)
    pub fn new(port: P, config: DriverConfig, rx_handler: H) -> Self {
        Self {
            port,
            config,
            rx_handler,
            rx_route: RxRoute::User,
            module_info: None,
            spi_status: TransportStatus::Disabled,
            link: LinkStatus::Ready,
            mailbox: Mailbox {
                cmd: 0,
                data: Vec::new(),
                status: QueueStatus::Free,
            },
            frame: Frame::default(),
            countdown: config.status_poll_ticks,
            fast: false,
            selected: false,
            suspended: false,
            sender: SendState::Idle,
            write_failed: false,
            identity: ModuleIdentity::default(),
        }
    }

    /// Power the module and read its identification
    ///
    /// Blocks while the identification task runs, ticking the transport at
    /// the configured period. Modules that support it are switched to fast
    /// SPI mode afterwards.
    pub fn init(&mut self) {
        self.suspended = false;
        self.link = LinkStatus::Ready;
        self.write_failed = false;
        self.fast = false;
        self.countdown = self.config.status_poll_ticks;
        self.spi_status = TransportStatus::Disabled;
        self.port.power_on();

        self.rx_route = RxRoute::Identify;
        let mut task = IdentifyTask::new();
        self.identity = loop {
            if let Some(identity) = task.poll(self) {
                break identity;
            }
            self.tick();
            self.wait_tick();
        };
        self.rx_route = RxRoute::User;
        self.module_info = None;

        if self.identity.is_known() {
            log::info!("Found {}", self.identity);
            if self.identity.module_type.supports_fast_spi() {
                self.set_fast_mode(true);
            }
        } else {
            log::warn!("TR module did not identify itself");
        }
    }

    /// Advance the transport by one step
    ///
    /// Must be called once per tick period. While an exchange is in flight
    /// every call moves one byte; otherwise the module status is polled
    /// every few ticks.
    pub fn tick(&mut self) {
        if self.suspended {
            return;
        }
        if self.link.is_busy() || self.countdown == 0 {
            self.spi_step();
            self.countdown = self.config.poll_ticks(self.fast) + 1;
        }
        self.countdown -= 1;
    }

    /// Wait one tick period
    pub fn wait_tick(&mut self) {
        let us = self.config.tick_period_us(self.fast);
        self.port.delay_us(us);
    }

    /// Send application data to the module in communication mode
    ///
    /// Call repeatedly with the same data until it returns
    /// [`SendStatus::Sent`] or an error; the transport must be ticked in
    /// between.
    pub fn send(&mut self, data: &[u8]) -> Result<SendStatus> {
        match self.sender {
            SendState::Idle => {
                if self.spi_status == TransportStatus::DataTransferInProgress {
                    return Ok(SendStatus::InProgress);
                }
                if self.spi_status != TransportStatus::CommunicationMode {
                    return Err(Error::NotReady);
                }
                if data.is_empty() || data.len() > MAX_PAYLOAD {
                    return Err(Error::BadSize);
                }
                self.sender = SendState::Sending;
                Ok(SendStatus::InProgress)
            }
            SendState::Sending => {
                if self.submit_packet(opcodes::SPI_WR_RD, data).is_ok() {
                    self.sender = SendState::AwaitingCompletion;
                }
                Ok(SendStatus::InProgress)
            }
            SendState::AwaitingCompletion => Ok(SendStatus::InProgress),
            SendState::Completed => {
                self.sender = SendState::Idle;
                Ok(SendStatus::Sent)
            }
            SendState::Failed => {
                self.sender = SendState::Idle;
                Err(Error::WriteFailed)
            }
        }
    }

    /// Queue a packet with an explicit SPI command
    ///
    /// Fails with [`Error::NotReady`] while a previous packet is still
    /// queued, leaving that packet untouched.
    pub fn submit_packet(&mut self, cmd: u8, data: &[u8]) -> Result<()> {
        if self.mailbox.status == QueueStatus::Busy {
            return Err(Error::NotReady);
        }
        if data.is_empty() {
            return Err(Error::BadSize);
        }
        self.mailbox.data = Vec::from_slice(data).map_err(|_| Error::BadSize)?;
        self.mailbox.cmd = cmd;
        self.mailbox.status = QueueStatus::Busy;
        self.write_failed = false;
        log::trace!("Queued packet {:#04x}, {} bytes", cmd, data.len());
        Ok(())
    }

    /// Report a queued write that was rejected on every attempt
    ///
    /// Returns [`Error::WriteFailed`] once per failure; the flag is also
    /// cleared by the next [`submit_packet`](Self::submit_packet).
    pub fn take_write_error(&mut self) -> Option<Error> {
        core::mem::take(&mut self.write_failed).then_some(Error::WriteFailed)
    }

    /// SPI status of the module as last polled
    pub fn transport_status(&self) -> TransportStatus {
        self.spi_status
    }

    /// State of the outbound mailbox
    pub fn queue_status(&self) -> QueueStatus {
        self.mailbox.status
    }

    /// Whether an exchange is in flight
    pub fn link_status(&self) -> LinkStatus {
        self.link
    }

    /// Finish the exchange in flight and stop ticking
    ///
    /// The status reads [`TransportStatus::Disabled`] until the next poll
    /// after [`resume`](Self::resume).
    pub fn suspend(&mut self) {
        while self.link.is_busy() {
            self.spi_step();
        }
        self.suspended = true;
        self.spi_status = TransportStatus::Disabled;
    }

    /// Re-enable ticking after [`suspend`](Self::suspend)
    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Run `f` with the transport suspended
    pub fn suspended<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.suspend();
        let ret = f(self);
        self.resume();
        ret
    }

    /// Power-cycle the module
    pub fn reset_module(&mut self) {
        log::debug!("Resetting TR module");
        self.port.power_off();
        self.port.delay_ms(100);
        self.port.power_on();
        self.port.delay_ms(1);
        self.selected = false;
    }

    /// Switch the module to programming mode
    pub fn enter_programming_mode(&mut self) {
        log::debug!("Entering programming mode");
        self.port.delay_ms(200);
        self.suspend();
        self.port.enter_programming_mode();
        self.selected = false;
        self.resume();
    }

    /// Leave programming mode by resetting the module
    pub fn end_programming_mode(&mut self) {
        log::debug!("Leaving programming mode");
        self.reset_module();
        self.port.delay_ms(200);
    }

    /// Current time of the bus port
    pub fn now_ms(&self) -> u32 {
        self.port.now_ms()
    }

    /// Identification read by [`init`](Self::init)
    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    /// Transport configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// True when the device stays selected for whole frames
    pub fn is_fast_mode(&self) -> bool {
        self.fast
    }

    /// Switch between per-byte and per-frame device selection
    pub fn set_fast_mode(&mut self, fast: bool) {
        if fast != self.fast {
            log::debug!("Fast SPI mode {}", if fast { "on" } else { "off" });
        }
        self.fast = fast;
    }

    /// Borrow the bus port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutably borrow the bus port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub(crate) fn take_module_info(&mut self) -> Option<Vec<u8, MAX_PAYLOAD>> {
        self.module_info.take()
    }

    fn spi_step(&mut self) {
        if self.link.is_busy() {
            self.step_frame();
        } else {
            self.step_idle();
        }
    }

    fn exchange(&mut self, tx: u8) -> u8 {
        if !self.selected {
            self.port.select();
            self.selected = true;
        }
        let rx = self.port.transfer_byte(tx);
        if !self.fast {
            self.deselect();
        }
        rx
    }

    fn deselect(&mut self) {
        self.port.deselect();
        self.selected = false;
    }

    fn step_frame(&mut self) {
        let tx = self.frame.next_tx();
        let rx = self.exchange(tx);
        if !self.frame.push_rx(rx) {
            return;
        }
        self.deselect();

        if self.frame.is_valid() {
            log::trace!(
                "Frame {:#04x} done, {} data bytes",
                self.frame.tx_bytes()[0],
                self.frame.dlen()
            );
            if self.link == LinkStatus::Reading {
                self.deliver();
            }
            if self.link == LinkStatus::Writing && self.sender == SendState::AwaitingCompletion {
                self.sender = SendState::Completed;
            }
            self.link = LinkStatus::Ready;
        } else if self.frame.retry() {
            log::debug!("Checksum error, repeating frame {:#04x}", self.frame.tx_bytes()[0]);
        } else {
            log::warn!(
                "Frame {:#04x} rejected, giving up",
                self.frame.tx_bytes()[0]
            );
            if self.link == LinkStatus::Writing {
                self.write_failed = true;
                if self.sender == SendState::AwaitingCompletion {
                    self.sender = SendState::Failed;
                }
            }
            self.link = LinkStatus::Ready;
        }
    }

    fn deliver(&mut self) {
        match self.rx_route {
            RxRoute::User => (self.rx_handler)(self.frame.rx_payload()),
            RxRoute::Identify => {
                self.module_info = Vec::from_slice(self.frame.rx_payload()).ok();
            }
        }
    }

    fn step_idle(&mut self) {
        let status = self.exchange(opcodes::SPI_CHECK);
        self.deselect();
        self.spi_status = TransportStatus::from_byte(status);

        if let Some(dlen) = self.spi_status.data_ready_len() {
            log::trace!("Module has {} bytes ready", dlen);
            self.frame = Frame::read(dlen, self.config.read_attempts);
            self.spi_status = TransportStatus::DataTransferInProgress;
            self.link = LinkStatus::Reading;
            return;
        }

        if self.mailbox.status == QueueStatus::Busy {
            let dlen = self.mailbox.data.len();
            let mut ptype = dlen as u8 | PTYPE_WRITE;
            self.link = LinkStatus::Writing;
            if self.mailbox.cmd == opcodes::SPI_MODULE_INFO && (dlen == 16 || dlen == 32) {
                ptype &= !PTYPE_WRITE;
                self.link = LinkStatus::Reading;
            }
            self.frame = Frame::new(
                self.mailbox.cmd,
                ptype,
                &self.mailbox.data,
                self.config.write_attempts,
            );
            self.spi_status = TransportStatus::DataTransferInProgress;
            self.mailbox.status = QueueStatus::Free;
        }
    }
}
