//! Bus port and file source traits

/// Hardware access needed by the transport
///
/// One implementation exists per host adapter. All operations are
/// infallible from the transport's point of view: a dead bus simply reads
/// back `0xFF`, which the transport reports as
/// [`TransportStatus::NoModule`](crate::spi::TransportStatus::NoModule).
pub trait BusPort {
    /// Clock one byte out and return the byte clocked in
    ///
    /// The transport selects the module before the first byte of an
    /// exchange.
    fn transfer_byte(&mut self, tx: u8) -> u8;

    /// Assert chip select and let the module settle
    fn select(&mut self);

    /// Release chip select
    fn deselect(&mut self);

    /// Switch the module supply on
    fn power_on(&mut self);

    /// Switch the module supply off
    fn power_off(&mut self);

    /// Run the programming-mode entry handshake
    ///
    /// Power-cycles the module and mirrors MISO to MOSI with chip select
    /// asserted for about 500 ms. Called with the transport suspended.
    fn enter_programming_mode(&mut self);

    /// Free-running millisecond counter
    ///
    /// May wrap; callers compare with `wrapping_sub`.
    fn now_ms(&self) -> u32;

    /// Busy-wait for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Busy-wait for the given number of microseconds
    ///
    /// The default rounds up to whole milliseconds.
    fn delay_us(&mut self, us: u32) {
        self.delay_ms(us.div_ceil(1000));
    }
}

/// Sequential byte source for programming files
pub trait FileSource {
    /// Next byte of the file, `None` at end of stream
    fn next_byte(&mut self) -> Option<u8>;
}

impl<T: FileSource + ?Sized> FileSource for &mut T {
    fn next_byte(&mut self) -> Option<u8> {
        (**self).next_byte()
    }
}

/// File source over an in-memory buffer
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Create a source reading `data` from the start
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not read yet
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl FileSource for SliceSource<'_> {
    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }
}

/// File source over any [`embedded_io::Read`] implementation
///
/// A read error ends the stream; the error is logged.
pub struct IoSource<R> {
    reader: R,
    done: bool,
}

impl<R: embedded_io::Read> IoSource<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: embedded_io::Read> FileSource for IoSource<R> {
    fn next_byte(&mut self) -> Option<u8> {
        if self.done {
            return None;
        }
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => {
                self.done = true;
                None
            }
            Err(e) => {
                log::error!("File read failed: {:?}", embedded_io::Error::kind(&e));
                self.done = true;
                None
            }
        }
    }
}

// Forwarding impl so adapters can be chosen at run time
#[cfg(feature = "alloc")]
impl<T: BusPort + ?Sized> BusPort for alloc::boxed::Box<T> {
    fn transfer_byte(&mut self, tx: u8) -> u8 {
        (**self).transfer_byte(tx)
    }

    fn select(&mut self) {
        (**self).select()
    }

    fn deselect(&mut self) {
        (**self).deselect()
    }

    fn power_on(&mut self) {
        (**self).power_on()
    }

    fn power_off(&mut self) {
        (**self).power_off()
    }

    fn enter_programming_mode(&mut self) {
        (**self).enter_programming_mode()
    }

    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
