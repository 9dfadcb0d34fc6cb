//! Programming session bookkeeping

use crate::port::FileSource;

/// Kind of programming file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Intel HEX firmware image
    Hex,
    /// Plugin in `.iqrf` format
    Plugin,
    /// TR configuration in `.trcnfg` format
    Config,
}

impl FileKind {
    /// Guess the kind from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("hex") {
            Some(Self::Hex)
        } else if ext.eq_ignore_ascii_case("iqrf") {
            Some(Self::Plugin)
        } else if ext.eq_ignore_ascii_case("trcnfg") {
            Some(Self::Config)
        } else {
            None
        }
    }
}

/// File being processed and how much of it was consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammingSession {
    /// File format
    pub kind: FileKind,
    /// Bytes read so far
    pub consumed: u32,
    /// Declared file size
    pub total: u32,
}

impl ProgrammingSession {
    /// Start a session over a file of `total` bytes
    pub fn new(kind: FileKind, total: u32) -> Self {
        Self {
            kind,
            consumed: 0,
            total,
        }
    }

    /// Share of the file consumed, in percent
    pub fn progress(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (u64::from(self.consumed) * 100 / u64::from(self.total)).min(100) as u8
    }

    /// Wrap a file so reads are counted against this session
    pub fn reader<'a, F: FileSource + ?Sized>(&'a mut self, file: &'a mut F) -> SessionReader<'a, F> {
        SessionReader {
            session: self,
            file,
        }
    }
}

/// File source that counts consumed bytes and stops at the declared size
pub struct SessionReader<'a, F: ?Sized> {
    session: &'a mut ProgrammingSession,
    file: &'a mut F,
}

impl<F: FileSource + ?Sized> FileSource for SessionReader<'_, F> {
    fn next_byte(&mut self) -> Option<u8> {
        if self.session.consumed >= self.session.total {
            return None;
        }
        let byte = self.file.next_byte()?;
        self.session.consumed += 1;
        Some(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SliceSource;

    #[test]
    fn test_counting_and_limit() {
        let mut session = ProgrammingSession::new(FileKind::Hex, 4);
        let mut src = SliceSource::new(b"abcdef");
        {
            let mut reader = session.reader(&mut src);
            assert_eq!(reader.next_byte(), Some(b'a'));
            assert_eq!(reader.next_byte(), Some(b'b'));
        }
        assert_eq!(session.progress(), 50);
        let mut reader = session.reader(&mut src);
        assert_eq!(reader.next_byte(), Some(b'c'));
        assert_eq!(reader.next_byte(), Some(b'd'));
        assert_eq!(reader.next_byte(), None);
        assert_eq!(session.progress(), 100);
    }

    #[test]
    fn test_progress_empty() {
        assert_eq!(ProgrammingSession::new(FileKind::Config, 0).progress(), 0);
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(FileKind::from_extension("HEX"), Some(FileKind::Hex));
        assert_eq!(FileKind::from_extension("iqrf"), Some(FileKind::Plugin));
        assert_eq!(FileKind::from_extension("trcnfg"), Some(FileKind::Config));
        assert_eq!(FileKind::from_extension("bin"), None);
    }
}
