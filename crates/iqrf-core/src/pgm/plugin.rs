//! Plugin (`.iqrf`) line parser
//!
//! A plugin file is a sequence of lines, each holding exactly 20 bytes as
//! hex digit pairs. Lines starting with `#` are comments.

use super::hex_pair;
use crate::error::{Error, Result};
use crate::port::FileSource;

/// Bytes per plugin line (one `PLUGIN_PGM` packet)
pub const PLUGIN_LINE_LEN: usize = 20;

/// Read the next data line from a plugin file
///
/// Comment and empty lines are skipped. Returns `Ok(None)` at the end of
/// the file; a line with any other number of bytes than
/// [`PLUGIN_LINE_LEN`], or a non-hex character, is a
/// [`Error::FileFormatError`].
pub fn read_line<F: FileSource + ?Sized>(file: &mut F) -> Result<Option<[u8; PLUGIN_LINE_LEN]>> {
    let mut line = [0u8; PLUGIN_LINE_LEN];
    let mut len = 0;

    loop {
        let mut c = file.next_byte();
        if c == Some(b'#') {
            c = loop {
                match file.next_byte() {
                    None => break None,
                    Some(b) if b == b'\r' || b == b'\n' => break Some(b),
                    Some(_) => {}
                }
            };
        }

        match c {
            None => {
                return match len {
                    0 => Ok(None),
                    PLUGIN_LINE_LEN => Ok(Some(line)),
                    _ => {
                        log::error!("Plugin file ends inside a line");
                        Err(Error::FileFormatError)
                    }
                };
            }
            Some(b'\r') | Some(b'\n') => match len {
                0 => {}
                PLUGIN_LINE_LEN => return Ok(Some(line)),
                _ => {
                    log::error!("Plugin line has {} bytes, expected {}", len, PLUGIN_LINE_LEN);
                    return Err(Error::FileFormatError);
                }
            },
            Some(hi) => {
                let lo = file.next_byte().ok_or(Error::FileFormatError)?;
                if len >= PLUGIN_LINE_LEN {
                    log::error!("Plugin line too long");
                    return Err(Error::FileFormatError);
                }
                line[len] = hex_pair(hi, lo).ok_or(Error::FileFormatError)?;
                len += 1;
            }
        }
    }
}
