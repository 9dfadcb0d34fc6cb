//! Bus port and file source abstractions
//!
//! The core never touches hardware or storage directly. A [`BusPort`]
//! supplies byte transfers, device select, power control and time, and a
//! [`FileSource`] yields the bytes of a programming file.

pub mod bitbang;
mod traits;

pub use bitbang::BitbangPort;
pub use traits::*;
