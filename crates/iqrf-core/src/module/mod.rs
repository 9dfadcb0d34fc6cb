//! TR module identification
//!
//! The identification block returned by the `MODULE_INFO` command is decoded
//! into a [`ModuleIdentity`]; [`IdentifyTask`] fetches it at start-up.

mod task;
mod types;

pub use task::IdentifyTask;
pub use types::{McuType, ModuleIdentity, ModuleType, IBK_LEN, RAW_INFO_LEN};
