//! DWARF front end for dffi.
//!
//! Loads debug sections from object files and rebuilds the C types and
//! functions they describe into a [`dffi_types::TypePool`]. The same recovery
//! serves freshly compiled units and prebuilt shared libraries.

mod error;
mod loader;
mod recover;

pub use error::{DieError, DwarfError};
pub use loader::{DebugInfo, Reader};
pub use recover::{recover, Recovered, RecoveredFunction, RESERVED_PREFIX};
