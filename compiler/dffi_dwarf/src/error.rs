//! DWARF ingestion errors.
//!
//! [`DwarfError`] aborts a whole ingestion. [`DieError`] is scoped to one
//! debugging information entry: the entry is logged and skipped, and the rest
//! of its compile unit is still recovered.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DwarfError {
    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse object file: {0}")]
    Object(#[from] object::Error),
    #[error("malformed DWARF: {0}")]
    Gimli(#[from] gimli::Error),
    #[error("`{0}`: __dffi is a reserved prefix and can't be used in a type name")]
    ReservedName(String),
}

#[derive(Debug, Error)]
pub enum DieError {
    #[error("{tag} is missing {attr}")]
    MissingAttribute { tag: gimli::DwTag, attr: gimli::DwAt },
    #[error("unsupported base type encoding {encoding} of size {size}")]
    UnsupportedEncoding { encoding: gimli::DwAte, size: u64 },
    #[error("unsupported type tag {0}")]
    UnsupportedTag(gimli::DwTag),
    #[error("unsupported member location expression")]
    UnsupportedLocation,
    #[error("type reference leaves its compile unit")]
    CrossUnitReference,
    #[error("unprototyped function with parameters")]
    Unprototyped,
    #[error("reference to undeclared composite type")]
    UndeclaredComposite,
    #[error("`{0}` uses a reserved name prefix")]
    ReservedName(String),
    #[error(transparent)]
    Layout(#[from] dffi_types::LayoutError),
    #[error(transparent)]
    Read(#[from] gimli::Error),
}
