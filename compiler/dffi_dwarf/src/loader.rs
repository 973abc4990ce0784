//! Loading DWARF sections out of object files.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection};

use crate::DwarfError;

/// Owned, cheaply clonable section reader.
pub type Reader = EndianArcSlice<RunTimeEndian>;

/// The DWARF sections of one object file.
pub struct DebugInfo {
    dwarf: Dwarf<Reader>,
}

impl DebugInfo {
    /// Read and parse the object file at `path`.
    pub fn open(path: &Path) -> Result<Self, DwarfError> {
        let bytes = std::fs::read(path).map_err(|source| DwarfError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&bytes)
    }

    /// Parse an in-memory ELF, Mach-O or PE image.
    pub fn parse(data: &[u8]) -> Result<Self, DwarfError> {
        let file = object::File::parse(data)?;
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let dwarf = Dwarf::load(|id| -> Result<Reader, DwarfError> {
            let data = section_data(&file, id)?;
            Ok(EndianArcSlice::new(Arc::from(&*data), endian))
        })?;
        Ok(Self { dwarf })
    }

    /// Build from raw section contents; sections `lookup` does not know are
    /// empty.
    pub fn from_sections(
        endian: RunTimeEndian,
        mut lookup: impl FnMut(SectionId) -> Option<Vec<u8>>,
    ) -> Result<Self, DwarfError> {
        let dwarf = Dwarf::load(|id| -> Result<Reader, DwarfError> {
            let data: Arc<[u8]> = lookup(id).map_or_else(|| Arc::from(Vec::new()), Arc::from);
            Ok(EndianArcSlice::new(data, endian))
        })?;
        Ok(Self { dwarf })
    }

    pub fn dwarf(&self) -> &Dwarf<Reader> {
        &self.dwarf
    }
}

fn section_data<'data>(
    file: &object::File<'data>,
    id: SectionId,
) -> Result<Cow<'data, [u8]>, DwarfError> {
    // ELF and PE use `.debug_*`, Mach-O uses `__debug_*`.
    let macho = id.name().replacen('.', "__", 1);
    for name in [id.name(), macho.as_str()] {
        if let Some(section) = file.section_by_name(name) {
            return Ok(section.uncompressed_data()?);
        }
    }
    Ok(Cow::Borrowed(&[]))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
