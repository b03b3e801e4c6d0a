use thiserror::Error;

pub type Result<T> = std::result::Result<T, BootError>;

/// Why a catalog was rejected. The record index is the zero-based record that was being read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatalogFault {
	/// The third field was not exactly 8 characters.
	AddressLength(usize),
	/// The third field held something other than `0-9` or `A-F`.
	AddressDigit(u8),
	/// The data ended inside a quote or part way through a record.
	UnterminatedRecord,
	/// The VFS header claims more records than its table sectors hold.
	TableTooShort { records: u32, table_sectors: u32 },
}

#[derive(Debug, Error)]
pub enum BootError {
	#[error("file not found: {0}")]
	NotFound(String),
	#[error("malformed catalog at record {record}: {fault:?}")]
	MalformedCatalog { record: usize, fault: CatalogFault },
	#[error("{field} of record {record} is longer than {capacity} bytes")]
	Overflow { record: usize, field: &'static str, capacity: usize },
	#[error("catalog holds at most {0} titles")]
	CatalogFull(usize),
	#[error("a disc transfer is still in flight")]
	DriveBusy,
	#[error("sector {0} is beyond the end of the disc")]
	SectorOutOfRange(u32),
	#[error("a sector count is required when reading from sector {0}")]
	SectorCountRequired(u32),
	#[error("0x{address:08x}+0x{length:x} does not fit in the {window} window")]
	OutsideWindow { window: &'static str, address: u32, length: u32 },
	#[error("invalid executable: {0}")]
	InvalidExecutable(String),
	#[error("archive has no sub-file {index} (holds {count})")]
	ArchiveIndex { index: usize, count: usize },
	#[error("invalid memory map: {0}")]
	InvalidMemoryMap(String),
	#[error("invalid disc image: {0}")]
	InvalidImage(String),
	#[error("no title at index {0}")]
	NoSuchTitle(usize),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl BootError {
	/// Errors the presentation layer answers with the literal missing-file banner.
	pub fn is_not_found(&self) -> bool {
		match self {
			BootError::NotFound(_) => true,
			_ => false,
		}
	}
}
