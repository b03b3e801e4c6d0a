//! Title catalogs: the quoted text list and the fixed-record VFS table.
//!
//! Text catalogs are runs of three quoted fields per title (name, path, eight hex digits of
//! target) ended by a byte of value 128. Anything outside quotes is ignored, so titles can be laid
//! out one per line or all on one line.
//!
//! VFS catalogs start with three words (reserved, title count, table sectors) followed by 84-byte
//! records: a 64-byte name then size, start sector, sector count, byte address and target. Every
//! title in a VFS lives inside the VFS file itself.

use crate::console::Console;
use crate::disc::{DiscImage, SECTOR_SIZE};
use crate::error::{BootError, CatalogFault, Result};
use crate::memory::WindowId;
use crate::sector_reader::{read_range, ReadMode};
use crate::title::{decode_hex, FixedText, Target, TitleRecord, NAME_CAPACITY, PATH_CAPACITY};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

pub const TEXT_TERMINATOR: u8 = 128;
pub const DEFAULT_CAPACITY: usize = 1024;

const VFS_HEADER_SIZE: usize = 12;
const VFS_RECORD_SIZE: usize = 84;
const VFS_NAME_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogLimits {
	/// Most titles one catalog may hold.
	pub capacity: usize,
}

impl Default for CatalogLimits {
	fn default() -> CatalogLimits {
		CatalogLimits { capacity: DEFAULT_CAPACITY }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
	Text,
	Binary,
}

#[derive(Debug, Clone)]
pub struct TitleCatalog {
	limits: CatalogLimits,
	records: Vec<TitleRecord>,
}

/// Which quoted field the text parser is filling.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
	Name,
	Path,
	Address,
}

impl Field {
	fn next(self) -> Option<Field> {
		match self {
			Field::Name => Some(Field::Path),
			Field::Path => Some(Field::Address),
			Field::Address => None,
		}
	}
}

impl TitleCatalog {
	pub fn new(limits: CatalogLimits) -> TitleCatalog {
		// Storage grows past the default on demand; the limit is only enforced by `push`.
		TitleCatalog { limits, records: Vec::with_capacity(limits.capacity.min(DEFAULT_CAPACITY)) }
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&TitleRecord> {
		self.records.get(index)
	}

	pub fn records(&self) -> &[TitleRecord] {
		&self.records
	}

	/// Drops every title, keeping the storage.
	pub fn clear(&mut self) {
		self.records.clear();
	}

	pub fn push(&mut self, record: TitleRecord) -> Result<()> {
		if self.records.len() >= self.limits.capacity {
			return Err(BootError::CatalogFull(self.limits.capacity));
		}
		self.records.push(record);
		Ok(())
	}

	/// Replaces the contents with the titles of a text catalog. Scanning stops at the terminator
	/// byte or the end of `bytes`, whichever comes first. On error the catalog holds whatever was
	/// parsed before the fault.
	pub fn parse_text(&mut self, bytes: &[u8]) -> Result<()> {
		self.clear();
		let mut record = TitleRecord::empty();
		let mut address = FixedText::<8>::new();
		let mut field = Field::Name;
		let mut in_quote = false;

		for &c in bytes.iter().take_while(|&&c| c != TEXT_TERMINATOR) {
			let index = self.records.len();
			if !in_quote {
				if c == b'"' {
					in_quote = true;
				}
				continue;
			}
			if c == b'"' {
				in_quote = false;
				match field.next() {
					Some(next) => field = next,
					None => {
						let raw = decode_hex(address.as_bytes())
							.map_err(|fault| BootError::MalformedCatalog { record: index, fault })?;
						record.target = Target::from_raw(raw);
						self.push(record)?;
						record = TitleRecord::empty();
						address.clear();
						field = Field::Name;
					}
				}
				continue;
			}
			let fits = match field {
				Field::Name => record.name.push(c),
				Field::Path => record.path.push(c),
				Field::Address => address.push(c),
			};
			if !fits {
				return Err(match field {
					Field::Name => BootError::Overflow { record: index, field: "name", capacity: NAME_CAPACITY },
					Field::Path => BootError::Overflow { record: index, field: "path", capacity: PATH_CAPACITY },
					Field::Address => BootError::MalformedCatalog { record: index, fault: CatalogFault::AddressLength(9) },
				});
			}
		}

		if in_quote || field != Field::Name {
			return Err(BootError::MalformedCatalog { record: self.records.len(), fault: CatalogFault::UnterminatedRecord });
		}
		debug!("Text catalog: {} titles", self.records.len());
		Ok(())
	}

	/// Replaces the contents with the titles of a VFS table. `vfs_path` becomes the path of every
	/// title.
	pub fn parse_vfs(&mut self, bytes: &[u8], vfs_path: &str) -> Result<()> {
		self.clear();
		let (count, table_sectors) = vfs_header(bytes)?;
		let table_bytes = table_sectors.max(1) as u64 * SECTOR_SIZE as u64;
		let needed = VFS_HEADER_SIZE as u64 + count as u64 * VFS_RECORD_SIZE as u64;
		if needed > table_bytes {
			return Err(BootError::MalformedCatalog {
				record: 0,
				fault: CatalogFault::TableTooShort { records: count, table_sectors },
			});
		}
		let path = FixedText::<PATH_CAPACITY>::from_bytes(vfs_path.as_bytes())
			.ok_or(BootError::Overflow { record: 0, field: "path", capacity: PATH_CAPACITY })?;

		for index in 0..count as usize {
			let start = VFS_HEADER_SIZE + index * VFS_RECORD_SIZE;
			let raw = match bytes.get(start..start + VFS_RECORD_SIZE) {
				Some(raw) => raw,
				None => return Err(BootError::MalformedCatalog { record: index, fault: CatalogFault::UnterminatedRecord }),
			};
			let name = &raw[..VFS_NAME_SIZE];
			let name_len = name.iter().position(|&b| b == 0).unwrap_or(VFS_NAME_SIZE);
			let mut fields = [0u32; 5];
			LittleEndian::read_u32_into(&raw[VFS_NAME_SIZE..], &mut fields);
			let [_size, start_sector, sector_count, _byte_address, target] = fields;
			self.push(TitleRecord {
				name: FixedText::from_bytes(&name[..name_len])
					.ok_or(BootError::Overflow { record: index, field: "name", capacity: NAME_CAPACITY })?,
				path,
				target: Target::from_raw(target),
				start_sector,
				sector_count,
			})?;
		}
		debug!("VFS catalog {}: {} titles in {} sectors", vfs_path, count, table_sectors);
		Ok(())
	}
}

/// Title count and table sector count from the first sector of a VFS.
pub fn vfs_header(bytes: &[u8]) -> Result<(u32, u32)> {
	if bytes.len() < VFS_HEADER_SIZE {
		return Err(BootError::MalformedCatalog { record: 0, fault: CatalogFault::UnterminatedRecord });
	}
	Ok((LittleEndian::read_u32(&bytes[4..8]), LittleEndian::read_u32(&bytes[8..12])))
}

/// Reads a catalog file through the staging window and parses it into `catalog`.
///
/// Text catalogs come from the whole file, or `sector_count` sectors from `start_sector` when a
/// record points into a larger file. A VFS is read one sector first and then the rest of its
/// table, which the first sector sizes.
pub fn load_catalog<I: DiscImage>(
	console: &mut Console<I>,
	catalog: &mut TitleCatalog,
	path: &str,
	format: CatalogFormat,
	start_sector: u32,
	sector_count: u32,
) -> Result<()> {
	let staging = console.memory.map().staging;
	let window = console.memory.map().window_start(WindowId::Staging, staging.size)?;
	match format {
		CatalogFormat::Text => {
			let read = read_range(console, path, window, start_sector, sector_count, ReadMode::Block)?;
			let bytes = &console.memory.slice(&window)[..read.bytes as usize];
			catalog.parse_text(bytes)?;
		}
		CatalogFormat::Binary => {
			let first = read_range(console, path, window, start_sector, 1, ReadMode::Block)?;
			let (count, table_sectors) = vfs_header(console.memory.slice(&window))?;
			debug!("VFS {}: {} titles, {} table sectors", first.entry.path, count, table_sectors);
			if table_sectors > 1 {
				let rest = window.skip(SECTOR_SIZE as u32);
				read_range(console, path, rest, start_sector + 1, table_sectors - 1, ReadMode::Block)?;
			}
			let table_len = (table_sectors.max(1) as u64 * SECTOR_SIZE as u64).min(window.len() as u64);
			let bytes = &console.memory.slice(&window)[..table_len as usize];
			catalog.parse_vfs(bytes, path)?;
		}
	}
	info!("Loaded {} titles from {}", catalog.len(), path);
	Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::disc_image::MemoryImage;
	use crate::memory::MemoryMap;
	use crate::title::{AudioKind, MultiTrack};
	use byteorder::WriteBytesExt;

	pub(crate) fn build_vfs(titles: &[(&str, u32, u32, u32)], table_sectors: u32) -> Vec<u8> {
		let mut vfs = vec![];
		vfs.write_u32::<LittleEndian>(0).unwrap();
		vfs.write_u32::<LittleEndian>(titles.len() as u32).unwrap();
		vfs.write_u32::<LittleEndian>(table_sectors).unwrap();
		for &(name, start_sector, sector_count, target) in titles {
			let mut raw_name = name.as_bytes().to_vec();
			raw_name.resize(VFS_NAME_SIZE, 0);
			vfs.extend(&raw_name);
			vfs.write_u32::<LittleEndian>(sector_count * SECTOR_SIZE as u32).unwrap();
			vfs.write_u32::<LittleEndian>(start_sector).unwrap();
			vfs.write_u32::<LittleEndian>(sector_count).unwrap();
			vfs.write_u32::<LittleEndian>(start_sector * SECTOR_SIZE as u32).unwrap();
			vfs.write_u32::<LittleEndian>(target).unwrap();
		}
		vfs.resize(table_sectors.max(1) as usize * SECTOR_SIZE, 0);
		vfs
	}

	fn text(bytes: &[u8]) -> Result<TitleCatalog> {
		let mut catalog = TitleCatalog::new(CatalogLimits::default());
		catalog.parse_text(bytes).map(|_| catalog)
	}

	#[test] fn test_two_loadable_titles() {
		let catalog = text(b"\"Game A\"\"GAMEA.EXE\"\"0001A000\"\"Game B\"\"GAMEB.EXE\"\"8002F000\"\x80").unwrap();
		assert_eq!(catalog.len(), 2);
		let a = catalog.get(0).unwrap();
		assert_eq!(a.name.as_bytes(), b"Game A");
		assert_eq!(a.path.as_bytes(), b"GAMEA.EXE");
		assert_eq!(a.target, Target::Load { stack: 0x0001_A000 });
		assert_eq!((a.start_sector, a.sector_count), (0, 0));
		assert_eq!(catalog.get(1).unwrap().target, Target::Load { stack: 0x8002_F000 });
	}

	#[test] fn test_layout_and_terminator() {
		let source = b"# titles\r\n\"Song\" \"\\MUSIC\\A.SEP\" \"01000002\"\r\n\"Menu\"\t\"SUB.TXT\"\t\"FFFFFFFF\"\r\n\x80\"Ignored\"";
		let catalog = text(source).unwrap();
		assert_eq!(catalog.len(), 2);
		assert_eq!(catalog.get(0).unwrap().target, Target::Track(MultiTrack::Sep, 2));
		assert_eq!(catalog.get(0).unwrap().path.as_bytes(), b"\\MUSIC\\A.SEP");
		assert_eq!(catalog.get(1).unwrap().target, Target::TextCatalog);
	}

	#[test] fn test_missing_terminator_stops_at_end() {
		let catalog = text(b"\"Quiet\"\"X\"\"FFFFFF00\"\n").unwrap();
		assert_eq!(catalog.len(), 1);
		assert_eq!(catalog.get(0).unwrap().target, Target::Silence);
		assert!(text(b"").unwrap().is_empty());
	}

	#[test] fn test_empty_fields() {
		let catalog = text(b"\"\"\"\"\"FFFFFF01\"").unwrap();
		let record = catalog.get(0).unwrap();
		assert!(record.name.is_empty() && record.path.is_empty());
		assert_eq!(record.target, Target::Music(AudioKind::Mod));
	}

	#[test] fn test_malformed_text() {
		match text(b"\"A\"\"A.EXE\"\"8002f000\"") {
			Err(BootError::MalformedCatalog { record: 0, fault: CatalogFault::AddressDigit(b'f') }) => {}
			other => panic!("unexpected {:?}", other),
		}
		match text(b"\"A\"\"A.EXE\"\"80000000\"\"B\"\"B.EXE\"\"1234\"") {
			Err(BootError::MalformedCatalog { record: 1, fault: CatalogFault::AddressLength(4) }) => {}
			other => panic!("unexpected {:?}", other),
		}
		assert!(matches!(text(b"\"A\"\"A.EXE\"\"800000001\""), Err(BootError::MalformedCatalog { .. })));
		match text(b"\"A\"\"A.EXE\"\"80000000\"\"B\"\"B.EX") {
			Err(BootError::MalformedCatalog { record: 1, fault: CatalogFault::UnterminatedRecord }) => {}
			other => panic!("unexpected {:?}", other),
		}
		assert!(matches!(text(b"\"A\"\"A.EXE\"\x80"), Err(BootError::MalformedCatalog { .. })));
	}

	#[test] fn test_overflow() {
		let long_name = format!("\"{}\"\"A.EXE\"\"80000000\"", "N".repeat(65));
		assert!(matches!(text(long_name.as_bytes()), Err(BootError::Overflow { field: "name", capacity: 64, .. })));
		let fits = format!("\"{}\"\"{}\"\"80000000\"", "N".repeat(64), "P".repeat(52));
		assert_eq!(text(fits.as_bytes()).unwrap().get(0).unwrap().path.len(), 52);
		let long_path = format!("\"A\"\"{}\"\"80000000\"", "P".repeat(53));
		assert!(matches!(text(long_path.as_bytes()), Err(BootError::Overflow { field: "path", .. })));

		let mut small = TitleCatalog::new(CatalogLimits { capacity: 1 });
		let result = small.parse_text(b"\"A\"\"A\"\"80000000\"\"B\"\"B\"\"80000000\"");
		assert!(matches!(result, Err(BootError::CatalogFull(1))));
	}

	#[test] fn test_huge_capacity_is_not_preallocated() {
		let mut catalog = TitleCatalog::new(CatalogLimits { capacity: usize::MAX });
		assert!(catalog.records.capacity() <= DEFAULT_CAPACITY);
		catalog.parse_text(b"\"A\"\"A.EXE\"\"80000000\"").unwrap();
		assert_eq!(catalog.len(), 1);
	}

	#[test] fn test_vfs_records() {
		let vfs = build_vfs(&[("Intro", 2, 10, 0x0100_0000), ("Tool", 12, 40, 0x801F_FF00)], 1);
		let mut catalog = TitleCatalog::new(CatalogLimits::default());
		catalog.parse_vfs(&vfs, "\\DISC.VFS").unwrap();
		assert_eq!(catalog.len(), 2);
		let tool = catalog.get(1).unwrap();
		assert_eq!(tool.name.as_bytes(), b"Tool");
		assert_eq!(tool.path.as_bytes(), b"\\DISC.VFS");
		assert_eq!((tool.start_sector, tool.sector_count), (12, 40));
		assert_eq!(tool.target, Target::Load { stack: 0x801F_FF00 });
	}

	#[test] fn test_vfs_table_too_short() {
		let titles: Vec<(&str, u32, u32, u32)> = (0..30).map(|i| ("T", i, 1, 0xFFFF_FF00)).collect();
		let mut vfs = build_vfs(&titles, 2);
		LittleEndian::write_u32(&mut vfs[8..12], 1);
		let mut catalog = TitleCatalog::new(CatalogLimits::default());
		match catalog.parse_vfs(&vfs, "\\DISC.VFS") {
			Err(BootError::MalformedCatalog { fault: CatalogFault::TableTooShort { records: 30, table_sectors: 1 }, .. }) => {}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test] fn test_load_multi_sector_vfs() {
		let titles: Vec<(&str, u32, u32, u32)> = (0..50).map(|i| ("Track", i, 1, 0x0101_0000 + i)).collect();
		let vfs = build_vfs(&titles, 3);
		let image = MemoryImage::new().with_file("\\MUSIC.VFS", vfs);
		let mut console = Console::new(MemoryMap::DEFAULT, image, 1).unwrap();
		let mut catalog = TitleCatalog::new(CatalogLimits::default());
		load_catalog(&mut console, &mut catalog, "\\MUSIC.VFS", CatalogFormat::Binary, 0, 0).unwrap();
		assert_eq!(catalog.len(), 50);
		assert_eq!(catalog.get(49).unwrap().target, Target::Track(MultiTrack::Seq, 49));
	}

	#[test] fn test_load_text_from_sub_range() {
		let mut data = vec![b' '; SECTOR_SIZE];
		data.extend(b"\"Inner\"\"IN.EXE\"\"00000000\"\x80");
		let image = MemoryImage::new().with_file("\\PACK.BIN", data);
		let mut console = Console::new(MemoryMap::DEFAULT, image, 1).unwrap();
		let mut catalog = TitleCatalog::new(CatalogLimits::default());
		load_catalog(&mut console, &mut catalog, "\\PACK.BIN", CatalogFormat::Text, 1, 1).unwrap();
		assert_eq!(catalog.len(), 1);
		assert_eq!(catalog.get(0).unwrap().target, Target::Load { stack: 0 });

		let error = load_catalog(&mut console, &mut catalog, "\\NONE.TXT", CatalogFormat::Text, 0, 0).unwrap_err();
		assert!(error.is_not_found());
	}
}
