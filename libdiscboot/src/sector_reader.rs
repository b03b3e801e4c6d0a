//! Whole-file and sub-range reads of named disc files.

use crate::console::Console;
use crate::disc::{sectors_for_bytes, DiscImage, FileEntry, ReadTicket, SECTOR_SIZE};
use crate::error::{BootError, Result};
use crate::memory::Region;

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
	/// Return as soon as the read is queued. The caller must sync before using the data.
	Issue,
	/// Return once the data is in memory.
	Block,
}

#[derive(Debug, Clone)]
pub struct RangeRead {
	pub entry: FileEntry,
	pub first_lba: u32,
	pub sectors: u32,
	/// Bytes of meaningful data at the start of the destination.
	pub bytes: u32,
	pub ticket: ReadTicket,
}

/// Reads `path` into `destination`.
///
/// With `start_sector` of 0 the file is read from its beginning: `sector_count` sectors, or the
/// whole file when the count is 0. Otherwise exactly `sector_count` sectors are read starting
/// `start_sector` sectors into the file, and a count is mandatory.
pub fn read_range<I: DiscImage>(
	console: &mut Console<I>,
	path: &str,
	destination: Region,
	start_sector: u32,
	sector_count: u32,
	mode: ReadMode,
) -> Result<RangeRead> {
	if start_sector != 0 && sector_count == 0 {
		return Err(BootError::SectorCountRequired(start_sector));
	}
	let entry = console.drive.search_file(path)?;
	let first_lba = entry.lba.checked_add(start_sector).ok_or(BootError::SectorOutOfRange(u32::MAX))?;
	let (sectors, bytes) = if sector_count > 0 {
		let bytes = sector_count as u64 * SECTOR_SIZE as u64;
		if bytes > destination.len() as u64 {
			return Err(BootError::OutsideWindow {
				window: destination.window().name(),
				address: destination.address(),
				length: bytes.min(u32::MAX as u64) as u32,
			});
		}
		(sector_count, bytes as u32)
	} else {
		(sectors_for_bytes(entry.size), entry.size)
	};
	debug!("{}: sectors {}+{} ({} bytes)", entry.path, start_sector, sectors, bytes);

	console.drive.set_location(first_lba)?;
	let ticket = console.drive.read(sectors, destination)?;
	if mode == ReadMode::Block {
		console.sync()?;
	}
	Ok(RangeRead { entry, first_lba, sectors, bytes, ticket })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::disc::TransferStatus;
	use crate::disc_image::MemoryImage;
	use crate::memory::{MemoryMap, WindowId};

	fn console() -> Console<MemoryImage> {
		let data: Vec<u8> = (0..6 * SECTOR_SIZE).map(|i| (i / SECTOR_SIZE) as u8 + 1).collect();
		let image = MemoryImage::new()
			.with_file("\\PACK.BIN", data)
			.with_file("\\SHORT.TXT", b"hello".to_vec());
		Console::new(MemoryMap::DEFAULT, image, 1).unwrap()
	}

	#[test] fn test_whole_file() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, 0x8000).unwrap();
		let read = read_range(&mut console, "\\SHORT.TXT", region, 0, 0, ReadMode::Block).unwrap();
		assert_eq!((read.sectors, read.bytes), (1, 5));
		assert_eq!(&console.memory.slice(&region)[..6], b"hello\0");
	}

	#[test] fn test_sub_range() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, 0x8000).unwrap();
		let read = read_range(&mut console, "\\PACK.BIN", region, 2, 3, ReadMode::Issue).unwrap();
		assert_eq!(read.first_lba, read.entry.lba + 2);
		assert_eq!(read.bytes, 3 * SECTOR_SIZE as u32);
		assert_eq!(console.drive.status(read.ticket), TransferStatus::Pending { remaining_sectors: 3 });
		console.sync().unwrap();
		let memory = console.memory.slice(&region);
		assert_eq!((memory[0], memory[SECTOR_SIZE], memory[2 * SECTOR_SIZE]), (3, 4, 5));
		assert_eq!(memory[3 * SECTOR_SIZE], 0);
	}

	#[test] fn test_count_from_start() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, 0x8000).unwrap();
		let read = read_range(&mut console, "\\PACK.BIN", region, 0, 2, ReadMode::Block).unwrap();
		assert_eq!(read.bytes, 2 * SECTOR_SIZE as u32);
		assert_eq!(console.memory.slice(&region)[2 * SECTOR_SIZE], 0);
	}

	#[test] fn test_offset_needs_a_count() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, 0x8000).unwrap();
		assert!(matches!(
			read_range(&mut console, "\\PACK.BIN", region, 1, 0, ReadMode::Block),
			Err(BootError::SectorCountRequired(1))
		));
	}

	#[test] fn test_read_larger_than_destination() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, SECTOR_SIZE as u32).unwrap();
		let result = read_range(&mut console, "\\PACK.BIN", region, 0, 0, ReadMode::Block);
		assert!(matches!(result, Err(BootError::OutsideWindow { .. })));
		assert!(console.memory.slice(&region).iter().all(|&b| b == 0));
	}

	#[test] fn test_missing_file() {
		let mut console = console();
		let region = console.memory.map().window_start(WindowId::Staging, 0x8000).unwrap();
		let error = read_range(&mut console, "\\GONE.BIN", region, 0, 0, ReadMode::Block).unwrap_err();
		assert!(error.is_not_found());
	}
}
