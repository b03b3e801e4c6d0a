//! ISO 9660 disc images, either cooked (2048 bytes per sector) or raw Mode 2 Form 1 dumps
//! (2352 bytes per sector).

use crate::disc::{DiscImage, FileEntry, SECTOR_SIZE};
use crate::error::{BootError, Result};

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const RAW_SECTOR_SIZE: u64 = 2352;
/// Sync (12) + header (4) + subheader (8).
const MODE2_FORM1_DATA_OFFSET: u64 = 24;
const SYNC_PATTERN: [u8; 12] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const PVD_LBA: u32 = 16;
const FLAG_DIRECTORY: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorFormat {
	Cooked,
	Raw,
}

impl SectorFormat {
	fn offset(&self, lba: u32) -> u64 {
		match self {
			SectorFormat::Cooked => lba as u64 * SECTOR_SIZE as u64,
			SectorFormat::Raw => lba as u64 * RAW_SECTOR_SIZE + MODE2_FORM1_DATA_OFFSET,
		}
	}
}

#[derive(Debug, Clone)]
struct DirectoryRecord {
	lba: u32,
	size: u32,
	is_dir: bool,
	identifier: String,
}

fn parse_directory_record(data: &[u8]) -> Option<DirectoryRecord> {
	let record_len = data[0] as usize;
	if record_len < 34 || record_len > data.len() {
		return None;
	}
	let id_len = data[32] as usize;
	if 33 + id_len > record_len {
		return None;
	}
	let raw_id = &data[33..33 + id_len];
	let identifier = match raw_id {
		[0] => ".".to_string(),
		[1] => "..".to_string(),
		_ => {
			let id = String::from_utf8_lossy(raw_id).to_ascii_uppercase();
			let id = id.split(';').next().unwrap_or("").to_string();
			// Files without an extension are recorded as "NAME."
			id.strip_suffix('.').map(|s| s.to_string()).unwrap_or(id)
		}
	};
	Some(DirectoryRecord {
		lba: LittleEndian::read_u32(&data[2..6]),
		size: LittleEndian::read_u32(&data[10..14]),
		is_dir: data[25] & FLAG_DIRECTORY != 0,
		identifier,
	})
}

#[derive(Debug)]
pub struct IsoImage<R: Read + Seek> {
	reader: R,
	format: SectorFormat,
	volume_sectors: u32,
	root: DirectoryRecord,
}

impl IsoImage<std::io::BufReader<std::fs::File>> {
	pub fn open_path(path: &Path) -> Result<Self> {
		let file = std::fs::File::open(path)?;
		IsoImage::open(std::io::BufReader::new(file))
	}
}

impl<R: Read + Seek> IsoImage<R> {
	pub fn open(mut reader: R) -> Result<IsoImage<R>> {
		let mut head = [0u8; 12];
		reader.seek(SeekFrom::Start(0))?;
		reader.read_exact(&mut head)?;
		let format = if head == SYNC_PATTERN { SectorFormat::Raw } else { SectorFormat::Cooked };

		let mut pvd = vec![0u8; SECTOR_SIZE];
		reader.seek(SeekFrom::Start(format.offset(PVD_LBA)))?;
		reader.read_exact(&mut pvd)?;
		if pvd[0] != 0x01 || &pvd[1..6] != b"CD001" {
			return Err(BootError::InvalidImage("missing CD001 primary volume descriptor".to_string()));
		}
		let volume_sectors = LittleEndian::read_u32(&pvd[80..84]);
		let root = parse_directory_record(&pvd[156..190])
			.ok_or_else(|| BootError::InvalidImage("bad root directory record".to_string()))?;
		debug!("ISO image: {:?}, {} sectors, root at {}", format, volume_sectors, root.lba);

		Ok(IsoImage { reader, format, volume_sectors, root })
	}

	pub fn format(&self) -> SectorFormat {
		self.format
	}

	fn read_directory(&mut self, directory: &DirectoryRecord) -> Result<Vec<DirectoryRecord>> {
		let mut records = vec![];
		let mut sector = vec![0u8; SECTOR_SIZE];
		let sectors = crate::disc::sectors_for_bytes(directory.size);
		for index in 0..sectors {
			self.read_volume_sector(directory.lba + index, &mut sector)?;
			let mut pos = 0;
			// Records never straddle sectors; a zero length byte pads out the rest.
			while pos < SECTOR_SIZE && sector[pos] != 0 {
				let record_len = sector[pos] as usize;
				if pos + record_len > SECTOR_SIZE {
					break;
				}
				if let Some(record) = parse_directory_record(&sector[pos..pos + record_len]) {
					records.push(record);
				}
				pos += record_len;
			}
		}
		Ok(records)
	}

	fn read_volume_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()> {
		if lba >= self.volume_sectors {
			return Err(BootError::SectorOutOfRange(lba));
		}
		self.reader.seek(SeekFrom::Start(self.format.offset(lba)))?;
		self.reader.read_exact(&mut destination[..SECTOR_SIZE])?;
		Ok(())
	}
}

impl<R: Read + Seek + std::fmt::Debug> DiscImage for IsoImage<R> {
	fn lookup(&mut self, path: &str) -> Result<FileEntry> {
		let not_found = || BootError::NotFound(path.to_string());
		let mut current = self.root.clone();
		let mut components = path.split('\\').filter(|part| !part.is_empty()).peekable();
		while let Some(component) = components.next() {
			if !current.is_dir {
				return Err(not_found());
			}
			let wanted_dir = components.peek().is_some();
			current = self
				.read_directory(&current)?
				.into_iter()
				.find(|record| record.identifier == component && record.is_dir == wanted_dir)
				.ok_or_else(not_found)?;
		}
		if current.is_dir {
			return Err(not_found());
		}
		Ok(FileEntry { path: path.to_string(), lba: current.lba, size: current.size })
	}

	fn read_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()> {
		self.read_volume_sector(lba, destination)
	}

	fn sector_count(&self) -> u32 {
		self.volume_sectors
	}
}
