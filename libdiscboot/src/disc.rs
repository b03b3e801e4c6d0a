//! The disc drive: directory search, read cursor and one asynchronous sector transfer at a time.
//!
//! A transfer only moves data when the drive is serviced, the same way the real drive only
//! delivers a sector per interrupt. Callers issue a read, carry on with other work, and must
//! `sync` (or poll until complete) before touching the destination.

use crate::error::{BootError, Result};
use crate::memory::{MainMemory, Region};

use log::{debug, trace};

pub const SECTOR_SIZE: usize = 2048;

/// Frames of lead-in before logical sector 0.
const LEAD_IN_FRAMES: u32 = 150;
const FRAMES_PER_SECOND: u32 = 75;

pub fn sectors_for_bytes(bytes: u32) -> u32 {
	((bytes as u64 + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64) as u32
}

/// Minute/second/frame disc position, as the drive reports it.
// https://psx-spx.consoledev.net/cdromdrive/#cdrom-disk-format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msf {
	pub minute: u8,
	pub second: u8,
	pub frame: u8,
}

impl Msf {
	pub fn from_lba(lba: u32) -> Msf {
		let frames = lba + LEAD_IN_FRAMES;
		Msf {
			minute: (frames / FRAMES_PER_SECOND / 60) as u8,
			second: ((frames / FRAMES_PER_SECOND) % 60) as u8,
			frame: (frames % FRAMES_PER_SECOND) as u8,
		}
	}

	/// `None` for positions inside the lead-in, before 00:02:00.
	pub fn to_lba(&self) -> Option<u32> {
		let frames = (self.minute as u32 * 60 + self.second as u32) * FRAMES_PER_SECOND + self.frame as u32;
		frames.checked_sub(LEAD_IN_FRAMES)
	}
}

impl std::fmt::Display for Msf {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:02}:{:02}:{:02}", self.minute, self.second, self.frame)
	}
}

/// A directory hit: where the file starts and how long the directory says it is.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
	pub path: String,
	pub lba: u32,
	pub size: u32,
}

impl FileEntry {
	pub fn sector_count(&self) -> u32 {
		sectors_for_bytes(self.size)
	}
}

/// Canonical form of a disc path: upper case, `\` separated, leading `\`, no `;1` version.
/// `cdrom:\GAMES\game.exe;1`, `/games/GAME.EXE` and `GAMES\GAME.EXE` all name the same file.
pub fn normalise_path(path: &str) -> String {
	let path = path.trim();
	let path = path.strip_prefix("cdrom:").unwrap_or(path);
	let path = match path.rfind(';') {
		Some(pos) => &path[..pos],
		None => path,
	};
	let mut result = String::with_capacity(path.len() + 1);
	for part in path.split(|c| c == '\\' || c == '/').filter(|part| !part.is_empty()) {
		result.push('\\');
		result.push_str(&part.to_ascii_uppercase());
	}
	if result.is_empty() {
		result.push('\\');
	}
	result
}

pub trait DiscImage : std::fmt::Debug {
	/// Looks a path up in the disc directory. Paths arrive already normalised.
	fn lookup(&mut self, path: &str) -> Result<FileEntry>;
	/// Reads the 2048 user-data bytes of one sector.
	fn read_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()>;
	/// Number of sectors on the disc.
	fn sector_count(&self) -> u32;
}

impl<T: DiscImage + ?Sized> DiscImage for Box<T> {
	fn lookup(&mut self, path: &str) -> Result<FileEntry> {
		(**self).lookup(path)
	}

	fn read_sector(&mut self, lba: u32, destination: &mut [u8]) -> Result<()> {
		(**self).read_sector(lba, destination)
	}

	fn sector_count(&self) -> u32 {
		(**self).sector_count()
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferStatus {
	Pending { remaining_sectors: u32 },
	Complete,
}

#[derive(Debug, Clone)]
struct Transfer {
	ticket: u32,
	next_lba: u32,
	remaining: u32,
	destination: Region,
}

#[derive(Debug)]
pub struct DiscDrive<I: DiscImage> {
	image: I,
	location: u32,
	transfer: Option<Transfer>,
	next_ticket: u32,
	sectors_per_service: u32,
	sector_buffer: Vec<u8>,
}

/// Proof that a read was issued. Hand it back to the drive to ask after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket(u32);

impl<I: DiscImage> DiscDrive<I> {
	/// `sectors_per_service` is how far a transfer advances each time the drive is serviced.
	pub fn new(image: I, sectors_per_service: u32) -> DiscDrive<I> {
		DiscDrive {
			image,
			location: 0,
			transfer: None,
			next_ticket: 1,
			sectors_per_service: sectors_per_service.max(1),
			sector_buffer: vec![0; SECTOR_SIZE],
		}
	}

	pub fn is_busy(&self) -> bool {
		self.transfer.is_some()
	}

	fn ensure_idle(&self) -> Result<()> {
		if self.is_busy() {
			Err(BootError::DriveBusy)
		} else {
			Ok(())
		}
	}

	pub fn search_file(&mut self, path: &str) -> Result<FileEntry> {
		self.ensure_idle()?;
		let normalised = normalise_path(path);
		debug!("Searching for file {}...", normalised);
		let entry = self.image.lookup(&normalised)?;
		debug!("Found {} at {} ({} bytes)", entry.path, Msf::from_lba(entry.lba), entry.size);
		Ok(entry)
	}

	pub fn location(&self) -> u32 {
		self.location
	}

	pub fn set_location(&mut self, lba: u32) -> Result<()> {
		self.ensure_idle()?;
		if lba > self.image.sector_count() {
			return Err(BootError::SectorOutOfRange(lba));
		}
		self.location = lba;
		Ok(())
	}

	/// Starts reading `sectors` sectors from the current location into `destination`. Whole
	/// sectors are written, so the region must be at least `sectors * 2048` bytes long.
	pub fn read(&mut self, sectors: u32, destination: Region) -> Result<ReadTicket> {
		self.ensure_idle()?;
		let bytes = sectors as u64 * SECTOR_SIZE as u64;
		if bytes > destination.len() as u64 {
			return Err(BootError::OutsideWindow {
				window: destination.window().name(),
				address: destination.address(),
				length: bytes.min(u32::MAX as u64) as u32,
			});
		}
		if self.location as u64 + sectors as u64 > self.image.sector_count() as u64 {
			return Err(BootError::SectorOutOfRange(self.location.saturating_add(sectors)));
		}
		let ticket = self.next_ticket;
		self.next_ticket += 1;
		debug!("Reading {} sectors from {} to 0x{:08x}", sectors, Msf::from_lba(self.location), destination.address());
		if sectors > 0 {
			self.transfer = Some(Transfer { ticket, next_lba: self.location, remaining: sectors, destination });
		}
		Ok(ReadTicket(ticket))
	}

	/// Moves up to one service quantum of sectors into memory.
	pub fn service(&mut self, memory: &mut MainMemory) -> Result<TransferStatus> {
		self.advance(memory, self.sectors_per_service)
	}

	fn advance(&mut self, memory: &mut MainMemory, budget: u32) -> Result<TransferStatus> {
		let mut transfer = match self.transfer.take() {
			Some(transfer) => transfer,
			None => return Ok(TransferStatus::Complete),
		};
		for _ in 0..budget.min(transfer.remaining) {
			if let Err(err) = self.image.read_sector(transfer.next_lba, &mut self.sector_buffer) {
				// A failed read ends the transfer; there is no retry.
				self.location = transfer.next_lba;
				return Err(err);
			}
			memory.slice_mut(&transfer.destination)[..SECTOR_SIZE].copy_from_slice(&self.sector_buffer);
			trace!("Sector {} -> 0x{:08x}", transfer.next_lba, transfer.destination.address());
			transfer.destination = transfer.destination.skip(SECTOR_SIZE as u32);
			transfer.next_lba += 1;
			transfer.remaining -= 1;
		}
		self.location = transfer.next_lba;
		if transfer.remaining == 0 {
			Ok(TransferStatus::Complete)
		} else {
			let remaining_sectors = transfer.remaining;
			self.transfer = Some(transfer);
			Ok(TransferStatus::Pending { remaining_sectors })
		}
	}

	/// Where a particular read stands. Only the transfer in flight can be pending.
	pub fn status(&self, ticket: ReadTicket) -> TransferStatus {
		match self.transfer {
			Some(ref transfer) if transfer.ticket == ticket.0 => TransferStatus::Pending { remaining_sectors: transfer.remaining },
			_ => TransferStatus::Complete,
		}
	}

	/// Blocks until the transfer in flight, if any, has landed in memory.
	pub fn sync(&mut self, memory: &mut MainMemory) -> Result<()> {
		while let TransferStatus::Pending { .. } = self.advance(memory, u32::MAX)? {}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::disc_image::MemoryImage;
	use crate::memory::{MemoryMap, WindowId};

	#[test] fn test_msf_round_trip() {
		assert_eq!(Msf::from_lba(0), Msf { minute: 0, second: 2, frame: 0 });
		assert_eq!(Msf::from_lba(16).to_string(), "00:02:16");
		let msf = Msf::from_lba(4500 - 150);
		assert_eq!(msf, Msf { minute: 1, second: 0, frame: 0 });
		assert_eq!(msf.to_lba(), Some(4350));
		assert_eq!(Msf { minute: 0, second: 2, frame: 0 }.to_lba(), Some(0));
		assert_eq!(Msf { minute: 0, second: 1, frame: 74 }.to_lba(), None);
	}

	#[test] fn test_normalise_path() {
		assert_eq!(normalise_path("\\PSFMENU\\TITLES.TXT;1"), "\\PSFMENU\\TITLES.TXT");
		assert_eq!(normalise_path("cdrom:\\games\\game.exe;1"), "\\GAMES\\GAME.EXE");
		assert_eq!(normalise_path("GAMES/Game.exe"), "\\GAMES\\GAME.EXE");
		assert_eq!(normalise_path(""), "\\");
	}

	#[test] fn test_sectors_for_bytes() {
		assert_eq!(sectors_for_bytes(0), 0);
		assert_eq!(sectors_for_bytes(1), 1);
		assert_eq!(sectors_for_bytes(2048), 1);
		assert_eq!(sectors_for_bytes(2049), 2);
		assert_eq!(sectors_for_bytes(u32::MAX), 0x20_0000);
	}

	fn drive_with(data: Vec<u8>) -> (DiscDrive<MemoryImage>, MainMemory) {
		let mut image = MemoryImage::new();
		image.add_file("\\DATA.BIN", data);
		(DiscDrive::new(image, 2), MainMemory::new(MemoryMap::DEFAULT).unwrap())
	}

	#[test] fn test_transfer_progresses_per_service() {
		let data: Vec<u8> = (0..5 * SECTOR_SIZE).map(|i| (i / SECTOR_SIZE) as u8 + 1).collect();
		let (mut drive, mut memory) = drive_with(data);
		let entry = drive.search_file("data.bin;1").unwrap();
		drive.set_location(entry.lba).unwrap();
		let region = memory.map().window_start(WindowId::Staging, 5 * SECTOR_SIZE as u32).unwrap();
		let ticket = drive.read(5, region).unwrap();

		assert_eq!(drive.status(ticket), TransferStatus::Pending { remaining_sectors: 5 });
		assert!(memory.slice(&region).iter().all(|&b| b == 0));
		assert_eq!(drive.service(&mut memory).unwrap(), TransferStatus::Pending { remaining_sectors: 3 });
		assert_eq!(memory.slice(&region)[SECTOR_SIZE], 2);
		assert_eq!(memory.slice(&region)[2 * SECTOR_SIZE], 0);

		drive.sync(&mut memory).unwrap();
		assert_eq!(drive.status(ticket), TransferStatus::Complete);
		assert_eq!(memory.slice(&region)[4 * SECTOR_SIZE], 5);
		assert_eq!(drive.location(), entry.lba + 5);
	}

	#[test] fn test_second_request_while_busy_is_refused() {
		let (mut drive, memory) = drive_with(vec![7; 3 * SECTOR_SIZE]);
		let entry = drive.search_file("\\DATA.BIN").unwrap();
		drive.set_location(entry.lba).unwrap();
		let region = memory.map().window_start(WindowId::Staging, 3 * SECTOR_SIZE as u32).unwrap();
		drive.read(3, region).unwrap();
		assert!(matches!(drive.read(1, region), Err(BootError::DriveBusy)));
		assert!(matches!(drive.search_file("\\DATA.BIN"), Err(BootError::DriveBusy)));
		assert!(matches!(drive.set_location(0), Err(BootError::DriveBusy)));
	}

	#[test] fn test_read_must_fit_destination() {
		let (mut drive, memory) = drive_with(vec![0; 4 * SECTOR_SIZE]);
		let region = memory.map().window_start(WindowId::Staging, SECTOR_SIZE as u32).unwrap();
		assert!(matches!(drive.read(2, region), Err(BootError::OutsideWindow { .. })));
		assert!(!drive.is_busy());
	}

	#[test] fn test_missing_file() {
		let (mut drive, _) = drive_with(vec![]);
		match drive.search_file("\\NOPE.EXE") {
			Err(BootError::NotFound(path)) => assert_eq!(path, "\\NOPE.EXE"),
			other => panic!("unexpected {:?}", other),
		}
	}
}
