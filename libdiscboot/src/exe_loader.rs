use crate::console::Console;
use crate::disc::{sectors_for_bytes, DiscImage, FileEntry, ReadTicket, TransferStatus, SECTOR_SIZE};
use crate::error::{BootError, Result};
use crate::memory::{Region, WindowId};
use crate::sector_reader::{read_range, ReadMode};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};

// https://psx-spx.consoledev.net/cdromfileformats/#cdrom-file-psx-executables-ps-x-exe

/// The header fills the whole first sector of the file.
pub const HEADER_SIZE: usize = SECTOR_SIZE;
const MARKER: &[u8; 8] = b"PS-X EXE";
const MARKER_FIELD_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExeHeader {
	pub pc0: u32,
	pub gp0: u32,
	pub t_addr: u32,
	pub t_size: u32,
	pub d_addr: u32,
	pub d_size: u32,
	pub b_addr: u32,
	pub b_size: u32,
	pub s_addr: u32,
	pub s_size: u32,
}

impl ExeHeader {
	pub fn parse(stream: &mut dyn std::io::Read) -> Result<ExeHeader> {
		let mut marker = [0u8; MARKER_FIELD_SIZE];
		stream.read_exact(&mut marker).map_err(|e| BootError::InvalidExecutable(format!("Failed to read marker: {}", e)))?;
		if &marker[..MARKER.len()] != MARKER {
			return Err(BootError::InvalidExecutable(format!("Bad marker: {:02x?}", &marker[..MARKER.len()])));
		}
		let mut field = |name: &str| {
			stream.read_u32::<LittleEndian>().map_err(|e| BootError::InvalidExecutable(format!("Failed to read {}: {}", name, e)))
		};
		Ok(ExeHeader {
			pc0: field("pc0")?,
			gp0: field("gp0")?,
			t_addr: field("t_addr")?,
			t_size: field("t_size")?,
			d_addr: field("d_addr")?,
			d_size: field("d_size")?,
			b_addr: field("b_addr")?,
			b_size: field("b_size")?,
			s_addr: field("s_addr")?,
			s_size: field("s_size")?,
		})
	}

	/// Writes a complete header sector.
	pub fn write(&self, stream: &mut dyn std::io::Write) -> std::io::Result<()> {
		let mut marker = [0u8; MARKER_FIELD_SIZE];
		marker[..MARKER.len()].copy_from_slice(MARKER);
		stream.write_all(&marker)?;
		for value in &[
			self.pc0, self.gp0, self.t_addr, self.t_size, self.d_addr,
			self.d_size, self.b_addr, self.b_size, self.s_addr, self.s_size,
		] {
			stream.write_u32::<LittleEndian>(*value)?;
		}
		stream.write_all(&[0u8; HEADER_SIZE - MARKER_FIELD_SIZE - 10 * 4])
	}

	/// The stack the header asks for, if any.
	pub fn stack_top(&self) -> Option<u32> {
		if self.s_addr != 0 {
			Some(self.s_addr.wrapping_add(self.s_size))
		} else {
			None
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
	pub path: String,
	/// Sectors into the file where the header sector is.
	pub start_sector: u32,
	/// Header plus body, in sectors. 0 (or 1) means up to the end of the file.
	pub sector_count: u32,
	/// Initial stack pointer chosen by the title, ahead of anything the header says.
	pub stack_override: Option<u32>,
}

impl LoadRequest {
	pub fn new(path: &str) -> LoadRequest {
		LoadRequest { path: path.to_string(), start_sector: 0, sector_count: 0, stack_override: None }
	}
}

/// A program whose body is in memory, or on its way there.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProgram {
	pub path: String,
	pub header: ExeHeader,
	pub body: Region,
	pub stack_override: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
	Pending,
	/// Header and body are both in memory.
	Ready,
	Failed,
}

#[derive(Debug)]
enum LoadPhase {
	HeaderRead { entry: FileEntry, header_lba: u32, ticket: ReadTicket },
	BodyStreaming { program: LoadedProgram, ticket: ReadTicket },
	Failed(Option<BootError>),
}

/// An executable load in progress. Advance it with `poll` once per frame, then `wait`.
#[derive(Debug)]
pub struct LoadHandle {
	request: LoadRequest,
	phase: LoadPhase,
}

/// Looks the executable up and queues its header sector into the staging window.
///
/// A missing file is reported here, before any memory is touched.
pub fn begin_load<I: DiscImage>(console: &mut Console<I>, request: LoadRequest) -> Result<LoadHandle> {
	let staging = console.memory.map().window_start(WindowId::Staging, HEADER_SIZE as u32)?;
	let read = read_range(console, &request.path, staging, request.start_sector, 1, ReadMode::Issue)?;
	info!("Loading {}...", read.entry.path);
	Ok(LoadHandle {
		phase: LoadPhase::HeaderRead { entry: read.entry, header_lba: read.first_lba, ticket: read.ticket },
		request,
	})
}

fn body_status<I: DiscImage>(console: &Console<I>, ticket: ReadTicket) -> LoadStatus {
	match console.drive.status(ticket) {
		TransferStatus::Pending { .. } => LoadStatus::Pending,
		TransferStatus::Complete => LoadStatus::Ready,
	}
}

impl LoadHandle {
	/// Gives the drive one frame of work and moves on to the next phase when a read lands.
	pub fn poll<I: DiscImage>(&mut self, console: &mut Console<I>) -> LoadStatus {
		if let LoadPhase::Failed(_) = self.phase {
			return LoadStatus::Failed;
		}
		let result = console.service().and_then(|_| self.advance(console));
		match result {
			Ok(status) => status,
			Err(err) => {
				self.phase = LoadPhase::Failed(Some(err));
				LoadStatus::Failed
			}
		}
	}

	fn advance<I: DiscImage>(&mut self, console: &mut Console<I>) -> Result<LoadStatus> {
		match self.phase {
			LoadPhase::HeaderRead { ref entry, header_lba, ticket } => {
				if console.drive.status(ticket) != TransferStatus::Complete {
					return Ok(LoadStatus::Pending);
				}
				let (program, ticket) = self.start_body(console, entry, header_lba)?;
				self.phase = LoadPhase::BodyStreaming { program, ticket };
				Ok(body_status(console, ticket))
			}
			LoadPhase::BodyStreaming { ticket, .. } => Ok(body_status(console, ticket)),
			LoadPhase::Failed(_) => Ok(LoadStatus::Failed),
		}
	}

	/// Parses the staged header and issues the body read straight into the load window.
	fn start_body<I: DiscImage>(&self, console: &mut Console<I>, entry: &FileEntry, header_lba: u32) -> Result<(LoadedProgram, ReadTicket)> {
		let staging = console.memory.map().window_start(WindowId::Staging, HEADER_SIZE as u32)?;
		let header = ExeHeader::parse(&mut console.memory.slice(&staging))?;
		debug!("EXE parameters: pc0 {:08x} gp0 {:08x} t_addr {:08x} t_size {:x} s_addr {:08x} s_size {:x}",
			header.pc0, header.gp0, header.t_addr, header.t_size, header.s_addr, header.s_size);

		let body_sectors = if self.request.sector_count > 1 {
			self.request.sector_count - 1
		} else {
			let consumed = (self.request.start_sector as u64 + 1) * SECTOR_SIZE as u64;
			sectors_for_bytes((entry.size as u64).saturating_sub(consumed) as u32)
		};
		let body_bytes = body_sectors as u64 * SECTOR_SIZE as u64;
		if body_bytes > u32::MAX as u64 {
			return Err(BootError::OutsideWindow { window: WindowId::Load.name(), address: header.t_addr, length: u32::MAX });
		}
		let body = console.memory.map().region(WindowId::Load, header.t_addr, body_bytes as u32)?;
		debug!("Loading {} body sectors to 0x{:08x}", body_sectors, header.t_addr);

		console.drive.set_location(header_lba + 1)?;
		let ticket = console.drive.read(body_sectors, body)?;
		let program = LoadedProgram {
			path: entry.path.clone(),
			header,
			body,
			stack_override: self.request.stack_override,
		};
		Ok((program, ticket))
	}

	/// Finishes the load, blocking on whatever is still in flight.
	pub fn wait<I: DiscImage>(mut self, console: &mut Console<I>) -> Result<LoadedProgram> {
		loop {
			match self.phase {
				LoadPhase::HeaderRead { .. } => {
					console.sync()?;
					self.advance(console)?;
				}
				LoadPhase::BodyStreaming { program, .. } => {
					console.sync()?;
					info!("{} loaded", program.path);
					return Ok(program);
				}
				LoadPhase::Failed(ref mut err) => {
					let path = self.request.path.clone();
					return Err(err.take().unwrap_or(BootError::InvalidExecutable(path)));
				}
			}
		}
	}
}
